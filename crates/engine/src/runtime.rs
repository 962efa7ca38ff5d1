//! Runtime wiring: one tokio task owns the `Arbiter`; everything else talks
//! to it through `EngineHandle`.
//!
//! The push detector and the poll sampler run on their own threads and only
//! ever enqueue `EngineCommand::Observe`. The arbiter task applies commands
//! one at a time, so grace bookkeeping and the flow slot never see
//! interleaved updates from the two sources.

use crate::arbiter::Arbiter;
use crate::clock::ClockRef;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::flow::LockFlow;
use crate::presenter::PresenterRef;
use applock_detect::{
    new_sink, CapabilityStatus, FocusDetector, ForegroundSampler, ObservationSink, UsageRanking,
    WindowEventSource,
};
use applock_events::{
    emit_event, AppId, Capability, Component, EngineEvent, EventBusRef, TriggerSource,
};
use applock_policy::LockPolicyRef;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Commands consumed by the arbiter task.
#[derive(Debug)]
pub enum EngineCommand {
    Observe {
        app: AppId,
        source: TriggerSource,
    },
    GrantUnlock {
        app: Option<AppId>,
        duration: Option<Duration>,
        reply: oneshot::Sender<Result<AppId>>,
    },
    PresentationFailed {
        app: AppId,
    },
    Abandon {
        app: AppId,
    },
    IsAllowed {
        app: AppId,
        reply: oneshot::Sender<bool>,
    },
    ActiveFlow {
        reply: oneshot::Sender<Option<LockFlow>>,
    },
}

/// Cloneable sender side of the engine.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    /// Report a foreground observation. Returns false once the engine stopped.
    pub fn observe(&self, app: AppId, source: TriggerSource) -> bool {
        match self.send(EngineCommand::Observe { app, source }) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!("observation dropped, engine stopped");
                false
            }
        }
    }

    /// Sink for `FocusDetector` and `ForegroundSampler`.
    pub fn observation_sink(&self) -> ObservationSink {
        let handle = self.clone();
        new_sink(move |app, source| {
            handle.observe(app, source);
        })
    }

    /// Authentication succeeded for `app`.
    pub async fn grant_unlock(&self, app: AppId, duration: Option<Duration>) -> Result<AppId> {
        self.request_grant(Some(app), duration).await
    }

    /// Authentication succeeded for whichever app the active flow belongs to.
    pub async fn grant_unlock_active(&self) -> Result<AppId> {
        self.request_grant(None, None).await
    }

    async fn request_grant(&self, app: Option<AppId>, duration: Option<Duration>) -> Result<AppId> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::GrantUnlock {
            app,
            duration,
            reply,
        })?;
        rx.await.map_err(|_| EngineError::EngineStopped)?
    }

    pub fn report_presentation_failed(&self, app: AppId) -> Result<()> {
        self.send(EngineCommand::PresentationFailed { app })
    }

    pub fn abandon(&self, app: AppId) -> Result<()> {
        self.send(EngineCommand::Abandon { app })
    }

    pub async fn is_allowed(&self, app: AppId) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::IsAllowed { app, reply })?;
        rx.await.map_err(|_| EngineError::EngineStopped)
    }

    pub async fn active_flow(&self) -> Result<Option<LockFlow>> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::ActiveFlow { reply })?;
        rx.await.map_err(|_| EngineError::EngineStopped)
    }

    fn send(&self, command: EngineCommand) -> Result<()> {
        self.tx.send(command).map_err(|_| EngineError::EngineStopped)
    }
}

/// Capability of each attached source. `None` means not attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineCapabilities {
    pub detector: Option<Capability>,
    pub sampler: Option<Capability>,
}

/// A running lock engine.
pub struct LockEngine {
    config: EngineConfig,
    handle: EngineHandle,
    events: EventBusRef,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    detector: Option<FocusDetector>,
    sampler: Option<ForegroundSampler>,
}

impl LockEngine {
    /// Validate `config` and spawn the arbiter task on the current runtime.
    pub fn start(
        config: EngineConfig,
        policy: LockPolicyRef,
        presenter: PresenterRef,
        clock: ClockRef,
        events: EventBusRef,
    ) -> Result<Self> {
        config.validate()?;

        let arbiter = Arbiter::new(
            policy,
            presenter,
            clock,
            events.clone(),
            config.default_grace(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_arbiter(arbiter, rx, cancel.clone()));

        tracing::info!(
            own_app = %config.own_app_id,
            grace_ms = config.default_grace_ms,
            "lock engine started"
        );

        Ok(Self {
            config,
            handle: EngineHandle { tx },
            events,
            cancel,
            task: Some(task),
            detector: None,
            sampler: None,
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribe the push detector to `source`.
    ///
    /// A failed subscription leaves the detector degraded; the engine keeps
    /// running on the sampler alone.
    pub fn attach_detector(&mut self, source: Arc<dyn WindowEventSource>) -> Capability {
        if let Some(detector) = &self.detector {
            tracing::warn!("detector already attached");
            return detector.capability();
        }

        let mut detector = FocusDetector::with_status(
            self.config.exclusion_filter(),
            self.handle.observation_sink(),
            self.capability_status(Component::Detector),
        );
        let capability = detector.start(source);
        self.detector = Some(detector);
        capability
    }

    /// Start the poll sampler against `provider`.
    pub fn attach_sampler<P>(&mut self, provider: Arc<P>) -> Capability
    where
        P: UsageRanking + ?Sized + 'static,
    {
        if let Some(sampler) = &self.sampler {
            tracing::warn!("sampler already attached");
            return sampler.capability();
        }

        let mut sampler = ForegroundSampler::with_status(
            self.config.exclusion_filter(),
            self.capability_status(Component::Sampler),
        );
        sampler.start_with_config(
            provider,
            self.handle.observation_sink(),
            self.config.sampler_config(),
        );
        let capability = sampler.capability();
        self.sampler = Some(sampler);
        capability
    }

    pub fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            detector: self.detector.as_ref().map(FocusDetector::capability),
            sampler: self.sampler.as_ref().map(ForegroundSampler::capability),
        }
    }

    /// Stop both sources, then the arbiter task.
    ///
    /// Once this returns no further observation is applied and every
    /// `EngineHandle` call fails with `EngineStopped`.
    pub async fn shutdown(&mut self) {
        if let Some(mut sampler) = self.sampler.take() {
            // Joining waits out an in-flight usage query.
            if let Err(e) = tokio::task::spawn_blocking(move || sampler.stop()).await {
                tracing::warn!("sampler stop failed: {}", e);
            }
        }
        if let Some(mut detector) = self.detector.take() {
            detector.stop();
        }

        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("arbiter task ended abnormally: {}", e);
            }
        }
        tracing::info!("lock engine stopped");
    }

    fn capability_status(&self, component: Component) -> CapabilityStatus {
        let events = self.events.clone();
        CapabilityStatus::new(component).with_listener(Arc::new(move |component, capability| {
            emit_event(
                &*events,
                &EngineEvent::CapabilityChanged {
                    component,
                    capability,
                },
            );
        }))
    }
}

impl Drop for LockEngine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_arbiter(
    mut arbiter: Arbiter,
    mut rx: mpsc::UnboundedReceiver<EngineCommand>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => apply(&mut arbiter, command),
                None => break,
            },
        }
    }

    // Stop accepting; queued observations are discarded with the receiver.
    rx.close();
    if let Some(flow) = arbiter.active_flow() {
        tracing::info!(
            app = %flow.app,
            flow_id = %flow.id,
            "arbiter stopped with a flow presenting"
        );
    }
}

fn apply(arbiter: &mut Arbiter, command: EngineCommand) {
    match command {
        EngineCommand::Observe { app, source } => {
            let decision = arbiter.on_foreground_observed(&app, source);
            tracing::trace!(app = %app, %source, ?decision, "observation applied");
        }
        EngineCommand::GrantUnlock {
            app,
            duration,
            reply,
        } => {
            let _ = reply.send(arbiter.grant_unlock(app, duration));
        }
        EngineCommand::PresentationFailed { app } => {
            arbiter.report_presentation_failed(&app);
        }
        EngineCommand::Abandon { app } => {
            arbiter.abandon(&app);
        }
        EngineCommand::IsAllowed { app, reply } => {
            let _ = reply.send(arbiter.is_allowed(&app));
        }
        EngineCommand::ActiveFlow { reply } => {
            let _ = reply.send(arbiter.active_flow().cloned());
        }
    }
}
