//! Trigger arbiter: turns foreground observations into at most one lock
//! screen per episode.
//!
//! Both foreground sources feed `on_foreground_observed`. The order of the
//! checks matters:
//!
//! 1. Grace bookkeeping runs first and for every app, locked or not. A flow
//!    presenting for a different app is abandoned: the lock screen belongs to
//!    the excluded own app, so any other admitted app means the user left it.
//! 2. Live grace for the app ends the decision.
//! 3. Unlocked apps end the decision.
//! 4. A flow already presenting for the same app suppresses the duplicate.
//! 5. Otherwise a flow is opened and the lock screen requested.

use crate::clock::{duration_ms, ClockRef};
use crate::error::{EngineError, Result};
use crate::flow::{FlowState, LockFlow};
use crate::grace::GraceLedger;
use crate::presenter::PresenterRef;
use applock_events::{
    emit_event, AbandonReason, AppId, EngineEvent, EventBusRef, TriggerSource,
};
use applock_policy::LockPolicyRef;
use std::time::Duration;
use uuid::Uuid;

/// Outcome of a single foreground observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// A new flow was opened and the lock screen requested.
    Presented(Uuid),
    /// The app holds live grace.
    GraceActive,
    /// The app is not protected.
    NotLocked,
    /// The policy lookup failed; retried on the next observation.
    PolicyUnavailable,
    /// A flow for this app is already presenting.
    DuplicateSuppressed,
    /// The platform rejected the launch; the flow was abandoned.
    PresentationFailed,
}

impl Decision {
    pub fn presented(&self) -> bool {
        matches!(self, Decision::Presented(_))
    }
}

pub struct Arbiter {
    ledger: GraceLedger,
    flow: Option<LockFlow>,
    policy: LockPolicyRef,
    presenter: PresenterRef,
    clock: ClockRef,
    events: EventBusRef,
    default_grace: Duration,
}

impl Arbiter {
    pub fn new(
        policy: LockPolicyRef,
        presenter: PresenterRef,
        clock: ClockRef,
        events: EventBusRef,
        default_grace: Duration,
    ) -> Self {
        Self {
            ledger: GraceLedger::new(clock.clone()),
            flow: None,
            policy,
            presenter,
            clock,
            events,
            default_grace,
        }
    }

    pub fn on_foreground_observed(&mut self, app: &AppId, source: TriggerSource) -> Decision {
        let evicted = self.ledger.on_app_switch(app);
        if !evicted.is_empty() {
            tracing::debug!(foreground = %app, evicted = evicted.len(), "grace cleared on switch");
            self.emit(EngineEvent::GraceEvicted {
                foreground: app.clone(),
                evicted,
            });
        }
        if self.flow.as_ref().is_some_and(|flow| !flow.is_for(app)) {
            self.close_abandoned(AbandonReason::LeftForeground);
        }

        if self.ledger.is_allowed(app) {
            tracing::debug!(app = %app, %source, "grace active, not locking");
            return Decision::GraceActive;
        }

        match self.policy.is_locked(app) {
            Ok(true) => {}
            Ok(false) => return Decision::NotLocked,
            Err(e) => {
                tracing::warn!(app = %app, %source, "policy lookup failed: {}", e);
                return Decision::PolicyUnavailable;
            }
        }

        if let Some(flow) = &self.flow {
            tracing::debug!(
                app = %app,
                %source,
                flow_id = %flow.id,
                "duplicate trigger suppressed"
            );
            self.emit(EngineEvent::DuplicateSuppressed {
                app: app.clone(),
                source,
            });
            return Decision::DuplicateSuppressed;
        }

        self.open_flow(app, source)
    }

    fn open_flow(&mut self, app: &AppId, source: TriggerSource) -> Decision {
        let flow = LockFlow::open(app.clone(), source, self.clock.now_ms());
        let flow_id = flow.id;
        tracing::info!(
            app = %app,
            %source,
            %flow_id,
            "locked app detected, presenting lock screen"
        );
        self.emit(EngineEvent::FlowStarted {
            flow_id,
            app: app.clone(),
            source,
            started_at_ms: flow.started_at_ms,
        });
        self.flow = Some(flow);

        match self.presenter.present_lock_screen(app) {
            Ok(()) => Decision::Presented(flow_id),
            Err(e) => {
                tracing::warn!(app = %app, %flow_id, "lock screen launch failed: {}", e);
                self.close_abandoned(AbandonReason::PresentationFailed);
                Decision::PresentationFailed
            }
        }
    }

    /// Apply grace after successful authentication and return to the app.
    ///
    /// Without an explicit `app` the presenting flow's app is used. Without
    /// a `duration` the configured default grace applies.
    pub fn grant_unlock(
        &mut self,
        app: Option<AppId>,
        duration: Option<Duration>,
    ) -> Result<AppId> {
        let target = match app {
            Some(app) => app,
            None => self
                .flow
                .as_ref()
                .map(|flow| flow.app.clone())
                .ok_or(EngineError::NoActiveFlow)?,
        };
        let grace = duration.unwrap_or(self.default_grace);

        self.ledger.allow(&target, grace);

        if let Err(e) = self.presenter.bring_to_foreground(&target) {
            // Grace is already recorded; the user can reopen the app.
            tracing::warn!(app = %target, "failed to return to unlocked app: {}", e);
        }

        match self.flow.take() {
            Some(mut flow) if flow.is_for(&target) => {
                self.presenter.dismiss_lock_screen(&target);
                flow.resolve(FlowState::Unlocked);
                let elapsed_ms = flow.elapsed_ms(self.clock.now_ms());
                tracing::info!(
                    app = %target,
                    flow_id = %flow.id,
                    elapsed_ms,
                    "unlock successful, grace applied"
                );
                self.emit(EngineEvent::FlowUnlocked {
                    flow_id: flow.id,
                    app: target.clone(),
                    elapsed_ms,
                    grace_ms: u64::try_from(duration_ms(grace)).unwrap_or(u64::MAX),
                });
            }
            other => {
                tracing::info!(app = %target, "grace applied without a matching flow");
                self.flow = other;
            }
        }

        Ok(target)
    }

    /// The presentation layer reports that the lock screen for `app` could
    /// not be shown. No retry: the next observation starts over.
    pub fn report_presentation_failed(&mut self, app: &AppId) -> bool {
        self.abandon_if_for(app, AbandonReason::PresentationFailed)
    }

    /// The presentation layer cancelled the challenge for `app`.
    pub fn abandon(&mut self, app: &AppId) -> bool {
        self.abandon_if_for(app, AbandonReason::Cancelled)
    }

    fn abandon_if_for(&mut self, app: &AppId, reason: AbandonReason) -> bool {
        if !self.flow.as_ref().is_some_and(|flow| flow.is_for(app)) {
            tracing::debug!(app = %app, ?reason, "no presenting flow for app");
            return false;
        }
        self.close_abandoned(reason);
        true
    }

    fn close_abandoned(&mut self, reason: AbandonReason) {
        let Some(mut flow) = self.flow.take() else {
            return;
        };
        flow.resolve(FlowState::Abandoned);
        let elapsed_ms = flow.elapsed_ms(self.clock.now_ms());
        tracing::info!(
            app = %flow.app,
            flow_id = %flow.id,
            ?reason,
            elapsed_ms,
            "lock flow abandoned"
        );
        self.emit(EngineEvent::FlowAbandoned {
            flow_id: flow.id,
            app: flow.app,
            reason,
            elapsed_ms,
        });
    }

    pub fn is_allowed(&mut self, app: &AppId) -> bool {
        self.ledger.is_allowed(app)
    }

    pub fn active_flow(&self) -> Option<&LockFlow> {
        self.flow.as_ref()
    }

    pub fn flow_state(&self) -> FlowState {
        self.flow
            .as_ref()
            .map(|flow| flow.state)
            .unwrap_or(FlowState::Idle)
    }

    pub fn current_foreground(&self) -> Option<&AppId> {
        self.ledger.current_foreground()
    }

    pub fn default_grace(&self) -> Duration {
        self.default_grace
    }

    fn emit(&self, event: EngineEvent) {
        emit_event(&*self.events, &event);
    }
}
