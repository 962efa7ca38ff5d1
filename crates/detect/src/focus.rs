//! Push detector: forwards window-focus notifications to the arbiter.

use crate::capability::CapabilityStatus;
use crate::exclusion::ExclusionFilter;
use crate::provider::{WindowEvent, WindowEventCallback, WindowEventSource};
use crate::ObservationSink;
use applock_events::{Capability, Component, TriggerSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Event-driven foreground detector.
///
/// A failed subscription is not fatal: the detector reports `Degraded` and
/// stays idle while the sampler keeps the engine informed.
pub struct FocusDetector {
    filter: Arc<ExclusionFilter>,
    sink: ObservationSink,
    status: CapabilityStatus,
    active: Arc<AtomicBool>,
    source: Option<Arc<dyn WindowEventSource>>,
}

impl FocusDetector {
    pub fn new(filter: ExclusionFilter, sink: ObservationSink) -> Self {
        Self::with_status(filter, sink, CapabilityStatus::new(Component::Detector))
    }

    pub fn with_status(
        filter: ExclusionFilter,
        sink: ObservationSink,
        status: CapabilityStatus,
    ) -> Self {
        Self {
            filter: Arc::new(filter),
            sink,
            status,
            active: Arc::new(AtomicBool::new(false)),
            source: None,
        }
    }

    /// Subscribe to `source` and start forwarding observations.
    pub fn start(&mut self, source: Arc<dyn WindowEventSource>) -> Capability {
        if self.active.load(Ordering::SeqCst) {
            tracing::warn!("FocusDetector already running");
            return self.status.get();
        }

        let filter = Arc::clone(&self.filter);
        let sink = Arc::clone(&self.sink);
        let active = Arc::clone(&self.active);
        let callback: WindowEventCallback = Arc::new(move |event| {
            forward(&filter, &sink, &active, event);
        });

        // Mark active before subscribing so events delivered synchronously
        // from inside `subscribe` are not lost.
        self.active.store(true, Ordering::SeqCst);
        match source.subscribe(callback) {
            Ok(()) => {
                tracing::info!("FocusDetector subscribed to window events");
                self.status.set(Capability::Available);
                self.source = Some(source);
            }
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                self.status.degrade(e.to_string());
            }
        }
        self.status.get()
    }

    /// Entry point for platform glue that delivers events directly.
    pub fn handle_event(&self, event: WindowEvent) {
        forward(&self.filter, &self.sink, &self.active, event);
    }

    /// Unsubscribe. Events delivered after this returns are dropped, including
    /// through callbacks the platform still holds. A callback already past
    /// its final `active` check when `stop` runs may still deliver once.
    pub fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(source) = self.source.take() {
            source.unsubscribe();
            tracing::info!("FocusDetector stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn capability(&self) -> Capability {
        self.status.get()
    }
}

impl Drop for FocusDetector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn forward(
    filter: &ExclusionFilter,
    sink: &ObservationSink,
    active: &AtomicBool,
    event: WindowEvent,
) {
    if !active.load(Ordering::SeqCst) {
        return;
    }
    let Some(raw) = event.app_id.as_deref() else {
        return;
    };
    let Some(app) = filter.admit(raw) else {
        tracing::trace!(app = raw, "window event excluded");
        return;
    };

    if !active.load(Ordering::SeqCst) {
        return;
    }
    tracing::debug!(app = %app, class = ?event.class_name, "window focus changed");
    sink(app, TriggerSource::Push);
}
