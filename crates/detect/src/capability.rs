//! Degraded-capability reporting.

use applock_events::{Capability, Component};
use std::sync::{Arc, PoisonError, RwLock};

/// Callback invoked when a source's capability changes.
pub type CapabilityListener = Arc<dyn Fn(Component, Capability) + Send + Sync + 'static>;

/// Shared capability flag a source publishes to its owner.
#[derive(Clone)]
pub struct CapabilityStatus {
    component: Component,
    current: Arc<RwLock<Capability>>,
    listener: Option<CapabilityListener>,
}

impl CapabilityStatus {
    pub fn new(component: Component) -> Self {
        Self {
            component,
            current: Arc::new(RwLock::new(Capability::Available)),
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: CapabilityListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn component(&self) -> Component {
        self.component
    }

    pub fn get(&self) -> Capability {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Store a new capability. The listener only fires on actual changes.
    pub fn set(&self, capability: Capability) -> bool {
        {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            if *guard == capability {
                return false;
            }
            *guard = capability.clone();
        }

        match &capability {
            Capability::Available => {
                tracing::info!(component = ?self.component, "capability restored")
            }
            Capability::Degraded { reason } => {
                tracing::warn!(component = ?self.component, %reason, "capability degraded")
            }
        }

        if let Some(listener) = &self.listener {
            listener(self.component, capability);
        }
        true
    }

    pub fn degrade(&self, reason: impl Into<String>) -> bool {
        self.set(Capability::Degraded {
            reason: reason.into(),
        })
    }
}
