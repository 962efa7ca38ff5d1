//! Shared contracts for the app-lock engine.
//!
//! This crate defines the identifiers and diagnostic events that flow
//! between the detector, the sampler, the arbiter and whoever hosts the
//! engine. Keeping them in one leaf crate prevents field-name drift between
//! producers and consumers.
//!
//! Also provides the `EventBus` trait for decoupled event emission.

mod bus;

pub use bus::{emit_event, EmittedEvent, EventBus, EventBusRef, InMemoryEventBus, NullEventBus};

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of an installed application (package / bundle id).
///
/// Equality is exact string match. The engine never owns the application,
/// it only names it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AppId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for AppId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which foreground source reported an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    /// Window-focus notifications (event driven).
    Push,
    /// Usage-ranking sampler (timer driven).
    Poll,
}

impl TriggerSource {
    pub fn label(&self) -> &'static str {
        match self {
            TriggerSource::Push => "push",
            TriggerSource::Poll => "poll",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a lock flow ended without an unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    /// The platform rejected the lock screen launch.
    PresentationFailed,
    /// The presentation layer cancelled the challenge.
    Cancelled,
    /// Another app came to the foreground before the user authenticated.
    LeftForeground,
}

/// Foreground source whose platform capability changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Detector,
    Sampler,
}

/// Capability of a foreground source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Capability {
    /// The source is delivering observations.
    #[default]
    Available,
    /// A required permission is missing; the source runs as a no-op.
    Degraded { reason: String },
}

impl Capability {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available)
    }
}

/// Diagnostic events emitted by the engine.
///
/// Producers: arbiter, detector and sampler adapters
/// Consumers: host application (logs, debug views)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A lock screen was requested for an app.
    FlowStarted {
        flow_id: Uuid,
        app: AppId,
        source: TriggerSource,
        started_at_ms: i64,
    },
    /// The user authenticated and grace was applied.
    FlowUnlocked {
        flow_id: Uuid,
        app: AppId,
        elapsed_ms: i64,
        grace_ms: u64,
    },
    /// The flow ended without an unlock.
    FlowAbandoned {
        flow_id: Uuid,
        app: AppId,
        reason: AbandonReason,
        elapsed_ms: i64,
    },
    /// A second trigger for an app whose flow is already presenting.
    DuplicateSuppressed { app: AppId, source: TriggerSource },
    /// A foreground switch cleared grace held by other apps.
    GraceEvicted { foreground: AppId, evicted: Vec<AppId> },
    /// A foreground source gained or lost its platform capability.
    CapabilityChanged {
        component: Component,
        capability: Capability,
    },
}

impl EngineEvent {
    /// Topic this event is published under.
    pub fn topic(&self) -> &'static str {
        match self {
            EngineEvent::FlowStarted { .. } => event_names::FLOW_STARTED,
            EngineEvent::FlowUnlocked { .. } => event_names::FLOW_UNLOCKED,
            EngineEvent::FlowAbandoned { .. } => event_names::FLOW_ABANDONED,
            EngineEvent::DuplicateSuppressed { .. } => event_names::DUPLICATE_SUPPRESSED,
            EngineEvent::GraceEvicted { .. } => event_names::GRACE_EVICTED,
            EngineEvent::CapabilityChanged { .. } => event_names::CAPABILITY_CHANGED,
        }
    }
}

/// Event names as constants to prevent typos.
pub mod event_names {
    pub const FLOW_STARTED: &str = "lock:flow_started";
    pub const FLOW_UNLOCKED: &str = "lock:flow_unlocked";
    pub const FLOW_ABANDONED: &str = "lock:flow_abandoned";
    pub const DUPLICATE_SUPPRESSED: &str = "lock:duplicate_suppressed";
    pub const GRACE_EVICTED: &str = "grace:evicted";
    pub const CAPABILITY_CHANGED: &str = "detect:capability_changed";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_id_is_exact_match() {
        assert_eq!(AppId::from("bank.app"), AppId::new("bank.app"));
        assert_ne!(AppId::from("bank.app"), AppId::from("Bank.app"));
        assert_ne!(AppId::from("bank.app"), AppId::from("bank.app "));
    }

    #[test]
    fn test_app_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&AppId::from("bank.app")).unwrap();
        assert_eq!(json, r#""bank.app""#);
    }

    #[test]
    fn test_flow_started_wire_shape() {
        let event = EngineEvent::FlowStarted {
            flow_id: Uuid::nil(),
            app: AppId::from("bank.app"),
            source: TriggerSource::Poll,
            started_at_ms: 42,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "flow_started");
        assert_eq!(value["app"], "bank.app");
        assert_eq!(value["source"], "poll");
        assert_eq!(event.topic(), event_names::FLOW_STARTED);
    }

    #[test]
    fn test_capability_deserialize() {
        let json = r#"{"status": "degraded", "reason": "usage access not granted"}"#;
        let capability: Capability = serde_json::from_str(json).unwrap();
        assert!(!capability.is_available());
        assert_eq!(
            capability,
            Capability::Degraded {
                reason: "usage access not granted".to_string()
            }
        );
    }
}
