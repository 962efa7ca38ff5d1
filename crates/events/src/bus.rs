//! Event bus abstraction for decoupled event emission.
//!
//! Provides a trait-based abstraction over event emission, allowing the
//! engine to be tested without a host UI and to run headless.

use crate::EngineEvent;
use std::sync::{Arc, Mutex, PoisonError};

/// Sink for engine diagnostics. Hosts forward these to their UI or logs.
pub trait EventBus: Send + Sync {
    /// Emit an event with a JSON payload.
    ///
    /// # Arguments
    /// * `topic` - Event name/topic (e.g., "lock:flow_started")
    /// * `payload` - JSON payload to emit
    fn emit(&self, topic: &str, payload: serde_json::Value);
}

/// Type alias for shared event bus reference.
pub type EventBusRef = Arc<dyn EventBus>;

/// Serialize an engine event and publish it under its own topic.
pub fn emit_event(bus: &dyn EventBus, event: &EngineEvent) {
    match serde_json::to_value(event) {
        Ok(payload) => bus.emit(event.topic(), payload),
        Err(e) => tracing::warn!(topic = event.topic(), "failed to serialize engine event: {}", e),
    }
}

/// Bus that keeps every event, for tests and simulations.
#[derive(Default)]
pub struct InMemoryEventBus {
    events: Mutex<Vec<EmittedEvent>>,
}

/// One captured emission.
#[derive(Debug, Clone)]
pub struct EmittedEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl EmittedEvent {
    /// Decode the payload back into an engine event.
    pub fn decode(&self) -> Option<EngineEvent> {
        serde_json::from_value(self.payload.clone()).ok()
    }
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, Vec<EmittedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get all captured events.
    pub fn events(&self) -> Vec<EmittedEvent> {
        self.guard().clone()
    }

    /// Get events for a specific topic.
    pub fn events_for(&self, topic: &str) -> Vec<EmittedEvent> {
        self.guard()
            .iter()
            .filter(|e| e.topic == topic)
            .cloned()
            .collect()
    }

    /// Captured events decoded back into `EngineEvent`s, in emission order.
    pub fn engine_events(&self) -> Vec<EngineEvent> {
        self.guard().iter().filter_map(EmittedEvent::decode).collect()
    }

    /// Clear all captured events.
    pub fn clear(&self) {
        self.guard().clear();
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

impl EventBus for InMemoryEventBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        self.guard().push(EmittedEvent {
            topic: topic.to_string(),
            payload,
        });
    }
}

/// Bus for hosts that do not consume diagnostics.
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn emit(&self, _topic: &str, _payload: serde_json::Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{event_names, AbandonReason, AppId, TriggerSource};
    use serde_json::json;

    fn suppressed(app: &str, source: TriggerSource) -> EngineEvent {
        EngineEvent::DuplicateSuppressed {
            app: AppId::from(app),
            source,
        }
    }

    #[test]
    fn test_emit_event_routes_to_topic() {
        let bus = InMemoryEventBus::new();
        let event = suppressed("bank.app", TriggerSource::Push);

        emit_event(&bus, &event);

        let captured = bus.events_for(event_names::DUPLICATE_SUPPRESSED);
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].decode(), Some(event));
        assert!(bus.events_for(event_names::FLOW_STARTED).is_empty());
    }

    #[test]
    fn test_engine_events_keep_order_and_skip_foreign_payloads() {
        let bus = InMemoryEventBus::new();
        emit_event(&bus, &suppressed("bank.app", TriggerSource::Poll));
        bus.emit("host:note", json!({"text": "not an engine event"}));
        emit_event(
            &bus,
            &EngineEvent::FlowAbandoned {
                flow_id: uuid::Uuid::nil(),
                app: AppId::from("bank.app"),
                reason: AbandonReason::Cancelled,
                elapsed_ms: 40,
            },
        );

        assert_eq!(bus.len(), 3);
        let decoded = bus.engine_events();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].topic(), event_names::DUPLICATE_SUPPRESSED);
        assert_eq!(decoded[1].topic(), event_names::FLOW_ABANDONED);

        bus.clear();
        assert!(bus.is_empty());
    }

    #[test]
    fn test_null_event_bus_discards() {
        emit_event(&NullEventBus, &suppressed("bank.app", TriggerSource::Push));
    }
}
