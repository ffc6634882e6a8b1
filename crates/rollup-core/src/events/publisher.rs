//! Publisher seam for lifecycle events.

use std::sync::{Arc, Mutex};

use super::envelope::EventEnvelope;
use super::types::RollupEventType;

/// Fire-and-forget publication. Implementations own their transport and must
/// not block the caller on delivery; failures are theirs to log.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &EventEnvelope);
}

impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    fn publish(&self, event: &EventEnvelope) {
        (**self).publish(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventPublisher;

impl EventPublisher for NoopEventPublisher {
    fn publish(&self, _event: &EventEnvelope) {}
}

/// Keeps every published event in memory, in publication order.
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<EventEnvelope>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EventEnvelope> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn events_of(&self, event_type: RollupEventType) -> Vec<EventEnvelope> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Events belonging to one execution.
    pub fn for_execution(&self, execution_id: &str) -> Vec<EventEnvelope> {
        self.events()
            .into_iter()
            .filter(|e| e.body.execution_id() == Some(execution_id))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventPublisher for RecordingEventPublisher {
    fn publish(&self, event: &EventEnvelope) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
