//! The envelope every published event travels in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{EventPayload, RollupEventType};

/// Bumped when a payload shape changes incompatibly.
pub const EVENT_SCHEMA_VERSION: u32 = 1;

pub const EVENT_SOURCE: &str = "rollup-engine";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self {
            correlation_id: None,
            causation_id: None,
            triggered_by: None,
            source: EVENT_SOURCE.to_string(),
            context: None,
        }
    }
}

/// `{type, eventId, tenantId, timestamp, version, payload, metadata}`.
/// Consumers must be idempotent on `eventId`; delivery is at-least-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: String,
    pub tenant_id: String,
    pub timestamp: DateTime<Utc>,
    pub version: u32,
    #[serde(flatten)]
    pub body: EventPayload,
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl EventEnvelope {
    pub fn new(tenant_id: impl Into<String>, body: EventPayload) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            timestamp: Utc::now(),
            version: EVENT_SCHEMA_VERSION,
            body,
            metadata: EventMetadata::default(),
        }
    }

    pub fn with_correlation(mut self, correlation_id: Option<String>) -> Self {
        self.metadata.correlation_id = correlation_id;
        self
    }

    pub fn with_causation(mut self, causation_id: Option<String>) -> Self {
        self.metadata.causation_id = causation_id;
        self
    }

    pub fn with_triggered_by(mut self, triggered_by: Option<String>) -> Self {
        self.metadata.triggered_by = triggered_by;
        self
    }

    pub fn event_type(&self) -> RollupEventType {
        self.body.event_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::ConfigurationDeletedEvent;

    #[test]
    fn envelope_wire_shape() {
        let envelope = EventEnvelope::new(
            "tenant-1",
            EventPayload::ConfigurationDeleted(ConfigurationDeletedEvent {
                rollup_id: "r1".into(),
            }),
        )
        .with_correlation(Some("corr-1".into()));

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["type"], "rollup.configuration.deleted");
        assert_eq!(value["payload"]["rollupId"], "r1");
        assert_eq!(value["tenantId"], "tenant-1");
        assert_eq!(value["version"], 1);
        assert_eq!(value["metadata"]["source"], "rollup-engine");
        assert_eq!(value["metadata"]["correlationId"], "corr-1");
        assert!(value["eventId"].as_str().is_some());

        let back: EventEnvelope = serde_json::from_value(value).unwrap();
        assert_eq!(back, envelope);
    }
}
