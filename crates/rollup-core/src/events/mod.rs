//! Lifecycle event contract: envelope, typed payloads and the publisher seam.

pub mod envelope;
pub mod publisher;
pub mod types;

pub use envelope::{EventEnvelope, EventMetadata, EVENT_SCHEMA_VERSION, EVENT_SOURCE};
pub use publisher::{EventPublisher, NoopEventPublisher, RecordingEventPublisher};
pub use types::*;
