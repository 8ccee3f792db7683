//! Pipeline lifecycle events and sinks.
//!
//! The engine reports what it did (invocation start and end, short-circuits,
//! captured and handled exceptions, executed outcomes) to an [`EventSink`].
//! Sinks must not fail; the engine never waits on them.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, Level};
use uuid::Uuid;

/// Event emitted before the first stage runs.
pub const INVOCATION_STARTED: &str = "invocation.started";
/// Event emitted when the pipeline finishes, successfully or not.
pub const INVOCATION_COMPLETED: &str = "invocation.completed";
/// Event emitted when the addressed operation does not exist.
pub const INVOCATION_NOT_FOUND: &str = "invocation.not_found";
/// Event emitted when a filter short-circuits its stage.
pub const FILTER_SHORT_CIRCUIT: &str = "filter.short_circuit";
/// Event emitted when an error is first captured.
pub const EXCEPTION_CAPTURED: &str = "exception.captured";
/// Event emitted when exception filters handled an error.
pub const EXCEPTION_HANDLED: &str = "exception.handled";
/// Event emitted after the terminal outcome executed.
pub const OUTCOME_EXECUTED: &str = "outcome.executed";

/// A single lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Dotted event name, e.g. `filter.short_circuit`.
    pub event_type: String,
    /// The request the event belongs to.
    pub request_id: Uuid,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl PipelineEvent {
    /// Creates an event without payload.
    #[must_use]
    pub fn new(event_type: impl Into<String>, request_id: Uuid) -> Self {
        Self {
            event_type: event_type.into(),
            request_id,
            timestamp: Utc::now(),
            data: None,
        }
    }

    /// Attaches a payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Receives pipeline events.
pub trait EventSink: Send + Sync {
    /// Records an event. Must not block or panic.
    fn emit(&self, event: PipelineEvent);
}

/// A sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: PipelineEvent) {}
}

/// A sink that forwards events to `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink with the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn emit(&self, event: PipelineEvent) {
        if self.level == Level::DEBUG || self.level == Level::TRACE {
            debug!(
                event_type = %event.event_type,
                request_id = %event.request_id,
                event_data = ?event.data,
                "Event: {}", event.event_type
            );
        } else {
            info!(
                event_type = %event.event_type,
                request_id = %event.request_id,
                event_data = ?event.data,
                "Event: {}", event.event_type
            );
        }
    }
}

/// A sink that keeps every event, for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the collected event names, in order.
    pub fn event_types(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    /// Returns events whose name starts with `prefix`.
    pub fn events_of_type(&self, prefix: &str) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Returns the number of collected events.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Drops all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: PipelineEvent) {
        self.events.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        let id = Uuid::new_v4();
        assert!(sink.is_empty());

        sink.emit(PipelineEvent::new(INVOCATION_STARTED, id));
        sink.emit(
            PipelineEvent::new(FILTER_SHORT_CIRCUIT, id)
                .with_data(serde_json::json!({"filter": "auth"})),
        );

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.events_of_type("filter.").len(), 1);
        assert_eq!(
            sink.event_types(),
            vec![INVOCATION_STARTED.to_string(), FILTER_SHORT_CIRCUIT.to_string()]
        );

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_logging_and_noop_sinks_accept_events() {
        let event = PipelineEvent::new(OUTCOME_EXECUTED, Uuid::new_v4());
        LoggingEventSink::default().emit(event.clone());
        LoggingEventSink::debug().emit(event.clone());
        NoOpEventSink.emit(event);
    }

    #[test]
    fn test_event_serializes_without_empty_data() {
        let event = PipelineEvent::new(INVOCATION_NOT_FOUND, Uuid::nil());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event_type"], "invocation.not_found");
        assert!(json.get("data").is_none());
    }
}
