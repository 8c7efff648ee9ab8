//! Analytics sink used by the checkout and discovery flows.
//!
//! Event delivery is owned by the host application. The flows only describe
//! *what* happened through [`EventTracker`]; the default [`LogTracker`] writes
//! events to the `analytics` tracing target.
use serde_json::{Map, Value};
use std::sync::Mutex;

/// Properties attached to an analytics event.
pub type Properties = Map<String, Value>;

/// Receives analytics events from the flows.
pub trait EventTracker: Send + Sync {
    fn track(&self, event: &str, properties: Properties);
}

/// Tracker that forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracker;

impl EventTracker for LogTracker {
    fn track(&self, event: &str, properties: Properties) {
        let properties = Value::Object(properties);
        tracing::info!(target: "analytics", event, properties = %properties, "Tracked event");
    }
}

/// A tracked event as seen by [`RecordingTracker`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEvent {
    pub name: String,
    pub properties: Properties,
}

/// In-memory tracker. Used by tests and by the CLI replay output.
#[derive(Debug, Default)]
pub struct RecordingTracker {
    events: Mutex<Vec<TrackedEvent>>,
}

impl RecordingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything tracked so far.
    pub fn events(&self) -> Vec<TrackedEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Names of tracked events, in order.
    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.name).collect()
    }

    /// Value of `key` for every tracked event (`Value::Null` where absent).
    pub fn property(&self, key: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .map(|e| e.properties.get(key).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

impl EventTracker for RecordingTracker {
    fn track(&self, event: &str, properties: Properties) {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(TrackedEvent {
            name: event.to_owned(),
            properties,
        });
    }
}

/// Builds a [`Properties`] map from key/value pairs.
pub fn properties<I, K>(pairs: I) -> Properties
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
