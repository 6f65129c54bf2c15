//! The engine's event model: a fixed set of event types, each carrying a
//! millisecond timestamp and an event-specific payload, dispatched
//! synchronously to every registered listener. A listener that panics is
//! caught and logged; it never aborts the triggering operation or prevents
//! other listeners from firing.

use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    EngineInitialized,
    IndexStart,
    IndexComplete,
    IndexError,
    SearchStart,
    SearchComplete,
    SearchError,
    UpdateStart,
    UpdateComplete,
    UpdateError,
    RemoveStart,
    RemoveComplete,
    RemoveError,
    StorageError,
    IndexClear,
    IndexClearError,
    EngineClosed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::EngineInitialized => "engine:initialized",
            EventType::IndexStart => "index:start",
            EventType::IndexComplete => "index:complete",
            EventType::IndexError => "index:error",
            EventType::SearchStart => "search:start",
            EventType::SearchComplete => "search:complete",
            EventType::SearchError => "search:error",
            EventType::UpdateStart => "update:start",
            EventType::UpdateComplete => "update:complete",
            EventType::UpdateError => "update:error",
            EventType::RemoveStart => "remove:start",
            EventType::RemoveComplete => "remove:complete",
            EventType::RemoveError => "remove:error",
            EventType::StorageError => "storage:error",
            EventType::IndexClear => "index:clear",
            EventType::IndexClearError => "index:clear:error",
            EventType::EngineClosed => "engine:closed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Event {
    pub fn new(event_type: EventType, timestamp: u64) -> Event {
        Event { event_type, timestamp, data: None, error: None }
    }

    pub fn with_data(mut self, data: Value) -> Event {
        self.data = Some(data);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Event {
        self.error = Some(error.into());
        self
    }
}

type Listener = Box<dyn Fn(&Event) + Send + Sync>;

/// Registered listener set. `emit` dispatches synchronously, in registration
/// order, to every listener still registered when dispatch began.
#[derive(Default)]
pub struct EventEmitter {
    listeners: Vec<Listener>,
}

impl EventEmitter {
    pub fn new() -> EventEmitter {
        EventEmitter::default()
    }

    pub fn on(&mut self, listener: impl Fn(&Event) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&self, event: Event) {
        for listener in &self.listeners {
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener(&event)));
            if let Err(payload) = result {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "listener panicked".to_string());
                tracing::warn!(event = event.event_type.as_str(), %message, "event listener panicked");
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter").field("listener_count", &self.listeners.len()).finish()
    }
}
