//! Fire-and-forget lifecycle events emitted by the chat session.
//!
//! The sink is an injected dependency rather than ambient global
//! state so tests can substitute a recording or no-op sink.
use serde_json::Value;

pub const CHAT_STARTED: &str = "lm.chatStarted";
pub const MODEL_SELECTED: &str = "lm.modelSelected";
pub const NO_SUITABLE_MODEL_FOUND: &str = "lm.noSuitableModelFound";
pub const REQUEST_SENT: &str = "lm.requestSent";
pub const REQUEST_FAILED: &str = "lm.requestFailed";
pub const CHAT_COMPLETED: &str = "lm.chatCompleted";

pub trait EventSink: Send + Sync {
    fn emit(&self, name: &str, properties: Option<Value>);
}

/// Forwards events to the tracing subscriber.
#[derive(Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, name: &str, properties: Option<Value>) {
        match properties {
            Some(properties) => tracing::debug!(event = name, %properties, "telemetry"),
            None => tracing::debug!(event = name, "telemetry"),
        }
    }
}

/// Drops every event.
#[derive(Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _name: &str, _properties: Option<Value>) {}
}
