//! Capture for hosts that log through `tracing`.
//!
//! [`CaptureLayer`] is the `tracing` counterpart of the console wrapper: add it
//! to the host's subscriber and, while the agent is intercepting, every event
//! becomes a captured record. Events from this crate and from the transport
//! stack it drives are skipped so delivery never feeds back into capture.

use super::Recorder;
use crate::types::{LogLevel, LogMetadata};
use std::fmt::{self, Write};
use std::sync::Weak;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Targets never captured
const IGNORED_TARGETS: &[&str] = &[
    env!("CARGO_CRATE_NAME"),
    "tonic",
    "h2",
    "hyper",
    "hyper_util",
    "tower",
    "rustls",
];

/// A tracing layer feeding events into an agent.
///
/// Holds only a weak reference: once the agent is dropped the layer goes
/// quiet instead of keeping the agent alive inside a global subscriber.
pub struct CaptureLayer {
    recorder: Weak<dyn Recorder>,
}

impl CaptureLayer {
    pub(crate) fn new(recorder: Weak<dyn Recorder>) -> Self {
        Self { recorder }
    }
}

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|ignored| {
        target == *ignored
            || target
                .strip_prefix(ignored)
                .map(|rest| rest.starts_with("::"))
                .unwrap_or(false)
    })
}

fn level_of(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warn,
        Level::INFO => LogLevel::Info,
        Level::DEBUG | Level::TRACE => LogLevel::Debug,
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_ignored(metadata.target()) {
            return;
        }

        let Some(recorder) = self.recorder.upgrade() else {
            return;
        };
        if !recorder.is_intercepting() {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut fields = LogMetadata::new();
        fields.insert("source".to_string(), "tracing".into());
        fields.insert("target".to_string(), metadata.target().into());

        recorder.record(level_of(metadata.level()), visitor.finish(), fields);
    }
}

/// Collects the `message` field first, followed by `key=value` pairs
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn push_field(&mut self, field: &Field, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", field.name(), value);
    }

    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field, format_args!("{}", value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            self.push_field(field, format_args!("{:?}", value));
        }
    }
}
