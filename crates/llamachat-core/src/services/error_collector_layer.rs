use crate::models::error_store::{ErrorEntry, ErrorLevel};
use chrono::Local;
use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use tracing::{
    Level, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::Layer;

const CHANNEL_CAPACITY: usize = 1000;

struct FieldVisitor {
    message: Option<String>,
    fields: HashMap<String, String>,
}

impl FieldVisitor {
    fn new() -> Self {
        Self {
            message: None,
            fields: HashMap::new(),
        }
    }

    fn insert(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }
}

/// Forwards WARN and ERROR events to the front-end's error panel.
///
/// Stderr belongs to the terminal UI, so problems the core reports reach the
/// user through this channel instead.
pub struct ErrorCollectorLayer {
    sender: SyncSender<ErrorEntry>,
}

impl ErrorCollectorLayer {
    pub fn new() -> (Self, Receiver<ErrorEntry>) {
        let (tx, rx) = sync_channel(CHANNEL_CAPACITY);
        (Self { sender: tx }, rx)
    }
}

impl<S> Layer<S> for ErrorCollectorLayer
where
    S: Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        let level = match *metadata.level() {
            Level::ERROR => ErrorLevel::Error,
            Level::WARN => ErrorLevel::Warning,
            _ => return,
        };

        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);

        let entry = ErrorEntry {
            timestamp: Local::now(),
            level,
            message: visitor.message.unwrap_or_default(),
            target: metadata.target().to_string(),
            fields: visitor.fields,
        };

        // Drop rather than block the UI thread when nobody is draining
        let _ = self.sender.try_send(entry);
    }
}
