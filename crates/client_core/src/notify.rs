//! User-facing alerts published by the workspace.

use std::fmt;

use tokio::sync::broadcast;
use tracing::debug;

/// Event name listeners subscribe to for alerts.
pub const SHOW_ALERT: &str = "showAlert";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "Success",
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Info => "Info",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: &'static str,
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn alert(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind: SHOW_ALERT,
            severity,
            message: message.into(),
        }
    }
}

/// Fire-and-forget alert sink handed to the workspace.
pub trait Notifier: Send + Sync {
    fn emit(&self, notification: Notification);

    fn success(&self, message: String) {
        self.emit(Notification::alert(Severity::Success, message));
    }

    fn error(&self, message: String) {
        self.emit(Notification::alert(Severity::Error, message));
    }
}

/// Publishes alerts on a tokio broadcast channel. Sending with no subscribers
/// is not an error.
#[derive(Clone)]
pub struct BroadcastNotifier {
    events: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Notifier for BroadcastNotifier {
    fn emit(&self, notification: Notification) {
        debug!(
            kind = notification.kind,
            severity = %notification.severity,
            message = %notification.message,
            "publishing alert"
        );
        let _ = self.events.send(notification);
    }
}
