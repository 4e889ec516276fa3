use serde::Serialize;
use tokio::sync::mpsc;

/// Severity of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
    /// Shown while a delete is in flight.
    Loading,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

/// Fire-and-forget notification sink (the toast channel). Delivery failure
/// never affects cache consistency.
pub trait Notify: Send + Sync {
    fn notify(&self, notification: Notification);

    fn success(&self, message: &str) {
        self.notify(Notification {
            level: Level::Success,
            message: message.to_string(),
        });
    }

    fn error(&self, message: &str) {
        self.notify(Notification {
            level: Level::Error,
            message: message.to_string(),
        });
    }

    fn loading(&self, message: &str) {
        self.notify(Notification {
            level: Level::Loading,
            message: message.to_string(),
        });
    }
}

/// Forwards notifications to an unbounded channel for the UI (or a test)
/// to drain. A dropped receiver silently discards further notifications.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelNotifier { tx }, rx)
    }
}

impl Notify for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }
}

/// Logs notifications instead of displaying them; used by the demo binary.
pub struct LogNotifier;

impl Notify for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            Level::Error => {
                tracing::warn!(target: "tallybook::notify", message = %notification.message, "toast")
            }
            _ => {
                tracing::info!(target: "tallybook::notify", message = %notification.message, "toast")
            }
        }
    }
}
