//! Transient user-facing notifications ("toasts").
//!
//! Stores and the auth bridge report outcomes through a [`Notifier`]; the host
//! decides how to show them.

use serde::Serialize;
use tokio::sync::mpsc;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Info,
    Error,
}

/// A short message for the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Notification {
    #[must_use]
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: title.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn info(title: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            title: title.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn error(title: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            description: None,
        }
    }

    /// Attach a second line of detail.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Sink for notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let description = notification.description.as_deref().unwrap_or_default();
        match notification.level {
            NotificationLevel::Error => {
                tracing::warn!(title = %notification.title, description, "Notification");
            }
            NotificationLevel::Success | NotificationLevel::Info => {
                tracing::info!(title = %notification.title, description, "Notification");
            }
        }
    }
}

/// Forwards notifications to a channel the UI drains.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // Receiver gone means nobody is showing toasts anymore
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification dropped, receiver closed");
        }
    }
}
