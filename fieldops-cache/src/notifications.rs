//! Transient user notifications raised by collection caches.
//!
//! A cache never renders anything itself. It hands a [`Notification`] to the
//! [`Notifier`] it was mounted with, and the screen decides how to show it.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
            NotificationLevel::Success => "success",
        };
        write!(f, "{}", value)
    }
}

/// Follow-up the user can trigger from a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    /// Re-run the operation that failed.
    Retry,
    /// Reload the collection; live changes may have been missed.
    Resync,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub table: Option<String>,
    pub action: Option<NotificationAction>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            table: None,
            action: None,
            created_at: Utc::now(),
        }
    }

    pub fn for_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "[{}] {}: {}", self.level, table, self.message),
            None => write!(f, "[{}] {}", self.level, self.message),
        }
    }
}

/// Sink for notifications. Shared by every cache on a screen.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let table = notification.table.as_deref().unwrap_or("-");
        match notification.level {
            NotificationLevel::Error => {
                error!(table = %table, "{}", notification.message)
            }
            NotificationLevel::Warning => {
                warn!(table = %table, "{}", notification.message)
            }
            NotificationLevel::Info | NotificationLevel::Success => {
                info!(table = %table, level = %notification.level, "{}", notification.message)
            }
        }
    }
}

/// Forwards notifications over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // A closed receiver means nobody is showing toasts any more.
        let _ = self.sender.send(notification);
    }
}

/// Keeps every notification in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        match self.notifications.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn levels(&self) -> Vec<NotificationLevel> {
        self.notifications().iter().map(|n| n.level).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notifications()
            .into_iter()
            .map(|n| n.message)
            .collect()
    }

    pub fn clear(&self) {
        match self.notifications.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        match self.notifications.lock() {
            Ok(mut guard) => guard.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_display() {
        let note = Notification::new(NotificationLevel::Error, "boom").for_table("repairs");
        assert_eq!(note.to_string(), "[error] repairs: boom");
        let note = Notification::new(NotificationLevel::Success, "done");
        assert_eq!(note.to_string(), "[success] done");
    }

    #[test]
    fn test_recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        notifier.notify(Notification::new(NotificationLevel::Info, "first"));
        notifier.notify(
            Notification::new(NotificationLevel::Error, "second")
                .with_action(NotificationAction::Retry),
        );
        assert_eq!(notifier.messages(), vec!["first", "second"]);
        assert_eq!(
            notifier.levels(),
            vec![NotificationLevel::Info, NotificationLevel::Error]
        );
        notifier.clear();
        assert!(notifier.notifications().is_empty());
    }

    #[test]
    fn test_channel_notifier_forwards() {
        let (notifier, mut receiver) = ChannelNotifier::new();
        notifier.notify(Notification::new(NotificationLevel::Warning, "offline"));
        let received = receiver.try_recv().expect("notification");
        assert_eq!(received.level, NotificationLevel::Warning);

        drop(receiver);
        notifier.notify(Notification::new(NotificationLevel::Info, "ignored"));
    }
}
