//! User-facing notifications emitted once per completed backend operation.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Diagnose,
    Explain,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Diagnose => "diagnose",
            Operation::Explain => "explain",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub operation: Operation,
    pub message: String,
    pub description: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn success(operation: Operation) -> Self {
        let (message, description) = match operation {
            Operation::Diagnose => (
                "Analysis complete!",
                "View your results in the Results tab.",
            ),
            Operation::Explain => (
                "Grad-CAM generated!",
                "View the heatmap in the Explainability tab.",
            ),
        };
        Self {
            kind: NotificationKind::Success,
            operation,
            message: message.to_string(),
            description: description.to_string(),
            at: Utc::now(),
        }
    }

    pub fn failure(operation: Operation, cause: impl std::fmt::Display) -> Self {
        let message = match operation {
            Operation::Diagnose => "Analysis failed",
            Operation::Explain => "Grad-CAM generation failed",
        };
        Self {
            kind: NotificationKind::Failure,
            operation,
            message: message.to_string(),
            description: cause.to_string(),
            at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == NotificationKind::Success
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => tracing::info!(
                operation = notification.operation.as_str(),
                "{}: {}",
                notification.message,
                notification.description
            ),
            NotificationKind::Failure => tracing::warn!(
                operation = notification.operation.as_str(),
                "{}: {}",
                notification.message,
                notification.description
            ),
        }
    }
}

/// Fans notifications out to any number of subscribers.
#[derive(Clone)]
pub struct BroadcastSink {
    events: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    /// `capacity` is raised to at least one slot.
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self { events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn notify(&self, notification: Notification) {
        // No subscribers is fine.
        let _ = self.events.send(notification);
    }
}
