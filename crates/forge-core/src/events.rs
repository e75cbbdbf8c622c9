//! Notification sink consumed by external observers (web dashboard, CLI
//! verbose output). The core emits an event after each successful or
//! rolled-back operation; sinks must never fail the operation.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Event / Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    EntityCreated {
        kind: String,
        id: String,
        path: String,
    },
    EntityDeleted {
        kind: String,
        id: String,
        reason: String,
    },
    CommitCreated {
        sha: String,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    #[serde(flatten)]
    pub event: Event,
}

// ---------------------------------------------------------------------------
// EventSink
// ---------------------------------------------------------------------------

pub trait EventSink: Send + Sync {
    fn emit(&self, notification: Notification);
}

impl<T: EventSink> EventSink for std::sync::Arc<T> {
    fn emit(&self, notification: Notification) {
        (**self).emit(notification);
    }
}

/// Default sink: structured log lines via `tracing`.
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, notification: Notification) {
        let payload = serde_json::to_string(&notification).unwrap_or_default();
        match notification.severity {
            Severity::Info => tracing::info!(%payload, "state event"),
            Severity::Warning => tracing::warn!(%payload, "state event"),
            Severity::Critical => tracing::error!(%payload, "state event"),
        }
    }
}

/// Test sink collecting notifications in memory.
#[derive(Default)]
pub struct MemorySink {
    notifications: Mutex<Vec<Notification>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications.lock().unwrap())
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_collects_in_order() {
        let sink = MemorySink::new();
        sink.emit(Notification {
            severity: Severity::Info,
            event: Event::EntityCreated {
                kind: "feature".into(),
                id: "user-auth".into(),
                path: "docs/features/user-auth".into(),
            },
        });
        sink.emit(Notification {
            severity: Severity::Info,
            event: Event::CommitCreated {
                sha: "abc1234".into(),
                message: "feat(user-auth): create feature scaffold".into(),
            },
        });

        let events = sink.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].event, Event::EntityCreated { .. }));
        assert!(matches!(events[1].event, Event::CommitCreated { .. }));
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn notification_serializes_flat() {
        let n = Notification {
            severity: Severity::Warning,
            event: Event::EntityDeleted {
                kind: "feature".into(),
                id: "payments".into(),
                reason: "rollback".into(),
            },
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["event"], "entity_deleted");
        assert_eq!(json["reason"], "rollback");
    }
}
