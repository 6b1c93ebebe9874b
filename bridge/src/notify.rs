//! Notification fan-out to the UI layer.
//!
//! The bridge never talks to widgets directly; everything user-visible goes
//! through one unbounded channel of [`Notification`] values that the shell
//! drains on its own schedule. Send never blocks bridge tasks, and a closed
//! receiver (shell shutting down) is tolerated silently.

use shared_types::{
    FatalKind, LogStream, Notification, ProgressEvent, QueryEvent, ReadinessState,
};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Cloneable sending half handed to the supervisor and every session.
#[derive(Debug, Clone)]
pub struct NotificationSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationSink {
    /// Create the sink plus the receiving half the shell drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::trace!("notification dropped: UI receiver closed");
        }
    }

    pub fn readiness(&self, state: ReadinessState) {
        self.send(Notification::Readiness { state });
    }

    pub fn backend_log(&self, stream: LogStream, line: impl Into<String>) {
        self.send(Notification::BackendLog {
            stream,
            line: line.into(),
        });
    }

    pub fn fatal(&self, kind: FatalKind, message: impl Into<String>, recent_logs: Vec<String>) {
        self.send(Notification::Fatal {
            kind,
            message: message.into(),
            recent_logs,
        });
    }

    pub fn transient(&self, message: impl Into<String>) {
        self.send(Notification::Transient {
            message: message.into(),
        });
    }

    pub fn query_event(&self, session: Uuid, event: QueryEvent) {
        self.send(Notification::Query { session, event });
    }

    pub fn progress_event(&self, session: Uuid, event: ProgressEvent) {
        self.send(Notification::Reindex { session, event });
    }
}
