//! Streaming sessions against the backend.
//!
//! A session is one bounded, cancellable request/response interaction with a
//! streaming endpoint. Each runs as an independent tokio task; records are
//! applied strictly in stream order within a session, and no ordering is
//! guaranteed across sessions.

pub mod progress;
pub mod query;

pub use progress::ProgressSession;
pub use query::{QueryRequest, QueryRunner, QuerySession};

/// Lifecycle of one session. `Idle → Active → exactly one terminal state`;
/// cancellation while `Idle` prevents the transition to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Failed
        )
    }
}
