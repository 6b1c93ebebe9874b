//! Types shared between the backend bridge and the desktop UI
//!
//! These types cross two boundaries:
//! - bridge → renderer (notifications, streamed query/progress events)
//! - bridge ↔ backend HTTP API (config payloads)
//!
//! Serializable with serde for JSON over IPC; ts-rs exports TypeScript
//! definitions for the renderer.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

// ============================================================================
// Lifecycle
// ============================================================================

/// Readiness of the supervised backend process.
///
/// Monotonic per supervisor run: once `Ready` or `Failed` is reached it is
/// terminal until the next `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../frontend/src/types/generated.ts")]
pub enum ReadinessState {
    Unknown,
    Probing,
    Ready,
    Failed,
}

impl ReadinessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReadinessState::Ready | ReadinessState::Failed)
    }
}

/// Which of the child's standard streams a captured log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../frontend/src/types/generated.ts")]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogStream::Stdout => write!(f, "stdout"),
            LogStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Unrecoverable lifecycle failures. The UI blocks on these; retrying
/// requires user intervention (reinstall, restart the app).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../frontend/src/types/generated.ts")]
pub enum FatalKind {
    SpawnFailed,
    ProbeFailed,
    BackendCrashed,
}

// ============================================================================
// Notifications (bridge → UI)
// ============================================================================

/// Everything the bridge pushes to the UI layer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type")]
#[ts(export, export_to = "../../frontend/src/types/generated.ts")]
pub enum Notification {
    /// Readiness transition of the supervised backend.
    Readiness { state: ReadinessState },

    /// One captured line of backend stdout/stderr.
    BackendLog { stream: LogStream, line: String },

    /// Fatal lifecycle failure; `recent_logs` holds the last captured
    /// backend output lines for the crash report.
    Fatal {
        kind: FatalKind,
        message: String,
        recent_logs: Vec<String>,
    },

    /// Recoverable failure; shown transiently, the UI stays usable.
    Transient { message: String },

    /// Streamed event from a query session.
    Query { session: Uuid, event: QueryEvent },

    /// Streamed event from a reindex session.
    Reindex { session: Uuid, event: ProgressEvent },
}

// ============================================================================
// Session Events
// ============================================================================

/// How a session ended. Exactly one of these is emitted per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "outcome", rename_all = "snake_case")]
#[ts(export, export_to = "../../frontend/src/types/generated.ts")]
pub enum SessionOutcome {
    Completed,
    Cancelled,
    Failed { message: String },
}

/// Incremental events from a query session, in stream order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type")]
#[ts(export, export_to = "../../frontend/src/types/generated.ts")]
pub enum QueryEvent {
    /// Append to the accumulated answer text.
    AnswerFragment { text: String },
    /// Replace the source list.
    Sources { sources: Vec<String> },
    /// Append to the debug panel.
    DebugLine { line: String },
    /// Terminal event; the partial answer is retained on cancellation.
    Finished { outcome: SessionOutcome },
}

/// Progress tuple reported by the reindex stream, taken verbatim from each
/// record (no local interpolation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../frontend/src/types/generated.ts")]
pub struct ProgressUpdate {
    /// Percentage in `[0, 100]`.
    pub progress: f64,
    pub current: u64,
    pub total: u64,
}

/// Incremental events from a reindex session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type")]
#[ts(export, export_to = "../../frontend/src/types/generated.ts")]
pub enum ProgressEvent {
    /// Replace the progress bar state.
    Progress { update: ProgressUpdate },
    /// Transient status line ("Database cleared", per-file errors); does not
    /// touch the counts and is never terminal.
    Status { status: String },
    /// Terminal event.
    Finished { outcome: SessionOutcome },
}

// ============================================================================
// Backend Config API (bridge ↔ backend HTTP)
// ============================================================================

/// Response of `GET /config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../frontend/src/types/generated.ts")]
pub struct BackendConfig {
    pub prompt_template: String,
    pub model: String,
    pub k: u32,
    pub available_models: Vec<String>,
    pub current_folder: String,
}

/// Body of `POST /config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../frontend/src/types/generated.ts")]
pub struct ConfigUpdate {
    pub template: String,
    pub model: String,
    pub k: u32,
    pub folder: String,
}

/// `{detail}` body the backend attaches to 4xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

/// Generic `{message}` acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Response of `GET /documents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentList {
    pub documents: Vec<String>,
}

/// Response of `GET /db-state`: a diagnostic dump of what the backend's
/// index actually holds versus what sits on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../frontend/src/types/generated.ts")]
pub struct DbState {
    pub documents_in_db: Vec<String>,
    pub files_in_db_directory: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_wire_format_is_tagged() {
        let n = Notification::Readiness {
            state: ReadinessState::Ready,
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "Readiness");
        assert_eq!(json["state"], "ready");
    }

    #[test]
    fn query_event_round_trips() {
        let e = QueryEvent::AnswerFragment {
            text: "The ".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: QueryEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn readiness_terminal_states() {
        assert!(!ReadinessState::Unknown.is_terminal());
        assert!(!ReadinessState::Probing.is_terminal());
        assert!(ReadinessState::Ready.is_terminal());
        assert!(ReadinessState::Failed.is_terminal());
    }

    #[test]
    fn session_outcome_failed_carries_message() {
        let o = SessionOutcome::Failed {
            message: "backend returned 500".into(),
        };
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["message"], "backend returned 500");
    }
}
