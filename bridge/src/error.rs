//! Error taxonomy for the bridge.
//!
//! Lifecycle failures (`SupervisorError`) are fatal to the whole app;
//! transport failures are local to one session and leave the supervisor and
//! other sessions untouched. A single undecodable stream line is neither —
//! it is logged and skipped inside the transport.

use std::path::PathBuf;

use reqwest::StatusCode;

/// Failures owned by the process supervisor and readiness prober.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The venv interpreter is missing — the backend was never built or
    /// installed. Checked before spawning so this is distinguishable from a
    /// backend that crashed immediately.
    #[error("backend interpreter not found at {0} (is the backend venv installed?)")]
    InterpreterMissing(PathBuf),

    /// The interpreter exists but the OS refused to spawn it.
    #[error("failed to spawn backend process: {0}")]
    Spawn(#[source] std::io::Error),

    /// `start()` while a child is already live is a programming error, not
    /// something to silently ignore.
    #[error("backend process is already running")]
    AlreadyRunning,

    /// The retry budget is exhausted; the backend is unreachable.
    #[error("backend did not answer the health probe after {attempts} attempts")]
    ProbeFailed { attempts: u32 },
}

/// Failures local to one streaming or request/response session.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Non-2xx initial response, with status and body attached.
    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Connection-level failure (refused, reset mid-stream, ...).
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// User-initiated stop. Not an error from the user's point of view;
    /// callers surface it distinctly from `Status`/`Request`.
    #[error("session cancelled")]
    Cancelled,
}

impl TransportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }
}
