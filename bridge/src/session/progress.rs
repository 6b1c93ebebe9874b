//! Streaming progress session for the full reindex.
//!
//! No cancellation in the baseline contract: the backend rebuilds its index
//! in place and is not designed to be interrupted mid-way.

use reqwest::Method;
use shared_types::{ProgressEvent, ProgressUpdate, SessionOutcome};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::notify::NotificationSink;
use crate::session::SessionState;
use crate::transport::{SessionTransport, StreamRecord};

/// One reindex run against `/reset-and-rescan`.
///
/// Progress records replace the fraction and counts verbatim; status-only
/// markers ("Database cleared", per-file errors) update a status line
/// without touching the counts; `{"status":"Completed"}` terminates.
#[derive(Debug)]
pub struct ProgressSession {
    id: Uuid,
    state: SessionState,
    progress: f64,
    current: u64,
    total: u64,
    status: Option<String>,
}

impl ProgressSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            progress: 0.0,
            current: 0,
            total: 0,
            status: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Last reported percentage in `[0, 100]`.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Run the session on its own task. The UI follows it through
    /// [`ProgressEvent`] notifications and the returned handle yields the
    /// final snapshot.
    pub fn spawn(
        transport: SessionTransport,
        sink: NotificationSink,
    ) -> (Uuid, JoinHandle<ProgressSession>) {
        let mut session = ProgressSession::new();
        let id = session.id();
        let handle = tokio::spawn(async move {
            session.run(&transport, &sink).await;
            session
        });
        (id, handle)
    }

    /// Drive the session to its terminal state.
    pub async fn run(
        &mut self,
        transport: &SessionTransport,
        sink: &NotificationSink,
    ) -> SessionOutcome {
        debug_assert_eq!(self.state, SessionState::Idle);

        // Baseline contract: not cancellable, so the stream gets a token
        // nobody ever sets.
        let mut records = match transport
            .open(Method::POST, "/reset-and-rescan", None, CancellationToken::new())
            .await
        {
            Ok(records) => records,
            Err(e) => {
                return self.finish(
                    sink,
                    SessionOutcome::Failed {
                        message: e.to_string(),
                    },
                )
            }
        };
        self.state = SessionState::Active;
        info!(session = %self.id, "reindex session active");

        loop {
            match records.next_record().await {
                Ok(Some(record)) => {
                    // A bare `{"error": ...}` is a whole-run failure. A
                    // record that also carries a status is a per-file error
                    // the backend keeps streaming past; it stays a status
                    // line.
                    if let (Some(error), None) = (record.error(), record.status()) {
                        return self.finish(
                            sink,
                            SessionOutcome::Failed {
                                message: error.to_string(),
                            },
                        );
                    }
                    if self.apply(&record, sink) {
                        return self.finish(sink, SessionOutcome::Completed);
                    }
                }
                Ok(None) => {
                    // The backend always closes with a Completed marker; a
                    // bare end of stream still counts as done.
                    if self.status.as_deref() != Some("Completed") {
                        warn!(session = %self.id, "reindex stream ended without completion marker");
                    }
                    return self.finish(sink, SessionOutcome::Completed);
                }
                Err(e) => {
                    return self.finish(
                        sink,
                        SessionOutcome::Failed {
                            message: e.to_string(),
                        },
                    )
                }
            }
        }
    }

    /// Apply one record; returns true on the completion marker.
    fn apply(&mut self, record: &StreamRecord, sink: &NotificationSink) -> bool {
        if record.status() == Some("Completed") {
            self.status = Some("Completed".to_string());
            return true;
        }

        match (record.progress(), record.current(), record.total()) {
            (Some(progress), Some(current), Some(total)) => {
                self.progress = progress;
                self.current = current;
                self.total = total;
                if let Some(status) = record.status() {
                    self.status = Some(status.to_string());
                }
                sink.progress_event(
                    self.id,
                    ProgressEvent::Progress {
                        update: ProgressUpdate {
                            progress,
                            current,
                            total,
                        },
                    },
                );
            }
            _ => {
                if let Some(status) = record.status() {
                    let line = match (record.file(), record.error()) {
                        (Some(file), Some(error)) => format!("{status}: {file}: {error}"),
                        _ => status.to_string(),
                    };
                    self.status = Some(line.clone());
                    sink.progress_event(self.id, ProgressEvent::Status { status: line });
                }
            }
        }
        false
    }

    fn finish(&mut self, sink: &NotificationSink, outcome: SessionOutcome) -> SessionOutcome {
        self.state = match &outcome {
            SessionOutcome::Completed => SessionState::Completed,
            SessionOutcome::Cancelled => SessionState::Cancelled,
            SessionOutcome::Failed { .. } => SessionState::Failed,
        };
        match &outcome {
            SessionOutcome::Failed { message } => {
                warn!(session = %self.id, message, "reindex session failed")
            }
            _ => info!(session = %self.id, progress = self.progress, "reindex session finished"),
        }
        sink.progress_event(
            self.id,
            ProgressEvent::Finished {
                outcome: outcome.clone(),
            },
        );
        outcome
    }
}

impl Default for ProgressSession {
    fn default() -> Self {
        Self::new()
    }
}
