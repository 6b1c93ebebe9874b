//! Streaming query session and the stop-and-replace runner.

use reqwest::Method;
use serde_json::json;
use shared_types::{QueryEvent, SessionOutcome};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::TransportError;
use crate::notify::NotificationSink;
use crate::session::SessionState;
use crate::transport::{SessionTransport, StreamRecord};

/// A question for the backend; `k` optionally overrides how many documents
/// are retrieved for context.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub text: String,
    pub k: Option<u32>,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            k: None,
        }
    }

    fn body(&self) -> serde_json::Value {
        match self.k {
            Some(k) => json!({ "text": self.text, "k": k }),
            None => json!({ "text": self.text }),
        }
    }
}

/// One query against `/query`.
///
/// Owns the accumulated answer: fragments append, source lists replace,
/// debug lines append. On cancellation the partial answer is retained —
/// the user stopped it, nothing went wrong.
#[derive(Debug)]
pub struct QuerySession {
    id: Uuid,
    state: SessionState,
    answer: String,
    sources: Vec<String>,
    debug: String,
}

impl QuerySession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            answer: String::new(),
            sources: Vec::new(),
            debug: String::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current answer text, concatenated in fragment order.
    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn debug_text(&self) -> &str {
        &self.debug
    }

    /// Drive the session to its terminal state.
    pub async fn run(
        &mut self,
        transport: &SessionTransport,
        request: &QueryRequest,
        sink: &NotificationSink,
        cancel: CancellationToken,
    ) -> SessionOutcome {
        debug_assert_eq!(self.state, SessionState::Idle);

        // Cancelled before issue: never goes Active, nothing on the wire.
        if cancel.is_cancelled() {
            return self.finish(sink, SessionOutcome::Cancelled);
        }

        let mut records = match transport
            .open(Method::POST, "/query", Some(&request.body()), cancel)
            .await
        {
            Ok(records) => records,
            Err(TransportError::Cancelled) => {
                return self.finish(sink, SessionOutcome::Cancelled)
            }
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
        debug!(session = %self.id, "query session active");

        loop {
            match records.next_record().await {
                Ok(Some(record)) => {
                    if let Err(message) = self.apply(&record, sink) {
                        return self.finish(sink, SessionOutcome::Failed { message });
                    }
                }
                Ok(None) => return self.finish(sink, SessionOutcome::Completed),
                Err(TransportError::Cancelled) => {
                    return self.finish(sink, SessionOutcome::Cancelled)
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

    /// Apply one record in stream order. An `error` field is a server-side
    /// failure reported inside the stream and fails the session.
    fn apply(&mut self, record: &StreamRecord, sink: &NotificationSink) -> Result<(), String> {
        if let Some(error) = record.error() {
            return Err(error.to_string());
        }
        if let Some(fragment) = record.answer() {
            self.answer.push_str(fragment);
            sink.query_event(
                self.id,
                QueryEvent::AnswerFragment {
                    text: fragment.to_string(),
                },
            );
        }
        if let Some(sources) = record.sources() {
            self.sources = sources.clone();
            sink.query_event(self.id, QueryEvent::Sources { sources });
        }
        if let Some(line) = record.debug() {
            self.debug.push_str(line);
            self.debug.push('\n');
            sink.query_event(
                self.id,
                QueryEvent::DebugLine {
                    line: line.to_string(),
                },
            );
        }
        Ok(())
    }

    fn finish(&mut self, sink: &NotificationSink, outcome: SessionOutcome) -> SessionOutcome {
        self.state = match &outcome {
            SessionOutcome::Completed => SessionState::Completed,
            SessionOutcome::Cancelled => SessionState::Cancelled,
            SessionOutcome::Failed { .. } => SessionState::Failed,
        };
        match &outcome {
            SessionOutcome::Failed { message } => {
                warn!(session = %self.id, message, "query session failed")
            }
            _ => info!(session = %self.id, state = ?self.state, "query session finished"),
        }
        sink.query_event(
            self.id,
            QueryEvent::Finished {
                outcome: outcome.clone(),
            },
        );
        outcome
    }
}

impl Default for QuerySession {
    fn default() -> Self {
        Self::new()
    }
}

struct ActiveQuery {
    id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<QuerySession>,
}

/// Issues query sessions with stop-and-replace semantics.
///
/// At most one session is active per runner. Submitting a new query cancels
/// the previous session and waits for its task to drain before the new one
/// is issued, so two sessions never stream toward the UI at the same time.
pub struct QueryRunner {
    transport: SessionTransport,
    sink: NotificationSink,
    active: tokio::sync::Mutex<Option<ActiveQuery>>,
}

impl QueryRunner {
    pub fn new(transport: SessionTransport, sink: NotificationSink) -> Self {
        Self {
            transport,
            sink,
            active: tokio::sync::Mutex::new(None),
        }
    }

    /// Start a new query session, replacing any active one. Returns the
    /// session id the UI uses to correlate streamed events.
    pub async fn submit(&self, request: QueryRequest) -> Uuid {
        let mut active = self.active.lock().await;
        if let Some(prev) = active.take() {
            debug!(session = %prev.id, "replacing active query session");
            prev.cancel.cancel();
            let _ = prev.handle.await;
        }

        let cancel = CancellationToken::new();
        let mut session = QuerySession::new();
        let id = session.id();
        let transport = self.transport.clone();
        let sink = self.sink.clone();
        let session_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let outcome = session.run(&transport, &request, &sink, session_cancel).await;
            if let SessionOutcome::Failed { message } = &outcome {
                sink.transient(format!("Query failed: {message}"));
            }
            session
        });

        *active = Some(ActiveQuery { id, cancel, handle });
        id
    }

    /// Cancel the active session, if any. Idempotent; a session already in
    /// a terminal state is unaffected.
    pub async fn cancel(&self) {
        if let Some(active) = self.active.lock().await.as_ref() {
            active.cancel.cancel();
        }
    }

    /// Wait for the active session to reach its terminal state and take its
    /// final snapshot.
    pub async fn join(&self) -> Option<QuerySession> {
        let prev = self.active.lock().await.take()?;
        prev.handle.await.ok()
    }
}
