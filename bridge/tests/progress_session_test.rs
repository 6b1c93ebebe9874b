//! Reindex progress session tests.

mod common;

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use shared_types::{Notification, ProgressEvent, SessionOutcome};

use bridge::{NotificationSink, ProgressSession, SessionState, SessionTransport};

fn ndjson(body: &'static str) -> Response {
    Response::new(Body::from_stream(futures::stream::once(async move {
        Ok::<_, Infallible>(Bytes::from_static(body.as_bytes()))
    })))
}

async fn transport_for(router: Router) -> SessionTransport {
    let addr = common::serve(router).await;
    SessionTransport::new(&common::config_for(addr)).expect("build transport")
}

async fn run_session(
    transport: SessionTransport,
) -> (ProgressSession, SessionOutcome, Vec<ProgressEvent>) {
    let (sink, mut rx) = NotificationSink::channel();
    let mut session = ProgressSession::new();
    let outcome = session.run(&transport, &sink).await;

    let mut events = Vec::new();
    loop {
        let notification = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("notification within deadline")
            .expect("sink open");
        if let Notification::Reindex { event, .. } = notification {
            let finished = matches!(event, ProgressEvent::Finished { .. });
            events.push(event);
            if finished {
                break;
            }
        }
    }
    (session, outcome, events)
}

#[tokio::test]
async fn progress_then_completion_marker() {
    let router = Router::new().route(
        "/reset-and-rescan",
        post(|| async {
            ndjson(
                "{\"status\":\"Processing\",\"progress\":50.0,\"current\":5,\"total\":10}\n{\"status\":\"Completed\"}\n",
            )
        }),
    );
    let transport = transport_for(router).await;

    let (session, outcome, events) = run_session(transport).await;
    assert_eq!(outcome, SessionOutcome::Completed);
    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(session.progress(), 50.0);
    assert_eq!(session.current(), 5);
    assert_eq!(session.total(), 10);

    assert!(matches!(events[0], ProgressEvent::Progress { update } if update.progress == 50.0));
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::Finished {
            outcome: SessionOutcome::Completed,
        }),
    );
}

#[tokio::test]
async fn status_markers_do_not_touch_the_counts() {
    let router = Router::new().route(
        "/reset-and-rescan",
        post(|| async {
            ndjson(
                "{\"status\":\"Database cleared\"}\n{\"status\":\"Processing\",\"progress\":\"33.33%\",\"current\":1,\"total\":3}\n{\"status\":\"Completed\"}\n",
            )
        }),
    );
    let transport = transport_for(router).await;

    let (session, outcome, events) = run_session(transport).await;
    assert_eq!(outcome, SessionOutcome::Completed);
    assert_eq!(
        events[0],
        ProgressEvent::Status {
            status: "Database cleared".into(),
        },
    );
    // Percent-string progress from the backend parses like the number form.
    assert_eq!(session.progress(), 33.33);
    assert_eq!(session.current(), 1);
    assert_eq!(session.total(), 3);
}

#[tokio::test]
async fn per_file_error_is_a_status_line_not_a_failure() {
    let router = Router::new().route(
        "/reset-and-rescan",
        post(|| async {
            ndjson(
                "{\"status\":\"Error\",\"file\":\"broken.pdf\",\"error\":\"unreadable\"}\n{\"status\":\"Processing\",\"progress\":100.0,\"current\":2,\"total\":2}\n{\"status\":\"Completed\"}\n",
            )
        }),
    );
    let transport = transport_for(router).await;

    let (session, outcome, events) = run_session(transport).await;
    assert_eq!(outcome, SessionOutcome::Completed);
    assert_eq!(
        events[0],
        ProgressEvent::Status {
            status: "Error: broken.pdf: unreadable".into(),
        },
    );
    assert_eq!(session.current(), 2);
}

#[tokio::test]
async fn bare_error_record_fails_the_run() {
    let router = Router::new().route(
        "/reset-and-rescan",
        post(|| async { ndjson("{\"error\":\"database is locked\"}\n") }),
    );
    let transport = transport_for(router).await;

    let (session, outcome, events) = run_session(transport).await;
    assert_eq!(
        outcome,
        SessionOutcome::Failed {
            message: "database is locked".into(),
        },
    );
    assert_eq!(session.state(), SessionState::Failed);
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::Finished {
            outcome: SessionOutcome::Failed { .. },
        }),
    ));
}

#[tokio::test]
async fn transport_failure_fails_the_run() {
    let router = Router::new().route(
        "/reset-and-rescan",
        post(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "restarting") }),
    );
    let transport = transport_for(router).await;

    let (session, outcome, _) = run_session(transport).await;
    assert_eq!(session.state(), SessionState::Failed);
    assert!(matches!(outcome, SessionOutcome::Failed { .. }));
}
