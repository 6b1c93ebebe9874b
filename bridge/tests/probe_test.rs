//! Readiness prober tests against an in-process mock backend.
//!
//! The spec-level properties under test: the prober performs exactly
//! `max_attempts` attempts when every one fails, stops at the first
//! success, and never blocks indefinitely on a hung endpoint.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, routing::get, Router};
use bridge::supervisor::probe::{wait_until_ready, ProbeSettings};
use bridge::SupervisorError;

struct FlakyState {
    hits: AtomicU32,
    succeed_at: u32,
}

async fn flaky_health(State(state): State<Arc<FlakyState>>) -> StatusCode {
    let attempt = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
    if state.succeed_at > 0 && attempt >= state.succeed_at {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn hung_health() -> StatusCode {
    std::future::pending().await
}

fn settings(max_attempts: u32) -> ProbeSettings {
    ProbeSettings {
        interval: Duration::from_millis(50),
        timeout: Duration::from_millis(40),
        max_attempts,
    }
}

async fn serve_flaky(succeed_at: u32) -> (String, Arc<FlakyState>) {
    let state = Arc::new(FlakyState {
        hits: AtomicU32::new(0),
        succeed_at,
    });
    let router = Router::new()
        .route("/health", get(flaky_health))
        .with_state(Arc::clone(&state));
    let addr = common::serve(router).await;
    (format!("http://{addr}"), state)
}

#[tokio::test]
async fn ready_on_first_success_and_no_further_attempts() {
    let (base_url, state) = serve_flaky(3).await;
    let client = reqwest::Client::new();

    let attempts = wait_until_ready(&client, &base_url, &settings(10))
        .await
        .expect("probe should succeed on the third attempt");
    assert_eq!(attempts, 3);
    assert_eq!(state.hits.load(Ordering::SeqCst), 3);

    // No rescheduled attempt sneaks in after success.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(state.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausts_exactly_the_retry_budget() {
    let (base_url, state) = serve_flaky(0).await;
    let client = reqwest::Client::new();

    let err = wait_until_ready(&client, &base_url, &settings(4))
        .await
        .expect_err("probe should exhaust its budget");
    match err {
        SupervisorError::ProbeFailed { attempts } => assert_eq!(attempts, 4),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(state.hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn hung_endpoint_cannot_stall_the_schedule() {
    let router = Router::new().route("/health", get(hung_health));
    let addr = common::serve(router).await;
    let client = reqwest::Client::new();

    let started = Instant::now();
    let err = wait_until_ready(&client, &format!("http://{addr}"), &settings(3))
        .await
        .expect_err("hung endpoint should fail the probe");
    assert!(matches!(err, SupervisorError::ProbeFailed { attempts: 3 }));
    // 3 × (40ms timeout + 50ms interval) plus slack, nowhere near a hang.
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn connection_refused_counts_as_a_failed_attempt() {
    // Bind then drop: the port exists but nothing listens.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = reqwest::Client::new();
    let err = wait_until_ready(&client, &format!("http://{addr}"), &settings(2))
        .await
        .expect_err("nothing is listening");
    assert!(matches!(err, SupervisorError::ProbeFailed { attempts: 2 }));
}
