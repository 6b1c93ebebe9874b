//! Shared helpers for the integration tests: an in-process axum mock
//! backend and a bridge config pointed at it.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use bridge::{BridgeConfig, TransportOptions};

/// Serve the router on an ephemeral loopback port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("test server addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    addr
}

/// Config pointed at the mock backend, with test-friendly probe timings.
pub fn config_for(addr: SocketAddr) -> BridgeConfig {
    BridgeConfig {
        backend_dir: std::env::temp_dir(),
        server_app: "app.main:app".into(),
        host: addr.ip().to_string(),
        port: addr.port(),
        probe_interval: Duration::from_millis(50),
        probe_timeout: Duration::from_millis(40),
        probe_max_attempts: 20,
        transport: TransportOptions::default(),
        log_history: 50,
    }
}
