//! Readiness prober: bounded, retried health checks against `/health`.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::SupervisorError;

#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    /// Delay between attempts.
    pub interval: Duration,
    /// Per-attempt timeout, bounded below `interval` so one hung request
    /// cannot stall the schedule.
    pub timeout: Duration,
    pub max_attempts: u32,
}

/// Poll `GET {base_url}/health` until the first 2xx response.
///
/// Performs at most `max_attempts` sequential requests; individual failures
/// are expected while the backend boots and are logged at debug level only.
/// Returns the 1-based attempt index that succeeded, or `ProbeFailed` after
/// the budget is exhausted — exactly once, never blocking indefinitely.
pub async fn wait_until_ready(
    client: &reqwest::Client,
    base_url: &str,
    settings: &ProbeSettings,
) -> Result<u32, SupervisorError> {
    let url = format!("{base_url}/health");

    for attempt in 1..=settings.max_attempts {
        match client.get(&url).timeout(settings.timeout).send().await {
            Ok(response) if response.status().is_success() => {
                info!(attempt, "backend is ready");
                return Ok(attempt);
            }
            Ok(response) => {
                debug!(attempt, status = %response.status(), "health probe rejected")
            }
            Err(e) => debug!(attempt, error = %e, "health probe attempt failed"),
        }
        if attempt < settings.max_attempts {
            tokio::time::sleep(settings.interval).await;
        }
    }

    Err(SupervisorError::ProbeFailed {
        attempts: settings.max_attempts,
    })
}
