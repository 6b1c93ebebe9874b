//! Bridge configuration, loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

/// Transport-level workarounds for local-machine networking.
///
/// A misconfigured system proxy or an IPv6 `localhost` resolution can
/// silently defeat loopback reachability on developer machines; both
/// overrides default to on for a local backend but stay configurable for
/// deployments where they are wrong.
#[derive(Debug, Clone, Copy)]
pub struct TransportOptions {
    /// Resolve the backend host to 127.0.0.1 instead of trusting DNS.
    pub pin_loopback: bool,
    /// Ignore ambient proxy environment variables for backend requests.
    pub bypass_proxy: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            pin_loopback: true,
            bypass_proxy: true,
        }
    }
}

impl TransportOptions {
    /// Apply the overrides to a reqwest client builder.
    ///
    /// `resolve` only affects hostname lookups; an IP-literal host already
    /// bypasses DNS and needs no pinning.
    pub fn apply(
        &self,
        mut builder: reqwest::ClientBuilder,
        host: &str,
        port: u16,
    ) -> reqwest::ClientBuilder {
        if self.bypass_proxy {
            builder = builder.no_proxy();
        }
        if self.pin_loopback && host.parse::<std::net::IpAddr>().is_err() {
            builder = builder.resolve(
                host,
                std::net::SocketAddr::from((std::net::Ipv4Addr::LOCALHOST, port)),
            );
        }
        builder
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Root of the backend checkout (contains `venv/` and `app/`).
    pub backend_dir: PathBuf,
    /// Module path handed to uvicorn.
    pub server_app: String,
    /// Host the backend binds and the bridge connects to.
    pub host: String,
    /// Port the backend listens on.
    pub port: u16,
    /// Delay between health probe attempts.
    pub probe_interval: Duration,
    /// Per-attempt probe timeout; kept below `probe_interval` so a hung
    /// request cannot stall the schedule.
    pub probe_timeout: Duration,
    /// Probe retry budget.
    pub probe_max_attempts: u32,
    /// Loopback/proxy overrides for all backend requests.
    pub transport: TransportOptions,
    /// How many recent backend log lines to keep for crash reports.
    pub log_history: usize,
}

impl BridgeConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let probe_interval_ms: u64 = env_parse("BRIDGE_PROBE_INTERVAL_MS", 1000)?;
        let probe_timeout_ms: u64 = env_parse("BRIDGE_PROBE_TIMEOUT_MS", 400)?;
        if probe_timeout_ms >= probe_interval_ms {
            anyhow::bail!(
                "BRIDGE_PROBE_TIMEOUT_MS ({probe_timeout_ms}) must be below \
                 BRIDGE_PROBE_INTERVAL_MS ({probe_interval_ms})"
            );
        }

        Ok(Self {
            backend_dir: {
                // Default: sibling `backend/` checkout next to the workspace
                // root (resolved at compile time). The shell may be launched
                // from any directory, so use an absolute path.
                // Override with BRIDGE_BACKEND_DIR.
                if let Ok(v) = std::env::var("BRIDGE_BACKEND_DIR") {
                    PathBuf::from(v)
                } else {
                    let workspace_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                        .parent()
                        .map(|p| p.to_path_buf())
                        .unwrap_or_else(|| PathBuf::from("."));
                    workspace_root.join("backend")
                }
            },
            server_app: std::env::var("BRIDGE_SERVER_APP")
                .unwrap_or_else(|_| "app.main:app".to_string()),
            host: std::env::var("BRIDGE_BACKEND_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_parse("BRIDGE_BACKEND_PORT", 8000)?,
            probe_interval: Duration::from_millis(probe_interval_ms),
            probe_timeout: Duration::from_millis(probe_timeout_ms),
            probe_max_attempts: env_parse("BRIDGE_PROBE_MAX_ATTEMPTS", 30)?,
            transport: TransportOptions {
                pin_loopback: env_parse("BRIDGE_PIN_LOOPBACK", true)?,
                bypass_proxy: env_parse("BRIDGE_BYPASS_PROXY", true)?,
            },
            log_history: env_parse("BRIDGE_LOG_HISTORY", 200)?,
        })
    }

    /// Base URL of the backend API.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Interpreter inside the backend venv; the layout differs per platform.
    pub fn python_path(&self) -> PathBuf {
        if cfg!(windows) {
            self.backend_dir.join("venv").join("Scripts").join("python.exe")
        } else {
            self.backend_dir.join("venv").join("bin").join("python")
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key} '{v}': {e}")),
        Err(_) => Ok(default),
    }
}
