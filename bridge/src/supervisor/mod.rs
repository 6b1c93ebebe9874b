//! Process supervisor for the backend child.
//!
//! Owns the start/stop lifecycle of the local Python backend: resolves the
//! venv interpreter, spawns uvicorn with a filtered environment, captures
//! stdout/stderr asynchronously, delegates readiness to the prober, and
//! watches for unexpected termination. At most one child is alive per
//! supervisor instance.

pub mod probe;

pub use probe::ProbeSettings;

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shared_types::{FatalKind, LogStream, ReadinessState};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::error::SupervisorError;
use crate::notify::NotificationSink;

/// Environment variables the child inherits; everything else is dropped.
const ENV_ALLOWLIST: &[&str] = &[
    "PATH", "HOME", "USERPROFILE", "SYSTEMROOT", "TEMP", "TMP", "TMPDIR", "LANG", "LC_ALL",
];

struct RunningBackend {
    pid: Option<u32>,
    shutdown: Arc<AtomicBool>,
    kill_tx: Option<oneshot::Sender<()>>,
    monitor: JoinHandle<()>,
}

/// Supervises the single backend child process for one desktop session.
pub struct BackendSupervisor {
    config: BridgeConfig,
    sink: NotificationSink,
    probe_client: reqwest::Client,
    running: Arc<Mutex<Option<RunningBackend>>>,
    readiness: Arc<std::sync::Mutex<ReadinessState>>,
    recent_logs: Arc<std::sync::Mutex<VecDeque<String>>>,
}

impl BackendSupervisor {
    pub fn new(config: BridgeConfig, sink: NotificationSink) -> anyhow::Result<Arc<Self>> {
        let probe_client = config
            .transport
            .apply(reqwest::Client::builder(), &config.host, config.port)
            .build()?;
        Ok(Arc::new(Self {
            config,
            sink,
            probe_client,
            running: Arc::new(Mutex::new(None)),
            readiness: Arc::new(std::sync::Mutex::new(ReadinessState::Unknown)),
            recent_logs: Arc::new(std::sync::Mutex::new(VecDeque::new())),
        }))
    }

    pub fn readiness(&self) -> ReadinessState {
        *lock(&self.readiness)
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Snapshot of the most recent captured backend log lines.
    pub fn recent_logs(&self) -> Vec<String> {
        lock(&self.recent_logs).iter().cloned().collect()
    }

    /// Spawn the backend and wait for it to become reachable.
    ///
    /// The interpreter path is checked before spawning so a missing venv is
    /// reported as `InterpreterMissing` rather than mistaken for an instant
    /// crash. A `start` while a child is live is `AlreadyRunning`. Fatal
    /// failures are also pushed to the notification sink.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(SupervisorError::AlreadyRunning);
        }

        // Fresh lifecycle: new readiness run, empty crash-report ring.
        *lock(&self.readiness) = ReadinessState::Unknown;
        lock(&self.recent_logs).clear();

        let python = self.config.python_path();
        if !python.exists() {
            let err = SupervisorError::InterpreterMissing(python);
            self.sink
                .fatal(FatalKind::SpawnFailed, err.to_string(), Vec::new());
            return Err(err);
        }

        let mut command = Command::new(&python);
        command
            .args(["-m", "uvicorn", self.config.server_app.as_str()])
            .args(["--host", &self.config.host])
            .args(["--port", &self.config.port.to_string()])
            .current_dir(&self.config.backend_dir)
            .env_clear()
            .envs(filtered_env())
            .env("PYTHONUNBUFFERED", "1")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            error!(python = %python.display(), error = %e, "failed to spawn backend");
            let err = SupervisorError::Spawn(e);
            self.sink
                .fatal(FatalKind::SpawnFailed, err.to_string(), Vec::new());
            err
        })?;

        let pid = child.id();
        info!(?pid, python = %python.display(), "backend process spawned");

        if let Some(stdout) = child.stdout.take() {
            self.spawn_capture(stdout, LogStream::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            self.spawn_capture(stderr, LogStream::Stderr);
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let ready_seen = Arc::new(AtomicBool::new(false));
        let (kill_tx, kill_rx) = oneshot::channel();
        let monitor = tokio::spawn(monitor_child(
            child,
            kill_rx,
            Arc::clone(&shutdown),
            Arc::clone(&ready_seen),
            Arc::clone(&self.running),
            self.sink.clone(),
            Arc::clone(&self.recent_logs),
        ));

        *running = Some(RunningBackend {
            pid,
            shutdown,
            kill_tx: Some(kill_tx),
            monitor,
        });
        drop(running);

        self.set_readiness(ReadinessState::Probing);
        let settings = ProbeSettings {
            interval: self.config.probe_interval,
            timeout: self.config.probe_timeout,
            max_attempts: self.config.probe_max_attempts,
        };
        match probe::wait_until_ready(&self.probe_client, &self.config.base_url(), &settings).await
        {
            Ok(attempts) => {
                debug!(attempts, "readiness probe succeeded");
                ready_seen.store(true, Ordering::Release);
                self.set_readiness(ReadinessState::Ready);
                Ok(())
            }
            Err(e) => {
                self.set_readiness(ReadinessState::Failed);
                self.sink
                    .fatal(FatalKind::ProbeFailed, e.to_string(), self.recent_logs());
                // An unreachable child is useless; reap it.
                self.stop().await;
                Err(e)
            }
        }
    }

    /// Terminate the child if live. Idempotent; a later `start` is a fresh
    /// lifecycle. A stop-initiated exit is exempt from the crash alarm.
    pub async fn stop(&self) {
        let entry = self.running.lock().await.take();
        let Some(mut entry) = entry else {
            debug!("stop requested but backend is not running");
            return;
        };

        info!(pid = ?entry.pid, "stopping backend");
        entry.shutdown.store(true, Ordering::Release);
        if let Some(kill_tx) = entry.kill_tx.take() {
            // Send fails only if the monitor already observed the exit.
            let _ = kill_tx.send(());
        }
        if let Err(e) = entry.monitor.await {
            warn!(error = %e, "backend monitor task panicked");
        }
    }

    fn set_readiness(&self, state: ReadinessState) {
        *lock(&self.readiness) = state;
        self.sink.readiness(state);
    }

    fn spawn_capture<R>(&self, stream: R, which: LogStream)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let sink = self.sink.clone();
        let logs = Arc::clone(&self.recent_logs);
        let capacity = self.config.log_history;
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(target: "backend", stream = %which, "{line}");
                {
                    let mut logs = lock(&logs);
                    if logs.len() == capacity {
                        logs.pop_front();
                    }
                    logs.push_back(format!("[{which}] {line}"));
                }
                sink.backend_log(which, line);
            }
        });
    }
}

/// Waits for the child to exit, from either direction: a natural exit
/// (crash alarm if it happened after readiness and without a stop request)
/// or a kill signal from `stop()`.
async fn monitor_child(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    shutdown: Arc<AtomicBool>,
    ready_seen: Arc<AtomicBool>,
    running: Arc<Mutex<Option<RunningBackend>>>,
    sink: NotificationSink,
    recent_logs: Arc<std::sync::Mutex<VecDeque<String>>>,
) {
    tokio::select! {
        status = child.wait() => {
            // The slot must clear before any report so a fresh start()
            // sees a dead backend as not-running.
            running.lock().await.take();
            match status {
                Ok(status) => {
                    if shutdown.load(Ordering::Acquire) {
                        info!(%status, "backend exited after stop request");
                    } else if ready_seen.load(Ordering::Acquire) && !status.success() {
                        error!(%status, "backend crashed after reaching ready");
                        let logs = lock(&recent_logs).iter().cloned().collect();
                        sink.fatal(
                            FatalKind::BackendCrashed,
                            format!("backend exited unexpectedly ({status})"),
                            logs,
                        );
                    } else if !status.success() {
                        // Died while booting; the prober reports the failure.
                        warn!(%status, "backend exited before readiness");
                    } else {
                        warn!(%status, "backend exited cleanly without a stop request");
                    }
                }
                Err(e) => error!(error = %e, "failed to wait on backend process"),
            }
        }
        _ = kill_rx => {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill backend process");
            }
        }
    }
}

fn filtered_env() -> impl Iterator<Item = (String, String)> {
    std::env::vars().filter(|(key, _)| ENV_ALLOWLIST.contains(&key.as_str()))
}

fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
