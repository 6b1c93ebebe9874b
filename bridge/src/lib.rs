//! Backend lifecycle supervisor and streaming session client.
//!
//! The desktop shell embeds this crate to manage its local question-
//! answering backend: spawn and supervise the Python child process, wait
//! for it to become reachable, and run cancellable streaming sessions
//! against its query and reindex endpoints. Everything user-visible flows
//! through one [`NotificationSink`] channel the shell drains.
//!
//! Typical wiring:
//!
//! ```no_run
//! # async fn wire() -> anyhow::Result<()> {
//! use bridge::{
//!     BackendSupervisor, BridgeConfig, NotificationSink, QueryRequest, QueryRunner,
//!     SessionTransport,
//! };
//!
//! let config = BridgeConfig::from_env()?;
//! let (sink, mut notifications) = NotificationSink::channel();
//!
//! let supervisor = BackendSupervisor::new(config.clone(), sink.clone())?;
//! supervisor.start().await?;
//!
//! let transport = SessionTransport::new(&config)?;
//! let queries = QueryRunner::new(transport, sink);
//! queries.submit(QueryRequest::new("what is in my notes?")).await;
//!
//! while let Some(notification) = notifications.recv().await {
//!     // forward to the renderer
//!     # let _ = notification;
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod notify;
pub mod session;
pub mod supervisor;
pub mod transport;

pub use api::BackendApi;
pub use config::{BridgeConfig, TransportOptions};
pub use error::{SupervisorError, TransportError};
pub use notify::NotificationSink;
pub use session::{ProgressSession, QueryRequest, QueryRunner, QuerySession, SessionState};
pub use supervisor::{BackendSupervisor, ProbeSettings};
pub use transport::{NdjsonParser, RecordStream, SessionTransport, StreamRecord};
