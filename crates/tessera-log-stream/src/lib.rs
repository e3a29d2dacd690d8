//! Tessera log streams
//!
//! Buffered, backpressure-aware writers appending each configured level to
//! its own `<level>.log` file.
//!
//! ## Behavior
//!
//! - **Immediate writes**: a message goes straight to its level's stream
//!   while that level has no backlog
//! - **Bounded backlog**: when a stream pushes back, messages queue in FIFO
//!   order up to `stream_limit`; further messages are dropped with a warning
//!   (and the process terminated when `kill_on_limit` is set)
//! - **Recovery**: a failing stream is replaced and its backlog replayed;
//!   `error_threshold` failures terminate the process
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tessera_log_stream::{LogLevel, LogStreamConfig, LogStreamHandle, LogStreamService};
//!
//! # async fn example() -> tessera_log_stream::LogStreamResult<()> {
//! let config = LogStreamConfig::load(None)?;
//! let handle = LogStreamHandle::spawn(LogStreamService::new(config)?)?;
//!
//! handle.log(LogLevel::Error, "payment gateway unreachable")?;
//! handle.cleanup().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handle;
pub mod level;
pub mod queue;
pub mod service;
pub mod sink;
pub mod terminate;

pub use config::LogStreamConfig;
pub use error::{LogStreamError, LogStreamResult};
pub use handle::LogStreamHandle;
pub use level::LogLevel;
pub use queue::{PendingQueues, QueueOutcome};
pub use service::{LogStreamService, LogStreamStats};
pub use sink::{FileSinkFactory, LogSink, SinkContext, SinkFactory, StreamId, StreamSignal, WriteOutcome};
pub use terminate::{ProcessTerminator, RecordingTerminator, TerminationReason, Terminator};
