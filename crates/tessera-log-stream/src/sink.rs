//! Stream sinks
//!
//! A sink accepts writes without blocking. When it cannot take more it
//! hands the message back as [`WriteOutcome::Backpressure`] and later emits
//! a [`StreamSignal::Drain`]; on an I/O failure it emits
//! [`StreamSignal::Error`] and stops accepting writes. Signals carry the
//! sink's [`StreamId`] so signals from a replaced sink can be told apart.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{LogStreamError, LogStreamResult};
use crate::level::LogLevel;

/// Identity of one sink instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// Notification from a sink to its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    /// The sink can accept writes again
    Drain { level: LogLevel, id: StreamId },
    /// The sink failed and no longer accepts writes
    Error {
        level: LogLevel,
        id: StreamId,
        error: String,
    },
}

impl StreamSignal {
    pub fn level(&self) -> LogLevel {
        match self {
            StreamSignal::Drain { level, .. } | StreamSignal::Error { level, .. } => *level,
        }
    }

    pub fn id(&self) -> StreamId {
        match self {
            StreamSignal::Drain { id, .. } | StreamSignal::Error { id, .. } => *id,
        }
    }
}

/// Everything a factory needs to open a sink
#[derive(Debug, Clone)]
pub struct SinkContext {
    pub level: LogLevel,
    pub id: StreamId,
    pub high_water_mark: usize,
    pub signals: mpsc::UnboundedSender<StreamSignal>,
}

impl SinkContext {
    /// Send a signal for this sink; a closed receiver is ignored
    pub fn signal_drain(&self) {
        let _ = self.signals.send(StreamSignal::Drain {
            level: self.level,
            id: self.id,
        });
    }

    pub fn signal_error(&self, error: impl Into<String>) {
        let _ = self.signals.send(StreamSignal::Error {
            level: self.level,
            id: self.id,
            error: error.into(),
        });
    }
}

/// Result of a non-blocking write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Buffer full; the message is handed back and a drain will follow
    Backpressure(String),
    /// The sink stopped; the message is handed back
    Closed(String),
}

/// Appendable, per-level output
pub trait LogSink: Send + fmt::Debug {
    fn id(&self) -> StreamId;

    fn write(&mut self, message: String) -> WriteOutcome;

    /// Flush what was accepted and release the sink
    fn close(self: Box<Self>) -> BoxFuture<'static, ()>;
}

/// Opens sinks for the service
pub trait SinkFactory: Send + Sync + fmt::Debug {
    fn open(&self, context: SinkContext) -> LogStreamResult<Box<dyn LogSink>>;
}

/// Appends each level to `<directory>/<level>.log`, one message per line
#[derive(Debug, Clone)]
pub struct FileSinkFactory {
    directory: PathBuf,
}

impl FileSinkFactory {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl SinkFactory for FileSinkFactory {
    /// Start a writer task for `<directory>/<level>.log`
    ///
    /// The file is opened by the writer task so the caller never waits on
    /// the filesystem; an open failure arrives as a [`StreamSignal::Error`]
    /// and writes accepted before it are handed back as closed.
    fn open(&self, context: SinkContext) -> LogStreamResult<Box<dyn LogSink>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| LogStreamError::Runtime(e.to_string()))?;
        let path = self.directory.join(context.level.file_name());

        let (sender, receiver) = mpsc::channel(context.high_water_mark.max(1));
        let needs_drain = Arc::new(AtomicBool::new(false));
        let id = context.id;
        let level = context.level;
        let task = runtime.spawn(run_writer(path, receiver, Arc::clone(&needs_drain), context));

        Ok(Box::new(FileSink {
            id,
            level,
            sender,
            needs_drain,
            task,
        }))
    }
}

/// Sink backed by a writer task and a bounded channel
pub struct FileSink {
    id: StreamId,
    level: LogLevel,
    sender: mpsc::Sender<String>,
    needs_drain: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl fmt::Debug for FileSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSink")
            .field("id", &self.id)
            .field("level", &self.level)
            .field("capacity", &self.sender.capacity())
            .finish()
    }
}

impl LogSink for FileSink {
    fn id(&self) -> StreamId {
        self.id
    }

    fn write(&mut self, message: String) -> WriteOutcome {
        match self.sender.try_send(message) {
            Ok(()) => WriteOutcome::Written,
            Err(TrySendError::Closed(message)) => WriteOutcome::Closed(message),
            Err(TrySendError::Full(message)) => {
                self.needs_drain.store(true, Ordering::SeqCst);
                // The writer may have emptied the channel before the flag was
                // set, in which case no drain would ever follow.
                match self.sender.try_send(message) {
                    Ok(()) => WriteOutcome::Written,
                    Err(TrySendError::Full(message)) => WriteOutcome::Backpressure(message),
                    Err(TrySendError::Closed(message)) => WriteOutcome::Closed(message),
                }
            }
        }
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
        let FileSink {
            id, sender, task, ..
        } = *self;
        drop(sender);
        async move {
            if let Err(e) = task.await {
                warn!(id = %id, error = %e, "file stream writer did not finish cleanly");
            }
        }
        .boxed()
    }
}

async fn run_writer(
    path: PathBuf,
    mut receiver: mpsc::Receiver<String>,
    needs_drain: Arc<AtomicBool>,
    context: SinkContext,
) {
    let file = match OpenOptions::new().create(true).append(true).open(&path).await {
        Ok(file) => file,
        Err(e) => {
            error!(level = %context.level, id = %context.id, path = %path.display(), error = %e, "file stream could not be opened");
            context.signal_error(e.to_string());
            return;
        }
    };
    debug!(level = %context.level, id = %context.id, path = %path.display(), "file stream opened");
    let mut writer = BufWriter::new(file);

    while let Some(first) = receiver.recv().await {
        let mut batch = vec![first];
        while let Ok(message) = receiver.try_recv() {
            batch.push(message);
        }

        if let Err(e) = write_batch(&mut writer, &batch).await {
            error!(level = %context.level, id = %context.id, error = %e, "file stream write failed");
            context.signal_error(e.to_string());
            return;
        }

        if needs_drain.swap(false, Ordering::SeqCst) {
            context.signal_drain();
        }
    }

    if let Err(e) = writer.shutdown().await {
        warn!(level = %context.level, id = %context.id, error = %e, "file stream close failed");
    }
}

async fn write_batch(writer: &mut BufWriter<File>, batch: &[String]) -> std::io::Result<()> {
    for message in batch {
        writer.write_all(message.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await
}
