//! Async handle to a running log stream service
//!
//! The service is moved into a spawned task that serializes caller commands
//! and sink signals, so it never needs a lock. `log` and `flush` only send a
//! command and return immediately.

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{LogStreamError, LogStreamResult};
use crate::level::LogLevel;
use crate::service::{LogStreamService, LogStreamStats};
use crate::sink::StreamSignal;

#[derive(Debug)]
enum Command {
    Log { level: LogLevel, message: String },
    Flush(LogLevel),
    Stats(oneshot::Sender<LogStreamStats>),
    Cleanup(oneshot::Sender<()>),
}

/// Cloneable front end of a spawned [`LogStreamService`]
#[derive(Debug, Clone)]
pub struct LogStreamHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl LogStreamHandle {
    /// Spawn the service's event loop on the current tokio runtime
    ///
    /// # Errors
    /// `AlreadyRunning` when the service's signal receiver was already taken.
    pub fn spawn(mut service: LogStreamService) -> LogStreamResult<Self> {
        let signals = service
            .take_signal_receiver()
            .ok_or(LogStreamError::AlreadyRunning)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| LogStreamError::Runtime(e.to_string()))?;

        let (commands, receiver) = mpsc::unbounded_channel();
        runtime.spawn(run(service, receiver, signals));
        Ok(Self { commands })
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) -> LogStreamResult<()> {
        self.send(Command::Log {
            level,
            message: message.into(),
        })
    }

    pub fn flush(&self, level: LogLevel) -> LogStreamResult<()> {
        self.send(Command::Flush(level))
    }

    pub async fn stats(&self) -> LogStreamResult<LogStreamStats> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Stats(reply))?;
        response.await.map_err(|_| LogStreamError::Closed)
    }

    /// Run the service's cleanup and stop its task
    ///
    /// Completes once every stream is closed. Later calls on any clone of
    /// this handle fail with `Closed`.
    pub async fn cleanup(&self) -> LogStreamResult<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Cleanup(reply))?;
        response.await.map_err(|_| LogStreamError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) -> LogStreamResult<()> {
        self.commands.send(command).map_err(|_| LogStreamError::Closed)
    }
}

async fn run(
    mut service: LogStreamService,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut signals: mpsc::UnboundedReceiver<StreamSignal>,
) {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Log { level, message }) => service.log(level, message),
                Some(Command::Flush(level)) => service.flush(level),
                Some(Command::Stats(reply)) => {
                    let _ = reply.send(service.stats());
                }
                Some(Command::Cleanup(reply)) => {
                    service.cleanup().await;
                    let _ = reply.send(());
                    break;
                }
                None => {
                    debug!("every log stream handle dropped, cleaning up");
                    service.cleanup().await;
                    break;
                }
            },
            Some(signal) = signals.recv() => service.handle_signal(signal),
        }
    }
}
