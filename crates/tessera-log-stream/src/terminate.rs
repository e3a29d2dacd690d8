//! Process termination policy

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::level::LogLevel;

/// Why the service gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// A pending queue overflowed with `kill_on_limit` set
    QueueLimit { level: LogLevel },
    /// Stream errors reached the configured threshold
    ErrorThreshold { errors: u32 },
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::QueueLimit { level } => {
                write!(f, "pending queue for {level} reached its limit")
            }
            TerminationReason::ErrorThreshold { errors } => {
                write!(f, "{errors} stream errors reached the error threshold")
            }
        }
    }
}

/// Strategy invoked once when the service reaches a fatal condition
pub trait Terminator: Send + Sync + fmt::Debug {
    fn terminate(&self, reason: &TerminationReason);
}

/// Sends SIGTERM to the current process (exits on non-unix targets)
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTerminator;

impl Terminator for ProcessTerminator {
    fn terminate(&self, reason: &TerminationReason) {
        error!(reason = %reason, "terminating process");

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Err(e) = kill(Pid::this(), Signal::SIGTERM) {
                error!(error = %e, "SIGTERM failed, exiting");
                std::process::exit(1);
            }
        }

        #[cfg(not(unix))]
        std::process::exit(1);
    }
}

/// Records termination requests instead of acting on them
#[derive(Debug, Default, Clone)]
pub struct RecordingTerminator {
    reasons: Arc<Mutex<Vec<TerminationReason>>>,
}

impl RecordingTerminator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reasons(&self) -> Vec<TerminationReason> {
        self.reasons.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.reasons.lock().len()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, reason: &TerminationReason) {
        self.reasons.lock().push(*reason);
    }
}
