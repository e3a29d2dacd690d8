//! Log stream service
//!
//! Owns one sink per configured level and a bounded pending queue per level.
//! Every method takes `&mut self`: the service is driven by a single task
//! (see [`crate::LogStreamHandle`]) or directly by its owner.
//!
//! Writes go straight to the level's sink while it has no backlog. Once a
//! sink pushes back, messages for that level queue up in FIFO order until a
//! drain signal flushes them. A failing sink is replaced and its backlog
//! flushed into the replacement; too many failures terminate the process.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use tessera_common::validation::Validatable;

use crate::config::LogStreamConfig;
use crate::error::LogStreamResult;
use crate::level::LogLevel;
use crate::queue::{PendingQueues, QueueOutcome};
use crate::sink::{FileSinkFactory, LogSink, SinkContext, SinkFactory, StreamId, StreamSignal, WriteOutcome};
use crate::terminate::{ProcessTerminator, TerminationReason, Terminator};

/// Point-in-time view of a service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogStreamStats {
    /// Pending messages per level with a backlog
    pub queued: BTreeMap<LogLevel, usize>,
    /// Messages discarded because a queue was full
    pub dropped: u64,
    /// Messages discarded by cleanup
    pub discarded: u64,
    /// Stream errors seen so far
    pub errors: u32,
    pub open_streams: usize,
    pub terminated: bool,
}

impl LogStreamStats {
    pub fn total_queued(&self) -> usize {
        self.queued.values().sum()
    }
}

pub struct LogStreamService {
    config: LogStreamConfig,
    levels: BTreeSet<LogLevel>,
    factory: Arc<dyn SinkFactory>,
    terminator: Arc<dyn Terminator>,
    sinks: HashMap<LogLevel, Box<dyn LogSink>>,
    pending: PendingQueues,
    signal_tx: mpsc::UnboundedSender<StreamSignal>,
    signal_rx: Option<mpsc::UnboundedReceiver<StreamSignal>>,
    next_stream_id: u64,
    errors: u32,
    dropped: u64,
    discarded: u64,
    terminated: bool,
    closed: bool,
}

impl std::fmt::Debug for LogStreamService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStreamService")
            .field("abspath", &self.config.abspath)
            .field("levels", &self.levels)
            .field("pending", &self.pending.total())
            .field("errors", &self.errors)
            .field("terminated", &self.terminated)
            .field("closed", &self.closed)
            .finish()
    }
}

impl LogStreamService {
    /// File-backed service that terminates the process on fatal conditions
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    /// A validation error for an invalid configuration, or a runtime error
    /// when called outside tokio. Files are opened by their writer tasks.
    pub fn new(config: LogStreamConfig) -> LogStreamResult<Self> {
        let factory = Arc::new(FileSinkFactory::new(config.abspath.clone()));
        Self::with_parts(config, factory, Arc::new(ProcessTerminator))
    }

    /// Service with explicit sink factory and termination strategy
    pub fn with_parts(
        config: LogStreamConfig,
        factory: Arc<dyn SinkFactory>,
        terminator: Arc<dyn Terminator>,
    ) -> LogStreamResult<Self> {
        config.validate()?;

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let mut service = Self {
            levels: config.enabled_levels(),
            pending: PendingQueues::new(config.stream_limit),
            config,
            factory,
            terminator,
            sinks: HashMap::new(),
            signal_tx,
            signal_rx: Some(signal_rx),
            next_stream_id: 0,
            errors: 0,
            dropped: 0,
            discarded: 0,
            terminated: false,
            closed: false,
        };

        let levels: Vec<LogLevel> = service.levels.iter().copied().collect();
        for level in levels {
            service.open_sink(level)?;
        }

        info!(
            abspath = %service.config.abspath.display(),
            levels = ?service.levels,
            "log stream service started"
        );
        Ok(service)
    }

    pub fn config(&self) -> &LogStreamConfig {
        &self.config
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Identity of the level's current sink
    pub fn stream_id(&self, level: LogLevel) -> Option<StreamId> {
        self.sinks.get(&level).map(|sink| sink.id())
    }

    pub fn pending(&self, level: LogLevel) -> usize {
        self.pending.len(level)
    }

    /// Write a message, or queue it behind the level's backlog
    ///
    /// Messages for unconfigured levels, and every message after
    /// termination or cleanup, are ignored.
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        if self.terminated || self.closed || !self.levels.contains(&level) {
            return;
        }

        let mut message = message.into();
        if !self.pending.has_backlog(level) {
            if let Some(sink) = self.sinks.get_mut(&level) {
                match sink.write(message) {
                    WriteOutcome::Written => return,
                    WriteOutcome::Backpressure(returned) => {
                        debug!(level = %level, "stream backpressure, queueing");
                        message = returned;
                    }
                    WriteOutcome::Closed(returned) => message = returned,
                }
            }
        }

        self.enqueue(level, message);
    }

    /// Move the level's backlog into its sink until the sink pushes back
    pub fn flush(&mut self, level: LogLevel) {
        let Some(sink) = self.sinks.get_mut(&level) else {
            return;
        };

        while let Some(message) = self.pending.pop_front(level) {
            match sink.write(message) {
                WriteOutcome::Written => {}
                WriteOutcome::Backpressure(message) | WriteOutcome::Closed(message) => {
                    self.pending.push_front(level, message);
                    return;
                }
            }
        }
    }

    /// React to a sink signal
    ///
    /// Signals from a sink that has since been replaced are ignored.
    pub fn handle_signal(&mut self, signal: StreamSignal) {
        if self.terminated || self.closed {
            return;
        }
        if self.stream_id(signal.level()) != Some(signal.id()) {
            debug!(level = %signal.level(), id = %signal.id(), "ignoring signal from stale stream");
            return;
        }

        match signal {
            StreamSignal::Drain { level, .. } => self.flush(level),
            StreamSignal::Error { level, id, error } => self.recover(level, id, &error),
        }
    }

    /// Handle every signal already delivered, returning how many there were
    ///
    /// Does nothing once the receiver was taken by a handle.
    pub fn process_signals(&mut self) -> usize {
        let mut signals = Vec::new();
        if let Some(receiver) = self.signal_rx.as_mut() {
            while let Ok(signal) = receiver.try_recv() {
                signals.push(signal);
            }
        }

        let count = signals.len();
        for signal in signals {
            self.handle_signal(signal);
        }
        count
    }

    /// Take the signal receiver to drive the service from an event loop
    pub fn take_signal_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<StreamSignal>> {
        self.signal_rx.take()
    }

    /// Flush once, discard what is left, then close every sink
    ///
    /// The service accepts no further messages afterwards.
    pub async fn cleanup(&mut self) {
        let levels: Vec<LogLevel> = self.levels.iter().copied().collect();
        for level in levels {
            self.flush(level);
            let lost = self.pending.discard(level);
            if lost > 0 {
                warn!(level = %level, lost, "discarding pending messages on cleanup");
                self.discarded += lost as u64;
            }
        }

        self.closed = true;
        join_all(self.sinks.drain().map(|(_, sink)| sink.close())).await;
        info!(abspath = %self.config.abspath.display(), "log stream service closed");
    }

    pub fn stats(&self) -> LogStreamStats {
        LogStreamStats {
            queued: self
                .pending
                .levels()
                .into_iter()
                .map(|level| (level, self.pending.len(level)))
                .collect(),
            dropped: self.dropped,
            discarded: self.discarded,
            errors: self.errors,
            open_streams: self.sinks.len(),
            terminated: self.terminated,
        }
    }

    fn enqueue(&mut self, level: LogLevel, message: String) {
        if self.pending.push(level, message) == QueueOutcome::Queued {
            return;
        }

        self.dropped += 1;
        warn!(
            level = %level,
            limit = self.pending.limit(),
            "pending queue full, dropping message"
        );
        if self.config.kill_on_limit {
            self.terminate(TerminationReason::QueueLimit { level });
        }
    }

    fn open_sink(&mut self, level: LogLevel) -> LogStreamResult<()> {
        if self.sinks.contains_key(&level) {
            return Ok(());
        }

        self.next_stream_id += 1;
        let context = SinkContext {
            level,
            id: StreamId::new(self.next_stream_id),
            high_water_mark: self.config.high_water_mark,
            signals: self.signal_tx.clone(),
        };
        let sink = self.factory.open(context)?;
        self.sinks.insert(level, sink);
        Ok(())
    }

    /// Replace a failed sink, retrying until one opens or the error
    /// threshold is reached
    fn recover(&mut self, level: LogLevel, id: StreamId, reason: &str) {
        self.sinks.remove(&level);
        self.errors += 1;
        error!(level = %level, id = %id, errors = self.errors, error = %reason, "log stream failed");

        loop {
            if self.errors >= self.config.error_threshold {
                self.terminate(TerminationReason::ErrorThreshold {
                    errors: self.errors,
                });
                return;
            }

            match self.open_sink(level) {
                Ok(()) => {
                    info!(level = %level, id = ?self.stream_id(level), "log stream recreated");
                    self.flush(level);
                    return;
                }
                Err(e) => {
                    self.errors += 1;
                    error!(level = %level, errors = self.errors, error = %e, "log stream could not be reopened");
                }
            }
        }
    }

    fn terminate(&mut self, reason: TerminationReason) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        error!(reason = %reason, "log stream service terminating");
        self.terminator.terminate(&reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LogStreamError;
    use crate::terminate::RecordingTerminator;
    use futures::future::{BoxFuture, FutureExt};
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[derive(Debug, Default)]
    struct Shared {
        written: Vec<(LogLevel, String)>,
        blocked: HashSet<LogLevel>,
        opened: Vec<(LogLevel, StreamId)>,
        closed: Vec<StreamId>,
        contexts: HashMap<LogLevel, SinkContext>,
        failing_opens: usize,
    }

    #[derive(Debug, Clone, Default)]
    struct FakeFactory {
        shared: Arc<Mutex<Shared>>,
    }

    impl FakeFactory {
        fn block(&self, level: LogLevel) {
            self.shared.lock().blocked.insert(level);
        }

        /// Unblock and deliver a drain through the real signal channel
        fn unblock(&self, level: LogLevel) {
            let mut shared = self.shared.lock();
            shared.blocked.remove(&level);
            if let Some(ctx) = shared.contexts.get(&level) {
                ctx.signal_drain();
            }
        }

        fn fail(&self, level: LogLevel, error: &str) {
            if let Some(ctx) = self.shared.lock().contexts.get(&level) {
                ctx.signal_error(error);
            }
        }

        fn written(&self, level: LogLevel) -> Vec<String> {
            self.shared
                .lock()
                .written
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, m)| m.clone())
                .collect()
        }

        fn opened(&self) -> Vec<(LogLevel, StreamId)> {
            self.shared.lock().opened.clone()
        }
    }

    impl SinkFactory for FakeFactory {
        fn open(&self, context: SinkContext) -> LogStreamResult<Box<dyn LogSink>> {
            let mut shared = self.shared.lock();
            if shared.failing_opens > 0 {
                shared.failing_opens -= 1;
                return Err(LogStreamError::Io(std::io::Error::other("disk gone")));
            }
            shared.opened.push((context.level, context.id));
            shared.contexts.insert(context.level, context.clone());
            Ok(Box::new(FakeSink {
                level: context.level,
                id: context.id,
                shared: Arc::clone(&self.shared),
            }))
        }
    }

    #[derive(Debug)]
    struct FakeSink {
        level: LogLevel,
        id: StreamId,
        shared: Arc<Mutex<Shared>>,
    }

    impl LogSink for FakeSink {
        fn id(&self) -> StreamId {
            self.id
        }

        fn write(&mut self, message: String) -> WriteOutcome {
            let mut shared = self.shared.lock();
            if shared.blocked.contains(&self.level) {
                return WriteOutcome::Backpressure(message);
            }
            shared.written.push((self.level, message));
            WriteOutcome::Written
        }

        fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
            self.shared.lock().closed.push(self.id);
            async {}.boxed()
        }
    }

    struct Fixture {
        _dir: TempDir,
        factory: FakeFactory,
        terminator: RecordingTerminator,
        service: LogStreamService,
    }

    fn fixture(configure: impl FnOnce(LogStreamConfig) -> LogStreamConfig) -> Fixture {
        let dir = TempDir::new().unwrap();
        let factory = FakeFactory::default();
        let terminator = RecordingTerminator::new();
        let config = configure(LogStreamConfig::new(dir.path()));
        let service = LogStreamService::with_parts(
            config,
            Arc::new(factory.clone()),
            Arc::new(terminator.clone()),
        )
        .unwrap();
        Fixture {
            _dir: dir,
            factory,
            terminator,
            service,
        }
    }

    #[test]
    fn test_opens_one_stream_per_configured_level() {
        let f = fixture(|c| c.with_levels([LogLevel::Info, LogLevel::Error, LogLevel::Info]));
        let levels: Vec<LogLevel> = f.factory.opened().into_iter().map(|(l, _)| l).collect();
        assert_eq!(levels, vec![LogLevel::Info, LogLevel::Error]);
        assert_eq!(f.service.stats().open_streams, 2);
    }

    #[test]
    fn test_invalid_directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result = LogStreamService::with_parts(
            LogStreamConfig::new(dir.path().join("missing")),
            Arc::new(FakeFactory::default()),
            Arc::new(RecordingTerminator::new()),
        );
        assert!(matches!(result, Err(LogStreamError::Validation(_))));
    }

    #[test]
    fn test_unconfigured_level_is_ignored() {
        let mut f = fixture(|c| c);
        f.service.log(LogLevel::Debug, "hidden");
        assert!(f.factory.written(LogLevel::Debug).is_empty());
        assert_eq!(f.service.stats(), LogStreamStats {
            open_streams: 2,
            ..Default::default()
        });
    }

    #[test]
    fn test_writes_pass_straight_through() {
        let mut f = fixture(|c| c);
        f.service.log(LogLevel::Error, "a");
        f.service.log(LogLevel::Error, "b");
        assert_eq!(f.factory.written(LogLevel::Error), vec!["a", "b"]);
        assert_eq!(f.service.pending(LogLevel::Error), 0);
    }

    #[test]
    fn test_backlog_preserves_order_across_drain() {
        let mut f = fixture(|c| c);
        f.service.log(LogLevel::Error, "1");
        f.factory.block(LogLevel::Error);
        f.service.log(LogLevel::Error, "2");
        f.service.log(LogLevel::Error, "3");
        assert_eq!(f.service.pending(LogLevel::Error), 2);

        f.factory.unblock(LogLevel::Error);
        // A write arriving before the drain is processed queues behind the backlog.
        f.service.log(LogLevel::Error, "4");
        assert_eq!(f.service.process_signals(), 1);

        assert_eq!(f.factory.written(LogLevel::Error), vec!["1", "2", "3", "4"]);
        assert_eq!(f.service.pending(LogLevel::Error), 0);
    }

    #[test]
    fn test_flush_stops_at_backpressure() {
        let mut f = fixture(|c| c);
        f.factory.block(LogLevel::Fatal);
        f.service.log(LogLevel::Fatal, "x");
        f.service.log(LogLevel::Fatal, "y");

        f.service.flush(LogLevel::Fatal);
        assert_eq!(f.service.pending(LogLevel::Fatal), 2);
        assert!(f.factory.written(LogLevel::Fatal).is_empty());
    }

    #[test]
    fn test_queue_limit_drops_incoming_without_terminating() {
        let mut f = fixture(|c| c.with_stream_limit(2));
        f.factory.block(LogLevel::Error);
        for message in ["a", "b", "c", "d"] {
            f.service.log(LogLevel::Error, message);
        }

        let stats = f.service.stats();
        assert_eq!(stats.queued.get(&LogLevel::Error), Some(&2));
        assert_eq!(stats.dropped, 2);
        assert_eq!(f.terminator.count(), 0);

        f.factory.unblock(LogLevel::Error);
        f.service.process_signals();
        assert_eq!(f.factory.written(LogLevel::Error), vec!["a", "b"]);
    }

    #[test]
    fn test_kill_on_limit_terminates_once() {
        let mut f = fixture(|c| c.with_stream_limit(1).with_kill_on_limit(true));
        f.factory.block(LogLevel::Error);
        f.service.log(LogLevel::Error, "kept");
        f.service.log(LogLevel::Error, "overflow");
        f.service.log(LogLevel::Error, "after");

        assert!(f.service.is_terminated());
        assert_eq!(
            f.terminator.reasons(),
            vec![TerminationReason::QueueLimit {
                level: LogLevel::Error
            }]
        );
        assert_eq!(f.service.stats().dropped, 1);
    }

    #[test]
    fn test_stale_signals_are_ignored() {
        let mut f = fixture(|c| c.with_levels([LogLevel::Warn]));
        f.factory.block(LogLevel::Warn);
        f.service.log(LogLevel::Warn, "queued");

        f.service.handle_signal(StreamSignal::Drain {
            level: LogLevel::Warn,
            id: StreamId::new(999),
        });
        f.service.handle_signal(StreamSignal::Error {
            level: LogLevel::Warn,
            id: StreamId::new(999),
            error: "old".into(),
        });
        assert_eq!(f.service.pending(LogLevel::Warn), 1);
        assert_eq!(f.service.stats().errors, 0);
    }

    #[test]
    fn test_error_recreates_stream_and_flushes_backlog() {
        let mut f = fixture(|c| c.with_levels([LogLevel::Error]));
        let first = f.service.stream_id(LogLevel::Error).unwrap();
        f.factory.block(LogLevel::Error);
        f.service.log(LogLevel::Error, "pending");

        f.factory.shared.lock().blocked.clear();
        f.factory.fail(LogLevel::Error, "EIO");
        f.service.process_signals();

        let second = f.service.stream_id(LogLevel::Error).unwrap();
        assert_ne!(first, second);
        assert_eq!(f.factory.written(LogLevel::Error), vec!["pending"]);
        assert_eq!(f.service.stats().errors, 1);
        assert!(!f.service.is_terminated());

        // The replaced stream's late drain changes nothing.
        f.service.handle_signal(StreamSignal::Drain {
            level: LogLevel::Error,
            id: first,
        });
        assert_eq!(f.service.stream_id(LogLevel::Error), Some(second));
    }

    #[test]
    fn test_error_threshold_terminates() {
        let mut f = fixture(|c| c.with_levels([LogLevel::Error]).with_error_threshold(2));
        f.factory.fail(LogLevel::Error, "first");
        f.service.process_signals();
        assert!(!f.service.is_terminated());

        f.factory.fail(LogLevel::Error, "second");
        f.service.process_signals();
        assert!(f.service.is_terminated());
        assert_eq!(
            f.terminator.reasons(),
            vec![TerminationReason::ErrorThreshold { errors: 2 }]
        );

        f.service.log(LogLevel::Error, "ignored");
        assert_eq!(f.service.pending(LogLevel::Error), 0);
    }

    #[test]
    fn test_failed_reopen_counts_towards_threshold() {
        let mut f = fixture(|c| c.with_levels([LogLevel::Fatal]).with_error_threshold(3));
        f.factory.shared.lock().failing_opens = 5;
        f.factory.fail(LogLevel::Fatal, "boom");
        f.service.process_signals();

        assert!(f.service.is_terminated());
        assert_eq!(f.service.stats().errors, 3);
        assert_eq!(f.service.stream_id(LogLevel::Fatal), None);
    }

    #[test]
    fn test_reopen_recovers_after_transient_failure() {
        let mut f = fixture(|c| c.with_levels([LogLevel::Fatal]).with_error_threshold(5));
        f.factory.shared.lock().failing_opens = 1;
        f.factory.fail(LogLevel::Fatal, "boom");
        f.service.process_signals();

        assert!(!f.service.is_terminated());
        assert_eq!(f.service.stats().errors, 2);
        assert!(f.service.stream_id(LogLevel::Fatal).is_some());
    }

    #[tokio::test]
    async fn test_cleanup_flushes_once_discards_rest_and_closes() {
        let mut f = fixture(|c| c);
        f.factory.block(LogLevel::Error);
        f.service.log(LogLevel::Error, "lost");
        f.service.log(LogLevel::Fatal, "written");

        f.service.cleanup().await;

        assert_eq!(f.factory.written(LogLevel::Fatal), vec!["written"]);
        assert!(f.factory.written(LogLevel::Error).is_empty());
        assert_eq!(f.factory.shared.lock().closed.len(), 2);

        let stats = f.service.stats();
        assert_eq!(stats.total_queued(), 0);
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.open_streams, 0);
        assert!(f.service.is_closed());

        f.service.log(LogLevel::Fatal, "late");
        assert_eq!(f.factory.written(LogLevel::Fatal), vec!["written"]);
    }

    #[test]
    fn test_signal_receiver_can_be_taken_once() {
        let mut f = fixture(|c| c);
        assert!(f.service.take_signal_receiver().is_some());
        assert!(f.service.take_signal_receiver().is_none());
        assert_eq!(f.service.process_signals(), 0);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test(flavor = "current_thread")]
    async fn test_failing_file_stream_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("error.log");
        std::os::unix::fs::symlink("/dev/full", &path).unwrap();

        let terminator = RecordingTerminator::new();
        let mut service = LogStreamService::with_parts(
            LogStreamConfig::new(dir.path()).with_levels([LogLevel::Error]),
            Arc::new(FileSinkFactory::new(dir.path())),
            Arc::new(terminator.clone()),
        )
        .unwrap();
        let mut signals = service.take_signal_receiver().unwrap();
        let first = service.stream_id(LogLevel::Error).unwrap();

        service.log(LogLevel::Error, "lost to a full device");
        let signal = signals.recv().await.unwrap();
        assert!(matches!(signal, StreamSignal::Error { id, .. } if id == first));

        std::fs::remove_file(&path).unwrap();
        service.handle_signal(signal);

        let second = service.stream_id(LogLevel::Error).unwrap();
        assert_ne!(first, second);
        assert_eq!(service.stats().errors, 1);

        service.log(LogLevel::Error, "after recovery");
        service.cleanup().await;

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "after recovery\n");
        assert_eq!(terminator.count(), 0);
        assert!(!service.is_terminated());
    }
}
