//! Bounded per-level pending queues
//!
//! Holds messages a stream could not accept yet. A level only has an entry
//! while it has a backlog, so `has_backlog` is a plain key lookup.

use std::collections::{HashMap, VecDeque};

use crate::level::LogLevel;

/// Result of queueing a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    Queued,
    /// The queue was full; the incoming message was discarded
    Dropped,
}

#[derive(Debug)]
pub struct PendingQueues {
    limit: usize,
    queues: HashMap<LogLevel, VecDeque<String>>,
}

impl PendingQueues {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            queues: HashMap::new(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append to the back of the level's queue unless it is full
    pub fn push(&mut self, level: LogLevel, message: String) -> QueueOutcome {
        if self.len(level) >= self.limit {
            return QueueOutcome::Dropped;
        }
        self.queues.entry(level).or_default().push_back(message);
        QueueOutcome::Queued
    }

    /// Return a message taken with [`pop_front`](Self::pop_front) to the head
    pub fn push_front(&mut self, level: LogLevel, message: String) {
        self.queues.entry(level).or_default().push_front(message);
    }

    pub fn pop_front(&mut self, level: LogLevel) -> Option<String> {
        let queue = self.queues.get_mut(&level)?;
        let message = queue.pop_front();
        if queue.is_empty() {
            self.queues.remove(&level);
        }
        message
    }

    pub fn has_backlog(&self, level: LogLevel) -> bool {
        self.queues.contains_key(&level)
    }

    pub fn len(&self, level: LogLevel) -> usize {
        self.queues.get(&level).map_or(0, VecDeque::len)
    }

    /// Messages pending across all levels
    pub fn total(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Drop the level's backlog, returning how many messages were lost
    pub fn discard(&mut self, level: LogLevel) -> usize {
        self.queues.remove(&level).map_or(0, |queue| queue.len())
    }

    /// Levels that currently have a backlog
    pub fn levels(&self) -> Vec<LogLevel> {
        let mut levels: Vec<LogLevel> = self.queues.keys().copied().collect();
        levels.sort();
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_entries_exist_only_with_backlog() {
        let mut queues = PendingQueues::new(3);
        assert!(!queues.has_backlog(LogLevel::Error));

        queues.push(LogLevel::Error, "a".into());
        assert!(queues.has_backlog(LogLevel::Error));
        assert_eq!(queues.pop_front(LogLevel::Error).as_deref(), Some("a"));
        assert!(!queues.has_backlog(LogLevel::Error));
        assert!(queues.is_empty());
        assert_eq!(queues.pop_front(LogLevel::Error), None);
    }

    #[test]
    fn test_full_queue_drops_incoming() {
        let mut queues = PendingQueues::new(2);
        assert_eq!(queues.push(LogLevel::Info, "1".into()), QueueOutcome::Queued);
        assert_eq!(queues.push(LogLevel::Info, "2".into()), QueueOutcome::Queued);
        assert_eq!(queues.push(LogLevel::Info, "3".into()), QueueOutcome::Dropped);
        assert_eq!(queues.push(LogLevel::Warn, "w".into()), QueueOutcome::Queued);

        assert_eq!(queues.pop_front(LogLevel::Info).as_deref(), Some("1"));
        assert_eq!(queues.pop_front(LogLevel::Info).as_deref(), Some("2"));
        assert_eq!(queues.levels(), vec![LogLevel::Warn]);
    }

    #[test]
    fn test_push_front_restores_order() {
        let mut queues = PendingQueues::new(5);
        queues.push(LogLevel::Fatal, "first".into());
        queues.push(LogLevel::Fatal, "second".into());

        let head = queues.pop_front(LogLevel::Fatal).unwrap();
        queues.push_front(LogLevel::Fatal, head);
        assert_eq!(queues.pop_front(LogLevel::Fatal).as_deref(), Some("first"));
    }

    #[test]
    fn test_discard() {
        let mut queues = PendingQueues::new(5);
        queues.push(LogLevel::Debug, "x".into());
        queues.push(LogLevel::Debug, "y".into());
        assert_eq!(queues.total(), 2);
        assert_eq!(queues.discard(LogLevel::Debug), 2);
        assert_eq!(queues.discard(LogLevel::Debug), 0);
        assert!(queues.is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(u32),
        Pop,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![any::<u32>().prop_map(Op::Push), Just(Op::Pop)]
    }

    proptest! {
        #[test]
        fn prop_bounded_fifo(limit in 1usize..8, ops in prop::collection::vec(op(), 0..64)) {
            let mut queues = PendingQueues::new(limit);
            let mut model: VecDeque<String> = VecDeque::new();

            for op in ops {
                match op {
                    Op::Push(n) => {
                        let outcome = queues.push(LogLevel::Error, n.to_string());
                        if model.len() < limit {
                            model.push_back(n.to_string());
                            prop_assert_eq!(outcome, QueueOutcome::Queued);
                        } else {
                            prop_assert_eq!(outcome, QueueOutcome::Dropped);
                        }
                    }
                    Op::Pop => {
                        prop_assert_eq!(queues.pop_front(LogLevel::Error), model.pop_front());
                    }
                }
                prop_assert!(queues.len(LogLevel::Error) <= limit);
                prop_assert_eq!(queues.has_backlog(LogLevel::Error), !model.is_empty());
            }
        }
    }
}
