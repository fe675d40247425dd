//! Append-only, process-wide session log.
//!
//! Cloning a [`LogSink`] shares the same log. Readers get owned snapshots
//! and never a reference into the live buffer; live readers can also
//! subscribe to appends.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use tokio::sync::broadcast;

use mirror_core::types::LogEntry;

const DEFAULT_BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct LogSink {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    entries: RwLock<Vec<LogEntry>>,
    appended_tx: broadcast::Sender<LogEntry>,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    /// Create a sink whose append broadcast buffers `capacity` entries per
    /// lagging subscriber. The log itself is unbounded.
    pub fn with_capacity(capacity: usize) -> Self {
        let (appended_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(Vec::new()),
                appended_tx,
            }),
        }
    }

    /// Append a timestamped message. The only mutator.
    pub fn append(&self, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry::new(Utc::now(), message);
        tracing::info!(target: "mirror::session_log", message = %entry.message);
        self.inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        // No subscribers is fine.
        let _ = self.inner.appended_tx.send(entry.clone());
        entry
    }

    /// Full ordered copy of the log.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// The last `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<LogEntry> {
        let entries = self.read();
        let start = entries.len().saturating_sub(n);
        entries[start..].to_vec()
    }

    /// Most recent entry, for "jump to last" readers.
    pub fn last(&self) -> Option<LogEntry> {
        self.read().last().cloned()
    }

    /// Receive every entry appended after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.inner.appended_tx.subscribe()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<LogEntry>> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let log = LogSink::new();
        log.append("first");
        log.append("second");
        log.append("third");
        let messages: Vec<_> = log.snapshot().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, ["first", "second", "third"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn timestamps_are_monotonic_in_insertion_order() {
        let log = LogSink::new();
        for i in 0..10 {
            log.append(format!("entry {i}"));
        }
        let entries = log.snapshot();
        assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn tail_and_last() {
        let log = LogSink::new();
        assert!(log.is_empty());
        assert!(log.last().is_none());
        assert!(log.tail(3).is_empty());

        for i in 0..5 {
            log.append(format!("{i}"));
        }
        let tail: Vec<_> = log.tail(2).into_iter().map(|e| e.message).collect();
        assert_eq!(tail, ["3", "4"]);
        assert_eq!(log.tail(50).len(), 5);
        assert_eq!(log.last().map(|e| e.message).as_deref(), Some("4"));
    }

    #[test]
    fn snapshot_is_detached_from_later_appends() {
        let log = LogSink::new();
        log.append("a");
        let snap = log.snapshot();
        log.append("b");
        assert_eq!(snap.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn clones_share_one_log() {
        let log = LogSink::new();
        let other = log.clone();
        other.append("from clone");
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn subscribers_receive_appends() {
        let log = LogSink::new();
        let mut rx = log.subscribe();
        log.append("hello");
        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.message, "hello");
    }
}
