//! In-process log broadcaster with replayable history
//!
//! `AppLogService` keeps the most recent lines written by the hosting process and
//! fans every new line out to the currently connected subscribers. Delivery to a
//! subscriber never blocks the writer: when a subscriber's queue is full the line
//! is dropped for that subscriber only.

use super::history::HistoryBuffer;
use super::source::LogSource;
use super::types::{
    LogStream, APPLICATION_SERVICE, DEFAULT_CONDUIT_CAPACITY, DEFAULT_HISTORY_CAPACITY,
};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

type SubscriberId = u64;
type SubscriberMap = HashMap<SubscriberId, Subscriber>;

struct Subscriber {
    tx: mpsc::Sender<String>,
    /// Sequence number of the newest line this subscriber already got from history
    seen: u64,
}

/// Ring-buffered broadcaster for the application's own log output.
///
/// Construct one per process, share it behind an `Arc`, feed it through
/// [`AppLogService::ingest`] (or the [`LogSink`](super::sink::LogSink) impl) and
/// hand it to whatever serves log streams.
///
/// Lock order is history, then subscribers. `ingest` never holds both.
pub struct AppLogService {
    history: RwLock<HistoryBuffer>,
    subscribers: Arc<RwLock<SubscriberMap>>,
    next_id: AtomicU64,
    conduit_capacity: usize,
    dropped: AtomicU64,
}

impl Default for AppLogService {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl AppLogService {
    /// Create a broadcaster keeping `history_capacity` lines
    pub fn new(history_capacity: usize) -> Self {
        Self::with_capacities(history_capacity, DEFAULT_CONDUIT_CAPACITY)
    }

    /// Create a broadcaster with an explicit per-subscriber queue depth
    pub fn with_capacities(history_capacity: usize, conduit_capacity: usize) -> Self {
        Self {
            history: RwLock::new(HistoryBuffer::new(history_capacity)),
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            conduit_capacity: conduit_capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Record a line and offer it to every subscriber without waiting.
    ///
    /// Must not emit tracing events: this is called from inside the subscriber
    /// that formats them.
    pub fn ingest(&self, line: impl Into<String>) {
        let line = line.into();
        let seq = write(&self.history).push(line.clone());

        let subscribers = read(&self.subscribers);
        for subscriber in subscribers.values() {
            if subscriber.seen >= seq {
                continue;
            }
            match subscriber.tx.try_send(line.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                // Reader went away; its watcher is about to unregister it.
                Err(TrySendError::Closed(_)) => {}
            }
        }
    }

    /// Close every active subscription. Later cancellations become no-ops.
    pub fn close_all(&self) {
        let closed = std::mem::take(&mut *write(&self.subscribers));
        let count = closed.len();
        drop(closed);
        debug!(count, "Closed all application log subscriptions");
    }

    /// Number of currently registered subscribers
    pub fn subscriber_count(&self) -> usize {
        read(&self.subscribers).len()
    }

    /// Number of lines currently held in history
    pub fn history_len(&self) -> usize {
        read(&self.history).len()
    }

    /// Lines discarded because a subscriber's queue was full
    pub fn dropped_lines(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn subscribe(&self, session: &CancellationToken, tail: usize) -> mpsc::Receiver<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // History is replayed and the subscriber registered while writers are
        // held off, so the hand-over to live lines has no gap and no repeats.
        let (rx, replayed) = {
            let history = read(&self.history);
            let (backlog, seen) = history.tail(tail);
            let replayed = backlog.len();
            let (tx, rx) = mpsc::channel(self.conduit_capacity.max(replayed));
            for line in backlog {
                if tx.try_send(line).is_err() {
                    break;
                }
            }
            write(&self.subscribers).insert(id, Subscriber { tx, seen });
            (rx, replayed)
        };

        let subscribers = Arc::clone(&self.subscribers);
        let session = session.clone();
        tokio::spawn(async move {
            session.cancelled().await;
            let removed = write(&subscribers).remove(&id);
            if removed.is_some() {
                drop(removed);
                debug!(subscriber = id, "Application log subscriber removed");
            }
        });

        debug!(subscriber = id, replayed, "Application log subscriber added");
        rx
    }
}

#[async_trait]
impl LogSource for AppLogService {
    async fn stream_logs(
        &self,
        cancel: &CancellationToken,
        service: &str,
        tail: usize,
    ) -> Result<LogStream> {
        if service != APPLICATION_SERVICE || cancel.is_cancelled() {
            return Ok(LogStream::empty());
        }

        let session = cancel.child_token();
        let rx = self.subscribe(&session, tail);
        Ok(LogStream::new(rx, session.drop_guard()))
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn wait_for_subscribers(service: &AppLogService, expected: usize) {
        timeout(Duration::from_secs(2), async {
            while service.subscriber_count() != expected {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("subscriber count never settled");
    }

    #[tokio::test]
    async fn test_history_replayed_in_order() {
        let service = AppLogService::new(10);
        for line in ["one", "two", "three"] {
            service.ingest(line);
        }

        let cancel = CancellationToken::new();
        let mut stream = service
            .stream_logs(&cancel, APPLICATION_SERVICE, 3)
            .await
            .unwrap();

        assert_eq!(stream.next_line().await.as_deref(), Some("one"));
        assert_eq!(stream.next_line().await.as_deref(), Some("two"));
        assert_eq!(stream.next_line().await.as_deref(), Some("three"));
        cancel.cancel();
        assert_eq!(stream.next_line().await, None);
    }

    #[tokio::test]
    async fn test_other_service_name_yields_closed_stream() {
        let service = AppLogService::new(10);
        service.ingest("hello");

        let cancel = CancellationToken::new();
        let stream = service.stream_logs(&cancel, "worker", 10).await.unwrap();

        assert!(stream.collect_lines().await.is_empty());
        assert_eq!(service.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_tail_zero_sends_only_live_lines() {
        let service = AppLogService::new(10);
        service.ingest("old");

        let cancel = CancellationToken::new();
        let mut stream = service
            .stream_logs(&cancel, APPLICATION_SERVICE, 0)
            .await
            .unwrap();
        service.ingest("new");

        assert_eq!(stream.next_line().await.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_history_larger_than_conduit_does_not_block() {
        let service = AppLogService::with_capacities(50, 4);
        for i in 0..30 {
            service.ingest(format!("line {i}"));
        }

        let cancel = CancellationToken::new();
        let stream = timeout(
            Duration::from_secs(1),
            service.stream_logs(&cancel, APPLICATION_SERVICE, 30),
        )
        .await
        .expect("subscribe blocked")
        .unwrap();
        cancel.cancel();

        let lines = stream.collect_lines().await;
        assert_eq!(lines.len(), 30);
        assert_eq!(lines[0], "line 0");
        assert_eq!(lines[29], "line 29");
    }

    #[tokio::test]
    async fn test_cancelled_token_gives_empty_stream() {
        let service = AppLogService::new(10);
        service.ingest("x");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stream = service
            .stream_logs(&cancel, APPLICATION_SERVICE, 5)
            .await
            .unwrap();
        assert!(stream.collect_lines().await.is_empty());
        assert_eq!(service.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_unregisters_subscriber() {
        let service = AppLogService::new(10);
        let cancel = CancellationToken::new();
        let _stream = service
            .stream_logs(&cancel, APPLICATION_SERVICE, 0)
            .await
            .unwrap();
        assert_eq!(service.subscriber_count(), 1);

        cancel.cancel();
        wait_for_subscribers(&service, 0).await;
    }

    #[tokio::test]
    async fn test_dropping_stream_unregisters_subscriber() {
        let service = AppLogService::new(10);
        let cancel = CancellationToken::new();
        let stream = service
            .stream_logs(&cancel, APPLICATION_SERVICE, 0)
            .await
            .unwrap();

        drop(stream);
        wait_for_subscribers(&service, 0).await;
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_full_conduit_counts_drops() {
        let service = AppLogService::with_capacities(10, 2);
        let cancel = CancellationToken::new();
        let _stream = service
            .stream_logs(&cancel, APPLICATION_SERVICE, 0)
            .await
            .unwrap();

        for i in 0..5 {
            service.ingest(format!("{i}"));
        }
        assert_eq!(service.dropped_lines(), 3);
    }

    #[tokio::test]
    async fn test_close_all_then_cancel_is_harmless() {
        let service = AppLogService::new(10);
        let cancel = CancellationToken::new();
        let stream = service
            .stream_logs(&cancel, APPLICATION_SERVICE, 0)
            .await
            .unwrap();

        service.close_all();
        assert_eq!(service.subscriber_count(), 0);
        cancel.cancel();
        cancel.cancel();
        tokio::task::yield_now().await;

        assert!(stream.collect_lines().await.is_empty());
        assert_eq!(service.subscriber_count(), 0);
    }
}
