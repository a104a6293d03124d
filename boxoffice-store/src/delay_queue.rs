use async_trait::async_trait;
use boxoffice_core::{CoreError, CoreResult, Disposition, ExpiryHandler, ExpiryScheduler};
use boxoffice_shared::ExpiryNotification;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Scheduled {
    due: Instant,
    seq: u64,
    payload: Vec<u8>,
}

#[derive(Default)]
struct Queue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

impl Queue {
    fn push(&mut self, due: Instant, payload: Vec<u8>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled { due, seq, payload }));
    }

    fn pop_due(&mut self, now: Instant) -> Vec<Vec<u8>> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|Reverse(s)| s.due <= now) {
            if let Some(Reverse(s)) = self.heap.pop() {
                due.push(s.payload);
            }
        }
        due
    }
}

/// In-process stand-in for the broker's delay queue: a priority queue keyed by
/// due time on Tokio's clock, so paused-time tests can fast-forward through TTLs.
pub struct InMemoryExpiryChannel {
    queue: Mutex<Queue>,
    wake: Notify,
    redelivery_delay: Duration,
    unavailable: AtomicBool,
}

impl Default for InMemoryExpiryChannel {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl InMemoryExpiryChannel {
    /// `redelivery_delay` is how long a requeued message waits before the next attempt.
    pub fn new(redelivery_delay: Duration) -> Self {
        Self {
            queue: Mutex::new(Queue::default()),
            wake: Notify::new(),
            redelivery_delay,
            unavailable: AtomicBool::new(false),
        }
    }

    /// While set, `schedule` fails as if the broker were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Enqueue raw bytes, e.g. a payload no handler can decode.
    pub fn publish_raw(&self, payload: Vec<u8>, delay: Duration) {
        self.lock().push(Instant::now() + delay, payload);
        self.wake.notify_one();
    }

    /// Messages still waiting, due or not.
    pub fn pending(&self) -> usize {
        self.lock().heap.len()
    }

    fn next_due(&self) -> Option<Instant> {
        self.lock().heap.peek().map(|Reverse(s)| s.due)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver every message that is due right now. Returns how many were handed over.
    pub async fn drain_due(&self, handler: &dyn ExpiryHandler) -> usize {
        let batch = self.lock().pop_due(Instant::now());
        let delivered = batch.len();

        for payload in batch {
            match handler.handle(&payload).await {
                Disposition::Ack => {}
                Disposition::Discard => debug!("Delivery discarded"),
                Disposition::Requeue => {
                    debug!(
                        delay_ms = self.redelivery_delay.as_millis() as u64,
                        "Delivery requeued"
                    );
                    self.lock().push(Instant::now() + self.redelivery_delay, payload);
                }
            }
        }
        delivered
    }

    /// Deliver messages as they come due until `shutdown` flips to true.
    pub async fn run(&self, handler: &dyn ExpiryHandler, mut shutdown: watch::Receiver<bool>) {
        info!("In-memory expiry channel started");

        while !*shutdown.borrow() {
            self.drain_due(handler).await;

            let sleep = async {
                match self.next_due() {
                    Some(due) => tokio::time::sleep_until(due).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = sleep => {}
                _ = self.wake.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("In-memory expiry channel stopped");
    }
}

#[async_trait]
impl ExpiryScheduler for InMemoryExpiryChannel {
    async fn schedule(&self, notification: &ExpiryNotification) -> CoreResult<()> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(CoreError::transport("publish expiry notification", "broker unreachable"));
        }

        let payload = notification
            .to_json()
            .map_err(|e| CoreError::transport("encode expiry notification", e))?;

        self.lock().push(Instant::now() + notification.delay(), payload);
        self.wake.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use uuid::Uuid;

    /// Records payloads and answers with a fixed script of dispositions.
    struct Recorder {
        seen: Mutex<Vec<Vec<u8>>>,
        requeue_first: AtomicUsize,
    }

    impl Recorder {
        fn new(requeue_first: usize) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                requeue_first: AtomicUsize::new(requeue_first),
            }
        }

        fn count(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ExpiryHandler for Recorder {
        async fn handle(&self, payload: &[u8]) -> Disposition {
            self.seen.lock().unwrap().push(payload.to_vec());
            let remaining = self.requeue_first.load(AtomicOrdering::SeqCst);
            if remaining > 0 {
                self.requeue_first.store(remaining - 1, AtomicOrdering::SeqCst);
                Disposition::Requeue
            } else {
                Disposition::Ack
            }
        }
    }

    fn notification(ttl_minutes: i32) -> ExpiryNotification {
        let (booking_id, event_id, place_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        ExpiryNotification::new(booking_id, event_id, place_id, Utc::now(), ttl_minutes)
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_delivered_before_ttl() {
        let channel = InMemoryExpiryChannel::default();
        let handler = Recorder::new(0);
        channel.schedule(&notification(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(channel.drain_due(&handler).await, 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(channel.drain_due(&handler).await, 1);
        assert_eq!(channel.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivers_in_due_order() {
        let channel = InMemoryExpiryChannel::default();
        let handler = Recorder::new(0);
        let late = notification(30);
        let early = notification(5);
        channel.schedule(&late).await.unwrap();
        channel.schedule(&early).await.unwrap();

        tokio::time::advance(Duration::from_secs(31 * 60)).await;
        channel.drain_due(&handler).await;

        let seen = handler.seen.lock().unwrap();
        let ids: Vec<Uuid> = seen
            .iter()
            .map(|p| ExpiryNotification::from_json(p).unwrap().booking_id)
            .collect();
        assert_eq!(ids, vec![early.booking_id, late.booking_id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeue_redelivers_after_delay() {
        let channel = InMemoryExpiryChannel::new(Duration::from_secs(10));
        let handler = Recorder::new(1);
        channel.publish_raw(b"{}".to_vec(), Duration::ZERO);

        assert_eq!(channel.drain_due(&handler).await, 1);
        assert_eq!(channel.pending(), 1);
        assert_eq!(channel.drain_due(&handler).await, 0);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(channel.drain_due(&handler).await, 1);
        assert_eq!(channel.pending(), 0);
        assert_eq!(handler.count(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_channel_rejects_publish() {
        let channel = InMemoryExpiryChannel::default();
        channel.set_unavailable(true);
        let err = channel.schedule(&notification(5)).await.unwrap_err();
        assert!(matches!(err, CoreError::Transport { .. }));
        assert_eq!(channel.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_delivers_and_stops() {
        let channel = Arc::new(InMemoryExpiryChannel::default());
        let handler = Arc::new(Recorder::new(0));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = {
            let channel = channel.clone();
            let handler = handler.clone();
            tokio::spawn(async move { channel.run(handler.as_ref(), shutdown_rx).await })
        };

        channel.schedule(&notification(5)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5 * 60 + 1)).await;
        assert_eq!(handler.count(), 1);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
