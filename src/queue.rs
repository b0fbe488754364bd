//! The single synchronization point between producers and consumers: a
//! bounded MPMC FIFO of batches.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use tracing::warn;

use crate::keys::Batch;
use crate::scanner::StopToken;

/// How long one bounded send waits before re-checking the stop token.
const OFFER_POLL: Duration = Duration::from_millis(50);

/// Bounded multi-producer/multi-consumer batch queue. FIFO per producer; no
/// ordering between producers. Cloning shares the same channel.
#[derive(Clone)]
pub struct BatchQueue {
    tx: Sender<Batch>,
    rx: Receiver<Batch>,
    capacity: usize,
}

impl BatchQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Block until the batch is accepted or the stop token rises. Returns
    /// `false` when the batch was not handed over (stop, or all consumers
    /// gone).
    pub fn offer(&self, batch: Batch, stop: &StopToken) -> bool {
        if self.rx.len() >= self.capacity {
            warn!("queue is full, consumers are capacity-starved; consider raising queueSize");
        }

        // One send attempt runs before the stop check so a batch finished
        // right at shutdown still reaches the consumers when space exists.
        let mut batch = batch;
        loop {
            match self.tx.send_timeout(batch, OFFER_POLL) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(returned)) => {
                    if stop.is_stopped() {
                        return false;
                    }
                    batch = returned;
                }
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }

    /// Non-blocking take. `None` means empty right now, not exhausted.
    #[inline]
    pub fn poll(&self) -> Option<Batch> {
        self.rx.try_recv().ok()
    }

    /// Advisory depth, read by the stats reporter.
    #[inline]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{PublicKeyBytes, Secret};

    fn dummy_batch() -> Batch {
        vec![PublicKeyBytes::invalid(Secret::from_u64(1))]
    }

    #[test]
    fn offer_then_poll_round_trips() {
        let queue = BatchQueue::with_capacity(2);
        let stop = StopToken::new();
        assert!(queue.offer(dummy_batch(), &stop));
        assert_eq!(queue.len(), 1);
        assert!(queue.poll().is_some());
        assert!(queue.poll().is_none());
    }

    #[test]
    fn offer_into_full_queue_unblocks_on_stop() {
        let queue = BatchQueue::with_capacity(1);
        let stop = StopToken::new();
        assert!(queue.offer(dummy_batch(), &stop));

        let blocked_queue = queue.clone();
        let blocked_stop = stop.clone();
        let handle = std::thread::spawn(move || blocked_queue.offer(dummy_batch(), &blocked_stop));

        std::thread::sleep(Duration::from_millis(120));
        stop.stop();
        let accepted = handle.join().unwrap();
        assert!(!accepted, "offer into a full queue must fail after stop");
    }

    #[test]
    fn fifo_order_per_producer() {
        let queue = BatchQueue::with_capacity(4);
        let stop = StopToken::new();
        for k in 0..3u64 {
            queue.offer(vec![PublicKeyBytes::invalid(Secret::from_u64(k))], &stop);
        }
        for k in 0..3u64 {
            let batch = queue.poll().unwrap();
            assert_eq!(batch[0].secret, Secret::from_u64(k));
        }
    }
}
