//! Shared pipeline state: pending-path FIFO, completion flag, wake tokens, id counter.
//!
//! One `WorkQueue` is created per pooled run and shared by `Arc` between the
//! producer and every worker. Wake tokens travel over an unbounded crossbeam
//! channel: one token per pushed item, plus one per worker once the producer
//! closes the queue. Receiving a token is the only place a worker blocks.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel as cb;
use parking_lot::Mutex;

/// A unit of work: path of one image file.
pub type WorkItem = PathBuf;

struct Pending {
    items: VecDeque<WorkItem>,
    /// Set once by the producer; no pushes follow.
    closed: bool,
}

pub struct WorkQueue {
    pending: Mutex<Pending>,
    wake_tx: cb::Sender<()>,
    wake_rx: cb::Receiver<()>,
    next_id: AtomicU64,
}

impl WorkQueue {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = cb::unbounded();
        Self {
            pending: Mutex::new(Pending {
                items: VecDeque::new(),
                closed: false,
            }),
            wake_tx,
            wake_rx,
            next_id: AtomicU64::new(1),
        }
    }

    /// Enqueue an item, then release one wake token.
    pub fn push(&self, item: WorkItem) {
        self.pending.lock().items.push_back(item);
        self.wake();
    }

    /// Mark the queue complete and release one extra token per worker, so a
    /// worker already parked on an empty queue still observes shutdown.
    pub fn close(&self, workers: usize) {
        self.pending.lock().closed = true;
        for _ in 0..workers {
            self.wake();
        }
    }

    /// Block until an item is available or the queue is closed and empty.
    ///
    /// Each pass of the loop consumes exactly one token, so an empty,
    /// still-open queue parks the caller on the next receive rather than spinning.
    pub fn next(&self) -> Option<WorkItem> {
        loop {
            // Both channel halves live in `self`; the receive cannot disconnect.
            if self.wake_rx.recv().is_err() {
                return None;
            }
            let mut pending = self.pending.lock();
            if let Some(item) = pending.items.pop_front() {
                return Some(item);
            }
            if pending.closed {
                return None;
            }
        }
    }

    /// Next result id. Ids start at 1 and follow completion order.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Number of ids handed out so far.
    pub fn issued_ids(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst) - 1
    }

    /// Remove whatever is still queued. Only meaningful after the pool joined.
    pub fn drain(&self) -> Vec<WorkItem> {
        self.pending.lock().items.drain(..).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.pending.lock().closed
    }

    pub fn len(&self) -> usize {
        self.pending.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn wake(&self) {
        let _ = self.wake_tx.send(());
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}
