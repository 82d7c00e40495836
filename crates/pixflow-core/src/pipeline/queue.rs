//! Per-stage work queue with a completion barrier.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;

/// A concurrent FIFO shared by the workers of one stage.
///
/// Workers claim items with [`try_dequeue`](Self::try_dequeue), which never
/// waits, and report each claimed item finished with
/// [`task_done`](Self::task_done). A coordinator can [`join`](Self::join) to
/// wait until every item ever pushed has been marked done.
pub struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
    /// Items pushed but not yet marked done
    outstanding: AtomicUsize,
    drained: Notify,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            outstanding: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    /// Add an item to the back of the queue.
    pub fn push(&self, item: T) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        self.lock().push_back(item);
    }

    /// Claim the next item, or `None` if the queue is empty right now.
    pub fn try_dequeue(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Mark one previously claimed item as finished.
    pub fn task_done(&self) {
        let prev = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match prev {
            Ok(1) => self.drained.notify_waiters(),
            Ok(_) => {}
            Err(_) => tracing::warn!("task_done called more times than items were pushed"),
        }
    }

    /// Wait until every pushed item has been marked done.
    pub async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register before checking, so a notify between the check and the
            // await is not missed.
            notified.as_mut().enable();
            if self.outstanding.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Items waiting to be claimed.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items pushed but not yet marked done, claimed or not.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for WorkQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let queue = Self::new();
        for item in iter {
            queue.push(item);
        }
        queue
    }
}

/// Marks a claimed item done when dropped, even if handling it unwound.
pub(crate) struct DoneGuard<'a, T> {
    queue: &'a WorkQueue<T>,
}

impl<'a, T> DoneGuard<'a, T> {
    pub(crate) fn new(queue: &'a WorkQueue<T>) -> Self {
        Self { queue }
    }
}

impl<T> Drop for DoneGuard<'_, T> {
    fn drop(&mut self) {
        self.queue.task_done();
    }
}
