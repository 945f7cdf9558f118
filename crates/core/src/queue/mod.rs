//! In-process import queue.
//!
//! A thread-safe, unbounded FIFO of task ids feeding the single import
//! worker. The queue is deliberately not durable: the task store's status
//! column is the recovery source of truth, reconciled by the restarter's
//! blind re-push. Duplicate ids are expected and harmless because the
//! worker treats every pop as check-then-skip.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};
use uuid::Uuid;

use crate::metrics;

/// FIFO of import task ids plus the shared import-in-progress flag.
///
/// Producers push from any context; only the import worker pops. The flag
/// is owned by the worker (set/clear) and read by the alternate-format
/// sweeper to stay out of the way of active processing.
pub struct ImportQueue {
    tx: mpsc::UnboundedSender<Uuid>,
    rx: Mutex<mpsc::UnboundedReceiver<Uuid>>,
    import_in_progress: AtomicBool,
}

impl Default for ImportQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            import_in_progress: AtomicBool::new(false),
        }
    }

    /// Enqueue a task id. Never blocks; duplicates are allowed.
    pub fn push(&self, task_id: Uuid) {
        if self.tx.send(task_id).is_err() {
            // Only possible if the receiver was dropped, which the queue
            // itself owns for its whole lifetime.
            error!("Import queue receiver is gone; dropping task {}", task_id);
            return;
        }
        metrics::QUEUE_PUSHES.inc();
        debug!("Pushed import task {} to the queue", task_id);
    }

    /// Wait for the next task id. Returns `None` only if the queue has
    /// been closed.
    pub async fn pop(&self) -> Option<Uuid> {
        let task_id = self.rx.lock().await.recv().await;
        if let Some(id) = task_id {
            debug!("Popped import task {} from the queue", id);
        }
        task_id
    }

    pub fn import_in_progress(&self) -> bool {
        self.import_in_progress.load(Ordering::SeqCst)
    }

    pub fn mark_import_in_progress(&self) {
        self.import_in_progress.store(true, Ordering::SeqCst);
        debug!("Media import marked as in progress");
    }

    pub fn mark_import_complete(&self) {
        self.import_in_progress.store(false, Ordering::SeqCst);
        debug!("Media import marked as complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn pops_in_fifo_order() {
        let queue = ImportQueue::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        queue.push(a);
        queue.push(b);

        assert_eq!(queue.pop().await, Some(a));
        assert_eq!(queue.pop().await, Some(b));
    }

    #[tokio::test]
    async fn allows_duplicate_ids() {
        let queue = ImportQueue::new();
        let id = Uuid::new_v4();

        queue.push(id);
        queue.push(id);

        assert_eq!(queue.pop().await, Some(id));
        assert_eq!(queue.pop().await, Some(id));
    }

    #[tokio::test]
    async fn pop_waits_for_a_push() {
        let queue = std::sync::Arc::new(ImportQueue::new());

        let waiter = {
            let queue = std::sync::Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let id = Uuid::new_v4();
        queue.push(id);

        let popped = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("pop should resolve")
            .expect("waiter task should not panic");
        assert_eq!(popped, Some(id));
    }

    #[tokio::test]
    async fn import_in_progress_flag_toggles() {
        let queue = ImportQueue::new();
        assert!(!queue.import_in_progress());
        queue.mark_import_in_progress();
        assert!(queue.import_in_progress());
        queue.mark_import_complete();
        assert!(!queue.import_in_progress());
    }
}
