//! Task restarter: periodic recovery of abandoned imports.
//!
//! The in-memory queue does not survive a process restart; the durable
//! status column does. Each sweep blindly re-pushes every task the store
//! reports as queued or in progress, even ones already in flight. The
//! worker's check-then-skip makes the duplicate pops harmless.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::metrics;
use crate::queue::ImportQueue;
use crate::task::{MediaStore, StoreError};

use super::config::WorkerConfig;

/// Periodically re-enqueues durably non-terminal tasks.
pub struct TaskRestarter {
    config: WorkerConfig,
    queue: Arc<ImportQueue>,
    store: Arc<dyn MediaStore>,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl TaskRestarter {
    pub fn new(config: WorkerConfig, queue: Arc<ImportQueue>, store: Arc<dyn MediaStore>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            queue,
            store,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start the sweep loop. The first sweep runs immediately so work
    /// lost to a restart resumes without waiting a full interval.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Task restarter already running");
            return;
        }

        let running = Arc::clone(&self.running);
        let queue = Arc::clone(&self.queue);
        let store = Arc::clone(&self.store);
        let interval = Duration::from_secs(self.config.restart_interval_secs);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Task restarter started");
            loop {
                match Self::resubmit_pending(&store, &queue) {
                    Ok(count) if count > 0 => {
                        info!("Re-queued {} abandoned import tasks", count);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Error re-queuing abandoned import tasks: {}", e);
                    }
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Task restarter received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                    }
                }
            }
            info!("Task restarter stopped");
        });
    }

    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    /// One sweep: push every resumable task id, unconditionally.
    pub fn resubmit_pending(
        store: &Arc<dyn MediaStore>,
        queue: &Arc<ImportQueue>,
    ) -> Result<usize, StoreError> {
        let ids = store.list_resumable_task_ids()?;
        for id in &ids {
            // If it is actually still queued, the worker will just log a
            // warning when the duplicate pop finds nothing to do.
            queue.push(*id);
        }
        metrics::SWEEP_RUNS
            .with_label_values(&["restarter", "ok"])
            .inc();
        Ok(ids.len())
    }
}
