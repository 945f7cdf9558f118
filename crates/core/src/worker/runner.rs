//! Import worker implementation.
//!
//! A single consumer loop pulls task ids off the import queue and drives
//! per-unit processing, persisting after every unit so progress is
//! observable mid-flight. Every pop is check-then-skip: a stale duplicate
//! from the restarter finds the task terminal (or its units processed)
//! and does nothing, which is what makes the restarter's blind re-push
//! safe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::converter::MediaConverter;
use crate::metrics;
use crate::processor::UnitProcessor;
use crate::queue::ImportQueue;
use crate::remote::RemoteStore;
use crate::task::{MediaStore, StoreError, TaskStatus};

use super::config::WorkerConfig;

/// Error type for worker operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The import worker: one instance per running process.
pub struct ImportWorker<C, R>
where
    C: MediaConverter + 'static,
    R: RemoteStore + 'static,
{
    config: WorkerConfig,
    queue: Arc<ImportQueue>,
    store: Arc<dyn MediaStore>,
    processor: Arc<UnitProcessor<C, R>>,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl<C, R> ImportWorker<C, R>
where
    C: MediaConverter + 'static,
    R: RemoteStore + 'static,
{
    pub fn new(
        config: WorkerConfig,
        queue: Arc<ImportQueue>,
        store: Arc<dyn MediaStore>,
        processor: Arc<UnitProcessor<C, R>>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            queue,
            store,
            processor,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start the consumer loop.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Import worker already running");
            return;
        }

        let running = Arc::clone(&self.running);
        let queue = Arc::clone(&self.queue);
        let store = Arc::clone(&self.store);
        let processor = Arc::clone(&self.processor);
        let config = self.config.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Import worker started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Import worker received shutdown signal");
                        break;
                    }
                    popped = queue.pop() => {
                        let Some(task_id) = popped else { break };
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }

                        queue.mark_import_in_progress();
                        let result =
                            Self::process_task(&store, &processor, &config, task_id).await;
                        queue.mark_import_complete();

                        if let Err(e) = result {
                            error!("Error processing import task {}: {}", task_id, e);
                        }
                    }
                }
            }
            info!("Import worker stopped");
        });
    }

    /// Stop the consumer loop. An in-flight unit finishes its current
    /// external call before the loop observes the signal.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    /// Process a single task immediately, outside the queue loop. The
    /// loop uses the same path; this entry point exists for deterministic
    /// driving in tests and tools.
    pub async fn run_task(&self, task_id: Uuid) -> Result<(), WorkerError> {
        self.queue.mark_import_in_progress();
        let result = Self::process_task(&self.store, &self.processor, &self.config, task_id).await;
        self.queue.mark_import_complete();
        result
    }

    async fn process_task(
        store: &Arc<dyn MediaStore>,
        processor: &Arc<UnitProcessor<C, R>>,
        config: &WorkerConfig,
        task_id: Uuid,
    ) -> Result<(), WorkerError> {
        let Some(task) = store.get_task(task_id)? else {
            warn!("Import task {} not found; it may have been superseded", task_id);
            return Ok(());
        };

        if task.status.is_terminal() {
            warn!(
                "Import task {} is not in a valid state for processing: {}",
                task_id,
                task.status.as_str()
            );
            return Ok(());
        }

        let attempts = store.record_task_attempt(task_id)?;
        store.mark_task_in_progress(task_id, Utc::now())?;
        info!(
            "Starting import of {} media units for task {} (attempt {})",
            task.units.len(),
            task_id,
            attempts
        );

        for unit in &task.units {
            if unit.processed {
                debug!("Unit {} already processed, skipping", unit.base_name);
                continue;
            }

            // Idempotency check against the published assets, covering
            // re-pushes and recovery after a crash between persist steps.
            if let Some(name) = unit.original_file_name() {
                if store.asset_exists(name, task.game_id)? {
                    info!("Asset already exists for {}, skipping unit", name);
                    store.mark_unit_processed(unit.id)?;
                    continue;
                }
            }

            match processor.process(unit, task.game_id).await {
                Ok(asset) => {
                    store.insert_asset(asset)?;
                    store.mark_unit_processed(unit.id)?;
                    metrics::MEDIA_UNITS_PROCESSED
                        .with_label_values(&[unit.kind.as_str(), "ok"])
                        .inc();
                    info!("Processed {} unit {}", unit.kind.as_str(), unit.base_name);
                }
                Err(e) => {
                    warn!(
                        "Failed to process {} unit {} in task {}: {}",
                        unit.kind.as_str(),
                        unit.base_name,
                        task_id,
                        e
                    );
                    metrics::MEDIA_UNITS_PROCESSED
                        .with_label_values(&[unit.kind.as_str(), "error"])
                        .inc();

                    // A contract violation never succeeds on retry; other
                    // failures are retried by the restarter until the
                    // attempt ceiling.
                    if e.is_contract_violation() || attempts >= config.max_task_attempts {
                        store.complete_task(
                            task_id,
                            TaskStatus::Failed,
                            Some(&e.to_string()),
                            Utc::now(),
                        )?;
                        metrics::IMPORT_TASKS_FINISHED
                            .with_label_values(&["failed"])
                            .inc();
                        info!("Import task {} marked as failed", task_id);
                    } else {
                        info!(
                            "Import task {} left in progress for retry ({}/{} attempts used)",
                            task_id, attempts, config.max_task_attempts
                        );
                    }
                    return Ok(());
                }
            }
        }

        store.complete_task(task_id, TaskStatus::Completed, None, Utc::now())?;
        metrics::IMPORT_TASKS_FINISHED
            .with_label_values(&["completed"])
            .inc();
        info!("Import task {} completed", task_id);
        Ok(())
    }
}
