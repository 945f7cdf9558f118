//! Prometheus metrics for core components.
//!
//! Covers the import queue, the worker, and the maintenance sweeps. The
//! server crate collects these into its registry for the /metrics
//! endpoint.

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts};

/// Task ids pushed onto the import queue (including restarter re-pushes).
pub static QUEUE_PUSHES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dugout_import_queue_pushes_total",
        "Task ids pushed onto the import queue",
    )
    .unwrap()
});

/// Import tasks reaching a terminal status, by result.
pub static IMPORT_TASKS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dugout_import_tasks_finished_total",
            "Import tasks reaching a terminal status",
        ),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Media units processed, by kind and result.
pub static MEDIA_UNITS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dugout_media_units_processed_total",
            "Media units run through the unit processor",
        ),
        &["kind", "result"], // kind: "photo"/"video"/"live_photo"; result: "ok"/"error"
    )
    .unwrap()
});

/// Maintenance sweep executions, by sweep and outcome.
pub static SWEEP_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dugout_sweep_runs_total",
            "Maintenance sweep executions",
        ),
        &["sweep", "result"],
    )
    .unwrap()
});

/// Local scratch files deleted by the temp-file collector.
pub static TEMP_FILES_DELETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dugout_temp_files_deleted_total",
        "Local scratch files deleted by the temp-file collector",
    )
    .unwrap()
});

/// All core metrics, for registration by the server.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(QUEUE_PUSHES.clone()),
        Box::new(IMPORT_TASKS_FINISHED.clone()),
        Box::new(MEDIA_UNITS_PROCESSED.clone()),
        Box::new(SWEEP_RUNS.clone()),
        Box::new(TEMP_FILES_DELETED.clone()),
    ]
}
