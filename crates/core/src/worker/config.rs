//! Worker and restarter configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the import worker and task restarter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Attempts after which a repeatedly failing task is marked failed
    /// instead of being left for the restarter.
    #[serde(default = "default_max_task_attempts")]
    pub max_task_attempts: u32,

    /// Seconds between restarter sweeps for abandoned tasks.
    #[serde(default = "default_restart_interval_secs")]
    pub restart_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_task_attempts: default_max_task_attempts(),
            restart_interval_secs: default_restart_interval_secs(),
        }
    }
}

fn default_max_task_attempts() -> u32 {
    3
}

fn default_restart_interval_secs() -> u64 {
    3600
}
