//! Maintenance sweep configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the format sweepers and the temp-file collector.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MaintenanceConfig {
    /// Seconds between content-type correction sweeps.
    #[serde(default = "default_content_type_interval_secs")]
    pub content_type_interval_secs: u64,

    /// Seconds between alternate-format backfill sweeps.
    #[serde(default = "default_alternate_format_interval_secs")]
    pub alternate_format_interval_secs: u64,

    /// Delay before the first alternate-format sweep.
    #[serde(default = "default_alternate_format_initial_delay_secs")]
    pub alternate_format_initial_delay_secs: u64,

    /// Assets handled per alternate-format sweep.
    #[serde(default = "default_alternate_format_batch_size")]
    pub alternate_format_batch_size: usize,

    /// Seconds between known-unit source file cleanups.
    #[serde(default = "default_unit_cleanup_interval_secs")]
    pub unit_cleanup_interval_secs: u64,

    /// Seconds between orphan scratch-directory sweeps.
    #[serde(default = "default_orphan_sweep_interval_secs")]
    pub orphan_sweep_interval_secs: u64,

    /// Minimum age before an unreferenced scratch file may be deleted.
    #[serde(default = "default_orphan_max_age_secs")]
    pub orphan_max_age_secs: u64,

    /// Scratch directory scanned by the orphan sweep.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            content_type_interval_secs: default_content_type_interval_secs(),
            alternate_format_interval_secs: default_alternate_format_interval_secs(),
            alternate_format_initial_delay_secs: default_alternate_format_initial_delay_secs(),
            alternate_format_batch_size: default_alternate_format_batch_size(),
            unit_cleanup_interval_secs: default_unit_cleanup_interval_secs(),
            orphan_sweep_interval_secs: default_orphan_sweep_interval_secs(),
            orphan_max_age_secs: default_orphan_max_age_secs(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

fn default_content_type_interval_secs() -> u64 {
    12 * 60 * 60
}

fn default_alternate_format_interval_secs() -> u64 {
    60 * 60
}

fn default_alternate_format_initial_delay_secs() -> u64 {
    30 * 60
}

fn default_alternate_format_batch_size() -> usize {
    10
}

fn default_unit_cleanup_interval_secs() -> u64 {
    12 * 60 * 60
}

fn default_orphan_sweep_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_orphan_max_age_secs() -> u64 {
    24 * 60 * 60
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("dugout-media")
}
