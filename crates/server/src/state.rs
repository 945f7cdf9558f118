use std::path::PathBuf;
use std::sync::Arc;

use dugout_core::{FormatMaintenanceOps, ImportQueue, MediaStore};

/// Shared application state
pub struct AppState {
    store: Arc<dyn MediaStore>,
    queue: Arc<ImportQueue>,
    maintenance: Arc<dyn FormatMaintenanceOps>,
    scratch_dir: PathBuf,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MediaStore>,
        queue: Arc<ImportQueue>,
        maintenance: Arc<dyn FormatMaintenanceOps>,
        scratch_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            queue,
            maintenance,
            scratch_dir,
        }
    }

    pub fn store(&self) -> &dyn MediaStore {
        self.store.as_ref()
    }

    pub fn queue(&self) -> &ImportQueue {
        self.queue.as_ref()
    }

    pub fn maintenance(&self) -> &dyn FormatMaintenanceOps {
        self.maintenance.as_ref()
    }

    pub fn scratch_dir(&self) -> &PathBuf {
        &self.scratch_dir
    }
}
