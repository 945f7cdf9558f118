//! Import worker and crash-recovery restarter.

mod config;
mod restarter;
mod runner;

pub use config::WorkerConfig;
pub use restarter::TaskRestarter;
pub use runner::{ImportWorker, WorkerError};
