use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Remote store credentials and bucket are non-empty
/// - Server port is not 0
/// - Worker and maintenance bounds are usable
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.remote_store.bucket.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "remote_store.bucket cannot be empty".to_string(),
        ));
    }
    if config.remote_store.access_key.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "remote_store.access_key cannot be empty".to_string(),
        ));
    }
    if config.remote_store.secret_key.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "remote_store.secret_key cannot be empty".to_string(),
        ));
    }

    if config.worker.max_task_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "worker.max_task_attempts must be at least 1".to_string(),
        ));
    }

    if config.maintenance.alternate_format_batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "maintenance.alternate_format_batch_size must be at least 1".to_string(),
        ));
    }

    Ok(())
}
