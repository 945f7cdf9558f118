use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("DUGOUT_").split("_"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[remote_store]
bucket = "dugout-media"
access_key = "key"
secret_key = "secret"
"#;

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.remote_store.bucket, "dugout-media");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.worker.max_task_attempts, 3);
        assert_eq!(config.maintenance.alternate_format_batch_size, 10);
    }

    #[test]
    fn test_load_config_with_overrides() {
        let toml = r#"
[remote_store]
bucket = "dugout-media"
access_key = "key"
secret_key = "secret"
endpoint_url = "https://nyc3.digitaloceanspaces.com"

[server]
port = 9000

[worker]
max_task_attempts = 5
restart_interval_secs = 600
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.worker.max_task_attempts, 5);
        assert_eq!(
            config.remote_store.endpoint_url.as_deref(),
            Some("https://nyc3.digitaloceanspaces.com")
        );
    }

    #[test]
    fn test_missing_remote_store_fails() {
        let result = load_config_from_str("[server]\nport = 8080\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
