//! Converter configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the shell converter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConverterConfig {
    /// Path to the ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to the ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Path to the ImageMagick binary.
    #[serde(default = "default_magick_path")]
    pub magick_path: PathBuf,

    /// Directory conversion outputs are written to.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Maximum seconds a single tool invocation may run.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// ffmpeg log level.
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            magick_path: default_magick_path(),
            scratch_dir: default_scratch_dir(),
            timeout_secs: default_timeout_secs(),
            ffmpeg_log_level: default_log_level(),
        }
    }
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_magick_path() -> PathBuf {
    PathBuf::from("magick")
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("dugout-media")
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_log_level() -> String {
    "error".to_string()
}
