//! Shell-tool converter implementation.
//!
//! Drives ffmpeg/ffprobe for video work and ImageMagick for image work.
//! Every invocation runs under a timeout and kills the child on drop.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use crate::task::ThumbnailSize;

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::traits::MediaConverter;
use super::types::{ImageInfo, VideoInfo, VideoStreamInfo};

const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".heic", ".png"];

/// Converter backed by ffmpeg, ffprobe, and ImageMagick.
pub struct ShellConverter {
    config: ConverterConfig,
}

impl ShellConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ConverterConfig::default())
    }

    async fn run_tool(
        &self,
        program: &Path,
        args: &[String],
    ) -> Result<std::process::Output, ConverterError> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ConverterError::ToolNotFound {
                        tool: program.to_string_lossy().to_string(),
                    }
                } else {
                    ConverterError::Io(e)
                }
            })?;

        let timeout_secs = self.config.timeout_secs;
        timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
            .await
            .map_err(|_| ConverterError::Timeout { timeout_secs })?
            .map_err(ConverterError::Io)
    }

    async fn run_expecting_success(
        &self,
        program: &Path,
        args: &[String],
        operation: &str,
    ) -> Result<std::process::Output, ConverterError> {
        let output = self.run_tool(program, args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(ConverterError::conversion_failed(
                format!("{} exited with {}", operation, output.status),
                Some(stderr),
            ));
        }
        Ok(output)
    }

    fn require_input(path: &Path) -> Result<(), ConverterError> {
        if !path.exists() {
            return Err(ConverterError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Output path in the scratch directory: input stem, optional suffix,
    /// new extension.
    fn output_path(&self, input: &Path, suffix: &str, extension: &str) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        self.config
            .scratch_dir
            .join(format!("{}{}.{}", stem, suffix, extension))
    }

    async fn ensure_scratch_dir(&self) -> Result<(), ConverterError> {
        tokio::fs::create_dir_all(&self.config.scratch_dir).await?;
        Ok(())
    }

    fn is_image_path(path: &Path) -> bool {
        let ext = extension_of(path);
        IMAGE_EXTENSIONS.contains(&ext.as_str())
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Parse ffprobe's JSON stream listing.
fn parse_video_streams(output: &str) -> Result<VideoInfo, ConverterError> {
    #[derive(Deserialize)]
    struct ProbeOutput {
        #[serde(default)]
        streams: Vec<ProbeStream>,
    }

    #[derive(Deserialize)]
    struct ProbeStream {
        codec_name: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
    }

    let probe: ProbeOutput = serde_json::from_str(output)
        .map_err(|e| ConverterError::parse_error(format!("ffprobe output: {}", e)))?;

    Ok(VideoInfo {
        streams: probe
            .streams
            .into_iter()
            .map(|s| VideoStreamInfo {
                codec_name: s.codec_name.unwrap_or_default(),
                width: s.width,
                height: s.height,
            })
            .collect(),
    })
}

/// Parse a capture timestamp in either EXIF ("2024:06:01 14:03:22") or
/// RFC3339 form. Naive EXIF times are taken as UTC.
fn parse_capture_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[async_trait]
impl MediaConverter for ShellConverter {
    fn name(&self) -> &str {
        "shell"
    }

    async fn probe_image(&self, path: &Path) -> Result<ImageInfo, ConverterError> {
        Self::require_input(path)?;

        // First frame only; HEIC containers can hold more than one.
        let target = format!("{}[0]", path.to_string_lossy());
        let args = vec![
            "identify".to_string(),
            "-format".to_string(),
            "%w %h".to_string(),
            target,
        ];
        let output = self
            .run_tool(&self.config.magick_path, &args)
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(ConverterError::probe_failed(format!(
                "magick identify failed for {}: {}",
                path.display(),
                stderr
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut parts = stdout.split_whitespace();
        let width = parts
            .next()
            .and_then(|w| w.parse::<u32>().ok())
            .ok_or_else(|| ConverterError::parse_error("missing image width"))?;
        let height = parts
            .next()
            .and_then(|h| h.parse::<u32>().ok())
            .ok_or_else(|| ConverterError::parse_error("missing image height"))?;

        Ok(ImageInfo {
            extension: extension_of(path),
            width,
            height,
        })
    }

    async fn probe_video(&self, path: &Path) -> Result<VideoInfo, ConverterError> {
        Self::require_input(path)?;

        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "v".to_string(),
            "-show_streams".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            path.to_string_lossy().to_string(),
        ];
        let output = self.run_tool(&self.config.ffprobe_path, &args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(ConverterError::probe_failed(format!(
                "ffprobe failed for {}: {}",
                path.display(),
                stderr
            )));
        }

        parse_video_streams(&String::from_utf8_lossy(&output.stdout))
    }

    async fn extract_capture_time(&self, path: &Path) -> Result<DateTime<Utc>, ConverterError> {
        Self::require_input(path)?;

        let raw = if Self::is_image_path(path) {
            let target = format!("{}[0]", path.to_string_lossy());
            let args = vec![
                "identify".to_string(),
                "-format".to_string(),
                "%[EXIF:DateTimeOriginal]".to_string(),
                target,
            ];
            let output = self
                .run_expecting_success(&self.config.magick_path, &args, "magick identify")
                .await?;
            String::from_utf8_lossy(&output.stdout).to_string()
        } else {
            let args = vec![
                "-v".to_string(),
                "error".to_string(),
                "-show_entries".to_string(),
                "format_tags=creation_time".to_string(),
                "-of".to_string(),
                "default=noprint_wrappers=1:nokey=1".to_string(),
                path.to_string_lossy().to_string(),
            ];
            let output = self
                .run_expecting_success(&self.config.ffprobe_path, &args, "ffprobe")
                .await?;
            String::from_utf8_lossy(&output.stdout).to_string()
        };

        parse_capture_timestamp(&raw).ok_or_else(|| ConverterError::CaptureTimeMissing {
            path: path.to_path_buf(),
        })
    }

    async fn create_jpeg(
        &self,
        path: &Path,
        size: Option<ThumbnailSize>,
    ) -> Result<PathBuf, ConverterError> {
        Self::require_input(path)?;
        self.ensure_scratch_dir().await?;

        let suffix = size.map(|s| format!("-{}", s.modifier())).unwrap_or_default();
        let output_path = self.output_path(path, &suffix, "jpg");

        let target = format!("{}[0]", path.to_string_lossy());
        let mut args = vec![target, "-auto-orient".to_string()];
        if let Some(size) = size {
            // Shrink-only resize bounded by the longest edge.
            let px = size.max_pixels();
            args.extend(["-resize".to_string(), format!("{}x{}>", px, px)]);
        }
        args.push(output_path.to_string_lossy().to_string());

        self.run_expecting_success(&self.config.magick_path, &args, "magick convert")
            .await?;
        Ok(output_path)
    }

    async fn convert_video_to_h264(&self, path: &Path) -> Result<PathBuf, ConverterError> {
        Self::require_input(path)?;
        self.ensure_scratch_dir().await?;

        let output_path = self.output_path(path, "-h264", "mp4");
        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            path.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-crf".to_string(),
            "23".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            output_path.to_string_lossy().to_string(),
        ];

        self.run_expecting_success(&self.config.ffmpeg_path, &args, "ffmpeg")
            .await?;
        Ok(output_path)
    }

    async fn extract_frame(&self, path: &Path) -> Result<PathBuf, ConverterError> {
        Self::require_input(path)?;
        self.ensure_scratch_dir().await?;

        let output_path = self.output_path(path, "-frame", "jpg");
        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            path.to_string_lossy().to_string(),
            "-vf".to_string(),
            "thumbnail".to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            output_path.to_string_lossy().to_string(),
        ];

        self.run_expecting_success(&self.config.ffmpeg_path, &args, "ffmpeg")
            .await?;
        Ok(output_path)
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        for (program, version_flag) in [
            (&self.config.ffmpeg_path, "-version"),
            (&self.config.ffprobe_path, "-version"),
            (&self.config.magick_path, "--version"),
        ] {
            self.run_tool(program, &[version_flag.to_string()]).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exif_timestamps() {
        let ts = parse_capture_timestamp("2024:06:01 14:03:22").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-06-01T14:03:22+00:00");
    }

    #[test]
    fn parses_rfc3339_timestamps() {
        let ts = parse_capture_timestamp("2024-06-01T14:03:22.000000Z\n").unwrap();
        assert_eq!(ts.timestamp(), 1717250602);
    }

    #[test]
    fn rejects_empty_timestamps() {
        assert!(parse_capture_timestamp("").is_none());
        assert!(parse_capture_timestamp("  \n").is_none());
    }

    #[test]
    fn parses_ffprobe_stream_json() {
        let json = r#"{"streams":[{"codec_name":"hevc","width":1920,"height":1080}]}"#;
        let info = parse_video_streams(json).unwrap();
        assert_eq!(info.streams.len(), 1);
        assert_eq!(info.primary_stream().unwrap().codec_name, "hevc");
        assert!(!info.is_web_safe());

        let json = r#"{"streams":[{"codec_name":"h264","width":1920,"height":1080}]}"#;
        assert!(parse_video_streams(json).unwrap().is_web_safe());
    }

    #[test]
    fn output_path_uses_scratch_dir_and_suffix() {
        let mut config = ConverterConfig::default();
        config.scratch_dir = PathBuf::from("/scratch");
        let converter = ShellConverter::new(config);

        let out = converter.output_path(Path::new("/uploads/IMG_1.heic"), "-small", "jpg");
        assert_eq!(out, PathBuf::from("/scratch/IMG_1-small.jpg"));
    }
}
