//! Media probing result types.

/// Basic information about an image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Lowercased extension with leading dot, e.g. ".heic".
    pub extension: String,
    pub width: u32,
    pub height: u32,
}

impl ImageInfo {
    /// Whether this image is already in a browser-renderable encoding.
    pub fn is_web_safe(&self) -> bool {
        matches!(self.extension.as_str(), ".jpg" | ".jpeg")
    }
}

/// One video stream as reported by the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoStreamInfo {
    pub codec_name: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Probe result for a video file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    pub streams: Vec<VideoStreamInfo>,
}

impl VideoInfo {
    /// The stream conversion decisions are based on.
    pub fn primary_stream(&self) -> Option<&VideoStreamInfo> {
        self.streams.first()
    }

    /// Whether the primary stream is already a browser-playable codec.
    pub fn is_web_safe(&self) -> bool {
        self.primary_stream()
            .map(|s| s.codec_name == "h264")
            .unwrap_or(false)
    }
}
