//! Media probe models.

use serde::{Deserialize, Serialize};

/// A single stream reported by the probe tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Stream index inside the container
    pub index: u32,
    /// "video", "audio", "subtitle", "data", ...
    pub codec_type: String,
    /// Codec name (e.g. "h264"), empty when unknown
    #[serde(default)]
    pub codec_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Stream duration in seconds, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl StreamDescriptor {
    pub fn is_video(&self) -> bool {
        self.codec_type == "video"
    }

    pub fn is_audio(&self) -> bool {
        self.codec_type == "audio"
    }
}

/// Media file information derived from one probe run.
///
/// Never persisted; callers that need it across runs cache it themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width of the first video stream in pixels (0 when there is none)
    pub width: u32,
    /// Height of the first video stream in pixels (0 when there is none)
    pub height: u32,
    /// Container format name as reported by the probe tool
    pub format: String,
    /// Bitrate in bits/second
    pub bitrate_bps: u64,
    /// File size in bytes
    pub size_bytes: u64,
    pub streams: Vec<StreamDescriptor>,
}

impl MediaInfo {
    /// First video stream, if any.
    pub fn video_stream(&self) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|s| s.is_video())
    }

    pub fn has_video(&self) -> bool {
        self.video_stream().is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.streams.iter().any(|s| s.is_audio())
    }
}
