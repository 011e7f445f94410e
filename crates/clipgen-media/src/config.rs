//! Media engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use clipgen_models::EncodingConfig;

/// Default probe tool (resolved through `PATH`).
pub const DEFAULT_FFPROBE_PATH: &str = "ffprobe";
/// Default transcode tool (resolved through `PATH`).
pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
/// Timeout applied to probe calls against remote URLs.
pub const DEFAULT_REMOTE_PROBE_TIMEOUT_SECS: u64 = 30;

/// Configuration handed to [`crate::Engine`] at construction time.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Probe tool path or bare program name
    pub ffprobe_path: PathBuf,
    /// Transcode tool path or bare program name
    pub ffmpeg_path: PathBuf,
    /// Root for palette files and highlight working directories
    pub temp_dir: PathBuf,
    /// Timeout for probing remote URLs
    pub remote_probe_timeout: Duration,
    /// Settings used whenever a step re-encodes
    pub encoding: EncodingConfig,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: PathBuf::from(DEFAULT_FFPROBE_PATH),
            ffmpeg_path: PathBuf::from(DEFAULT_FFMPEG_PATH),
            temp_dir: default_temp_dir(),
            remote_probe_timeout: Duration::from_secs(DEFAULT_REMOTE_PROBE_TIMEOUT_SECS),
            encoding: EncodingConfig::default(),
        }
    }
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("clipgen")
}

impl MediaConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ffprobe_path: std::env::var("CLIPGEN_FFPROBE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffprobe_path),
            ffmpeg_path: std::env::var("CLIPGEN_FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            temp_dir: std::env::var("CLIPGEN_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            remote_probe_timeout: Duration::from_secs(
                std::env::var("CLIPGEN_REMOTE_PROBE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_REMOTE_PROBE_TIMEOUT_SECS),
            ),
            encoding: EncodingConfig {
                codec: std::env::var("CLIPGEN_VIDEO_CODEC").unwrap_or(defaults.encoding.codec),
                preset: std::env::var("CLIPGEN_PRESET").unwrap_or(defaults.encoding.preset),
                crf: std::env::var("CLIPGEN_CRF")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.encoding.crf),
                ..defaults.encoding
            },
        }
    }

    /// Override both tool paths.
    pub fn with_tools(mut self, ffprobe: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffprobe_path = ffprobe.into();
        self.ffmpeg_path = ffmpeg.into();
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }
}
