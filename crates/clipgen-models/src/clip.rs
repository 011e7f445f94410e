//! Clip specifications, generated artifacts and job results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Kind of derivative artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipKind {
    Preview,
    Highlight,
    Intro,
    Gif,
    Webp,
}

impl ClipKind {
    /// All kinds, in generation order.
    pub const ALL: [ClipKind; 5] = [
        ClipKind::Preview,
        ClipKind::Highlight,
        ClipKind::Intro,
        ClipKind::Gif,
        ClipKind::Webp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClipKind::Preview => "preview",
            ClipKind::Highlight => "highlight",
            ClipKind::Intro => "intro",
            ClipKind::Gif => "gif",
            ClipKind::Webp => "webp",
        }
    }

    /// File extension of the artifact.
    pub fn extension(&self) -> &'static str {
        match self {
            ClipKind::Preview | ClipKind::Highlight | ClipKind::Intro => "mp4",
            ClipKind::Gif => "gif",
            ClipKind::Webp => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ClipKind::Preview | ClipKind::Highlight | ClipKind::Intro => "video/mp4",
            ClipKind::Gif => "image/gif",
            ClipKind::Webp => "image/webp",
        }
    }

    /// File name inside the per-item clip directory (`<kind>.<ext>`).
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.as_str(), self.extension())
    }
}

impl fmt::Display for ClipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClipKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClipKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown clip kind: {s}"))
    }
}

/// Whether the extractor may pass streams through or must re-encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CodecMode {
    #[default]
    Copy,
    Reencode,
}

/// Invalid clip parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClipSpecError {
    #[error("clip duration must be positive, got {0}")]
    NonPositiveDuration(f64),

    #[error("clip start must be non-negative, got {0}")]
    NegativeStart(f64),

    #[error("width and height must both be zero or both be positive, got {width}x{height}")]
    PartialResize { width: u32, height: u32 },
}

/// Parameters for a single time-range extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSpec {
    /// Start offset in seconds
    pub start: f64,
    /// Duration in seconds, must be > 0
    pub duration: f64,
    /// Output width (0 = keep original)
    #[serde(default)]
    pub width: u32,
    /// Output height (0 = keep original)
    #[serde(default)]
    pub height: u32,
    #[serde(default = "default_include_audio")]
    pub include_audio: bool,
    /// Target video bitrate in kbit/s when re-encoding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_bitrate_kbps: Option<u32>,
    #[serde(default)]
    pub codec_mode: CodecMode,
}

fn default_include_audio() -> bool {
    true
}

impl ClipSpec {
    /// Stream-copy clip keeping original dimensions and audio.
    pub fn new(start: f64, duration: f64) -> Self {
        Self {
            start,
            duration,
            width: 0,
            height: 0,
            include_audio: true,
            video_bitrate_kbps: None,
            codec_mode: CodecMode::Copy,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_audio(mut self, include_audio: bool) -> Self {
        self.include_audio = include_audio;
        self
    }

    pub fn with_video_bitrate(mut self, kbps: u32) -> Self {
        self.video_bitrate_kbps = Some(kbps);
        self
    }

    pub fn with_codec_mode(mut self, mode: CodecMode) -> Self {
        self.codec_mode = mode;
        self
    }

    /// Whether a resize was requested.
    pub fn resizes(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Codec mode actually used: any resize forces a re-encode.
    pub fn effective_codec_mode(&self) -> CodecMode {
        if self.resizes() {
            CodecMode::Reencode
        } else {
            self.codec_mode
        }
    }

    pub fn validate(&self) -> Result<(), ClipSpecError> {
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(ClipSpecError::NonPositiveDuration(self.duration));
        }
        if !(self.start.is_finite() && self.start >= 0.0) {
            return Err(ClipSpecError::NegativeStart(self.start));
        }
        if (self.width == 0) != (self.height == 0) {
            return Err(ClipSpecError::PartialResize {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// One generated derivative file plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipArtifact {
    pub kind: ClipKind,
    pub file_path: PathBuf,
    pub public_url: String,
    pub mime_type: String,
    pub duration_seconds: f64,
    pub file_size_bytes: u64,
}

/// Which artifact kinds a job should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipSelection {
    #[serde(default)]
    pub preview: bool,
    #[serde(default)]
    pub highlight: bool,
    #[serde(default)]
    pub intro: bool,
    #[serde(default)]
    pub gif: bool,
    #[serde(default)]
    pub webp: bool,
}

impl Default for ClipSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl ClipSelection {
    pub fn all() -> Self {
        Self {
            preview: true,
            highlight: true,
            intro: true,
            gif: true,
            webp: true,
        }
    }

    pub fn none() -> Self {
        Self {
            preview: false,
            highlight: false,
            intro: false,
            gif: false,
            webp: false,
        }
    }

    pub fn from_kinds<I: IntoIterator<Item = ClipKind>>(kinds: I) -> Self {
        let mut selection = Self::none();
        for kind in kinds {
            selection.set(kind, true);
        }
        selection
    }

    pub fn contains(&self, kind: ClipKind) -> bool {
        match kind {
            ClipKind::Preview => self.preview,
            ClipKind::Highlight => self.highlight,
            ClipKind::Intro => self.intro,
            ClipKind::Gif => self.gif,
            ClipKind::Webp => self.webp,
        }
    }

    pub fn set(&mut self, kind: ClipKind, enabled: bool) {
        match kind {
            ClipKind::Preview => self.preview = enabled,
            ClipKind::Highlight => self.highlight = enabled,
            ClipKind::Intro => self.intro = enabled,
            ClipKind::Gif => self.gif = enabled,
            ClipKind::Webp => self.webp = enabled,
        }
    }

    /// Selected kinds in generation order.
    pub fn kinds(&self) -> Vec<ClipKind> {
        ClipKind::ALL
            .iter()
            .copied()
            .filter(|k| self.contains(*k))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds().is_empty()
    }
}

/// Outcome of one orchestration run. Not persisted by itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ClipJobResult {
    /// True iff at least one artifact is available
    pub success: bool,
    pub artifacts: BTreeMap<ClipKind, ClipArtifact>,
    pub message: String,
    /// Per-kind failure reasons for generators that produced nothing
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<ClipKind, String>,
    /// True when the run was skipped because artifacts already existed
    #[serde(default)]
    pub skipped: bool,
    /// When the artifact set was generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl ClipJobResult {
    /// Job-level failure with no artifacts.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }

    /// Build a result from produced artifacts and per-kind failures.
    pub fn from_parts(
        artifacts: BTreeMap<ClipKind, ClipArtifact>,
        failures: BTreeMap<ClipKind, String>,
    ) -> Self {
        let success = !artifacts.is_empty();
        let message = if !success {
            "No artifacts were generated".to_string()
        } else if failures.is_empty() {
            format!("Generated {} artifact(s)", artifacts.len())
        } else {
            format!(
                "Generated {} artifact(s), {} failed",
                artifacts.len(),
                failures.len()
            )
        };

        Self {
            success,
            artifacts,
            message,
            failures,
            skipped: false,
            generated_at: None,
        }
    }

    /// Kinds that were produced.
    pub fn kinds(&self) -> Vec<ClipKind> {
        self.artifacts.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_spec_validation() {
        assert!(ClipSpec::new(0.0, 10.0).validate().is_ok());
        assert_eq!(
            ClipSpec::new(0.0, 0.0).validate(),
            Err(ClipSpecError::NonPositiveDuration(0.0))
        );
        assert_eq!(
            ClipSpec::new(-1.0, 5.0).validate(),
            Err(ClipSpecError::NegativeStart(-1.0))
        );
        assert!(matches!(
            ClipSpec::new(0.0, 5.0).with_size(640, 0).validate(),
            Err(ClipSpecError::PartialResize { .. })
        ));
    }

    #[test]
    fn test_resize_forces_reencode() {
        let spec = ClipSpec::new(0.0, 5.0);
        assert_eq!(spec.effective_codec_mode(), CodecMode::Copy);

        let spec = spec.with_size(640, 360);
        assert_eq!(spec.effective_codec_mode(), CodecMode::Reencode);
    }

    #[test]
    fn test_kind_layout() {
        assert_eq!(ClipKind::Highlight.file_name(), "highlight.mp4");
        assert_eq!(ClipKind::Gif.file_name(), "gif.gif");
        assert_eq!(ClipKind::Webp.mime_type(), "image/webp");
        assert_eq!("WEBP".parse::<ClipKind>().unwrap(), ClipKind::Webp);
    }

    #[test]
    fn test_selection_kinds_in_order() {
        let selection = ClipSelection::from_kinds([ClipKind::Webp, ClipKind::Preview]);
        assert_eq!(selection.kinds(), vec![ClipKind::Preview, ClipKind::Webp]);
        assert!(ClipSelection::none().is_empty());
        assert_eq!(ClipSelection::all().kinds().len(), 5);
    }

    #[test]
    fn test_job_result_success_requires_artifact() {
        let mut failures = BTreeMap::new();
        failures.insert(ClipKind::Gif, "no output".to_string());
        let result = ClipJobResult::from_parts(BTreeMap::new(), failures);
        assert!(!result.success);

        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            ClipKind::Preview,
            ClipArtifact {
                kind: ClipKind::Preview,
                file_path: PathBuf::from("/clips/1/preview.mp4"),
                public_url: "https://example.com/clips/1/preview.mp4".to_string(),
                mime_type: "video/mp4".to_string(),
                duration_seconds: 10.0,
                file_size_bytes: 1024,
            },
        );
        let result = ClipJobResult::from_parts(artifacts, BTreeMap::new());
        assert!(result.success);
        assert_eq!(result.kinds(), vec![ClipKind::Preview]);
    }
}
