//! Worker configuration.

use std::path::PathBuf;

use clipgen_media::{HighlightConfig, MediaConfig, SceneDetectionConfig, SourcePolicy};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root directory for generated artifacts (`<root>/<content_id>/<kind>.<ext>`)
    pub clip_output_dir: PathBuf,
    /// Public URL that `clip_output_dir` is served under
    pub clip_public_base_url: String,
    /// Public URL prefix of the site's own uploads
    pub upload_base_url: Option<String>,
    /// Directory `upload_base_url` maps to
    pub upload_dir: PathBuf,
    /// Directory for the JSON content store used by the binary
    pub content_store_dir: PathBuf,
    /// Engine configuration
    pub media: MediaConfig,
    /// Preview clip length in seconds
    pub preview_duration: f64,
    /// Fraction of the source where the preview starts
    pub preview_start_ratio: f64,
    /// Intro clip length in seconds
    pub intro_duration: f64,
    /// Highlight reel cap as a fraction of the source duration
    pub highlight_max_ratio: f64,
    pub highlight: HighlightConfig,
    pub gif_duration: f64,
    pub webp_duration: f64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            clip_output_dir: PathBuf::from("media/clips"),
            clip_public_base_url: "/media/clips".to_string(),
            upload_base_url: None,
            upload_dir: PathBuf::from("media/uploads"),
            content_store_dir: PathBuf::from("media/content"),
            media: MediaConfig::default(),
            preview_duration: 10.0,
            preview_start_ratio: 0.1,
            intro_duration: 5.0,
            highlight_max_ratio: 0.5,
            highlight: HighlightConfig::default(),
            gif_duration: 3.0,
            webp_duration: 3.0,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let scene_defaults = SceneDetectionConfig::default();

        let highlight = HighlightConfig {
            target_duration: env_parse("CLIPGEN_HIGHLIGHT_DURATION_SECS")
                .unwrap_or(defaults.highlight.target_duration),
            detection: SceneDetectionConfig {
                threshold: env_parse("CLIPGEN_SCENE_THRESHOLD").unwrap_or(scene_defaults.threshold),
                min_scene_length: env_parse("CLIPGEN_SCENE_MIN_LENGTH_SECS")
                    .unwrap_or(scene_defaults.min_scene_length),
                max_scenes: env_parse("CLIPGEN_SCENE_MAX").unwrap_or(scene_defaults.max_scenes),
            },
            fallback_start_ratio: env_parse("CLIPGEN_HIGHLIGHT_FALLBACK_START_RATIO")
                .unwrap_or(defaults.highlight.fallback_start_ratio),
            min_duration_for_detection: env_parse("CLIPGEN_HIGHLIGHT_MIN_SOURCE_SECS")
                .unwrap_or(defaults.highlight.min_duration_for_detection),
        };

        Self {
            clip_output_dir: std::env::var("CLIPGEN_CLIP_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.clip_output_dir),
            clip_public_base_url: std::env::var("CLIPGEN_CLIP_PUBLIC_URL")
                .unwrap_or(defaults.clip_public_base_url),
            upload_base_url: std::env::var("CLIPGEN_UPLOAD_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            upload_dir: std::env::var("CLIPGEN_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            content_store_dir: std::env::var("CLIPGEN_CONTENT_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.content_store_dir),
            media: MediaConfig::from_env(),
            preview_duration: env_parse("CLIPGEN_PREVIEW_DURATION_SECS")
                .unwrap_or(defaults.preview_duration),
            preview_start_ratio: defaults.preview_start_ratio,
            intro_duration: env_parse("CLIPGEN_INTRO_DURATION_SECS")
                .unwrap_or(defaults.intro_duration),
            highlight_max_ratio: defaults.highlight_max_ratio,
            highlight,
            gif_duration: env_parse("CLIPGEN_GIF_DURATION_SECS").unwrap_or(defaults.gif_duration),
            webp_duration: env_parse("CLIPGEN_WEBP_DURATION_SECS")
                .unwrap_or(defaults.webp_duration),
        }
    }

    /// Source eligibility rules derived from the upload settings.
    pub fn source_policy(&self) -> SourcePolicy {
        match &self.upload_base_url {
            Some(base) => SourcePolicy::default().with_uploads(base.clone(), self.upload_dir.clone()),
            None => SourcePolicy {
                upload_dir: self.upload_dir.clone(),
                ..SourcePolicy::default()
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
