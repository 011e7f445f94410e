//! FFmpeg CLI wrapper for derivative clip generation.
//!
//! This crate provides:
//! - Engine availability and capability checks
//! - Media inspection via FFprobe
//! - Source eligibility and resolution
//! - Clip, thumbnail, GIF and WebP generation
//! - Scene detection and highlight reel composition
//! - Watermark overlay

pub mod animated;
pub mod clip;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod fs_utils;
pub mod highlight;
pub mod probe;
pub mod scene;
pub mod source;
pub mod thumbnail;
pub mod watermark;

pub use animated::{generate_gif, generate_webp, GifOptions, WebpOptions};
pub use clip::{build_clip_command, extract_clip};
pub use command::{EngineOutput, FfmpegCommand, FfmpegRunner};
pub use config::MediaConfig;
pub use engine::{Engine, EngineFault, EngineInfo};
pub use error::{MediaError, MediaResult};
pub use highlight::{compose_highlight, HighlightConfig, HighlightOutcome};
pub use probe::{parse_probe_output, probe_media};
pub use scene::{detect_change_points, detect_scenes, SceneDetectionConfig};
pub use source::{Ineligible, MediaSource, SourcePolicy, SourceResolver};
pub use thumbnail::{generate_thumbnail, generate_thumbnails, ThumbnailOptions};
pub use watermark::{overlay_watermark, WatermarkOptions, WatermarkPosition};
