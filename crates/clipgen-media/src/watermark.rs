//! Static image watermark overlay.
//!
//! Standalone utility: not part of the default artifact set.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command::FfmpegCommand;
use crate::engine::Engine;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::ensure_parent_dir;
use crate::source::MediaSource;

/// Corner (or center) the watermark is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

impl WatermarkPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
            Self::Center => "center",
        }
    }
}

impl fmt::Display for WatermarkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatermarkPosition {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "top-left" => Ok(Self::TopLeft),
            "top-right" => Ok(Self::TopRight),
            "bottom-left" => Ok(Self::BottomLeft),
            "bottom-right" => Ok(Self::BottomRight),
            "center" | "centre" => Ok(Self::Center),
            other => Err(MediaError::InvalidSpec(format!(
                "unknown watermark position: {other}"
            ))),
        }
    }
}

/// Overlay settings.
///
/// ```ignore
/// let opts = WatermarkOptions::default()
///     .with_position(WatermarkPosition::TopLeft)
///     .with_opacity(0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WatermarkOptions {
    pub position: WatermarkPosition,
    /// Distance from the anchored edges in pixels
    pub margin_px: u32,
    /// Scale factor applied to the watermark image
    pub scale: f64,
    /// 0.0 (invisible) to 1.0 (opaque)
    pub opacity: f64,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            position: WatermarkPosition::BottomRight,
            margin_px: 20,
            scale: 1.0,
            opacity: 0.7,
        }
    }
}

impl WatermarkOptions {
    pub fn with_position(mut self, position: WatermarkPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_margin(mut self, margin_px: u32) -> Self {
        self.margin_px = margin_px;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }
}

/// Overlay expression (`x:y`) for a position and margin.
pub fn overlay_position(position: WatermarkPosition, margin: u32) -> String {
    match position {
        WatermarkPosition::TopLeft => format!("{m}:{m}", m = margin),
        WatermarkPosition::TopRight => format!("W-w-{m}:{m}", m = margin),
        WatermarkPosition::BottomLeft => format!("{m}:H-h-{m}", m = margin),
        WatermarkPosition::BottomRight => format!("W-w-{m}:H-h-{m}", m = margin),
        WatermarkPosition::Center => "(W-w)/2:(H-h)/2".to_string(),
    }
}

/// Filter graph: optional scale and alpha on input 1, then overlay on input 0.
pub fn build_overlay_filter(options: &WatermarkOptions) -> String {
    let mut steps = Vec::new();
    if (options.scale - 1.0).abs() > f64::EPSILON {
        steps.push(format!("scale=iw*{0:.3}:ih*{0:.3}", options.scale));
    }
    let opacity = if options.opacity.is_nan() {
        1.0
    } else {
        options.opacity.clamp(0.0, 1.0)
    };
    if opacity < 1.0 {
        steps.push("format=rgba".to_string());
        steps.push(format!("colorchannelmixer=aa={:.2}", opacity));
    }

    let position = overlay_position(options.position, options.margin_px);
    if steps.is_empty() {
        format!("[0:v][1:v]overlay={position}:format=auto")
    } else {
        format!(
            "[1:v]{}[wm];[0:v][wm]overlay={position}:format=auto",
            steps.join(",")
        )
    }
}

/// Overlay `watermark` onto `source`, re-encoding video and copying audio.
pub async fn overlay_watermark(
    engine: &Engine,
    source: &MediaSource,
    watermark: &Path,
    output: &Path,
    options: &WatermarkOptions,
) -> MediaResult<()> {
    if !watermark.exists() {
        return Err(MediaError::FileNotFound(watermark.to_path_buf()));
    }
    if !(options.scale > 0.0) {
        return Err(MediaError::InvalidSpec(format!(
            "watermark scale must be positive, got {}",
            options.scale
        )));
    }
    ensure_parent_dir(output).await?;

    let encoding = &engine.config().encoding;
    let cmd = FfmpegCommand::new(source.as_input(), output)
        .add_input(watermark.to_string_lossy())
        .filter_complex(build_overlay_filter(options))
        .output_args(encoding.video_args(None))
        .audio_codec("copy")
        .faststart();

    info!(
        source = %source,
        watermark = %watermark.display(),
        position = %options.position,
        "Applying watermark"
    );

    engine.ffmpeg()?.run_to_file(&cmd, output).await?;
    Ok(())
}
