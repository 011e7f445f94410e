//! Looping GIF and WebP previews.
//!
//! Optimized GIFs use two passes: `palettegen` over the target window, then
//! `paletteuse` while encoding. The palette is a private temp file removed
//! on every exit path.

use std::path::Path;

use rand::Rng;
use tracing::info;

use clipgen_models::MediaInfo;

use crate::command::FfmpegCommand;
use crate::engine::Engine;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::ensure_parent_dir;
use crate::source::MediaSource;

/// Encoder required for WebP output.
pub const WEBP_ENCODER: &str = "libwebp";

/// GIF settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GifOptions {
    /// Start offset; `None` picks a random offset when the media is long enough
    pub start: Option<f64>,
    /// Clip length in seconds
    pub duration: f64,
    /// Output width (0 = keep original)
    pub width: u32,
    /// Output height (0 = keep aspect)
    pub height: u32,
    pub fps: u32,
    /// Two-pass palette optimization
    pub optimize: bool,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            start: None,
            duration: 3.0,
            width: 480,
            height: 0,
            fps: 10,
            optimize: true,
        }
    }
}

/// WebP animation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WebpOptions {
    /// Start offset; `None` picks a random offset when the media is long enough
    pub start: Option<f64>,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// 0-100, ignored when lossless
    pub quality: u8,
    pub lossless: bool,
}

impl Default for WebpOptions {
    fn default() -> Self {
        Self {
            start: None,
            duration: 3.0,
            width: 480,
            height: 0,
            fps: 15,
            quality: 75,
            lossless: false,
        }
    }
}

/// Generate a looping GIF.
///
/// `info` is used to pick a start offset and clamp the window; pass `None`
/// when the media was not inspected.
pub async fn generate_gif(
    engine: &Engine,
    source: &MediaSource,
    output: &Path,
    options: &GifOptions,
    info: Option<&MediaInfo>,
) -> MediaResult<()> {
    let (start, duration) = resolve_window(options.start, options.duration, info, &mut rand::rng())?;
    ensure_parent_dir(output).await?;
    let runner = engine.ffmpeg()?;
    let base_filter = format!(
        "fps={},{}",
        options.fps.max(1),
        scale_expr(options.width, options.height)
    );

    info!(
        source = %source,
        output = %output.display(),
        start,
        duration,
        optimize = options.optimize,
        "Generating GIF"
    );

    if !options.optimize {
        let cmd = FfmpegCommand::new(source.as_input(), output)
            .seek(start)
            .duration(duration)
            .video_filter(base_filter)
            .no_audio()
            .loop_forever();
        runner.run_to_file(&cmd, output).await?;
        return Ok(());
    }

    // Removed when dropped, whatever happens below
    let palette = tempfile::Builder::new()
        .prefix("palette-")
        .suffix(".png")
        .tempfile_in(engine.temp_dir().await?)?;

    let palette_cmd = FfmpegCommand::new(source.as_input(), palette.path())
        .seek(start)
        .duration(duration)
        .video_filter(format!("{base_filter},palettegen=stats_mode=diff"))
        .single_frame();
    runner.run_to_file(&palette_cmd, palette.path()).await?;

    let gif_cmd = FfmpegCommand::new(source.as_input(), output)
        .seek(start)
        .duration(duration)
        .add_input(palette.path().to_string_lossy())
        .filter_complex(format!(
            "[0:v]{base_filter}[x];[x][1:v]paletteuse=dither=bayer:bayer_scale=5:diff_mode=rectangle"
        ))
        .no_audio()
        .loop_forever();
    runner.run_to_file(&gif_cmd, output).await?;

    info!(output = %output.display(), "GIF generated");
    Ok(())
}

/// Generate a looping WebP animation.
///
/// Fails fast with [`MediaError::UnsupportedCodec`] when the engine lacks
/// the WebP encoder.
pub async fn generate_webp(
    engine: &Engine,
    source: &MediaSource,
    output: &Path,
    options: &WebpOptions,
    info: Option<&MediaInfo>,
) -> MediaResult<()> {
    if !engine.supports_encoder(WEBP_ENCODER).await {
        return Err(MediaError::UnsupportedCodec(WEBP_ENCODER.to_string()));
    }

    let (start, duration) = resolve_window(options.start, options.duration, info, &mut rand::rng())?;
    ensure_parent_dir(output).await?;

    info!(
        source = %source,
        output = %output.display(),
        start,
        duration,
        lossless = options.lossless,
        "Generating WebP"
    );

    let cmd = FfmpegCommand::new(source.as_input(), output)
        .seek(start)
        .duration(duration)
        .video_filter(format!(
            "fps={},{}",
            options.fps.max(1),
            scale_expr(options.width, options.height)
        ))
        .video_codec(WEBP_ENCODER)
        .output_args([
            "-lossless".to_string(),
            if options.lossless { "1" } else { "0" }.to_string(),
            "-quality".to_string(),
            options.quality.min(100).to_string(),
            "-compression_level".to_string(),
            "4".to_string(),
        ])
        .no_audio()
        .loop_forever();

    engine.ffmpeg()?.run_to_file(&cmd, output).await?;

    info!(output = %output.display(), "WebP generated");
    Ok(())
}

/// Work out the `(start, duration)` window for an animation.
fn resolve_window<R: Rng>(
    start: Option<f64>,
    duration: f64,
    info: Option<&MediaInfo>,
    rng: &mut R,
) -> MediaResult<(f64, f64)> {
    if !(duration.is_finite() && duration > 0.0) {
        return Err(MediaError::InvalidSpec(format!(
            "animation duration must be positive, got {duration}"
        )));
    }

    let media_duration = info.map(|i| i.duration).filter(|d| *d > 0.0);
    let duration = match media_duration {
        Some(total) => duration.min(total),
        None => duration,
    };

    let start = match (start, media_duration) {
        (Some(s), Some(total)) => s.clamp(0.0, (total - duration).max(0.0)),
        (Some(s), None) => s.max(0.0),
        (None, Some(total)) => pick_start(rng, total, duration),
        (None, None) => 0.0,
    };

    Ok((start, duration))
}

/// Random start so that `[start, start + clip)` fits inside the media.
pub fn pick_start<R: Rng>(rng: &mut R, media_duration: f64, clip_duration: f64) -> f64 {
    let latest = media_duration - clip_duration;
    if latest <= 0.0 {
        return 0.0;
    }
    rng.random_range(0.0..latest)
}

fn scale_expr(width: u32, height: u32) -> String {
    match (width, height) {
        (0, 0) => "scale=iw:ih:flags=lanczos".to_string(),
        (w, 0) => format!("scale={}:-1:flags=lanczos", w),
        (0, h) => format!("scale=-1:{}:flags=lanczos", h),
        (w, h) => format!("scale={}:{}:flags=lanczos", w, h),
    }
}
