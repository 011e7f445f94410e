//! Thumbnail generation.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::command::FfmpegCommand;
use crate::engine::Engine;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::ensure_parent_dir;
use crate::probe::probe_media;
use crate::source::MediaSource;

/// Thumbnail settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbnailOptions {
    /// Output width (0 = derive from height or keep original)
    pub width: u32,
    /// Output height (0 = derive from width or keep original)
    pub height: u32,
    /// JPEG quality scale, 2 (best) to 31 (worst)
    pub quality: u8,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            width: 480,
            height: 0,
            quality: 2,
        }
    }
}

impl ThumbnailOptions {
    fn scale_filter(&self) -> Option<String> {
        match (self.width, self.height) {
            (0, 0) => None,
            (w, 0) => Some(format!("scale={}:-2", w)),
            (0, h) => Some(format!("scale=-2:{}", h)),
            (w, h) => Some(format!("scale={}:{}", w, h)),
        }
    }
}

/// Extract a single frame at `timestamp` seconds.
pub async fn generate_thumbnail(
    engine: &Engine,
    source: &MediaSource,
    output: &Path,
    timestamp: f64,
    options: &ThumbnailOptions,
) -> MediaResult<()> {
    ensure_parent_dir(output).await?;

    let mut cmd = FfmpegCommand::new(source.as_input(), output)
        .seek(timestamp.max(0.0))
        .single_frame()
        .output_args(["-q:v".to_string(), options.quality.clamp(2, 31).to_string()]);

    if let Some(filter) = options.scale_filter() {
        cmd = cmd.video_filter(filter);
    }

    engine.ffmpeg()?.run_to_file(&cmd, output).await?;
    Ok(())
}

/// Extract `count` evenly spaced thumbnails into `output_dir`.
///
/// Inspects the source first; no extraction is attempted when the duration
/// is unknown. Frames that fail are skipped; the call fails only when none
/// could be produced.
pub async fn generate_thumbnails(
    engine: &Engine,
    source: &MediaSource,
    output_dir: &Path,
    count: usize,
    options: &ThumbnailOptions,
) -> MediaResult<Vec<PathBuf>> {
    if count == 0 {
        return Err(MediaError::InvalidSpec(
            "thumbnail count must be at least 1".to_string(),
        ));
    }

    let info = probe_media(engine, source).await?;
    if info.duration <= 0.0 {
        return Err(MediaError::invalid_media(format!(
            "cannot place thumbnails, duration is {}",
            info.duration
        )));
    }

    tokio::fs::create_dir_all(output_dir).await?;

    let mut paths = Vec::with_capacity(count);
    for (i, offset) in thumbnail_offsets(info.duration, count).into_iter().enumerate() {
        let path = output_dir.join(format!("thumb_{:03}.jpg", i + 1));
        match generate_thumbnail(engine, source, &path, offset, options).await {
            Ok(()) => paths.push(path),
            Err(e) => warn!(offset, error = %e, "Skipping thumbnail"),
        }
    }

    if paths.is_empty() {
        return Err(MediaError::invalid_media(format!(
            "no thumbnails could be extracted from {}",
            source
        )));
    }

    info!(source = %source, count = paths.len(), "Generated thumbnails");
    Ok(paths)
}

/// Offsets `duration / (count + 1) * i` for `i` in `1..=count`.
pub fn thumbnail_offsets(duration: f64, count: usize) -> Vec<f64> {
    let step = duration / (count as f64 + 1.0);
    (1..=count).map(|i| step * i as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_offsets_evenly_spaced() {
        let offsets = thumbnail_offsets(100.0, 4);
        assert_eq!(offsets, vec![20.0, 40.0, 60.0, 80.0]);
        assert_eq!(thumbnail_offsets(30.0, 1), vec![15.0]);
    }

    #[test]
    fn test_scale_filter() {
        let default = ThumbnailOptions::default();
        assert_eq!(default.scale_filter().as_deref(), Some("scale=480:-2"));

        let both = ThumbnailOptions {
            width: 320,
            height: 180,
            quality: 5,
        };
        assert_eq!(both.scale_filter().as_deref(), Some("scale=320:180"));

        let original = ThumbnailOptions {
            width: 0,
            height: 0,
            quality: 2,
        };
        assert_eq!(original.scale_filter(), None);
    }

    #[tokio::test]
    async fn test_zero_count_rejected() {
        let engine = Engine::new(crate::MediaConfig::default());
        let err = generate_thumbnails(
            &engine,
            &MediaSource::Local("in.mp4".into()),
            Path::new("thumbs"),
            0,
            &ThumbnailOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::InvalidSpec(_)));
    }
}
