//! Highlight reel composition.
//!
//! Scene detection is best effort. Whenever it yields nothing usable the
//! reel degrades to a single excerpt taken from [`fallback_window`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use clipgen_models::{ClipSpec, CodecMode, MediaInfo, Scene};

use crate::clip::extract_clip;
use crate::command::FfmpegCommand;
use crate::engine::Engine;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::ensure_parent_dir;
use crate::scene::{detect_scenes, SceneDetectionConfig};
use crate::source::MediaSource;

/// Highlight composition settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightConfig {
    /// Reel length in seconds
    pub target_duration: f64,
    pub detection: SceneDetectionConfig,
    /// Fallback excerpt start as a fraction of the source duration
    pub fallback_start_ratio: f64,
    /// Sources shorter than this skip detection and use the fallback
    pub min_duration_for_detection: f64,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            target_duration: 30.0,
            detection: SceneDetectionConfig::default(),
            fallback_start_ratio: 0.3,
            min_duration_for_detection: 60.0,
        }
    }
}

impl HighlightConfig {
    pub fn with_target_duration(mut self, seconds: f64) -> Self {
        self.target_duration = seconds;
        self
    }
}

/// What [`compose_highlight`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightOutcome {
    /// True when the reel is the single fallback excerpt
    pub used_fallback: bool,
    /// Source ranges that made it into the reel, in order
    pub segments: Vec<Scene>,
    /// Total reel duration in seconds
    pub duration: f64,
}

/// Compose a highlight reel of `source` into `output`.
pub async fn compose_highlight(
    engine: &Engine,
    source: &MediaSource,
    output: &Path,
    info: &MediaInfo,
    config: &HighlightConfig,
) -> MediaResult<HighlightOutcome> {
    if info.duration <= 0.0 {
        return Err(MediaError::invalid_media(format!(
            "cannot compose highlight, duration is {}",
            info.duration
        )));
    }
    if config.target_duration <= 0.0 {
        return Err(MediaError::InvalidSpec(format!(
            "highlight target duration must be positive, got {}",
            config.target_duration
        )));
    }
    ensure_parent_dir(output).await?;

    if info.duration < config.min_duration_for_detection {
        info!(
            source = %source,
            duration = info.duration,
            "Source too short for scene detection, using fallback excerpt"
        );
        return extract_fallback(engine, source, output, info.duration, config).await;
    }

    let scenes = match detect_scenes(engine, source, info.duration, &config.detection).await {
        Ok(scenes) if !scenes.is_empty() => scenes,
        Ok(_) => {
            info!(source = %source, "No scenes long enough, using fallback excerpt");
            return extract_fallback(engine, source, output, info.duration, config).await;
        }
        Err(MediaError::NoScenesDetected) => {
            info!(source = %source, "No scene changes detected, using fallback excerpt");
            return extract_fallback(engine, source, output, info.duration, config).await;
        }
        Err(e) => {
            warn!(source = %source, error = %e, "Scene detection failed, using fallback excerpt");
            return extract_fallback(engine, source, output, info.duration, config).await;
        }
    };

    // Removed on drop, on every return path below
    let work_dir = tempfile::Builder::new()
        .prefix(&work_dir_prefix(source))
        .tempdir_in(engine.temp_dir().await?)?;

    let plan = plan_segments(&scenes, config.target_duration);
    let mut extracted: Vec<(Scene, PathBuf)> = Vec::with_capacity(plan.len());
    for (i, segment) in plan.iter().enumerate() {
        let path = work_dir.path().join(format!("segment_{:02}.mp4", i));
        let spec = ClipSpec::new(segment.start_seconds, segment.length_seconds)
            .with_codec_mode(CodecMode::Reencode);
        match extract_clip(engine, source, &path, &spec).await {
            Ok(()) => extracted.push((*segment, path)),
            Err(e) => warn!(
                start = segment.start_seconds,
                length = segment.length_seconds,
                error = %e,
                "Skipping highlight segment"
            ),
        }
    }

    if extracted.is_empty() {
        warn!(source = %source, "No highlight segments extracted, using fallback excerpt");
        return extract_fallback(engine, source, output, info.duration, config).await;
    }

    let paths: Vec<PathBuf> = extracted.iter().map(|(_, p)| p.clone()).collect();
    concatenate_segments(engine, &paths, work_dir.path(), output).await?;

    let segments: Vec<Scene> = extracted.into_iter().map(|(s, _)| s).collect();
    let duration = segments.iter().map(|s| s.length_seconds).sum();
    info!(
        source = %source,
        output = %output.display(),
        segments = segments.len(),
        duration,
        "Highlight composed"
    );

    Ok(HighlightOutcome {
        used_fallback: false,
        segments,
        duration,
    })
}

/// Single excerpt window `(start, length)` for sources without usable scenes.
///
/// Starts at `ratio * duration`, pulled back so the excerpt ends by the end of
/// the media, and never before zero.
pub fn fallback_window(media_duration: f64, target: f64, ratio: f64) -> (f64, f64) {
    let length = target.min(media_duration);
    let start = (ratio * media_duration).min(media_duration - target).max(0.0);
    (start, length)
}

/// Cut chronologically ordered scenes down to at most `target` seconds.
pub fn plan_segments(scenes: &[Scene], target: f64) -> Vec<Scene> {
    let mut remaining = target;
    let mut plan = Vec::new();
    for scene in scenes {
        if remaining <= 0.0 {
            break;
        }
        let take = scene.length_seconds.min(remaining);
        if take <= 0.0 {
            continue;
        }
        plan.push(Scene::new(scene.start_seconds, take));
        remaining -= take;
    }
    plan
}

async fn extract_fallback(
    engine: &Engine,
    source: &MediaSource,
    output: &Path,
    media_duration: f64,
    config: &HighlightConfig,
) -> MediaResult<HighlightOutcome> {
    let (start, length) = fallback_window(
        media_duration,
        config.target_duration,
        config.fallback_start_ratio,
    );
    extract_clip(engine, source, output, &ClipSpec::new(start, length)).await?;

    Ok(HighlightOutcome {
        used_fallback: true,
        segments: vec![Scene::new(start, length)],
        duration: length,
    })
}

/// Join already encoded segments with the concat demuxer (stream copy).
async fn concatenate_segments(
    engine: &Engine,
    segments: &[PathBuf],
    work_dir: &Path,
    output: &Path,
) -> MediaResult<()> {
    if let [single] = segments {
        tokio::fs::copy(single, output).await?;
        return Ok(());
    }

    let manifest = work_dir.join("concat.txt");
    tokio::fs::write(&manifest, concat_manifest(segments)).await?;

    let cmd = FfmpegCommand::new(manifest.to_string_lossy(), output)
        .input_args(["-f", "concat", "-safe", "0"])
        .codec_copy()
        .faststart();
    engine.ffmpeg()?.run_to_file(&cmd, output).await?;
    Ok(())
}

fn concat_manifest(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', r"'\''")))
        .collect()
}

/// Unique per invocation: source hash plus wall-clock millis.
fn work_dir_prefix(source: &MediaSource) -> String {
    let mut hasher = DefaultHasher::new();
    source.as_input().hash(&mut hasher);
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("highlight-{:016x}-{}-", hasher.finish(), millis)
}
