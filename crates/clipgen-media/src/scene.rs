//! Scene-change detection.
//!
//! A `select='gt(scene,T)',showinfo` pass prints one `pts_time:` entry per
//! frame whose visual difference to its predecessor exceeds `T`. Those
//! timestamps become scene boundaries.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use clipgen_models::Scene;

use crate::command::FfmpegCommand;
use crate::engine::Engine;
use crate::error::{MediaError, MediaResult};
use crate::source::MediaSource;

static PTS_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"pts_time:\s*([0-9]+(?:\.[0-9]+)?)").expect("valid pts_time pattern")
});

/// Scene detection tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneDetectionConfig {
    /// Scene-change sensitivity, exclusive range (0, 1)
    pub threshold: f64,
    /// Scenes shorter than this are discarded before ranking
    pub min_scene_length: f64,
    /// Maximum number of scenes kept after ranking
    pub max_scenes: usize,
}

impl Default for SceneDetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            min_scene_length: 3.0,
            max_scenes: 5,
        }
    }
}

impl SceneDetectionConfig {
    pub fn validate(&self) -> MediaResult<()> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(MediaError::InvalidSpec(format!(
                "scene threshold must be in (0, 1), got {}",
                self.threshold
            )));
        }
        if self.max_scenes == 0 {
            return Err(MediaError::InvalidSpec(
                "max_scenes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Run the analysis pass and return raw change-point timestamps.
///
/// Returns [`MediaError::NoScenesDetected`] when the log has no timestamps.
pub async fn detect_change_points(
    engine: &Engine,
    source: &MediaSource,
    threshold: f64,
) -> MediaResult<Vec<f64>> {
    if !(threshold > 0.0 && threshold < 1.0) {
        return Err(MediaError::InvalidSpec(format!(
            "scene threshold must be in (0, 1), got {threshold}"
        )));
    }

    let cmd = FfmpegCommand::null_output(source.as_input())
        .log_level("info")
        .video_filter(format!("select='gt(scene,{threshold})',showinfo"))
        .no_audio();

    let output = engine.ffmpeg()?.run(&cmd).await?;
    if !output.success && output.stderr.trim().is_empty() {
        return Err(MediaError::ffmpeg_failed(
            format!("scene analysis failed for {}", source),
            None,
            output.exit_code,
        ));
    }

    let points = parse_change_points(&output.stderr);
    if points.is_empty() {
        debug!(source = %source, threshold, "No scene changes in analysis log");
        return Err(MediaError::NoScenesDetected);
    }

    info!(source = %source, count = points.len(), threshold, "Detected scene changes");
    Ok(points)
}

/// Detect and select scenes in one call.
pub async fn detect_scenes(
    engine: &Engine,
    source: &MediaSource,
    media_duration: f64,
    config: &SceneDetectionConfig,
) -> MediaResult<Vec<Scene>> {
    config.validate()?;
    let points = detect_change_points(engine, source, config.threshold).await?;
    let scenes = build_scenes(&points, media_duration, config.min_scene_length);
    Ok(select_scenes(scenes, config.max_scenes))
}

/// Extract every `pts_time:` value from an analysis log.
pub fn parse_change_points(log: &str) -> Vec<f64> {
    PTS_TIME
        .captures_iter(log)
        .filter_map(|c| c.get(1)?.as_str().parse::<f64>().ok())
        .collect()
}

/// Turn change points into scenes.
///
/// Boundaries are sorted and deduplicated with `0.0` prepended; each scene
/// runs to the next boundary, the last one to `media_duration`. Scenes
/// shorter than `min_length` are dropped.
pub fn build_scenes(points: &[f64], media_duration: f64, min_length: f64) -> Vec<Scene> {
    let mut boundaries: Vec<f64> = std::iter::once(0.0)
        .chain(
            points
                .iter()
                .copied()
                .filter(|p| p.is_finite() && *p > 0.0 && *p < media_duration),
        )
        .collect();
    boundaries.sort_by(f64::total_cmp);
    boundaries.dedup();

    boundaries
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = boundaries.get(i + 1).copied().unwrap_or(media_duration);
            Scene::new(start, end - start)
        })
        .filter(|s| s.length_seconds >= min_length)
        .collect()
}

/// Keep the `max` longest scenes, returned in chronological order.
///
/// Equal lengths rank the earlier scene first.
pub fn select_scenes(mut scenes: Vec<Scene>, max: usize) -> Vec<Scene> {
    scenes.sort_by(|a, b| {
        b.length_seconds
            .total_cmp(&a.length_seconds)
            .then(a.start_seconds.total_cmp(&b.start_seconds))
    });
    scenes.truncate(max);
    scenes.sort_by(|a, b| a.start_seconds.total_cmp(&b.start_seconds));
    scenes
}
