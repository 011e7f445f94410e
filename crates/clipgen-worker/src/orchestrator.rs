//! Clip job orchestration.
//!
//! One run is a sequential pipeline: check the engine, resolve the source,
//! inspect it once, then run each selected generator. Generators are
//! independent; a failing one is recorded and the rest still run.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, Instrument};

use clipgen_media::fs_utils::{non_empty_file, remove_file_if_exists};
use clipgen_media::{
    compose_highlight, extract_clip, generate_gif, generate_webp, probe_media, Engine,
    GifOptions, MediaResult, MediaSource, SourceResolver, WebpOptions,
};
use clipgen_models::{
    ClipArtifact, ClipJobResult, ClipKind, ClipSelection, ClipSpec, ContentId, MediaInfo,
};

use crate::artifacts::{
    duration_key, is_valid_content_id, kind_keys, path_key, url_key, ArtifactLayout,
    CLIPS_GENERATED, CLIPS_GENERATED_AT, CLIPS_GENERATED_KINDS,
};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::ClipJobLog;
use crate::store::ContentStore;

/// Produces derivative clips for content items.
#[derive(Clone)]
pub struct ClipJobOrchestrator {
    config: WorkerConfig,
    engine: Engine,
    resolver: SourceResolver,
    layout: ArtifactLayout,
    store: Arc<dyn ContentStore>,
}

impl ClipJobOrchestrator {
    pub fn new(config: WorkerConfig, store: Arc<dyn ContentStore>) -> Self {
        let engine = Engine::new(config.media.clone());
        let resolver = SourceResolver::new(config.source_policy());
        let layout = ArtifactLayout::new(
            config.clip_output_dir.clone(),
            config.clip_public_base_url.clone(),
        );
        Self {
            config,
            engine,
            resolver,
            layout,
            store,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Generate the selected artifacts for `id`.
    ///
    /// Never returns an error: job-level failures come back as
    /// `success == false` with no artifacts, generator failures as entries in
    /// `failures`. Without `regenerate`, an item that already has artifacts
    /// is returned as stored and no engine process is started. With it, the
    /// stored set is only replaced once the engine and source check out.
    pub async fn run(
        &self,
        id: &ContentId,
        selection: &ClipSelection,
        regenerate: bool,
    ) -> ClipJobResult {
        let log = ClipJobLog::new(id);
        let span = log.span();
        self.run_inner(id, selection, regenerate, &log)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        id: &ContentId,
        selection: &ClipSelection,
        regenerate: bool,
        log: &ClipJobLog,
    ) -> ClipJobResult {
        log.requested(&selection.kinds(), regenerate);

        if !is_valid_content_id(id) {
            return fail(log, WorkerError::InvalidContentId(id.to_string()));
        }
        if selection.is_empty() {
            return fail_msg(log, "No clip kinds selected");
        }

        if !regenerate {
            match self.already_generated(id).await {
                Ok(Some(result)) => {
                    log.served_from_store(result.artifacts.len());
                    return result;
                }
                Ok(None) => {}
                Err(e) => return fail(log, e),
            }
        }

        let (source, info) = match self.prepare(id).await {
            Ok(prepared) => prepared,
            Err(e) => return fail(log, e),
        };
        log.source_resolved(&source.to_string(), info.duration);

        if regenerate {
            match self.delete_artifacts(id).await {
                Ok(removed) => log.replacing(removed),
                Err(e) => {
                    return fail_msg(log, format!("Failed to remove existing artifacts: {e}"))
                }
            }
        }

        let mut artifacts = BTreeMap::new();
        let mut failures = BTreeMap::new();
        for kind in selection.kinds() {
            match self.generate(id, kind, &source, &info).await {
                Ok(artifact) => {
                    log.artifact_ready(kind, artifact.file_size_bytes);
                    artifacts.insert(kind, artifact);
                }
                Err(e) => {
                    let reason = e.to_string();
                    log.artifact_failed(kind, &reason);
                    failures.insert(kind, reason);
                }
            }
        }

        let mut result = ClipJobResult::from_parts(artifacts, failures);
        if result.success {
            let now = Utc::now();
            if let Err(e) = self.persist(id, &result.artifacts, now).await {
                log.record_failed(&e.to_string());
                result.message = format!("{}; failed to record artifacts: {e}", result.message);
            }
            result.generated_at = Some(now);
        }
        log.finished(&result);
        result
    }

    /// Job preconditions: a working engine, an eligible source and a
    /// positive duration. Nothing on disk or in the store is touched.
    async fn prepare(&self, id: &ContentId) -> WorkerResult<(MediaSource, MediaInfo)> {
        self.engine
            .check()
            .await
            .map_err(|e| WorkerError::EngineUnavailable(e.to_string()))?;

        let content = self.store.content_source(id).await?;
        let source = self.resolver.resolve(&content)?;

        let info = probe_media(&self.engine, &source)
            .await
            .map_err(|e| WorkerError::InspectionFailed(e.to_string()))?;
        if info.duration <= 0.0 {
            return Err(WorkerError::InspectionFailed(format!(
                "source reports duration {}",
                info.duration
            )));
        }
        Ok((source, info))
    }

    async fn generate(
        &self,
        id: &ContentId,
        kind: ClipKind,
        source: &MediaSource,
        info: &MediaInfo,
    ) -> MediaResult<ClipArtifact> {
        let output = self.layout.path_for(id, kind);
        let engine = &self.engine;

        let duration = match kind {
            ClipKind::Preview => {
                let (start, length) = preview_window(
                    info.duration,
                    self.config.preview_duration,
                    self.config.preview_start_ratio,
                );
                extract_clip(engine, source, &output, &ClipSpec::new(start, length)).await?;
                length
            }
            ClipKind::Intro => {
                let length = self.config.intro_duration.min(info.duration);
                extract_clip(engine, source, &output, &ClipSpec::new(0.0, length)).await?;
                length
            }
            ClipKind::Highlight => {
                let target = highlight_target(
                    info.duration,
                    self.config.highlight.target_duration,
                    self.config.highlight_max_ratio,
                );
                let config = self.config.highlight.with_target_duration(target);
                let outcome = compose_highlight(engine, source, &output, info, &config).await?;
                debug!(
                    used_fallback = outcome.used_fallback,
                    segments = outcome.segments.len(),
                    "Highlight outcome"
                );
                outcome.duration
            }
            ClipKind::Gif => {
                let options = GifOptions {
                    duration: self.config.gif_duration,
                    ..GifOptions::default()
                };
                generate_gif(engine, source, &output, &options, Some(info)).await?;
                options.duration.min(info.duration)
            }
            ClipKind::Webp => {
                let options = WebpOptions {
                    duration: self.config.webp_duration,
                    ..WebpOptions::default()
                };
                generate_webp(engine, source, &output, &options, Some(info)).await?;
                options.duration.min(info.duration)
            }
        };

        let size = non_empty_file(&output).await.unwrap_or(0);
        Ok(self.layout.artifact(id, kind, duration, size))
    }

    async fn already_generated(&self, id: &ContentId) -> WorkerResult<Option<ClipJobResult>> {
        let generated = self.store.get_attribute(id, CLIPS_GENERATED).await?;
        if generated.as_deref() != Some("true") {
            return Ok(None);
        }

        let artifacts = self.stored_artifacts(id).await?;
        if artifacts.is_empty() {
            return Ok(None);
        }

        let generated_at = self
            .store
            .get_attribute(id, CLIPS_GENERATED_AT)
            .await?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc));

        Ok(Some(ClipJobResult {
            success: true,
            message: format!(
                "Clips already generated ({} artifact(s)); pass regenerate to rebuild",
                artifacts.len()
            ),
            artifacts,
            failures: BTreeMap::new(),
            skipped: true,
            generated_at,
        }))
    }

    /// Artifacts recorded against `id`, without touching the engine.
    pub async fn stored_artifacts(
        &self,
        id: &ContentId,
    ) -> WorkerResult<BTreeMap<ClipKind, ClipArtifact>> {
        let mut artifacts = BTreeMap::new();
        for kind in ClipKind::ALL {
            let Some(path) = self.store.get_attribute(id, &path_key(kind)).await? else {
                continue;
            };
            let public_url = self
                .store
                .get_attribute(id, &url_key(kind))
                .await?
                .unwrap_or_else(|| self.layout.public_url(id, kind));
            let duration_seconds = self
                .store
                .get_attribute(id, &duration_key(kind))
                .await?
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0);
            let file_size_bytes = tokio::fs::metadata(&path)
                .await
                .map(|m| m.len())
                .unwrap_or(0);

            artifacts.insert(
                kind,
                ClipArtifact {
                    kind,
                    file_path: path.into(),
                    public_url,
                    mime_type: kind.mime_type().to_string(),
                    duration_seconds,
                    file_size_bytes,
                },
            );
        }
        Ok(artifacts)
    }

    /// Remove every artifact file and attribute for `id`.
    ///
    /// Missing files and attributes are not errors. Returns the number of
    /// files removed.
    pub async fn delete_artifacts(&self, id: &ContentId) -> WorkerResult<usize> {
        if !is_valid_content_id(id) {
            return Err(WorkerError::InvalidContentId(id.to_string()));
        }

        let mut removed = 0;
        for kind in ClipKind::ALL {
            if remove_file_if_exists(&self.layout.path_for(id, kind)).await? {
                removed += 1;
            }
            for key in kind_keys(kind) {
                self.store.delete_attribute(id, &key).await?;
            }
        }
        for key in [CLIPS_GENERATED, CLIPS_GENERATED_KINDS, CLIPS_GENERATED_AT] {
            self.store.delete_attribute(id, key).await?;
        }

        // Only succeeds when nothing else lives there
        if tokio::fs::remove_dir(self.layout.dir_for(id)).await.is_err() {
            debug!(content_id = %id, "Clip directory kept");
        }

        debug!(content_id = %id, removed, "Deleted artifacts");
        Ok(removed)
    }

    async fn persist(
        &self,
        id: &ContentId,
        artifacts: &BTreeMap<ClipKind, ClipArtifact>,
        generated_at: DateTime<Utc>,
    ) -> WorkerResult<()> {
        for (kind, artifact) in artifacts {
            self.store
                .set_attribute(id, &path_key(*kind), &artifact.file_path.to_string_lossy())
                .await?;
            self.store
                .set_attribute(id, &url_key(*kind), &artifact.public_url)
                .await?;
            self.store
                .set_attribute(
                    id,
                    &duration_key(*kind),
                    &format!("{:.3}", artifact.duration_seconds),
                )
                .await?;
        }

        let kinds: Vec<&str> = artifacts.keys().map(|k| k.as_str()).collect();
        self.store
            .set_attribute(id, CLIPS_GENERATED_KINDS, &kinds.join(","))
            .await?;
        self.store
            .set_attribute(id, CLIPS_GENERATED_AT, &generated_at.to_rfc3339())
            .await?;
        self.store.set_attribute(id, CLIPS_GENERATED, "true").await?;
        Ok(())
    }
}

fn fail(log: &ClipJobLog, error: WorkerError) -> ClipJobResult {
    fail_msg(log, error.to_string())
}

fn fail_msg(log: &ClipJobLog, message: impl Into<String>) -> ClipJobResult {
    let message = message.into();
    log.rejected(&message);
    ClipJobResult::failure(message)
}

/// Preview window `(start, length)`: starts at `ratio * duration`, pulled
/// back so it ends by the end of the media.
pub fn preview_window(media_duration: f64, length: f64, ratio: f64) -> (f64, f64) {
    let length = length.min(media_duration);
    let start = (ratio * media_duration)
        .min(media_duration - length)
        .max(0.0);
    (start, length)
}

/// Highlight length: the configured target, capped at `max_ratio` of the source.
pub fn highlight_target(media_duration: f64, target: f64, max_ratio: f64) -> f64 {
    target.min(media_duration * max_ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_window() {
        assert_eq!(preview_window(600.0, 10.0, 0.1), (60.0, 10.0));
        assert_eq!(preview_window(30.0, 10.0, 0.5), (15.0, 10.0));
        assert_eq!(preview_window(10.5, 10.0, 0.1), (0.5, 10.0));
        assert_eq!(preview_window(4.0, 10.0, 0.1), (0.0, 4.0));
    }

    #[test]
    fn test_highlight_target_capped_at_half() {
        assert_eq!(highlight_target(600.0, 30.0, 0.5), 30.0);
        assert_eq!(highlight_target(40.0, 30.0, 0.5), 20.0);
    }
}
