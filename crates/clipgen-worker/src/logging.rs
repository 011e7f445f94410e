//! Structured clip job events.

use tracing::{error, info, warn, Span};

use clipgen_models::{ClipJobResult, ClipKind, ContentId};

/// Emits the lifecycle events of one clip job with the content id attached.
#[derive(Debug, Clone)]
pub struct ClipJobLog {
    content_id: String,
}

impl ClipJobLog {
    pub fn new(content_id: &ContentId) -> Self {
        Self {
            content_id: content_id.to_string(),
        }
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    /// Span carrying the content id; the whole run is instrumented with it.
    pub fn span(&self) -> Span {
        tracing::info_span!("clip_job", content_id = %self.content_id)
    }

    pub fn requested(&self, kinds: &[ClipKind], regenerate: bool) {
        info!(
            content_id = %self.content_id,
            kinds = ?kinds,
            regenerate,
            "Clip generation requested"
        );
    }

    pub fn served_from_store(&self, artifacts: usize) {
        info!(
            content_id = %self.content_id,
            artifacts,
            "Clips already generated, returning stored set"
        );
    }

    pub fn source_resolved(&self, source: &str, duration: f64) {
        info!(
            content_id = %self.content_id,
            source,
            duration,
            "Source ready for clipping"
        );
    }

    pub fn replacing(&self, removed: usize) {
        info!(
            content_id = %self.content_id,
            removed,
            "Existing clips removed for regeneration"
        );
    }

    pub fn artifact_ready(&self, kind: ClipKind, bytes: u64) {
        info!(content_id = %self.content_id, %kind, bytes, "Clip written");
    }

    pub fn artifact_failed(&self, kind: ClipKind, reason: &str) {
        warn!(content_id = %self.content_id, %kind, reason, "Clip generation failed");
    }

    pub fn rejected(&self, reason: &str) {
        error!(content_id = %self.content_id, reason, "Clip job aborted");
    }

    pub fn record_failed(&self, reason: &str) {
        error!(content_id = %self.content_id, reason, "Could not record generated clips");
    }

    pub fn finished(&self, result: &ClipJobResult) {
        if result.success {
            info!(
                content_id = %self.content_id,
                generated = result.artifacts.len(),
                failed = result.failures.len(),
                "{}", result.message
            );
        } else {
            error!(
                content_id = %self.content_id,
                failed = result.failures.len(),
                "{}", result.message
            );
        }
    }
}
