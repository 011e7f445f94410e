//! Artifact file layout and persisted attribute keys.

use std::path::{Path, PathBuf};

use clipgen_models::{ClipArtifact, ClipKind, ContentId};

/// Set to `"true"` once at least one artifact was produced.
pub const CLIPS_GENERATED: &str = "clips_generated";
/// RFC 3339 timestamp of the last successful generation.
pub const CLIPS_GENERATED_AT: &str = "clips_generated_at";
/// Comma-separated kinds produced by the last successful generation.
pub const CLIPS_GENERATED_KINDS: &str = "clips_generated_kinds";

pub fn path_key(kind: ClipKind) -> String {
    format!("clip_{}_path", kind.as_str())
}

pub fn url_key(kind: ClipKind) -> String {
    format!("clip_{}_url", kind.as_str())
}

pub fn duration_key(kind: ClipKind) -> String {
    format!("clip_{}_duration", kind.as_str())
}

/// All per-kind attribute keys.
pub fn kind_keys(kind: ClipKind) -> [String; 3] {
    [path_key(kind), url_key(kind), duration_key(kind)]
}

/// Maps content items to artifact paths and public URLs.
///
/// Files live at `<root>/<content_id>/<kind>.<ext>`; URLs replace `<root>`
/// with the public base URL.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
    public_base_url: String,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir_for(&self, id: &ContentId) -> PathBuf {
        self.root.join(id.as_str())
    }

    pub fn path_for(&self, id: &ContentId, kind: ClipKind) -> PathBuf {
        self.dir_for(id).join(kind.file_name())
    }

    pub fn public_url(&self, id: &ContentId, kind: ClipKind) -> String {
        format!(
            "{}/{}/{}",
            self.public_base_url.trim_end_matches('/'),
            id.as_str(),
            kind.file_name()
        )
    }

    /// Artifact record for a file that was just produced.
    pub fn artifact(
        &self,
        id: &ContentId,
        kind: ClipKind,
        duration_seconds: f64,
        file_size_bytes: u64,
    ) -> ClipArtifact {
        ClipArtifact {
            kind,
            file_path: self.path_for(id, kind),
            public_url: self.public_url(id, kind),
            mime_type: kind.mime_type().to_string(),
            duration_seconds,
            file_size_bytes,
        }
    }
}

/// Content ids become directory names, so they must be a single path segment.
pub fn is_valid_content_id(id: &ContentId) -> bool {
    let s = id.as_str();
    !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\', '\0'])
}
