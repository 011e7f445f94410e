//! Shared data models for the clip generation pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Probe results (`MediaInfo`, `StreamDescriptor`)
//! - Detected scenes
//! - Clip specifications, artifacts and job results
//! - Content item sources
//! - Encoding configuration

pub mod clip;
pub mod content;
pub mod encoding;
pub mod media;
pub mod scene;

// Re-export common types
pub use clip::{
    ClipArtifact, ClipJobResult, ClipKind, ClipSelection, ClipSpec, ClipSpecError, CodecMode,
};
pub use content::{ContentId, ContentSource, SourceType};
pub use encoding::EncodingConfig;
pub use media::{MediaInfo, StreamDescriptor};
pub use scene::Scene;
