//! Clip generation worker.
//!
//! This crate provides:
//! - The clip job orchestrator
//! - Content store abstraction with in-memory and JSON file backends
//! - Artifact layout and persisted attribute keys
//! - Worker configuration and structured job logging

pub mod artifacts;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod store;

pub use artifacts::ArtifactLayout;
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::ClipJobLog;
pub use orchestrator::ClipJobOrchestrator;
pub use store::{ContentRecord, ContentStore, InMemoryContentStore, JsonFileContentStore};
