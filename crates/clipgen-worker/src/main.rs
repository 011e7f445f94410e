//! Clip generation worker binary.
//!
//! Runs one job for a content item. When a source URL is given it is
//! registered in the JSON content store before the run; otherwise the stored
//! source is used.

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipgen_models::{ClipKind, ClipSelection, ContentId, ContentSource, SourceType};
use clipgen_worker::{ClipJobOrchestrator, JsonFileContentStore, WorkerConfig};

/// Generate preview clips, highlight reels and animated previews for one
/// content item
#[derive(Debug, Parser)]
#[command(name = "clipgen-worker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Content item identifier (a single path segment)
    content_id: String,

    /// Video URL or local path to register for the item
    source_url: Option<String>,

    /// Declared source type of SOURCE_URL (direct, embed, unknown)
    #[arg(long, default_value = "direct")]
    source_type: SourceType,

    /// Comma-separated artifact kinds (preview, highlight, intro, gif, webp)
    #[arg(long, value_delimiter = ',')]
    only: Vec<ClipKind>,

    /// Delete existing artifacts and build them again
    #[arg(long)]
    regenerate: bool,
}

impl Args {
    fn content_id(&self) -> ContentId {
        ContentId::from(self.content_id.as_str())
    }

    fn selection(&self) -> ClipSelection {
        if self.only.is_empty() {
            ClipSelection::all()
        } else {
            ClipSelection::from_kinds(self.only.iter().copied())
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("clipgen_worker=info,clipgen_media=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }

    if let Err(e) = run().await {
        error!("clipgen-worker failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let content_id = args.content_id();
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let store = Arc::new(JsonFileContentStore::new(config.content_store_dir.clone()));
    if let Some(url) = &args.source_url {
        store
            .register(&content_id, ContentSource::new(args.source_type, url.clone()))
            .await
            .context("failed to register content item")?;
    }

    let orchestrator = ClipJobOrchestrator::new(config, store);
    let result = orchestrator
        .run(&content_id, &args.selection(), args.regenerate)
        .await;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        bail!(result.message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("clipgen-worker").chain(list.iter().copied()))
    }

    #[test]
    fn test_parse_full_args() {
        let parsed = args(&[
            "post-1",
            "https://cdn.example.com/a.mp4",
            "--only",
            "gif,preview",
            "--regenerate",
            "--source-type",
            "embed",
        ])
        .unwrap();
        assert_eq!(parsed.content_id().as_str(), "post-1");
        assert_eq!(parsed.source_url.as_deref(), Some("https://cdn.example.com/a.mp4"));
        assert_eq!(parsed.source_type, SourceType::Embed);
        assert_eq!(parsed.selection().kinds(), vec![ClipKind::Preview, ClipKind::Gif]);
        assert!(parsed.regenerate);
    }

    #[test]
    fn test_parse_defaults() {
        let parsed = args(&["post-1"]).unwrap();
        assert_eq!(parsed.source_url, None);
        assert_eq!(parsed.source_type, SourceType::Direct);
        assert_eq!(parsed.selection(), ClipSelection::all());
        assert!(!parsed.regenerate);
    }

    #[test]
    fn test_only_accepts_repeated_flags() {
        let parsed = args(&["post-1", "--only", "intro", "--only", "webp"]).unwrap();
        assert_eq!(parsed.selection().kinds(), vec![ClipKind::Intro, ClipKind::Webp]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(args(&[]).is_err());
        assert!(args(&["post-1", "--only", "thumbnail"]).is_err());
        assert!(args(&["post-1", "--source-type", "ftp"]).is_err());
        assert!(args(&["post-1", "--bogus"]).is_err());
        assert!(args(&["a", "b", "c"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
