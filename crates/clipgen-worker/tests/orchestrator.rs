//! End-to-end orchestrator runs against fake ffprobe/ffmpeg scripts.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clipgen_media::MediaConfig;
use clipgen_models::{ClipKind, ClipSelection, ContentId, ContentSource, SourceType};
use clipgen_worker::artifacts::{CLIPS_GENERATED, CLIPS_GENERATED_KINDS};
use clipgen_worker::{ClipJobOrchestrator, ContentStore, InMemoryContentStore, WorkerConfig};
use tempfile::TempDir;

const FAKE_FFPROBE: &str = r#"#!/bin/sh
echo "ffprobe $*" >> "@LOG@"
if [ "$1" = "-version" ]; then
  echo "ffprobe version 6.1-fake Copyright (c) 2007-2023"
  exit 0
fi
cat <<'JSON'
{
  "streams": [
    {"index": 0, "codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720, "duration": "120.0"},
    {"index": 1, "codec_type": "audio", "codec_name": "aac", "duration": "120.0"}
  ],
  "format": {"format_name": "mov,mp4", "duration": "120.000000", "size": "4096", "bit_rate": "800000"}
}
JSON
"#;

const FAKE_FFMPEG: &str = r#"#!/bin/sh
echo "ffmpeg $*" >> "@LOG@"
if [ "$1" = "-version" ]; then
  echo "ffmpeg version 6.1-fake Copyright (c) 2000-2023"
  exit 0
fi
if [ "$1" = "-hide_banner" ] && [ "$2" = "-encoders" ]; then
  echo " V....D libx264   libx264 H.264 / AVC"
  echo "@WEBP@"
  exit 0
fi
for last; do :; done
if [ "$last" = "-" ]; then
  echo "[Parsed_showinfo_1 @ 0x1] n:   0 pts: 1 pts_time:20.0 duration:1" >&2
  echo "[Parsed_showinfo_1 @ 0x1] n:   1 pts: 2 pts_time:50.5 duration:1" >&2
  exit 0
fi
printf 'fake-media' > "$last"
"#;

const WEBP_LINE: &str = " V....D libwebp   libwebp WebP image (codec webp)";

struct Fixture {
    dir: TempDir,
    store: Arc<InMemoryContentStore>,
    orchestrator: ClipJobOrchestrator,
}

impl Fixture {
    async fn new(with_webp: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let ffprobe = write_script(dir.path(), "ffprobe", FAKE_FFPROBE, &log, "");
        let ffmpeg = write_script(
            dir.path(),
            "ffmpeg",
            FAKE_FFMPEG,
            &log,
            if with_webp { WEBP_LINE } else { "" },
        );
        Self::with_tools(dir, ffprobe, ffmpeg).await
    }

    async fn with_tools(dir: TempDir, ffprobe: PathBuf, ffmpeg: PathBuf) -> Self {
        let source = dir.path().join("source.mp4");
        std::fs::write(&source, b"not really a video").unwrap();

        let config = worker_config(dir.path(), ffprobe, ffmpeg);
        let store = Arc::new(InMemoryContentStore::new());
        store
            .insert(
                content_id(),
                ContentSource::direct(source.to_string_lossy().to_string()),
            )
            .await;
        let orchestrator = ClipJobOrchestrator::new(config, store.clone());

        Self {
            dir,
            store,
            orchestrator,
        }
    }

    /// Another orchestrator over the same store and output dir.
    fn orchestrator_with_tools(&self, ffprobe: PathBuf, ffmpeg: PathBuf) -> ClipJobOrchestrator {
        ClipJobOrchestrator::new(
            worker_config(self.dir.path(), ffprobe, ffmpeg),
            self.store.clone(),
        )
    }

    fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("calls.log"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn clear_calls(&self) {
        let _ = std::fs::remove_file(self.dir.path().join("calls.log"));
    }

    fn temp_entries(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("tmp"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

fn worker_config(dir: &Path, ffprobe: PathBuf, ffmpeg: PathBuf) -> WorkerConfig {
    WorkerConfig {
        clip_output_dir: dir.join("clips"),
        clip_public_base_url: "https://cdn.example.com/clips".to_string(),
        media: MediaConfig::default()
            .with_tools(ffprobe, ffmpeg)
            .with_temp_dir(dir.join("tmp")),
        ..WorkerConfig::default()
    }
}

fn write_script(dir: &Path, name: &str, template: &str, log: &Path, webp: &str) -> PathBuf {
    let path = dir.join(name);
    let body = template
        .replace("@LOG@", &log.to_string_lossy())
        .replace("@WEBP@", webp);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn content_id() -> ContentId {
    ContentId::from("post-42")
}

#[tokio::test]
async fn generates_every_selected_kind() {
    let fx = Fixture::new(true).await;
    let id = content_id();

    let result = fx.orchestrator.run(&id, &ClipSelection::all(), false).await;

    assert!(result.success, "{}", result.message);
    assert!(!result.skipped);
    assert!(result.failures.is_empty(), "{:?}", result.failures);
    assert_eq!(result.kinds(), ClipKind::ALL.to_vec());
    assert!(result.generated_at.is_some());

    for (kind, artifact) in &result.artifacts {
        assert!(artifact.file_path.exists(), "{kind} missing on disk");
        assert_eq!(artifact.file_size_bytes, "fake-media".len() as u64);
        assert_eq!(
            artifact.public_url,
            format!("https://cdn.example.com/clips/post-42/{}", kind.file_name())
        );
    }

    let preview = &result.artifacts[&ClipKind::Preview];
    assert_eq!(preview.duration_seconds, 10.0);
    assert_eq!(preview.mime_type, "video/mp4");
    assert_eq!(result.artifacts[&ClipKind::Intro].duration_seconds, 5.0);
    assert_eq!(result.artifacts[&ClipKind::Highlight].duration_seconds, 30.0);
    assert_eq!(result.artifacts[&ClipKind::Gif].mime_type, "image/gif");

    let attributes = fx.store.attributes(&id).await;
    assert_eq!(attributes.get(CLIPS_GENERATED).map(String::as_str), Some("true"));
    assert_eq!(
        attributes.get(CLIPS_GENERATED_KINDS).map(String::as_str),
        Some("preview,highlight,intro,gif,webp")
    );

    // Probed once for the whole job
    let probes = fx
        .calls()
        .iter()
        .filter(|c| c.starts_with("ffprobe") && !c.contains("-version"))
        .count();
    assert_eq!(probes, 1);

    // Palette and highlight work dirs are gone
    assert_eq!(fx.temp_entries(), 0);
}

#[tokio::test]
async fn second_run_is_served_from_store_without_engine_calls() {
    let fx = Fixture::new(true).await;
    let id = content_id();
    let selection = ClipSelection::from_kinds([ClipKind::Preview, ClipKind::Intro]);

    let first = fx.orchestrator.run(&id, &selection, false).await;
    assert!(first.success);
    fx.clear_calls();

    let second = fx.orchestrator.run(&id, &selection, false).await;
    assert!(second.success);
    assert!(second.skipped);
    assert!(fx.calls().is_empty(), "unexpected calls: {:?}", fx.calls());
    assert_eq!(second.kinds(), first.kinds());
    assert_eq!(
        second.artifacts[&ClipKind::Preview].file_path,
        first.artifacts[&ClipKind::Preview].file_path
    );
    assert_eq!(second.artifacts[&ClipKind::Preview].duration_seconds, 10.0);
}

#[tokio::test]
async fn regenerate_rebuilds_artifacts() {
    let fx = Fixture::new(true).await;
    let id = content_id();
    let first = fx
        .orchestrator
        .run(&id, &ClipSelection::from_kinds([ClipKind::Gif, ClipKind::Intro]), false)
        .await;
    assert!(first.success);
    fx.clear_calls();

    let second = fx
        .orchestrator
        .run(&id, &ClipSelection::from_kinds([ClipKind::Intro]), true)
        .await;

    assert!(second.success);
    assert!(!second.skipped);
    assert!(!fx.calls().is_empty());
    assert_eq!(second.kinds(), vec![ClipKind::Intro]);
    // The old GIF was deleted with the rest of the set
    assert!(!first.artifacts[&ClipKind::Gif].file_path.exists());
    assert_eq!(
        fx.store.attributes(&id).await.get(CLIPS_GENERATED_KINDS).map(String::as_str),
        Some("intro")
    );
}

#[tokio::test]
async fn regenerate_without_engine_keeps_existing_artifacts() {
    let fx = Fixture::new(true).await;
    let id = content_id();
    let selection = ClipSelection::from_kinds([ClipKind::Preview]);
    let first = fx.orchestrator.run(&id, &selection, false).await;
    assert!(first.success);
    let preview = first.artifacts[&ClipKind::Preview].file_path.clone();

    let broken = fx.orchestrator_with_tools(
        fx.dir.path().join("no-ffprobe"),
        fx.dir.path().join("no-ffmpeg"),
    );
    let result = broken.run(&id, &selection, true).await;

    assert!(!result.success);
    assert!(result.message.contains("unavailable"), "{}", result.message);
    assert!(preview.exists());
    assert_eq!(fx.store.attributes(&id).await.get(CLIPS_GENERATED).map(String::as_str), Some("true"));

    // The untouched set is still served
    let again = fx.orchestrator.run(&id, &selection, false).await;
    assert!(again.skipped);
    assert_eq!(again.kinds(), vec![ClipKind::Preview]);
}

#[tokio::test]
async fn regenerate_with_vanished_source_keeps_existing_artifacts() {
    let fx = Fixture::new(true).await;
    let id = content_id();
    let first = fx
        .orchestrator
        .run(&id, &ClipSelection::from_kinds([ClipKind::Intro]), false)
        .await;
    assert!(first.success);

    std::fs::remove_file(fx.dir.path().join("source.mp4")).unwrap();
    let result = fx.orchestrator.run(&id, &ClipSelection::all(), true).await;

    assert!(!result.success);
    assert!(result.artifacts.is_empty());
    assert!(first.artifacts[&ClipKind::Intro].file_path.exists());
    assert_eq!(
        fx.store.attributes(&id).await.get(CLIPS_GENERATED_KINDS).map(String::as_str),
        Some("intro")
    );
}

#[tokio::test]
async fn missing_webp_encoder_only_fails_webp() {
    let fx = Fixture::new(false).await;
    let id = content_id();

    let result = fx
        .orchestrator
        .run(&id, &ClipSelection::from_kinds([ClipKind::Preview, ClipKind::Webp]), false)
        .await;

    assert!(result.success);
    assert_eq!(result.kinds(), vec![ClipKind::Preview]);
    assert!(result.failures.contains_key(&ClipKind::Webp));
    assert!(result.message.contains("1 failed"), "{}", result.message);
    assert!(!fx.orchestrator.layout().path_for(&id, ClipKind::Webp).exists());
}

#[tokio::test]
async fn platform_embed_is_rejected_before_processing() {
    let fx = Fixture::new(true).await;
    let id = ContentId::from("post-embed");
    fx.store
        .insert(
            id.clone(),
            ContentSource::new(SourceType::Direct, "https://www.youtube.com/watch?v=abc123"),
        )
        .await;

    let result = fx.orchestrator.run(&id, &ClipSelection::all(), false).await;

    assert!(!result.success);
    assert!(result.artifacts.is_empty());
    assert!(result.message.contains("ineligible"), "{}", result.message);
    assert!(!fx.calls().iter().any(|c| c.contains("-show_streams")));
    assert!(fx.store.attributes(&id).await.is_empty());
}

#[tokio::test]
async fn unavailable_engine_fails_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let missing_probe = dir.path().join("no-ffprobe");
    let missing_ffmpeg = dir.path().join("no-ffmpeg");
    let fx = Fixture::with_tools(dir, missing_probe, missing_ffmpeg).await;
    let id = content_id();

    let result = fx.orchestrator.run(&id, &ClipSelection::all(), false).await;

    assert!(!result.success);
    assert!(result.artifacts.is_empty());
    assert!(result.message.contains("unavailable"), "{}", result.message);
    assert!(!fx.orchestrator.layout().dir_for(&id).exists());
}

#[tokio::test]
async fn delete_artifacts_is_idempotent() {
    let fx = Fixture::new(true).await;
    let id = content_id();
    let result = fx
        .orchestrator
        .run(&id, &ClipSelection::from_kinds([ClipKind::Preview, ClipKind::Intro]), false)
        .await;
    assert!(result.success);

    assert_eq!(fx.orchestrator.delete_artifacts(&id).await.unwrap(), 2);
    assert!(!fx.orchestrator.layout().dir_for(&id).exists());
    assert_eq!(fx.store.get_attribute(&id, CLIPS_GENERATED).await.unwrap(), None);
    assert!(fx.orchestrator.stored_artifacts(&id).await.unwrap().is_empty());

    assert_eq!(fx.orchestrator.delete_artifacts(&id).await.unwrap(), 0);
}
