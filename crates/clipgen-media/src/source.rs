//! Source eligibility and resolution.
//!
//! The engine cannot reliably fetch authenticated or platform-wrapped
//! streams, so eligibility is decided here before any processing starts.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

use clipgen_models::{ContentSource, SourceType};

/// Platforms whose pages wrap the actual stream. Subdomains match too.
pub const PLATFORM_DENYLIST: &[&str] = &[
    "youtube.com",
    "youtube-nocookie.com",
    "youtu.be",
    "vimeo.com",
    "dailymotion.com",
    "dai.ly",
    "twitch.tv",
    "tiktok.com",
    "facebook.com",
    "fb.watch",
    "instagram.com",
    "twitter.com",
    "x.com",
    "streamable.com",
    "wistia.com",
    "loom.com",
    "rumble.com",
    "bilibili.com",
];

/// Public sample/test media hosts the engine can read over HTTP.
pub const SAMPLE_MEDIA_HOSTS: &[&str] = &[
    "commondatastorage.googleapis.com",
    "test-videos.co.uk",
    "sample-videos.com",
    "samplelib.com",
    "file-examples.com",
    "filesamples.com",
    "download.blender.org",
    "media.w3.org",
    "test-streams.mux.dev",
];

/// Extensions that mark a URL as a direct media file.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mov", "webm", "mkv", "avi", "wmv", "flv", "mpg", "mpeg", "ogv", "3gp", "ts",
    "m3u8",
];

/// Engine input: a local file or a URL the engine reads directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Local(PathBuf),
    Remote(String),
}

impl MediaSource {
    /// Classify a string by URL syntax: `http(s)://` is remote, anything else a path.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match Url::parse(input) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                MediaSource::Remote(input.to_string())
            }
            _ => MediaSource::Local(PathBuf::from(input)),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, MediaSource::Remote(_))
    }

    /// Argument passed to `-i`.
    pub fn as_input(&self) -> String {
        match self {
            MediaSource::Local(path) => path.to_string_lossy().to_string(),
            MediaSource::Remote(url) => url.clone(),
        }
    }

    pub fn local_path(&self) -> Option<&Path> {
        match self {
            MediaSource::Local(path) => Some(path),
            MediaSource::Remote(_) => None,
        }
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_input())
    }
}

impl From<&Path> for MediaSource {
    fn from(path: &Path) -> Self {
        MediaSource::Local(path.to_path_buf())
    }
}

impl From<PathBuf> for MediaSource {
    fn from(path: PathBuf) -> Self {
        MediaSource::Local(path)
    }
}

/// Why a content item cannot be processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Ineligible {
    #[error("content item has no source URL")]
    MissingUrl,

    #[error("third-party platform embeds are not processable ({0})")]
    PlatformEmbed(String),

    #[error("source type '{0}' is not a direct upload")]
    NotDirect(SourceType),

    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("uploaded file does not exist: {}", .0.display())]
    MissingUpload(PathBuf),

    #[error("local file does not exist: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("URL does not point to a recognizable media file: {0}")]
    Unrecognized(String),
}

/// Rules the resolver applies.
#[derive(Debug, Clone)]
pub struct SourcePolicy {
    /// Public URL prefix of the site's own uploads (e.g. `https://example.com/uploads/`)
    pub upload_base_url: Option<String>,
    /// Filesystem directory that `upload_base_url` maps to
    pub upload_dir: PathBuf,
    pub platform_denylist: Vec<String>,
    pub sample_media_hosts: Vec<String>,
    pub video_extensions: Vec<String>,
}

impl Default for SourcePolicy {
    fn default() -> Self {
        Self {
            upload_base_url: None,
            upload_dir: PathBuf::from("uploads"),
            platform_denylist: PLATFORM_DENYLIST.iter().map(|s| s.to_string()).collect(),
            sample_media_hosts: SAMPLE_MEDIA_HOSTS.iter().map(|s| s.to_string()).collect(),
            video_extensions: VIDEO_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SourcePolicy {
    /// Map uploads served from `base_url` to files under `dir`.
    pub fn with_uploads(mut self, base_url: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.upload_base_url = Some(base_url.into());
        self.upload_dir = dir.into();
        self
    }
}

/// Decides whether a content item can be processed and what the engine reads.
#[derive(Debug, Clone, Default)]
pub struct SourceResolver {
    policy: SourcePolicy,
}

impl SourceResolver {
    pub fn new(policy: SourcePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SourcePolicy {
        &self.policy
    }

    /// Resolve a declared source into an engine input.
    pub fn resolve(&self, source: &ContentSource) -> Result<MediaSource, Ineligible> {
        let raw = source.url.trim();
        if raw.is_empty() {
            return Err(Ineligible::MissingUrl);
        }

        let parsed = Url::parse(raw).ok();

        // Platform embeds are rejected even when mis-tagged as direct
        if let Some(host) = parsed.as_ref().and_then(|u| u.host_str()) {
            let host = host.to_ascii_lowercase();
            if host_matches(&host, &self.policy.platform_denylist) {
                return Err(Ineligible::PlatformEmbed(host));
            }
        }

        if source.source_type != SourceType::Direct {
            return Err(Ineligible::NotDirect(source.source_type));
        }

        let url = match parsed {
            Some(url) => url,
            None => return self.resolve_local_path(Path::new(raw)),
        };

        if !matches!(url.scheme(), "http" | "https") {
            if url.scheme() == "file" {
                if let Ok(path) = url.to_file_path() {
                    return self.resolve_local_path(&path);
                }
            }
            return Err(Ineligible::UnsupportedScheme(url.scheme().to_string()));
        }

        if let Some(path) = self.upload_path(raw) {
            return if path.is_file() {
                debug!(url = raw, path = %path.display(), "Resolved upload URL to local file");
                Ok(MediaSource::Local(path))
            } else {
                Err(Ineligible::MissingUpload(path))
            };
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if host_matches(&host, &self.policy.sample_media_hosts) || self.has_video_extension(&url) {
            return Ok(MediaSource::Remote(raw.to_string()));
        }

        Err(Ineligible::Unrecognized(raw.to_string()))
    }

    fn resolve_local_path(&self, path: &Path) -> Result<MediaSource, Ineligible> {
        if path.is_file() {
            Ok(MediaSource::Local(path.to_path_buf()))
        } else {
            Err(Ineligible::MissingFile(path.to_path_buf()))
        }
    }

    /// Filesystem path for a URL under the upload origin.
    ///
    /// Segments come from the raw string: URL parsing would already have
    /// collapsed encoded dot segments.
    fn upload_path(&self, raw: &str) -> Option<PathBuf> {
        let base = self.policy.upload_base_url.as_deref()?;
        let base = base.trim_end_matches('/');
        let rest = raw.strip_prefix(base)?;
        if !rest.starts_with('/') {
            return None;
        }

        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let mut relative = PathBuf::new();
        for segment in rest.trim_start_matches('/').split('/') {
            match decode_segment(segment) {
                Some(name) => relative.push(name),
                // Never escape the upload directory
                None => return Some(self.policy.upload_dir.join("__invalid__")),
            }
        }

        Some(self.policy.upload_dir.join(relative))
    }

    fn has_video_extension(&self, url: &Url) -> bool {
        let path = url.path();
        let Some((_, ext)) = path.rsplit_once('.') else {
            return false;
        };
        if ext.contains('/') {
            return false;
        }
        self.policy
            .video_extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    }
}

/// Percent-decode one path segment; `None` unless it is a plain file or
/// directory name.
fn decode_segment(segment: &str) -> Option<String> {
    let decoded = urlencoding::decode(segment).ok()?;
    if decoded.contains(['/', '\\']) {
        return None;
    }
    let mut components = Path::new(decoded.as_ref()).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(decoded.into_owned()),
        _ => None,
    }
}

/// Exact host or any subdomain of a listed domain.
fn host_matches(host: &str, domains: &[String]) -> bool {
    let host = host.trim_start_matches("www.");
    domains.iter().any(|domain| {
        host == domain
            || host
                .strip_suffix(domain.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver_with_uploads(dir: &Path) -> SourceResolver {
        SourceResolver::new(
            SourcePolicy::default().with_uploads("https://example.com/uploads", dir),
        )
    }

    #[test]
    fn test_media_source_parse() {
        assert!(MediaSource::parse("https://cdn.example.com/v.mp4").is_remote());
        assert!(!MediaSource::parse("/var/media/v.mp4").is_remote());
        assert!(!MediaSource::parse("C:\\videos\\v.mp4").is_remote());
        assert_eq!(
            MediaSource::parse("relative/v.mp4").local_path(),
            Some(Path::new("relative/v.mp4"))
        );
    }

    #[test]
    fn test_denylisted_platforms_rejected_for_any_type() {
        let resolver = SourceResolver::default();
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://player.vimeo.com/video/123.mp4",
            "https://m.facebook.com/watch/?v=1",
        ] {
            for source_type in [SourceType::Direct, SourceType::Embed, SourceType::Unknown] {
                let result = resolver.resolve(&ContentSource::new(source_type, url));
                assert!(
                    matches!(result, Err(Ineligible::PlatformEmbed(_))),
                    "{url} as {source_type} should be a platform embed, got {result:?}"
                );
            }
        }
    }

    #[test]
    fn test_lookalike_domain_not_denylisted() {
        let resolver = SourceResolver::default();
        let result = resolver.resolve(&ContentSource::direct("https://notyoutube.com/clip.mp4"));
        assert!(matches!(result, Ok(MediaSource::Remote(_))));
    }

    #[test]
    fn test_non_direct_rejected() {
        let resolver = SourceResolver::default();
        let result = resolver.resolve(&ContentSource::new(
            SourceType::Embed,
            "https://cdn.example.com/video.mp4",
        ));
        assert_eq!(result, Err(Ineligible::NotDirect(SourceType::Embed)));
    }

    #[test]
    fn test_upload_url_maps_to_existing_file() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("2024/05")).unwrap();
        let file = dir.path().join("2024/05/talk.mp4");
        std::fs::write(&file, b"video").unwrap();

        let resolver = resolver_with_uploads(dir.path());
        let result = resolver.resolve(&ContentSource::direct(
            "https://example.com/uploads/2024/05/talk.mp4?ver=2",
        ));
        assert_eq!(result, Ok(MediaSource::Local(file)));
    }

    #[test]
    fn test_missing_upload_rejected() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_with_uploads(dir.path());
        let result =
            resolver.resolve(&ContentSource::direct("https://example.com/uploads/gone.mp4"));
        assert!(matches!(result, Err(Ineligible::MissingUpload(_))));
    }

    #[test]
    fn test_upload_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_with_uploads(dir.path());
        let result = resolver.resolve(&ContentSource::direct(
            "https://example.com/uploads/%2e%2e/etc/passwd.mp4",
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_upload_url_with_encoded_name() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("my talk ü.mp4");
        std::fs::write(&file, b"video").unwrap();

        let resolver = resolver_with_uploads(dir.path());
        let result = resolver.resolve(&ContentSource::direct(
            "https://example.com/uploads/my%20talk%20%C3%BC.mp4",
        ));
        assert_eq!(result, Ok(MediaSource::Local(file)));
    }

    #[test]
    fn test_encoded_separators_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("secret.mp4"), b"video").unwrap();
        let resolver = resolver_with_uploads(dir.path());

        for url in [
            "https://example.com/uploads/%2e%2e/etc/passwd.mp4",
            "https://example.com/uploads/..%2Fsecret.mp4",
            "https://example.com/uploads/a%5C..%5Csecret.mp4",
        ] {
            let result = resolver.resolve(&ContentSource::direct(url));
            assert!(
                matches!(result, Err(Ineligible::MissingUpload(ref p)) if p.ends_with("__invalid__")),
                "{url} resolved to {result:?}"
            );
        }
    }

    #[test]
    fn test_decode_segment() {
        assert_eq!(decode_segment("my%20talk.mp4").as_deref(), Some("my talk.mp4"));
        assert_eq!(decode_segment("%2e%2e"), None);
        assert_eq!(decode_segment("."), None);
        assert_eq!(decode_segment(""), None);
        assert_eq!(decode_segment("%FF"), None);
    }

    #[test]
    fn test_sample_host_and_extension_accepted() {
        let resolver = SourceResolver::default();

        let sample = "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny";
        assert_eq!(
            resolver.resolve(&ContentSource::direct(sample)),
            Ok(MediaSource::Remote(sample.to_string()))
        );

        let by_ext = "https://cdn.example.org/media/Clip.MOV?token=abc";
        assert_eq!(
            resolver.resolve(&ContentSource::direct(by_ext)),
            Ok(MediaSource::Remote(by_ext.to_string()))
        );
    }

    #[test]
    fn test_unrecognized_url_rejected() {
        let resolver = SourceResolver::default();
        let result = resolver.resolve(&ContentSource::direct("https://example.org/watch/123"));
        assert!(matches!(result, Err(Ineligible::Unrecognized(_))));

        let result = resolver.resolve(&ContentSource::direct("ftp://example.org/v.mp4"));
        assert_eq!(result, Err(Ineligible::UnsupportedScheme("ftp".to_string())));
    }

    #[test]
    fn test_local_path_source() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("local.mp4");
        std::fs::write(&file, b"video").unwrap();

        let resolver = SourceResolver::default();
        let result = resolver.resolve(&ContentSource::direct(file.to_string_lossy()));
        assert_eq!(result, Ok(MediaSource::Local(file)));

        let result = resolver.resolve(&ContentSource::direct("/does/not/exist.mp4"));
        assert!(matches!(result, Err(Ineligible::MissingFile(_))));
        assert_eq!(
            resolver.resolve(&ContentSource::direct("  ")),
            Err(Ineligible::MissingUrl)
        );
    }
}
