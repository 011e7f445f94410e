//! Engine discovery and health checks.
//!
//! The engine is the external FFmpeg/FFprobe pair. Every generator receives
//! an [`Engine`] built from a [`MediaConfig`], so tests can point it at fake
//! binaries without touching process-wide state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::command::FfmpegRunner;
use crate::config::MediaConfig;
use crate::error::{MediaError, MediaResult};

const FFPROBE: &str = "ffprobe";
const FFMPEG: &str = "ffmpeg";

/// Why a tool failed the availability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineFault {
    /// Configured path does not exist or is not on `PATH`
    Missing(PathBuf),
    /// The binary could not be executed or exited with failure
    ExecutionFailed(String),
    /// `-version` output did not contain the expected marker
    UnexpectedOutput(String),
}

impl fmt::Display for EngineFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineFault::Missing(path) => write!(f, "binary not found at {}", path.display()),
            EngineFault::ExecutionFailed(msg) => write!(f, "execution failed: {}", msg),
            EngineFault::UnexpectedOutput(first_line) => {
                write!(f, "unexpected version output: {}", first_line)
            }
        }
    }
}

/// Resolved tool paths and their version banners.
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub ffprobe_path: PathBuf,
    pub ffprobe_version: String,
    pub ffmpeg_path: PathBuf,
    pub ffmpeg_version: String,
}

/// Handle to the external media engine.
#[derive(Debug, Clone)]
pub struct Engine {
    config: Arc<MediaConfig>,
}

impl Engine {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    /// Resolve the probe tool path.
    pub fn ffprobe_path(&self) -> MediaResult<PathBuf> {
        resolve_tool(FFPROBE, &self.config.ffprobe_path)
    }

    /// Resolve the transcode tool path.
    pub fn ffmpeg_path(&self) -> MediaResult<PathBuf> {
        resolve_tool(FFMPEG, &self.config.ffmpeg_path)
    }

    /// Runner for the transcode tool.
    pub fn ffmpeg(&self) -> MediaResult<FfmpegRunner> {
        Ok(FfmpegRunner::new(self.ffmpeg_path()?))
    }

    /// Runner for the probe tool.
    pub fn ffprobe(&self) -> MediaResult<FfmpegRunner> {
        Ok(FfmpegRunner::new(self.ffprobe_path()?))
    }

    /// Root directory for private temp files, created on demand.
    pub async fn temp_dir(&self) -> MediaResult<PathBuf> {
        let dir = self.config.temp_dir.clone();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Verify both tools exist, run, and identify themselves.
    pub async fn check(&self) -> MediaResult<EngineInfo> {
        // Resolve both before spawning anything
        let ffprobe_path = self.ffprobe_path()?;
        let ffmpeg_path = self.ffmpeg_path()?;

        let ffprobe_version = check_version(FFPROBE, &ffprobe_path).await?;
        let ffmpeg_version = check_version(FFMPEG, &ffmpeg_path).await?;

        Ok(EngineInfo {
            ffprobe_path,
            ffprobe_version,
            ffmpeg_path,
            ffmpeg_version,
        })
    }

    /// Whether the engine is installed and functioning. Never fails.
    pub async fn is_available(&self) -> bool {
        match self.check().await {
            Ok(info) => {
                debug!(
                    ffprobe = %info.ffprobe_path.display(),
                    ffmpeg = %info.ffmpeg_path.display(),
                    version = %info.ffmpeg_version,
                    "Media engine available"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "Media engine unavailable");
                false
            }
        }
    }

    /// Whether the transcode tool was built with the named encoder.
    pub async fn supports_encoder(&self, encoder: &str) -> bool {
        let runner = match self.ffmpeg() {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, encoder, "Cannot query encoders");
                return false;
            }
        };

        let args = ["-hide_banner".to_string(), "-encoders".to_string()];
        match runner.run_args(&args).await {
            Ok(output) if output.success => {
                let found = encoder_listed(&output.stdout, encoder);
                if !found {
                    info!(encoder, "Encoder not available in this FFmpeg build");
                }
                found
            }
            Ok(output) => {
                warn!(encoder, stderr = %output.stderr.trim(), "Encoder query failed");
                false
            }
            Err(e) => {
                warn!(encoder, error = %e, "Encoder query failed");
                false
            }
        }
    }
}

/// Resolve a configured tool path.
///
/// A bare program name is looked up on `PATH`; anything else must exist on
/// disk. No subprocess is spawned here.
fn resolve_tool(tool: &'static str, configured: &Path) -> MediaResult<PathBuf> {
    let is_bare_name = configured.components().count() == 1
        && !configured.to_string_lossy().contains(std::path::MAIN_SEPARATOR);

    if is_bare_name {
        return which::which(configured).map_err(|_| MediaError::EngineUnavailable {
            tool,
            fault: EngineFault::Missing(configured.to_path_buf()),
        });
    }

    if configured.is_file() {
        Ok(configured.to_path_buf())
    } else {
        Err(MediaError::EngineUnavailable {
            tool,
            fault: EngineFault::Missing(configured.to_path_buf()),
        })
    }
}

/// Run `<tool> -version` and return the first line of its banner.
async fn check_version(tool: &'static str, path: &Path) -> MediaResult<String> {
    let output = FfmpegRunner::new(path)
        .run_args(&["-version".to_string()])
        .await
        .map_err(|e| MediaError::EngineUnavailable {
            tool,
            fault: EngineFault::ExecutionFailed(e.to_string()),
        })?;

    if !output.success {
        return Err(MediaError::EngineUnavailable {
            tool,
            fault: EngineFault::ExecutionFailed(format!(
                "exit code {:?}: {}",
                output.exit_code,
                output.stderr.trim()
            )),
        });
    }

    let marker = format!("{} version", tool);
    let first_line = output.stdout.lines().next().unwrap_or_default().trim().to_string();
    if output.stdout.contains(&marker) {
        Ok(first_line)
    } else {
        Err(MediaError::EngineUnavailable {
            tool,
            fault: EngineFault::UnexpectedOutput(first_line),
        })
    }
}

/// Check `ffmpeg -encoders` output for an encoder name.
///
/// Lines look like ` V....D libwebp   libwebp WebP image (codec webp)`.
fn encoder_listed(listing: &str, encoder: &str) -> bool {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|name| name == encoder)
}
