//! Time-range extraction.
//!
//! Stream copy is used whenever possible: it is fast and lossless but cuts
//! on keyframes. Any resize request forces a re-encode.

use std::path::Path;
use tracing::info;

use clipgen_models::{ClipSpec, CodecMode, EncodingConfig};

use crate::command::FfmpegCommand;
use crate::engine::Engine;
use crate::error::MediaResult;
use crate::fs_utils::ensure_parent_dir;
use crate::source::MediaSource;

/// Extract `spec` from `source` into `output`.
///
/// Succeeds only when the engine leaves a non-empty file at `output`.
pub async fn extract_clip(
    engine: &Engine,
    source: &MediaSource,
    output: &Path,
    spec: &ClipSpec,
) -> MediaResult<()> {
    spec.validate()?;
    ensure_parent_dir(output).await?;

    info!(
        source = %source,
        output = %output.display(),
        start = spec.start,
        duration = spec.duration,
        mode = ?spec.effective_codec_mode(),
        "Extracting clip"
    );

    let cmd = build_clip_command(source, output, spec, &engine.config().encoding);
    let size = engine.ffmpeg()?.run_to_file(&cmd, output).await?;

    info!(output = %output.display(), size, "Clip extracted");
    Ok(())
}

/// Build the trim command for a clip spec.
pub fn build_clip_command(
    source: &MediaSource,
    output: &Path,
    spec: &ClipSpec,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(source.as_input(), output)
        .seek(spec.start)
        .duration(spec.duration);

    let cmd = match spec.effective_codec_mode() {
        CodecMode::Copy => {
            let cmd = cmd.video_codec("copy");
            let cmd = if spec.include_audio {
                cmd.audio_codec("copy")
            } else {
                cmd.no_audio()
            };
            cmd.output_args(["-avoid_negative_ts", "make_zero"])
        }
        CodecMode::Reencode => {
            let cmd = if spec.resizes() {
                cmd.video_filter(format!("scale={}:{}", spec.width, spec.height))
            } else {
                cmd
            };
            let cmd = cmd.output_args(encoding.video_args(spec.video_bitrate_kbps));
            if spec.include_audio {
                cmd.output_args(encoding.audio_args())
            } else {
                cmd.no_audio()
            }
        }
    };

    cmd.faststart()
}
