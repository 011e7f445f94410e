//! FFprobe media information.

use serde::Deserialize;
use tracing::{debug, error};

use clipgen_models::{MediaInfo, StreamDescriptor};

use crate::engine::Engine;
use crate::error::{MediaError, MediaResult};
use crate::source::MediaSource;

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: Option<u32>,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Probe a local file or URL.
///
/// Remote sources are bounded by the configured probe timeout; local probes
/// run to completion.
pub async fn probe_media(engine: &Engine, source: &MediaSource) -> MediaResult<MediaInfo> {
    if let MediaSource::Local(path) = source {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.clone()));
        }
    }

    let mut runner = engine.ffprobe()?;
    if source.is_remote() {
        runner = runner.with_timeout(engine.config().remote_probe_timeout.as_secs());
    }

    let args: Vec<String> = [
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain(std::iter::once(source.as_input()))
    .collect();

    let output = runner.run_args(&args).await?;

    if output.stdout.trim().is_empty() {
        error!(
            source = %source,
            exit_code = ?output.exit_code,
            stderr = %output.stderr.trim(),
            "FFprobe produced no output"
        );
        return Err(MediaError::probe_failed(
            format!("FFprobe produced no output for {}", source),
            Some(output.stderr),
        ));
    }

    let info = parse_probe_output(output.stdout.as_bytes())?;
    debug!(
        source = %source,
        duration = info.duration,
        width = info.width,
        height = info.height,
        "Probed media"
    );
    Ok(info)
}

/// Parse FFprobe's JSON report into [`MediaInfo`].
pub fn parse_probe_output(stdout: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput =
        serde_json::from_slice(stdout).map_err(|e| MediaError::ParseFailed(e.to_string()))?;

    let format = probe.format.as_ref();
    let duration = format
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_number::<f64>)
        .unwrap_or(0.0);
    let size_bytes = format
        .and_then(|f| f.size.as_deref())
        .and_then(parse_number::<u64>)
        .unwrap_or(0);
    let bitrate_bps = format
        .and_then(|f| f.bit_rate.as_deref())
        .and_then(parse_number::<u64>)
        .unwrap_or(0);
    let format_name = format
        .and_then(|f| f.format_name.clone())
        .unwrap_or_default();

    let streams: Vec<StreamDescriptor> = probe
        .streams
        .into_iter()
        .enumerate()
        .map(|(i, s)| StreamDescriptor {
            index: s.index.unwrap_or(i as u32),
            codec_type: s.codec_type.unwrap_or_default(),
            codec_name: s.codec_name.unwrap_or_default(),
            width: s.width,
            height: s.height,
            duration: s.duration.as_deref().and_then(parse_number::<f64>),
        })
        .collect();

    let (width, height) = streams
        .iter()
        .find(|s| s.is_video())
        .map(|s| (s.width.unwrap_or(0), s.height.unwrap_or(0)))
        .unwrap_or((0, 0));

    // Some containers only report duration on the stream
    let duration = if duration > 0.0 {
        duration
    } else {
        streams
            .iter()
            .filter_map(|s| s.duration)
            .fold(0.0, f64::max)
    };

    Ok(MediaInfo {
        duration,
        width,
        height,
        format: format_name,
        bitrate_bps,
        size_bytes,
        streams,
    })
}

/// Parse a numeric field that FFprobe may report as "N/A".
fn parse_number<T: std::str::FromStr>(s: &str) -> Option<T> {
    s.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_name": "aac", "codec_type": "audio", "duration": "600.02"},
            {"index": 1, "codec_name": "h264", "codec_type": "video", "width": 1920, "height": 1080, "duration": "600.000000"}
        ],
        "format": {
            "filename": "talk.mp4",
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "duration": "600.023000",
            "size": "104857600",
            "bit_rate": "1398101"
        }
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let info = parse_probe_output(SAMPLE.as_bytes()).unwrap();
        assert!((info.duration - 600.023).abs() < 0.001);
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert_eq!(info.size_bytes, 104_857_600);
        assert_eq!(info.bitrate_bps, 1_398_101);
        assert_eq!(info.format, "mov,mp4,m4a,3gp,3g2,mj2");
        assert_eq!(info.streams.len(), 2);
        assert!(info.has_audio());
    }

    #[test]
    fn test_audio_only_has_zero_dimensions() {
        let json = r#"{"streams":[{"codec_type":"audio"}],"format":{"duration":"12.5","bit_rate":"N/A"}}"#;
        let info = parse_probe_output(json.as_bytes()).unwrap();
        assert_eq!((info.width, info.height), (0, 0));
        assert_eq!(info.bitrate_bps, 0);
        assert!((info.duration - 12.5).abs() < 0.001);
    }

    #[test]
    fn test_stream_duration_fallback() {
        let json = r#"{"streams":[{"codec_type":"video","width":640,"height":360,"duration":"42.0"}],"format":{}}"#;
        let info = parse_probe_output(json.as_bytes()).unwrap();
        assert!((info.duration - 42.0).abs() < 0.001);
    }

    #[test]
    fn test_invalid_json_is_parse_failure() {
        let err = parse_probe_output(b"ffprobe: something went wrong").unwrap_err();
        assert!(matches!(err, MediaError::ParseFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_local_file() {
        let engine = Engine::new(crate::MediaConfig::default());
        let source = MediaSource::Local("/nonexistent/video.mp4".into());
        let err = probe_media(&engine, &source).await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
