//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, warn};

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{non_empty_file, remove_file_if_exists};

/// One `-i` input together with the arguments that precede it.
#[derive(Debug, Clone)]
struct CommandInput {
    args: Vec<String>,
    source: String,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in order; the first one receives `input_arg` calls
    inputs: Vec<CommandInput>,
    /// Output file path ("-" for the null muxer)
    output: String,
    /// Output arguments (after the last -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command. `input` is a local path or a URL.
    pub fn new(input: impl Into<String>, output: impl AsRef<Path>) -> Self {
        Self {
            inputs: vec![CommandInput {
                args: Vec::new(),
                source: input.into(),
            }],
            output: output.as_ref().to_string_lossy().to_string(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Create a command that decodes `input` and discards the result.
    ///
    /// Used for analysis passes whose only product is the log.
    pub fn null_output(input: impl Into<String>) -> Self {
        let mut cmd = Self::new(input, "-");
        cmd.overwrite = false;
        cmd
    }

    /// Add an argument before the first `-i`.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        if let Some(first) = self.inputs.first_mut() {
            first.args.push(arg.into());
        }
        self
    }

    /// Add multiple arguments before the first `-i`.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(first) = self.inputs.first_mut() {
            first.args.extend(args.into_iter().map(Into::into));
        }
        self
    }

    /// Append another input.
    pub fn add_input(self, source: impl Into<String>) -> Self {
        self.add_input_with_args(Vec::<String>::new(), source)
    }

    /// Append another input preceded by its own arguments.
    pub fn add_input_with_args<I, S>(mut self, args: I, source: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(CommandInput {
            args: args.into_iter().map(Into::into).collect(),
            source: source.into(),
        });
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set seek position (before input).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Set duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format!("{:.3}", seconds))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Copy all streams without re-encoding.
    pub fn codec_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Drop audio streams.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Extract single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    /// Move the MP4 index to the front for progressive playback.
    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    /// Loop animated output forever (GIF/WebP).
    pub fn loop_forever(self) -> Self {
        self.output_arg("-loop").output_arg("0")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Output target as passed to FFmpeg.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-nostdin".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.iter().cloned());

        if self.output == "-" {
            args.push("-f".to_string());
            args.push("null".to_string());
        }
        args.push(self.output.clone());

        args
    }

    /// Render the full command line for diagnostics.
    pub fn command_line(&self, program: &Path) -> String {
        render_command_line(program, &self.build_args())
    }
}

fn render_command_line(program: &Path, args: &[String]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) || arg.contains('\'') {
            line.push('"');
            line.push_str(arg);
            line.push('"');
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Captured result of one engine subprocess.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs engine subprocesses and captures their output.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    /// Resolved program path
    program: PathBuf,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    /// Create a new runner for an already resolved program.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout_secs: None,
        }
    }

    /// Set timeout. The process is killed when it elapses.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the program with raw arguments, waiting for it to exit.
    ///
    /// A non-zero exit status is reported in [`EngineOutput`], not as an error.
    pub async fn run_args(&self, args: &[String]) -> MediaResult<EngineOutput> {
        debug!("Running: {}", render_command_line(&self.program, args));

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MediaError::ffmpeg_failed(
                    format!("Failed to spawn {}: {}", self.program.display(), e),
                    None,
                    None,
                )
            })?;

        let output = match self.timeout_secs {
            Some(secs) => {
                match tokio::time::timeout(Duration::from_secs(secs), child.wait_with_output())
                    .await
                {
                    Ok(result) => result?,
                    Err(_) => {
                        // Dropping the future kills the child (kill_on_drop)
                        warn!(
                            program = %self.program.display(),
                            "Engine call timed out after {} seconds", secs
                        );
                        return Err(MediaError::Timeout(secs));
                    }
                }
            }
            None => child.wait_with_output().await?,
        };

        Ok(EngineOutput {
            exit_code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<EngineOutput> {
        self.run_args(&cmd.build_args()).await
    }

    /// Run a command that must leave a non-empty file at `output`.
    ///
    /// Success is decided by the file, not the exit code, so any file left
    /// at `output` by an earlier run is removed first. Failures log the full
    /// command line and the captured engine output.
    pub async fn run_to_file(&self, cmd: &FfmpegCommand, output: &Path) -> MediaResult<u64> {
        let command_line = cmd.command_line(&self.program);
        if remove_file_if_exists(output).await? {
            debug!(output = %output.display(), "Removed stale output");
        }
        let result = self.run(cmd).await.inspect_err(|e| {
            error!(command = %command_line, error = %e, "Engine call failed");
        })?;

        match non_empty_file(output).await {
            Some(size) => {
                if !result.success {
                    warn!(
                        command = %command_line,
                        exit_code = ?result.exit_code,
                        stderr = %result.stderr.trim(),
                        "Engine exited with failure but produced output; keeping it"
                    );
                }
                Ok(size)
            }
            None => {
                error!(
                    command = %command_line,
                    exit_code = ?result.exit_code,
                    stderr = %result.stderr.trim(),
                    "Engine produced no output file"
                );
                Err(MediaError::OutputMissing {
                    path: output.to_path_buf(),
                    command: command_line,
                    stderr: result.stderr,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .seek(10.0)
            .duration(30.0)
            .video_codec("libx264");

        let args = cmd.build_args();
        assert_eq!(args[0], "-y");
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input, "seek must precede the input");
        assert_eq!(args[ss + 1], "10.000");
        assert!(args.contains(&"libx264".to_string()));
        assert_eq!(args.last().unwrap(), "output.mp4");
    }

    #[test]
    fn test_multiple_inputs_keep_order() {
        let cmd = FfmpegCommand::new("video.mp4", "out.mp4")
            .add_input_with_args(["-loop", "1"], "logo.png")
            .filter_complex("[0:v][1:v]overlay");

        let args = cmd.build_args();
        let inputs: Vec<&String> = args
            .iter()
            .enumerate()
            .filter(|(i, _)| *i > 0 && args[i - 1] == "-i")
            .map(|(_, a)| a)
            .collect();
        assert_eq!(inputs, vec!["video.mp4", "logo.png"]);

        let loop_pos = args.iter().position(|a| a == "-loop").unwrap();
        let logo_pos = args.iter().position(|a| a == "logo.png").unwrap();
        assert!(loop_pos < logo_pos);
    }

    #[test]
    fn test_null_output() {
        let cmd = FfmpegCommand::null_output("https://cdn.example.com/a.mp4").log_level("info");
        let args = cmd.build_args();
        assert!(!args.contains(&"-y".to_string()));
        assert_eq!(&args[args.len() - 3..], ["-f", "null", "-"]);
        assert!(args.contains(&"info".to_string()));
    }

    #[test]
    fn test_command_line_quotes_spaces() {
        let cmd = FfmpegCommand::new("my video.mp4", "out.mp4");
        let line = cmd.command_line(Path::new("/usr/bin/ffmpeg"));
        assert!(line.starts_with("/usr/bin/ffmpeg -y"));
        assert!(line.contains("\"my video.mp4\""));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_to_file_requires_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("never.mp4");
        let cmd = FfmpegCommand::new("in.mp4", &output);

        // `true` exits 0 without writing anything
        let err = FfmpegRunner::new("true")
            .run_to_file(&cmd, &output)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::OutputMissing { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stale_output_does_not_count_as_success() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("preview.mp4");
        tokio::fs::write(&output, b"from an earlier run").await.unwrap();
        let cmd = FfmpegCommand::new("in.mp4", &output);

        // `false` exits 1 without writing anything
        let err = FfmpegRunner::new("false")
            .run_to_file(&cmd, &output)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::OutputMissing { .. }));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let err = FfmpegRunner::new("/nonexistent/engine/ffmpeg")
            .run_args(&["-version".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FfmpegFailed { .. }));
    }
}
