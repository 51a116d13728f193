//! FFmpeg-backed transcoder.
//!
//! Builds reproducible command lines (`-fflags +bitexact`, metadata
//! stripped, fixed sample rate) so the same inputs always produce the
//! same audio, and bounds every run with a per-operation timeout.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{MediaError, MediaResult, MediaTranscoder, TrackLabels};
use crate::config::MediaSettings;

/// Remux outputs smaller than this are treated as failed runs.
const MIN_PLAUSIBLE_OUTPUT_BYTES: u64 = 1000;

pub struct FfmpegTranscoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    sample_rate: u32,
    channels: u32,
    offset_epsilon_secs: f64,
    extract_timeout: Duration,
    apply_timeout: Duration,
    remux_timeout: Duration,
    probe_timeout: Duration,
}

impl FfmpegTranscoder {
    /// Resolves both binaries (configured path, or PATH discovery) and
    /// captures the transcode parameters.
    pub fn from_settings(settings: &MediaSettings) -> MediaResult<Self> {
        let ffmpeg = resolve_tool(&settings.ffmpeg_path, "ffmpeg")?;
        let ffprobe = resolve_tool(&settings.ffprobe_path, "ffprobe")?;
        tracing::debug!(
            ffmpeg = %ffmpeg.display(),
            ffprobe = %ffprobe.display(),
            "Resolved media tools"
        );
        Ok(Self {
            ffmpeg,
            ffprobe,
            sample_rate: settings.sample_rate,
            channels: settings.channels,
            offset_epsilon_secs: settings.offset_epsilon_secs,
            extract_timeout: Duration::from_secs(settings.extract_timeout_secs),
            apply_timeout: Duration::from_secs(settings.apply_timeout_secs),
            remux_timeout: Duration::from_secs(settings.remux_timeout_secs),
            probe_timeout: Duration::from_secs(settings.probe_timeout_secs),
        })
    }

    async fn run(
        &self,
        tool: &str,
        program: &Path,
        args: Vec<OsString>,
        timeout: Duration,
    ) -> MediaResult<std::process::Output> {
        tracing::debug!("Running {}: {}", tool, render_command(program, &args));

        let mut cmd = Command::new(program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| MediaError::timeout(tool, timeout.as_secs()))?
            .map_err(|e| MediaError::spawn(tool, e))?;

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::command_failed(
                tool,
                exit_code,
                stderr.trim().to_string(),
            ));
        }

        Ok(output)
    }
}

#[async_trait]
impl MediaTranscoder for FfmpegTranscoder {
    async fn extract_audio(&self, video: &Path, output: &Path) -> MediaResult<PathBuf> {
        ensure_parent_dir(output).await?;
        let args = extract_args(video, self.sample_rate, self.channels, output);
        self.run("ffmpeg", &self.ffmpeg, args, self.extract_timeout)
            .await?;
        require_output(output, 1).await?;
        tracing::info!(
            source = %video.display(),
            audio = %output.display(),
            "Extracted audio track"
        );
        Ok(output.to_path_buf())
    }

    async fn apply_offset(
        &self,
        audio: &Path,
        offset_seconds: f64,
        output: &Path,
    ) -> MediaResult<PathBuf> {
        ensure_parent_dir(output).await?;

        match plan_offset(offset_seconds, self.offset_epsilon_secs) {
            OffsetAction::CopyUnchanged => {
                tracing::info!(
                    offset = format!("{:+.3}s", offset_seconds),
                    "Offset below epsilon, copying audio unchanged"
                );
                tokio::fs::copy(audio, output)
                    .await
                    .map_err(|e| MediaError::io("copying audio", e))?;
            }
            OffsetAction::TrimLead(secs) => {
                tracing::info!(
                    offset = format!("{:+.3}s", offset_seconds),
                    "Dubbed track lags, trimming lead"
                );
                let args = trim_args(audio, secs, output);
                self.run("ffmpeg", &self.ffmpeg, args, self.apply_timeout)
                    .await?;
            }
            OffsetAction::PadLead(delay_ms) => {
                tracing::info!(
                    offset = format!("{:+.3}s", offset_seconds),
                    "Dubbed track leads, padding with silence"
                );
                let args = pad_args(audio, delay_ms, output);
                self.run("ffmpeg", &self.ffmpeg, args, self.apply_timeout)
                    .await?;
            }
        }

        require_output(output, 1).await?;
        Ok(output.to_path_buf())
    }

    async fn remux(
        &self,
        video: &Path,
        original_audio: &Path,
        synced_audio: &Path,
        output: &Path,
        labels: &TrackLabels,
    ) -> MediaResult<PathBuf> {
        ensure_parent_dir(output).await?;
        let args = remux_args(video, original_audio, synced_audio, labels, output);
        self.run("ffmpeg", &self.ffmpeg, args, self.remux_timeout)
            .await?;
        require_output(output, MIN_PLAUSIBLE_OUTPUT_BYTES).await?;
        tracing::info!(output = %output.display(), "Remux completed");
        Ok(output.to_path_buf())
    }

    async fn probe_duration(&self, media: &Path) -> MediaResult<f64> {
        let args = probe_args(media);
        let output = self
            .run("ffprobe", &self.ffprobe, args, self.probe_timeout)
            .await?;
        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }
}

fn resolve_tool(configured: &str, name: &str) -> MediaResult<PathBuf> {
    if !configured.trim().is_empty() {
        return Ok(PathBuf::from(configured));
    }
    which::which(name).map_err(|_| MediaError::tool_not_found(name))
}

async fn ensure_parent_dir(output: &Path) -> MediaResult<()> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| MediaError::io("creating output directory", e))?;
    }
    Ok(())
}

async fn require_output(path: &Path, min_bytes: u64) -> MediaResult<()> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| MediaError::io("reading output metadata", e))?;
    if meta.len() < min_bytes {
        return Err(MediaError::invalid_output(format!(
            "{} is only {} bytes",
            path.display(),
            meta.len()
        )));
    }
    Ok(())
}

fn render_command(program: &Path, args: &[OsString]) -> String {
    let mut parts = vec![program.display().to_string()];
    parts.extend(args.iter().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

#[derive(Debug, PartialEq)]
enum OffsetAction {
    CopyUnchanged,
    TrimLead(f64),
    PadLead(u64),
}

/// Picks how an offset is applied. Positive means the dubbed track
/// starts late relative to the original, so its lead is trimmed;
/// negative means it starts early, so silence is prepended.
fn plan_offset(offset_seconds: f64, epsilon_secs: f64) -> OffsetAction {
    if offset_seconds.abs() < epsilon_secs {
        OffsetAction::CopyUnchanged
    } else if offset_seconds > 0.0 {
        OffsetAction::TrimLead(offset_seconds)
    } else {
        OffsetAction::PadLead((-offset_seconds * 1000.0).round() as u64)
    }
}

fn extract_args(video: &Path, sample_rate: u32, channels: u32, output: &Path) -> Vec<OsString> {
    vec![
        "-i".into(),
        video.into(),
        "-vn".into(),
        "-acodec".into(),
        "pcm_s16le".into(),
        "-ar".into(),
        sample_rate.to_string().into(),
        "-ac".into(),
        channels.to_string().into(),
        "-map_metadata".into(),
        "-1".into(),
        "-fflags".into(),
        "+bitexact".into(),
        "-threads".into(),
        "0".into(),
        "-y".into(),
        output.into(),
    ]
}

fn trim_args(audio: &Path, offset_seconds: f64, output: &Path) -> Vec<OsString> {
    vec![
        "-ss".into(),
        format!("{:.3}", offset_seconds).into(),
        "-i".into(),
        audio.into(),
        "-threads".into(),
        "0".into(),
        "-y".into(),
        output.into(),
    ]
}

fn pad_args(audio: &Path, delay_ms: u64, output: &Path) -> Vec<OsString> {
    vec![
        "-i".into(),
        audio.into(),
        "-af".into(),
        format!("adelay={}|{}", delay_ms, delay_ms).into(),
        "-threads".into(),
        "0".into(),
        "-y".into(),
        output.into(),
    ]
}

fn remux_args(
    video: &Path,
    original_audio: &Path,
    synced_audio: &Path,
    labels: &TrackLabels,
    output: &Path,
) -> Vec<OsString> {
    vec![
        "-i".into(),
        video.into(),
        "-i".into(),
        original_audio.into(),
        "-i".into(),
        synced_audio.into(),
        "-map".into(),
        "0:v".into(),
        "-map".into(),
        "1:a".into(),
        "-map".into(),
        "2:a".into(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "192k".into(),
        "-metadata:s:a:0".into(),
        format!("title={}", labels.original_title).into(),
        "-metadata:s:a:0".into(),
        format!("language={}", labels.original_language).into(),
        "-metadata:s:a:1".into(),
        format!("title={}", labels.dubbed_title).into(),
        "-metadata:s:a:1".into(),
        format!("language={}", labels.dubbed_language).into(),
        "-threads".into(),
        "0".into(),
        "-y".into(),
        output.into(),
    ]
}

fn probe_args(media: &Path) -> Vec<OsString> {
    vec![
        "-v".into(),
        "quiet".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "default=noprint_wrappers=1:nokey=1".into(),
        media.into(),
    ]
}

fn parse_duration(stdout: &str) -> MediaResult<f64> {
    let trimmed = stdout.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| MediaError::parse("media duration", format!("not a number: {:?}", trimmed)))?;
    if !value.is_finite() || value < 0.0 {
        return Err(MediaError::parse(
            "media duration",
            format!("out of range: {}", value),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_to_strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn extract_args_are_reproducible() {
        let args = args_to_strings(&extract_args(
            Path::new("in.mkv"),
            16_000,
            1,
            Path::new("out.wav"),
        ));
        assert!(args.windows(2).any(|w| w == ["-fflags", "+bitexact"]));
        assert!(args.windows(2).any(|w| w == ["-ar", "16000"]));
        assert!(args.windows(2).any(|w| w == ["-map_metadata", "-1"]));
        assert!(args.contains(&"-vn".to_string()));
        assert_eq!(args.last(), Some(&"out.wav".to_string()));
    }

    #[test]
    fn positive_offset_trims_the_lead() {
        assert_eq!(plan_offset(2.0, 0.1), OffsetAction::TrimLead(2.0));

        let args = args_to_strings(&trim_args(Path::new("a.wav"), 2.0, Path::new("b.wav")));
        assert_eq!(&args[..2], &["-ss".to_string(), "2.000".to_string()]);
    }

    #[test]
    fn negative_offset_pads_with_silence() {
        assert_eq!(plan_offset(-1.5, 0.1), OffsetAction::PadLead(1500));

        let args = args_to_strings(&pad_args(Path::new("a.wav"), 1500, Path::new("b.wav")));
        assert!(args.windows(2).any(|w| w == ["-af", "adelay=1500|1500"]));
    }

    #[test]
    fn tiny_offset_copies_unchanged() {
        assert_eq!(plan_offset(0.05, 0.1), OffsetAction::CopyUnchanged);
        assert_eq!(plan_offset(-0.099, 0.1), OffsetAction::CopyUnchanged);
        assert_eq!(plan_offset(0.1, 0.1), OffsetAction::TrimLead(0.1));
    }

    #[test]
    fn remux_args_label_both_audio_streams() {
        let labels = TrackLabels::default();
        let args = args_to_strings(&remux_args(
            Path::new("video.mp4"),
            Path::new("orig.wav"),
            Path::new("synced.wav"),
            &labels,
            Path::new("out.mkv"),
        ));
        assert!(args.windows(2).any(|w| w == ["-map", "0:v"]));
        assert!(args.windows(2).any(|w| w == ["-map", "1:a"]));
        assert!(args.windows(2).any(|w| w == ["-map", "2:a"]));
        assert!(args.windows(2).any(|w| w == ["-c:v", "copy"]));
        assert!(args
            .windows(2)
            .any(|w| w == ["-metadata:s:a:0", "title=Original"]));
        assert!(args
            .windows(2)
            .any(|w| w == ["-metadata:s:a:1", "language=spa"]));
    }

    #[test]
    fn duration_parsing_rejects_garbage() {
        assert!((parse_duration("123.456\n").unwrap() - 123.456).abs() < 1e-9);
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("inf").is_err());
    }

    /// Transcoder with unresolvable tool paths. Only usable for code
    /// paths that never spawn a process.
    fn transcoder_without_tools() -> FfmpegTranscoder {
        let mut settings = MediaSettings::default();
        settings.ffmpeg_path = "/nonexistent/ffmpeg".to_string();
        settings.ffprobe_path = "/nonexistent/ffprobe".to_string();
        FfmpegTranscoder::from_settings(&settings).unwrap()
    }

    #[tokio::test]
    async fn epsilon_offset_copies_bytes_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.wav");
        let dst = dir.path().join("out.wav");
        tokio::fs::write(&src, b"RIFF fake wav payload").await.unwrap();

        let transcoder = transcoder_without_tools();
        transcoder.apply_offset(&src, 0.05, &dst).await.unwrap();

        assert_eq!(
            tokio::fs::read(&src).await.unwrap(),
            tokio::fs::read(&dst).await.unwrap()
        );
    }

    #[tokio::test]
    async fn undersized_outputs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.mkv");
        tokio::fs::write(&path, b"x").await.unwrap();

        assert!(matches!(
            require_output(&path, MIN_PLAUSIBLE_OUTPUT_BYTES).await,
            Err(MediaError::InvalidOutput(_))
        ));
        assert!(require_output(&path, 1).await.is_ok());
        assert!(require_output(&dir.path().join("absent.mkv"), 1).await.is_err());
    }
}
