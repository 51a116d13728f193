//! End-to-end pipeline runs against a real ffmpeg install.
//!
//! Each test renders tiny synthetic clips with lavfi sources, then
//! drives the full orchestrator with the real transcoder and no
//! inference capabilities, so the estimate comes from the duration
//! gap. All tests skip when ffmpeg/ffprobe are not on PATH.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use dubsync_core::capability::ResourceManager;
use dubsync_core::config::Settings;
use dubsync_core::media::FfmpegTranscoder;
use dubsync_core::models::TaskStatus;
use dubsync_core::{SyncRequest, TaskOrchestrator};

fn tools_available() -> bool {
    which::which("ffmpeg").is_ok() && which::which("ffprobe").is_ok()
}

/// Renders a `testsrc` clip with a sine tone. Returns false when this
/// ffmpeg build cannot generate it.
fn generate_clip(path: &Path, seconds: u32, tone_hz: u32) -> bool {
    let video_source = format!("testsrc=duration={seconds}:size=128x72:rate=10");
    let audio_source = format!("sine=frequency={tone_hz}:duration={seconds}");
    let output = Command::new("ffmpeg")
        .args(["-f", "lavfi", "-i", &video_source])
        .args(["-f", "lavfi", "-i", &audio_source])
        .args(["-c:v", "mpeg4", "-c:a", "pcm_s16le", "-shortest", "-y"])
        .arg(path)
        .output();
    match output {
        Ok(out) if out.status.success() => true,
        Ok(out) => {
            eprintln!(
                "skipping: clip generation failed: {}",
                String::from_utf8_lossy(&out.stderr)
            );
            false
        }
        Err(e) => {
            eprintln!("skipping: could not run ffmpeg: {e}");
            false
        }
    }
}

fn audio_stream_count(path: &Path) -> usize {
    let out = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
        .arg(path)
        .output()
        .expect("run ffprobe");
    let parsed: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("parse ffprobe json");
    parsed["streams"]
        .as_array()
        .map(|streams| {
            streams
                .iter()
                .filter(|s| s["codec_type"] == "audio")
                .count()
        })
        .unwrap_or(0)
}

fn test_settings(root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.paths.work_dir = root.join("work").to_string_lossy().into_owned();
    settings.paths.output_dir = root.join("out").to_string_lossy().into_owned();
    settings.paths.logs_dir = root.join("logs").to_string_lossy().into_owned();
    settings
}

fn computed_offset(orchestrator: &TaskOrchestrator, task_id: &str) -> f64 {
    orchestrator
        .list_tasks()
        .into_iter()
        .find(|task| task.id == task_id)
        .and_then(|task| task.computed_offset)
        .expect("terminal task records its offset")
}

async fn run_to_terminal(
    settings: Settings,
    original: &Path,
    dubbed: &Path,
) -> (TaskOrchestrator, String, TaskStatus) {
    settings.ensure_dirs().expect("create test directories");
    let transcoder = FfmpegTranscoder::from_settings(&settings.media).expect("tools present");
    let resources = ResourceManager::new(settings.resources.memory_ceiling);
    let orchestrator =
        TaskOrchestrator::new(settings, Arc::new(transcoder), Arc::new(resources));

    let task_id = orchestrator.submit(SyncRequest::new(original, dubbed));
    for _ in 0..1200 {
        let report = orchestrator
            .get_status(&task_id)
            .expect("submitted task should stay queryable");
        if report.status.is_terminal() {
            if report.status == TaskStatus::Error {
                eprintln!("task error: {:?}", report.error);
            }
            return (orchestrator, task_id, report.status);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("pipeline did not settle in time");
}

#[tokio::test]
async fn duration_gap_is_halved_and_remuxed() {
    if !tools_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let original = dir.path().join("original.mkv");
    let dubbed = dir.path().join("dubbed.mkv");
    if !generate_clip(&original, 6, 440) || !generate_clip(&dubbed, 8, 330) {
        return;
    }

    let (orchestrator, task_id, status) =
        run_to_terminal(test_settings(dir.path()), &original, &dubbed).await;
    assert_eq!(status, TaskStatus::Completed);

    let offset = computed_offset(&orchestrator, &task_id);
    assert!(
        (offset - 1.0).abs() < 0.2,
        "expected roughly +1.0s, got {offset}"
    );

    let result: PathBuf = orchestrator.get_result_path(&task_id).unwrap();
    assert!(result.exists());
    assert!(std::fs::metadata(&result).unwrap().len() > 1000);
    assert_eq!(audio_stream_count(&result), 2);
}

#[tokio::test]
async fn equal_durations_copy_the_track_unchanged() {
    if !tools_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let original = dir.path().join("original.mkv");
    let dubbed = dir.path().join("dubbed.mkv");
    if !generate_clip(&original, 5, 440) || !generate_clip(&dubbed, 5, 330) {
        return;
    }

    let (orchestrator, task_id, status) =
        run_to_terminal(test_settings(dir.path()), &original, &dubbed).await;
    assert_eq!(status, TaskStatus::Completed);

    let offset = computed_offset(&orchestrator, &task_id);
    assert!(offset.abs() < 0.05, "expected near-zero offset, got {offset}");

    let result = orchestrator.get_result_path(&task_id).unwrap();
    assert_eq!(audio_stream_count(&result), 2);
}

#[tokio::test]
async fn shorter_dub_gets_a_padded_lead() {
    if !tools_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let original = dir.path().join("original.mkv");
    let dubbed = dir.path().join("dubbed.mkv");
    if !generate_clip(&original, 8, 440) || !generate_clip(&dubbed, 6, 330) {
        return;
    }

    let (orchestrator, task_id, status) =
        run_to_terminal(test_settings(dir.path()), &original, &dubbed).await;
    assert_eq!(status, TaskStatus::Completed);

    let offset = computed_offset(&orchestrator, &task_id);
    assert!(
        (offset + 1.0).abs() < 0.2,
        "expected roughly -1.0s, got {offset}"
    );

    let result = orchestrator.get_result_path(&task_id).unwrap();
    assert_eq!(audio_stream_count(&result), 2);
}
