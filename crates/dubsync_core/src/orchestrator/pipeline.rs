//! The per-task pipeline: verify, extract, transcribe, estimate,
//! apply, remux.
//!
//! Progress lands on fixed checkpoints so pollers see the same stages
//! for every task. Stages that depend on an external capability
//! degrade instead of failing; everything else propagates to the task
//! boundary.

use std::path::{Path, PathBuf};

use super::table::TaskTable;
use super::{Inner, SyncRequest};
use crate::capability::TranscriptionClient;
use crate::config::TaskSettings;
use crate::error::{SyncError, SyncResult};
use crate::logging::TaskLogger;
use crate::media::{MediaTranscoder, TrackLabels};
use crate::models::Segment;
use crate::transcript;

const PROGRESS_VERIFY: u8 = 5;
const PROGRESS_EXTRACT_ORIGINAL: u8 = 15;
const PROGRESS_EXTRACT_DUBBED: u8 = 25;
const PROGRESS_CAPABILITIES: u8 = 35;
const PROGRESS_TRANSCRIBE_ORIGINAL: u8 = 45;
const PROGRESS_TRANSCRIBE_DUBBED: u8 = 60;
const PROGRESS_ESTIMATE: u8 = 75;
const PROGRESS_APPLY: u8 = 85;
const PROGRESS_REMUX: u8 = 95;

/// Worker-side view of one task. All table mutation goes through
/// here, never through the map itself.
pub(super) struct TaskHandle<'a> {
    table: &'a TaskTable,
    id: &'a str,
}

impl<'a> TaskHandle<'a> {
    pub(super) fn new(table: &'a TaskTable, id: &'a str) -> Self {
        Self { table, id }
    }

    pub(super) fn id(&self) -> &str {
        self.id
    }

    fn progress(&self, value: u8, message: &str) {
        self.table.set_progress(self.id, value, message);
    }

    fn artifact(&self, path: PathBuf) {
        self.table.record_artifact(self.id, path);
    }

    fn offset(&self, value: f64) {
        self.table.set_computed_offset(self.id, value);
    }
}

/// Runs every stage for one task and returns the result path. The
/// caller owns the terminal status transition and cleanup.
pub(super) async fn run_sync(
    inner: &Inner,
    request: &SyncRequest,
    handle: &TaskHandle<'_>,
    logger: &TaskLogger,
) -> SyncResult<PathBuf> {
    let settings = &inner.settings;
    let task_id = handle.id();

    handle.progress(PROGRESS_VERIFY, "Verifying input files");
    logger.phase("Verify inputs");
    validate_input(&request.original_path, &settings.tasks)?;
    validate_input(&request.dubbed_path, &settings.tasks)?;

    let task_dir = Path::new(&settings.paths.work_dir).join(task_id);
    tokio::fs::create_dir_all(&task_dir).await.map_err(|e| {
        SyncError::internal(format!(
            "failed to create work directory {}: {}",
            task_dir.display(),
            e
        ))
    })?;

    handle.progress(PROGRESS_EXTRACT_ORIGINAL, "Extracting original audio");
    logger.phase("Extract original audio");
    let original_audio = task_dir.join("original_audio.wav");
    inner
        .transcoder
        .extract_audio(&request.original_path, &original_audio)
        .await
        .map_err(SyncError::extraction)?;
    handle.artifact(original_audio.clone());

    handle.progress(PROGRESS_EXTRACT_DUBBED, "Extracting dubbed audio");
    logger.phase("Extract dubbed audio");
    let dubbed_audio = task_dir.join("dubbed_audio.wav");
    inner
        .transcoder
        .extract_audio(&request.dubbed_path, &dubbed_audio)
        .await
        .map_err(SyncError::extraction)?;
    handle.artifact(dubbed_audio.clone());

    let durations =
        probe_durations(inner.transcoder.as_ref(), &original_audio, &dubbed_audio, logger).await;

    handle.progress(PROGRESS_CAPABILITIES, "Preparing capabilities");
    logger.phase("Prepare capabilities");
    let transcription = inner.resources.transcription();
    if transcription.is_none() {
        logger.warn("Transcription capability unavailable, continuing without transcripts");
        tracing::warn!(
            task_id = %task_id,
            "Transcription capability unavailable, continuing without transcripts"
        );
    }

    let (original_segments, dubbed_segments) = match transcription {
        Some(client) => {
            handle.progress(PROGRESS_TRANSCRIBE_ORIGINAL, "Transcribing original audio");
            logger.phase("Transcribe original audio");
            let original_segments =
                transcribe_track(client.as_ref(), &original_audio, logger).await;

            handle.progress(PROGRESS_TRANSCRIBE_DUBBED, "Transcribing dubbed audio");
            logger.phase("Transcribe dubbed audio");
            let dubbed_segments = transcribe_track(client.as_ref(), &dubbed_audio, logger).await;

            (original_segments, dubbed_segments)
        }
        None => (Vec::new(), Vec::new()),
    };

    if settings.tasks.preserve_debug_artifacts {
        write_debug_transcripts(
            &settings.paths.work_dir,
            task_id,
            &original_segments,
            &dubbed_segments,
            logger,
        )
        .await;
    }

    handle.progress(PROGRESS_ESTIMATE, "Estimating offset");
    logger.phase("Estimate offset");
    let embedder = inner.resources.embedding();
    let estimate = inner
        .estimator
        .estimate(
            &original_segments,
            &dubbed_segments,
            durations,
            embedder.as_deref(),
        )
        .await;
    handle.offset(estimate.offset);
    logger.info(&format!("Estimated offset {}", estimate));
    tracing::info!(task_id = %task_id, %estimate, "Offset estimated");

    handle.progress(PROGRESS_APPLY, "Applying offset");
    logger.phase("Apply offset");
    let synced_audio = task_dir.join("synced_audio.wav");
    inner
        .transcoder
        .apply_offset(&dubbed_audio, estimate.offset, &synced_audio)
        .await
        .map_err(SyncError::sync_application)?;
    handle.artifact(synced_audio.clone());

    handle.progress(PROGRESS_REMUX, "Remuxing final output");
    logger.phase("Remux");
    let output_name = request
        .output_name
        .as_deref()
        .and_then(sanitize_output_name)
        .unwrap_or_else(|| format!("synced_{}.mkv", task_id));
    let output_path = Path::new(&settings.paths.output_dir).join(output_name);
    let labels = TrackLabels {
        original_title: settings.media.original_track_title.clone(),
        original_language: settings.media.original_track_language.clone(),
        dubbed_title: settings.media.dubbed_track_title.clone(),
        dubbed_language: settings.media.dubbed_track_language.clone(),
    };
    inner
        .transcoder
        .remux(
            &request.original_path,
            &original_audio,
            &synced_audio,
            &output_path,
            &labels,
        )
        .await
        .map_err(SyncError::remux)?;

    Ok(output_path)
}

fn validate_input(path: &Path, limits: &TaskSettings) -> SyncResult<()> {
    let meta = std::fs::metadata(path)
        .map_err(|_| SyncError::input_not_found(path.display().to_string()))?;
    if !meta.is_file() {
        return Err(SyncError::input_not_found(path.display().to_string()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !limits.allowed_extensions.iter().any(|a| *a == extension) {
        return Err(SyncError::input_not_allowed(format!(
            "unsupported extension {:?} for {}",
            extension,
            path.display()
        )));
    }

    if meta.len() > limits.max_input_bytes {
        return Err(SyncError::input_not_allowed(format!(
            "{} is {} bytes, over the {} byte limit",
            path.display(),
            meta.len(),
            limits.max_input_bytes
        )));
    }
    Ok(())
}

async fn transcribe_track(
    client: &dyn TranscriptionClient,
    audio: &Path,
    logger: &TaskLogger,
) -> Vec<Segment> {
    match client.transcribe(audio).await {
        Ok(raw) => {
            let cleaned = transcript::clean_segments(&raw);
            logger.info(&format!(
                "Transcribed {} segments, {} usable after cleaning",
                raw.len(),
                cleaned.len()
            ));
            cleaned
        }
        Err(e) => {
            logger.warn(&format!("Transcription failed: {}", e));
            tracing::warn!(
                error = %e,
                audio = %audio.display(),
                "Transcription failed, continuing without segments"
            );
            Vec::new()
        }
    }
}

async fn probe_durations(
    transcoder: &dyn MediaTranscoder,
    original_audio: &Path,
    dubbed_audio: &Path,
    logger: &TaskLogger,
) -> Option<(f64, f64)> {
    let original = probe_one(transcoder, original_audio, logger).await;
    let dubbed = probe_one(transcoder, dubbed_audio, logger).await;
    match (original, dubbed) {
        (Some(o), Some(d)) => Some((o, d)),
        _ => None,
    }
}

async fn probe_one(
    transcoder: &dyn MediaTranscoder,
    path: &Path,
    logger: &TaskLogger,
) -> Option<f64> {
    match transcoder.probe_duration(path).await {
        Ok(secs) => Some(secs),
        Err(e) => {
            logger.warn(&format!("Duration probe failed for {}: {}", path.display(), e));
            None
        }
    }
}

async fn write_debug_transcripts(
    work_dir: &str,
    task_id: &str,
    original: &[Segment],
    dubbed: &[Segment],
    logger: &TaskLogger,
) {
    let debug_dir = Path::new(work_dir).join("debug").join(task_id);
    if let Err(e) = tokio::fs::create_dir_all(&debug_dir).await {
        logger.warn(&format!("Could not create debug directory: {}", e));
        return;
    }

    for (name, segments) in [("original.json", original), ("dubbed.json", dubbed)] {
        match serde_json::to_vec_pretty(segments) {
            Ok(json) => {
                if let Err(e) = tokio::fs::write(debug_dir.join(name), json).await {
                    logger.warn(&format!("Could not write {}: {}", name, e));
                }
            }
            Err(e) => logger.warn(&format!("Could not serialize {}: {}", name, e)),
        }
    }
    logger.info(&format!(
        "Debug transcripts written to {}",
        debug_dir.display()
    ));
}

/// Strips directories, control characters, and oversize tails from a
/// requested output name, then guarantees an `.mkv` extension.
/// Returns `None` when nothing usable remains.
fn sanitize_output_name(requested: &str) -> Option<String> {
    const MAX_NAME_CHARS: usize = 128;

    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return None;
    }
    let base = Path::new(trimmed).file_name()?.to_string_lossy().into_owned();
    let filtered: String = base
        .chars()
        .filter(|c| !c.is_control() && *c != '/' && *c != '\\')
        .take(MAX_NAME_CHARS)
        .collect();
    let name = filtered.trim().trim_matches('.');
    if name.is_empty() {
        return None;
    }

    if name.to_ascii_lowercase().ends_with(".mkv") {
        Some(name.to_string())
    } else {
        Some(format!("{}.mkv", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_are_sanitized() {
        assert_eq!(sanitize_output_name("movie"), Some("movie.mkv".to_string()));
        assert_eq!(
            sanitize_output_name("  movie.mkv  "),
            Some("movie.mkv".to_string())
        );
        assert_eq!(
            sanitize_output_name("/tmp/../etc/passwd"),
            Some("passwd.mkv".to_string())
        );
        assert_eq!(
            sanitize_output_name("show.s01e01"),
            Some("show.s01e01.mkv".to_string())
        );
        assert_eq!(sanitize_output_name(""), None);
        assert_eq!(sanitize_output_name("   "), None);
        assert_eq!(sanitize_output_name(".."), None);
        assert_eq!(sanitize_output_name("..."), None);
    }

    #[test]
    fn oversize_names_are_capped() {
        let long = "x".repeat(400);
        let name = sanitize_output_name(&long).unwrap();
        assert!(name.len() <= 128 + ".mkv".len());
        assert!(name.ends_with(".mkv"));
    }

    #[test]
    fn validation_rejects_missing_wrong_and_oversized_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let limits = TaskSettings::default();

        let missing = dir.path().join("nope.mkv");
        assert!(matches!(
            validate_input(&missing, &limits),
            Err(SyncError::InputNotFound { .. })
        ));

        let wrong_ext = dir.path().join("notes.txt");
        std::fs::write(&wrong_ext, b"hello").unwrap();
        assert!(matches!(
            validate_input(&wrong_ext, &limits),
            Err(SyncError::InputNotAllowed { .. })
        ));

        let good = dir.path().join("clip.mkv");
        std::fs::write(&good, b"fake video bytes").unwrap();
        assert!(validate_input(&good, &limits).is_ok());

        let mut tight = TaskSettings::default();
        tight.max_input_bytes = 4;
        assert!(matches!(
            validate_input(&good, &tight),
            Err(SyncError::InputNotAllowed { .. })
        ));

        // A directory is not an input file.
        assert!(matches!(
            validate_input(dir.path(), &limits),
            Err(SyncError::InputNotFound { .. })
        ));
    }
}
