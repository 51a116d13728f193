//! Settings struct with TOML-based sections.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigResult};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Transcoding settings.
    #[serde(default)]
    pub media: MediaSettings,

    /// Offset estimation settings.
    #[serde(default)]
    pub estimator: EstimatorSettings,

    /// External inference capability endpoints.
    #[serde(default)]
    pub capability: CapabilitySettings,

    /// Memory budget settings.
    #[serde(default)]
    pub resources: ResourceSettings,

    /// Task lifecycle settings.
    #[serde(default)]
    pub tasks: TaskSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            paths: PathSettings::default(),
            media: MediaSettings::default(),
            estimator: EstimatorSettings::default(),
            capability: CapabilitySettings::default(),
            resources: ResourceSettings::default(),
            tasks: TaskSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from a TOML file; errors when the file is missing.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings atomically: write to a temp file in the same
    /// directory, then rename over the target.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        let temp_path = path.with_extension("toml.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Create the work, output, and log directories if missing.
    pub fn ensure_dirs(&self) -> ConfigResult<()> {
        for dir in [
            &self.paths.work_dir,
            &self.paths.output_dir,
            &self.paths.logs_dir,
        ] {
            let path = PathBuf::from(dir);
            if !path.exists() {
                fs::create_dir_all(&path)?;
            }
        }
        Ok(())
    }
}

/// Directories for scratch files, results, and per-task logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Scratch root; each task gets a subdirectory under it.
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    /// Folder for final containers.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Folder for per-task log files.
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,
}

fn default_work_dir() -> String {
    "sync_work".to_string()
}

fn default_output_dir() -> String {
    "sync_output".to_string()
}

fn default_logs_dir() -> String {
    "sync_work/logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            output_dir: default_output_dir(),
            logs_dir: default_logs_dir(),
        }
    }
}

/// Transcoder configuration: binaries, audio normalization, timeouts,
/// and output track labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSettings {
    /// Explicit ffmpeg path; empty means discover on PATH.
    #[serde(default)]
    pub ffmpeg_path: String,

    /// Explicit ffprobe path; empty means discover on PATH.
    #[serde(default)]
    pub ffprobe_path: String,

    /// Sample rate for extracted audio.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Channel count for extracted audio.
    #[serde(default = "default_channels")]
    pub channels: u32,

    /// Offsets below this magnitude are applied as a plain copy.
    #[serde(default = "default_offset_epsilon")]
    pub offset_epsilon_secs: f64,

    /// Wall-clock limit for one extraction run.
    #[serde(default = "default_extract_timeout")]
    pub extract_timeout_secs: u64,

    /// Wall-clock limit for one offset application run.
    #[serde(default = "default_apply_timeout")]
    pub apply_timeout_secs: u64,

    /// Wall-clock limit for the final remux.
    #[serde(default = "default_remux_timeout")]
    pub remux_timeout_secs: u64,

    /// Wall-clock limit for a duration probe.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Title metadata for the reference audio track.
    #[serde(default = "default_original_title")]
    pub original_track_title: String,

    /// Language tag for the reference audio track.
    #[serde(default = "default_original_language")]
    pub original_track_language: String,

    /// Title metadata for the dubbed audio track.
    #[serde(default = "default_dubbed_title")]
    pub dubbed_track_title: String,

    /// Language tag for the dubbed audio track.
    #[serde(default = "default_dubbed_language")]
    pub dubbed_track_language: String,
}

fn default_sample_rate() -> u32 {
    16_000
}

fn default_channels() -> u32 {
    1
}

fn default_offset_epsilon() -> f64 {
    0.1
}

fn default_extract_timeout() -> u64 {
    1800
}

fn default_apply_timeout() -> u64 {
    600
}

fn default_remux_timeout() -> u64 {
    3600
}

fn default_probe_timeout() -> u64 {
    60
}

fn default_original_title() -> String {
    "Original".to_string()
}

fn default_original_language() -> String {
    "eng".to_string()
}

fn default_dubbed_title() -> String {
    "Dubbed".to_string()
}

fn default_dubbed_language() -> String {
    "spa".to_string()
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: String::new(),
            ffprobe_path: String::new(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            offset_epsilon_secs: default_offset_epsilon(),
            extract_timeout_secs: default_extract_timeout(),
            apply_timeout_secs: default_apply_timeout(),
            remux_timeout_secs: default_remux_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            original_track_title: default_original_title(),
            original_track_language: default_original_language(),
            dubbed_track_title: default_dubbed_title(),
            dubbed_track_language: default_dubbed_language(),
        }
    }
}

/// Offset estimation tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorSettings {
    /// Minimum cosine similarity for a semantic match.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Maximum segments embedded per track.
    #[serde(default = "default_max_segments")]
    pub max_segments: usize,

    /// Texts per embedding request.
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    /// Semantic candidates beyond this magnitude fall back to the
    /// statistical method.
    #[serde(default = "default_max_semantic_offset")]
    pub max_semantic_offset_secs: f64,

    /// Position-matched deltas sampled from the head of both tracks.
    #[serde(default = "default_base_sample_size")]
    pub base_sample_size: usize,

    /// Sample size used after the variation ceiling trips.
    #[serde(default = "default_widened_sample_size")]
    pub widened_sample_size: usize,

    /// Standard-deviation ceiling that triggers the wider sample.
    #[serde(default = "default_delta_std_dev_ceiling")]
    pub delta_std_dev_ceiling_secs: f64,
}

fn default_similarity_threshold() -> f64 {
    0.6
}

fn default_max_segments() -> usize {
    20
}

fn default_embed_batch_size() -> usize {
    5
}

fn default_max_semantic_offset() -> f64 {
    60.0
}

fn default_base_sample_size() -> usize {
    10
}

fn default_widened_sample_size() -> usize {
    30
}

fn default_delta_std_dev_ceiling() -> f64 {
    5.0
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_segments: default_max_segments(),
            embed_batch_size: default_embed_batch_size(),
            max_semantic_offset_secs: default_max_semantic_offset(),
            base_sample_size: default_base_sample_size(),
            widened_sample_size: default_widened_sample_size(),
            delta_std_dev_ceiling_secs: default_delta_std_dev_ceiling(),
        }
    }
}

/// External inference endpoints. Empty URLs leave the capability
/// unconfigured and the pipeline on its fallback path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySettings {
    /// Base URL of a Whisper-compatible transcription API.
    #[serde(default)]
    pub transcription_url: String,

    /// Transcription model name.
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    /// Base URL of an OpenAI-compatible embeddings API.
    #[serde(default)]
    pub embedding_url: String,

    /// Embedding model name.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Bearer token sent to both endpoints; empty means none.
    #[serde(default)]
    pub api_key: String,

    /// Per-request wall-clock limit.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_request_timeout() -> u64 {
    300
}

impl Default for CapabilitySettings {
    fn default() -> Self {
        Self {
            transcription_url: String::new(),
            transcription_model: default_transcription_model(),
            embedding_url: String::new(),
            embedding_model: default_embedding_model(),
            api_key: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Memory budget for heavy capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSettings {
    /// Fraction of total memory above which capabilities are withheld.
    #[serde(default = "default_memory_ceiling")]
    pub memory_ceiling: f64,
}

fn default_memory_ceiling() -> f64 {
    0.85
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            memory_ceiling: default_memory_ceiling(),
        }
    }
}

/// Task lifecycle: validation limits, retention, artifact handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSettings {
    /// Hours a terminal task stays queryable before eviction.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,

    /// Minutes between retention sweeps.
    #[serde(default = "default_sweep_interval_minutes")]
    pub sweep_interval_minutes: u64,

    /// Delete result files when their task is evicted.
    #[serde(default = "default_true")]
    pub auto_cleanup_results: bool,

    /// Keep cleaned transcripts under the work directory for inspection.
    #[serde(default)]
    pub preserve_debug_artifacts: bool,

    /// Largest accepted input file.
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: u64,

    /// Accepted input container extensions (lowercase, no dot).
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_retention_hours() -> u64 {
    24
}

fn default_sweep_interval_minutes() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_max_input_bytes() -> u64 {
    20 * 1024 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    ["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            retention_hours: default_retention_hours(),
            sweep_interval_minutes: default_sweep_interval_minutes(),
            auto_cleanup_results: true,
            preserve_debug_artifacts: false,
            max_input_bytes: default_max_input_bytes(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.media.sample_rate, 16_000);
        assert_eq!(settings.media.channels, 1);
        assert!((settings.media.offset_epsilon_secs - 0.1).abs() < f64::EPSILON);
        assert!((settings.estimator.similarity_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(settings.estimator.max_segments, 20);
        assert!((settings.resources.memory_ceiling - 0.85).abs() < f64::EPSILON);
        assert_eq!(settings.tasks.retention_hours, 24);
        assert!(settings.tasks.allowed_extensions.contains(&"mkv".to_string()));
    }

    #[test]
    fn load_or_default_tolerates_missing_file() {
        let dir = tempdir().unwrap();
        let settings = Settings::load_or_default(dir.path().join("nope.toml")).unwrap();
        assert_eq!(settings.estimator.embed_batch_size, 5);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[estimator]\nsimilarity_threshold = 0.75\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert!((settings.estimator.similarity_threshold - 0.75).abs() < f64::EPSILON);
        assert_eq!(settings.estimator.max_segments, 20);
        assert_eq!(settings.media.sample_rate, 16_000);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.tasks.retention_hours = 6;
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.tasks.retention_hours, 6);

        let temp_path = path.with_extension("toml.tmp");
        assert!(!temp_path.exists());
    }
}
