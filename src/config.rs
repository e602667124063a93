//! Capture configuration
//!
//! A [`CaptureConfig`] is built once per session, before `start`, and never
//! changes while the session runs. It can be loaded from a JSON file.

use crate::capture::audio::AudioSource;
use crate::capture::traits::CaptureRegion;
use crate::export::types::{ExportFormat, ExportQuality};
use crate::recorder::channel::{RecordingError, RecordingResult};
use crate::utils::error::{AppError, AppResult};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Highest accepted frame rate
pub const MAX_FRAME_RATE: u32 = 240;

fn default_frame_rate() -> u32 {
    30
}

fn default_target_height() -> u32 {
    1080
}

fn default_audio_bitrate() -> u32 {
    192
}

/// What to do when a session ends without a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmptyOutputPolicy {
    /// Write an empty file at the output path
    #[default]
    Placeholder,
    /// Report `EncodingFailed`
    Fail,
}

/// Configuration for one capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Screen rectangle to record, already resolved
    pub region: CaptureRegion,

    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Output height in pixels; width follows the region's aspect ratio
    #[serde(default = "default_target_height")]
    pub target_height: u32,

    #[serde(default)]
    pub record_system_audio: bool,

    #[serde(default)]
    pub record_microphone: bool,

    /// Where the finished file is written
    pub output_path: PathBuf,

    #[serde(default)]
    pub quality: ExportQuality,

    /// Container format; inferred from the output extension when absent
    #[serde(default)]
    pub format: Option<ExportFormat>,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate_kbps: u32,

    #[serde(default)]
    pub empty_output: EmptyOutputPolicy,

    /// Parent of the session temp directory; the OS temp dir when absent
    #[serde(default)]
    pub temp_root: Option<PathBuf>,
}

impl CaptureConfig {
    /// Config with defaults for everything but the region and output
    pub fn new(region: CaptureRegion, output_path: impl Into<PathBuf>) -> Self {
        Self {
            region,
            frame_rate: default_frame_rate(),
            target_height: default_target_height(),
            record_system_audio: false,
            record_microphone: false,
            output_path: output_path.into(),
            quality: ExportQuality::default(),
            format: None,
            audio_bitrate_kbps: default_audio_bitrate(),
            empty_output: EmptyOutputPolicy::default(),
            temp_root: None,
        }
    }

    /// Check the invariants a session relies on
    pub fn validate(&self) -> RecordingResult<()> {
        let invalid = |msg: String| Err(RecordingError::InvalidConfig(msg));

        if self.frame_rate == 0 || self.frame_rate > MAX_FRAME_RATE {
            return invalid(format!(
                "frame rate must be between 1 and {}, got {}",
                MAX_FRAME_RATE, self.frame_rate
            ));
        }
        if self.target_height == 0 {
            return invalid("target height must be positive".to_string());
        }
        if !self.region.is_valid() {
            return invalid(format!("capture region {} is empty", self.region));
        }
        if self.output_path.as_os_str().is_empty() || self.output_path.file_name().is_none() {
            return invalid("output path must name a file".to_string());
        }
        if self.audio_bitrate_kbps == 0 {
            return invalid("audio bitrate must be positive".to_string());
        }
        Ok(())
    }

    /// Container format for the output
    pub fn output_format(&self) -> ExportFormat {
        self.format
            .or_else(|| ExportFormat::from_path(&self.output_path))
            .unwrap_or_default()
    }

    /// Audio sources enabled by this config
    pub fn audio_sources(&self) -> Vec<AudioSource> {
        let mut sources = Vec::new();
        if self.record_system_audio {
            sources.push(AudioSource::System);
        }
        if self.record_microphone {
            sources.push(AudioSource::Microphone);
        }
        sources
    }

    pub fn temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Load a capture config from a JSON file
pub fn load_config(path: &Path) -> AppResult<CaptureConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: CaptureConfig = serde_json::from_str(&content)?;
    config
        .validate()
        .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

/// Timestamped file name in `dir`, e.g. `Recording_2024-01-31_14-05-09.mp4`
pub fn default_output_path(dir: &Path) -> PathBuf {
    output_path_at(dir, Local::now())
}

fn output_path_at(dir: &Path, at: DateTime<Local>) -> PathBuf {
    dir.join(format!("Recording_{}.mp4", at.format("%Y-%m-%d_%H-%M-%S")))
}
