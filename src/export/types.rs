//! Export types and configuration
//!
//! This module defines the output formats, quality levels, the encode job
//! handed to an encoder, and export errors.

use crate::recorder::frames::FrameSequence;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Mp4,
    Webm,
    Gif,
}

impl ExportFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "mp4",
            ExportFormat::Webm => "webm",
            ExportFormat::Gif => "gif",
        }
    }

    /// Get the FFmpeg video codec for this format
    pub fn video_codec(&self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "libx264",
            ExportFormat::Webm => "libvpx-vp9",
            ExportFormat::Gif => "gif",
        }
    }

    /// Get the FFmpeg audio codec, if the container carries audio
    pub fn audio_codec(&self) -> Option<&'static str> {
        match self {
            ExportFormat::Mp4 => Some("aac"),
            ExportFormat::Webm => Some("libopus"),
            ExportFormat::Gif => None,
        }
    }

    pub fn supports_audio(&self) -> bool {
        self.audio_codec().is_some()
    }

    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "mp4" => Some(ExportFormat::Mp4),
            "webm" => Some(ExportFormat::Webm),
            "gif" => Some(ExportFormat::Gif),
            _ => None,
        }
    }
}

/// Export quality levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportQuality {
    Low,
    #[default]
    Medium,
    High,
    Lossless,
}

impl ExportQuality {
    /// Get the CRF value for H.264/VP9 encoding
    /// Lower values = higher quality, larger files
    pub fn crf(&self) -> u8 {
        match self {
            ExportQuality::Low => 28,
            ExportQuality::Medium => 23,
            ExportQuality::High => 18,
            // CRF 0 has compatibility issues with scaling and yuv420p
            ExportQuality::Lossless => 1,
        }
    }

    /// Get the FFmpeg preset for H.264 encoding
    pub fn h264_preset(&self) -> &'static str {
        match self {
            ExportQuality::Low => "faster",
            ExportQuality::Medium => "medium",
            ExportQuality::High => "slow",
            ExportQuality::Lossless => "veryslow",
        }
    }
}

/// Everything needed to turn captured material into one media file
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub frames: FrameSequence,

    /// Rate the frames were captured at, and the output rate
    pub frame_rate: u32,

    /// Output height in pixels; width follows the aspect ratio
    pub target_height: u32,

    /// Mixed soundtrack, if any audio was captured
    pub audio: Option<PathBuf>,

    /// Delay of the soundtrack's first sample after the first frame
    pub audio_offset: Duration,

    pub output_path: PathBuf,
    pub format: ExportFormat,
    pub quality: ExportQuality,
    pub audio_bitrate_kbps: u32,
}

/// Produces the final media file from an [`EncodeJob`]
pub trait MediaEncoder: Send + Sync {
    /// Check the encoder can run at all, before any capture starts
    fn check_available(&self) -> Result<(), ExportError> {
        Ok(())
    }

    fn encode(&self, job: &EncodeJob) -> Result<(), ExportError>;
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    #[error("No frames to encode")]
    NoFrames,

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Encoding error: {0}")]
    Encoding(String),
}
