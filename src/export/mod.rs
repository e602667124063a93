//! Media encoding module
//!
//! Turns the frames and mixed audio of a finished session into a single
//! media file at a constant frame rate.

pub mod ffmpeg;
pub mod types;

pub use ffmpeg::FfmpegEncoder;
pub use types::{EncodeJob, ExportError, ExportFormat, ExportQuality, MediaEncoder};
