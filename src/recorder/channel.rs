//! Recording channel abstraction
//!
//! A channel is one capture source (the display or an audio device) that
//! writes raw material into the session's working directory.

use crate::capture::audio::AudioSource;
use crate::capture::traits::CaptureError;
use crate::export::types::ExportError;
use crate::recorder::audio::PcmTrack;
use crate::recorder::frames::FrameSequence;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Errors that can occur during recording
#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("A recording is already in progress")]
    AlreadyRunning,

    #[error("No recording in progress")]
    NotRunning,

    #[error("Screen capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("{input} audio device unavailable: {reason}")]
    DeviceUnavailable { input: AudioSource, reason: String },

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Failed to start recording: {0}")]
    SessionStartFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CaptureError> for RecordingError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::CaptureUnavailable(reason) => RecordingError::CaptureUnavailable(reason),
        }
    }
}

impl From<ExportError> for RecordingError {
    fn from(err: ExportError) -> Self {
        RecordingError::EncodingFailed(err.to_string())
    }
}

pub type RecordingResult<T> = Result<T, RecordingError>;

/// Type of recording channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    Display,
    SystemAudio,
    Microphone,
}

impl From<AudioSource> for ChannelType {
    fn from(source: AudioSource) -> Self {
        match source {
            AudioSource::System => ChannelType::SystemAudio,
            AudioSource::Microphone => ChannelType::Microphone,
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Display => write!(f, "display"),
            ChannelType::SystemAudio => write!(f, "system-audio"),
            ChannelType::Microphone => write!(f, "microphone"),
        }
    }
}

/// Pause flag shared by every channel of a session.
///
/// Channels keep their devices open while paused and discard what arrives,
/// so flipping this one flag pauses all of them at once.
#[derive(Debug, Clone, Default)]
pub struct PauseFlag(Arc<AtomicBool>);

impl PauseFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, paused: bool) {
        self.0.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a channel needs from its session
#[derive(Debug, Clone)]
pub struct ChannelContext {
    /// Session temp directory; channels write only below it
    pub work_dir: PathBuf,
    pub pause: PauseFlag,
    /// Session start, used to align audio tracks
    pub epoch: Instant,
}

impl ChannelContext {
    pub fn new(work_dir: impl Into<PathBuf>, pause: PauseFlag) -> Self {
        Self {
            work_dir: work_dir.into(),
            pause,
            epoch: Instant::now(),
        }
    }
}

/// Raw material a channel leaves behind when stopped
#[derive(Debug)]
pub enum ChannelOutput {
    Frames(FrameSequence),
    Pcm(PcmTrack),
    /// Nothing was captured
    None,
}

/// Trait for recording channels
#[async_trait]
pub trait RecordingChannel: Send {
    /// Get the channel identifier
    fn id(&self) -> &str;

    /// Get the channel type
    fn channel_type(&self) -> ChannelType;

    /// Open the source and begin writing below `ctx.work_dir`
    async fn start(&mut self, ctx: &ChannelContext) -> RecordingResult<()>;

    /// Stop capturing and hand back what was written
    async fn stop(&mut self) -> RecordingResult<ChannelOutput>;

    /// Check if channel is currently recording
    fn is_recording(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_flag_shared() {
        let flag = PauseFlag::new();
        let other = flag.clone();
        assert!(!other.is_paused());
        flag.set(true);
        assert!(other.is_paused());
    }

    #[test]
    fn test_error_messages() {
        let err = RecordingError::DeviceUnavailable {
            input: AudioSource::Microphone,
            reason: "no device".to_string(),
        };
        assert_eq!(err.to_string(), "microphone audio device unavailable: no device");

        let err: RecordingError = CaptureError::unavailable("window closed").into();
        assert!(matches!(err, RecordingError::CaptureUnavailable(_)));
    }

    #[test]
    fn test_channel_type_from_source() {
        assert_eq!(ChannelType::from(AudioSource::System), ChannelType::SystemAudio);
        assert_eq!(ChannelType::from(AudioSource::Microphone).to_string(), "microphone");
    }
}
