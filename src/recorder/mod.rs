//! Recording system module
//!
//! This module implements the capture pipeline:
//! - RecordingChannel trait for the display and audio sources
//! - Paced video capture and per-source audio capture
//! - Audio mixing of the finished tracks
//! - CaptureSession to orchestrate a recording from start to output file

pub mod audio;
pub mod channel;
pub mod coordinator;
pub mod frames;
pub mod mixer;
pub mod state;
pub mod video;

#[cfg(test)]
pub(crate) mod testing;

pub use audio::{AudioCaptureLoop, PcmTrack};
pub use channel::{RecordingChannel, RecordingError, RecordingResult};
pub use coordinator::{CaptureSession, RecordingEvent, StatusProbe};
pub use state::{RecordingOutput, SessionState, SessionStatus};
pub use video::VideoCaptureLoop;
