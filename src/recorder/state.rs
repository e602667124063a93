//! Recording state management
//!
//! Defines the session state machine, segment tracking, and the values
//! reported to callers.

use crate::capture::audio::AudioSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No recording in progress
    #[default]
    Idle,
    /// Currently recording
    Recording,
    /// Recording is paused; devices stay open
    Paused,
    /// Capture has ended and the output is being produced
    Stopping,
    /// Output finished
    Stopped,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Recording | SessionState::Paused)
    }
}

/// One uninterrupted stretch of recording
///
/// A new segment starts each time the session is resumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSegment {
    /// Segment index (0, 1, 2, ...)
    pub index: usize,

    /// Duration of this segment in milliseconds
    pub duration_ms: f64,

    /// Session time when the segment started
    pub process_time_start_ms: f64,

    /// Session time when the segment ended
    pub process_time_end_ms: f64,

    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RecordingSegment {
    /// Create a new segment starting now
    pub fn new(index: usize, process_time_ms: f64) -> Self {
        Self {
            index,
            duration_ms: 0.0,
            process_time_start_ms: process_time_ms,
            process_time_end_ms: process_time_ms,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// End the segment
    pub fn end(&mut self, process_time_ms: f64) {
        self.process_time_end_ms = process_time_ms;
        self.duration_ms = self.process_time_end_ms - self.process_time_start_ms;
        self.ended_at = Some(Utc::now());
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Total recorded time across segments, counting an open segment up to `now_ms`
pub fn recorded_ms(segments: &[RecordingSegment], now_ms: f64) -> f64 {
    segments
        .iter()
        .map(|s| {
            if s.is_open() {
                (now_ms - s.process_time_start_ms).max(0.0)
            } else {
                s.duration_ms
            }
        })
        .sum()
}

/// Snapshot of a session for progress display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: SessionState,

    /// Recorded time, excluding pauses
    pub elapsed_ms: u64,

    /// Bytes written so far
    pub current_file_size_bytes: u64,

    pub frames_captured: u64,
}

/// An audio source that could not be recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailableSource {
    pub input: AudioSource,
    pub reason: String,
}

/// Result of a completed recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingOutput {
    /// Path to the finished media file
    pub output_path: String,

    /// Total duration in milliseconds, excluding pauses
    pub total_duration_ms: f64,

    /// Number of segments
    pub segment_count: usize,

    pub frame_count: u64,

    pub has_audio: bool,

    /// Audio sources that were requested but could not be opened
    pub unavailable_sources: Vec<UnavailableSource>,

    /// True when no frames were captured and an empty placeholder was written
    pub placeholder: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_ms_skips_gaps() {
        let mut first = RecordingSegment::new(0, 0.0);
        first.end(1000.0);
        let second = RecordingSegment::new(1, 3000.0);

        assert_eq!(recorded_ms(&[first.clone()], 5000.0), 1000.0);
        assert_eq!(recorded_ms(&[first, second], 3500.0), 1500.0);
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(
            serde_json::to_string(&SessionState::Recording).unwrap(),
            "\"recording\""
        );
        assert!(SessionState::Paused.is_active());
        assert!(!SessionState::Stopping.is_active());
    }
}
