//! Capture session coordinator
//!
//! Owns the video and audio channels of one recording and drives the
//! session lifecycle: start, pause, resume, and stop with mixing, encoding,
//! and temp cleanup.

use super::audio::AudioCaptureLoop;
use super::channel::{
    ChannelContext, ChannelOutput, PauseFlag, RecordingChannel, RecordingError, RecordingResult,
};
use super::mixer::mix_tracks;
use super::state::{
    recorded_ms, RecordingOutput, RecordingSegment, SessionState, SessionStatus,
    UnavailableSource,
};
use super::video::VideoCaptureLoop;
use crate::capture::audio::{AudioInput, AudioSource, CpalAudioInput};
use crate::capture::traits::FrameSource;
use crate::config::{CaptureConfig, EmptyOutputPolicy};
use crate::export::ffmpeg::FfmpegEncoder;
use crate::export::types::{EncodeJob, MediaEncoder};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::Instant;
use uuid::Uuid;

/// Events emitted during recording
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    /// Recording started
    Started,
    /// Recording paused
    Paused,
    /// Recording resumed
    Resumed,
    /// A requested audio source could not be opened
    SourceUnavailable { input: AudioSource, reason: String },
    /// Recording stopped and the output is ready
    Stopped { output_path: PathBuf },
    /// Error occurred
    Error(String),
}

#[derive(Default)]
struct ProbeState {
    state: SessionState,
    segments: Vec<RecordingSegment>,
    started_at: Option<Instant>,
    frames: Option<Arc<AtomicU64>>,
    work_dir: Option<PathBuf>,
    output_path: Option<PathBuf>,
}

impl ProbeState {
    fn process_time_ms(&self) -> f64 {
        self.started_at
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }

    fn end_segment(&mut self) {
        let now = self.process_time_ms();
        if let Some(segment) = self.segments.last_mut().filter(|s| s.is_open()) {
            segment.end(now);
        }
    }

    fn begin_segment(&mut self) {
        let now = self.process_time_ms();
        let index = self.segments.len();
        self.segments.push(RecordingSegment::new(index, now));
    }
}

/// Read-only view of a session, usable without the session's control lock
#[derive(Clone, Default)]
pub struct StatusProbe {
    inner: Arc<RwLock<ProbeState>>,
}

impl StatusProbe {
    pub fn state(&self) -> SessionState {
        self.inner.read().state
    }

    pub fn status(&self) -> SessionStatus {
        let inner = self.inner.read();
        let elapsed_ms = recorded_ms(&inner.segments, inner.process_time_ms());
        let frames_captured = inner
            .frames
            .as_ref()
            .map(|f| f.load(Ordering::SeqCst))
            .unwrap_or(0);

        let current_file_size_bytes = match inner.state {
            SessionState::Recording | SessionState::Paused | SessionState::Stopping => {
                inner.work_dir.as_deref().map(dir_size).unwrap_or(0)
            }
            SessionState::Idle | SessionState::Stopped => inner
                .output_path
                .as_ref()
                .and_then(|p| std::fs::metadata(p).ok())
                .map(|m| m.len())
                .unwrap_or(0),
        };

        SessionStatus {
            state: inner.state,
            elapsed_ms: elapsed_ms.max(0.0) as u64,
            current_file_size_bytes,
            frames_captured,
        }
    }

    fn set_state(&self, state: SessionState) {
        self.inner.write().state = state;
    }
}

/// Total size of the files below `dir`
fn dir_size(dir: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    entries
        .flatten()
        .map(|entry| match entry.metadata() {
            Ok(meta) if meta.is_dir() => dir_size(&entry.path()),
            Ok(meta) => meta.len(),
            Err(_) => 0,
        })
        .sum()
}

/// Everything belonging to the recording in progress
struct ActiveRecording {
    id: Uuid,
    config: CaptureConfig,
    temp: TempDir,
    video: VideoCaptureLoop,
    audio: AudioCaptureLoop,
    pause: PauseFlag,
    unavailable: Vec<UnavailableSource>,
}

/// Drives one recording at a time from a frame source, an audio input and
/// an encoder
pub struct CaptureSession {
    frame_source: Arc<dyn FrameSource>,
    audio_input: Arc<dyn AudioInput>,
    encoder: Arc<dyn MediaEncoder>,
    active: Option<ActiveRecording>,
    probe: StatusProbe,
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl CaptureSession {
    pub fn new(
        frame_source: Arc<dyn FrameSource>,
        audio_input: Arc<dyn AudioInput>,
        encoder: Arc<dyn MediaEncoder>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            frame_source,
            audio_input,
            encoder,
            active: None,
            probe: StatusProbe::default(),
            event_tx,
        }
    }

    /// Session using the platform screen source, cpal and FFmpeg
    pub fn with_defaults() -> Self {
        Self::new(
            crate::capture::default_frame_source(),
            Arc::new(CpalAudioInput::new()),
            Arc::new(FfmpegEncoder::new()),
        )
    }

    /// Get the current session state
    pub fn state(&self) -> SessionState {
        self.probe.state()
    }

    pub fn status(&self) -> SessionStatus {
        self.probe.status()
    }

    /// Handle for reading status from other tasks
    pub fn probe(&self) -> StatusProbe {
        self.probe.clone()
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: RecordingEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Start recording.
    ///
    /// Video must start for the session to start. Audio sources that fail
    /// to open are reported and left out.
    pub async fn start(&mut self, config: CaptureConfig) -> RecordingResult<()> {
        if self.state() != SessionState::Idle || self.active.is_some() {
            return Err(RecordingError::AlreadyRunning);
        }

        config.validate()?;
        self.encoder
            .check_available()
            .map_err(|e| RecordingError::SessionStartFailed(format!("encoder unavailable: {}", e)))?;

        let start_failed = |what: &str, e: std::io::Error| {
            RecordingError::SessionStartFailed(format!("{}: {}", what, e))
        };

        if let Some(parent) = config
            .output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| start_failed("cannot create output directory", e))?;
        }

        let temp_root = config.temp_root();
        std::fs::create_dir_all(&temp_root)
            .map_err(|e| start_failed("cannot create temp root", e))?;
        let temp = tempfile::Builder::new()
            .prefix("screen-recorder-")
            .tempdir_in(&temp_root)
            .map_err(|e| start_failed("cannot create session directory", e))?;

        let id = Uuid::new_v4();
        tracing::info!(
            "Starting recording {} of {} to {}",
            id,
            config.region,
            config.output_path.display()
        );

        let pause = PauseFlag::new();
        let ctx = ChannelContext::new(temp.path(), pause.clone());

        let mut video =
            VideoCaptureLoop::new(self.frame_source.clone(), config.region, config.frame_rate);
        if let Err(e) = video.start(&ctx).await {
            tracing::error!("Video capture failed to start: {}", e);
            if let Err(cleanup) = temp.close() {
                tracing::warn!("Failed to remove session directory: {}", cleanup);
            }
            return Err(RecordingError::SessionStartFailed(e.to_string()));
        }

        let mut audio = AudioCaptureLoop::new(self.audio_input.clone());
        let failures = audio.start(&ctx, &config.audio_sources()).await;

        let mut unavailable = Vec::with_capacity(failures.len());
        for (input, error) in failures {
            let reason = match error {
                RecordingError::DeviceUnavailable { reason, .. } => reason,
                other => other.to_string(),
            };
            self.emit(RecordingEvent::SourceUnavailable {
                input,
                reason: reason.clone(),
            });
            unavailable.push(UnavailableSource { input, reason });
        }

        {
            let mut probe = self.probe.inner.write();
            *probe = ProbeState {
                state: SessionState::Recording,
                segments: Vec::new(),
                started_at: Some(Instant::now()),
                frames: Some(video.frames_counter()),
                work_dir: Some(temp.path().to_path_buf()),
                output_path: Some(config.output_path.clone()),
            };
            probe.begin_segment();
        }

        self.active = Some(ActiveRecording {
            id,
            config,
            temp,
            video,
            audio,
            pause,
            unavailable,
        });

        self.emit(RecordingEvent::Started);
        tracing::info!("Recording started");
        Ok(())
    }

    /// Pause recording. Devices stay open and their output is discarded.
    pub async fn pause(&mut self) -> RecordingResult<()> {
        if self.state() != SessionState::Recording {
            return Err(RecordingError::NotRunning);
        }
        let active = self.active.as_ref().ok_or(RecordingError::NotRunning)?;

        tracing::info!("Pausing recording {}", active.id);
        active.pause.set(true);
        {
            let mut probe = self.probe.inner.write();
            probe.end_segment();
            probe.state = SessionState::Paused;
        }

        self.emit(RecordingEvent::Paused);
        Ok(())
    }

    /// Resume recording
    pub async fn resume(&mut self) -> RecordingResult<()> {
        if self.state() != SessionState::Paused {
            return Err(RecordingError::NotRunning);
        }
        let active = self.active.as_ref().ok_or(RecordingError::NotRunning)?;

        tracing::info!("Resuming recording {}", active.id);
        {
            let mut probe = self.probe.inner.write();
            probe.begin_segment();
            probe.state = SessionState::Recording;
        }
        active.pause.set(false);

        self.emit(RecordingEvent::Resumed);
        Ok(())
    }

    /// Stop recording and produce the output file.
    ///
    /// The session directory is removed whatever the outcome, and the
    /// session returns to `Idle`.
    pub async fn stop(&mut self) -> RecordingResult<RecordingOutput> {
        if !self.state().is_active() {
            return Err(RecordingError::NotRunning);
        }
        let mut active = self.active.take().ok_or(RecordingError::NotRunning)?;

        tracing::info!("Stopping recording {}", active.id);
        {
            let mut probe = self.probe.inner.write();
            probe.end_segment();
            probe.state = SessionState::Stopping;
        }

        let result = self.finish(&mut active).await;

        let ActiveRecording {
            temp, video, audio, ..
        } = active;
        drop(video);
        drop(audio);
        let temp_path = temp.path().to_path_buf();
        if let Err(e) = temp.close() {
            tracing::warn!("Failed to remove {}: {}", temp_path.display(), e);
        }

        match &result {
            Ok(output) => {
                self.probe.set_state(SessionState::Stopped);
                self.emit(RecordingEvent::Stopped {
                    output_path: PathBuf::from(&output.output_path),
                });
                tracing::info!(
                    "Recording stopped. Duration: {}ms, {} frames",
                    output.total_duration_ms,
                    output.frame_count
                );
            }
            Err(e) => {
                tracing::error!("Recording failed: {}", e);
                self.emit(RecordingEvent::Error(e.to_string()));
            }
        }

        self.probe.set_state(SessionState::Idle);
        result
    }

    /// Drain both loops, mix, and encode
    async fn finish(&self, active: &mut ActiveRecording) -> RecordingResult<RecordingOutput> {
        let video_output = active.video.stop().await;
        let tracks = active.audio.stop().await;

        let frames = match video_output? {
            ChannelOutput::Frames(frames) => frames,
            other => {
                return Err(RecordingError::EncodingFailed(format!(
                    "display channel produced {:?}",
                    other
                )))
            }
        };
        let config = &active.config;
        let format = config.output_format();

        let audio = if !format.supports_audio() {
            if !tracks.is_empty() {
                tracing::info!("{} output carries no audio; dropping tracks", format.extension());
            }
            None
        } else {
            let mixed_path = active.temp.path().join("mixed.wav");
            tokio::task::spawn_blocking(move || mix_tracks(tracks, &mixed_path))
                .await
                .map_err(|e| RecordingError::EncodingFailed(format!("mixer task failed: {}", e)))??
        };

        let placeholder = if frames.is_empty() {
            match config.empty_output {
                EmptyOutputPolicy::Placeholder => {
                    tracing::warn!(
                        "No frames captured; writing empty placeholder {}",
                        config.output_path.display()
                    );
                    std::fs::File::create(&config.output_path)?;
                    true
                }
                EmptyOutputPolicy::Fail => {
                    return Err(RecordingError::EncodingFailed(
                        "no frames were captured".to_string(),
                    ));
                }
            }
        } else {
            let job = EncodeJob {
                frames: frames.clone(),
                frame_rate: config.frame_rate,
                target_height: config.target_height,
                audio: audio.as_ref().map(|a| a.path.clone()),
                audio_offset: audio
                    .as_ref()
                    .map(|a| a.start_offset)
                    .unwrap_or_default(),
                output_path: config.output_path.clone(),
                format,
                quality: config.quality,
                audio_bitrate_kbps: config.audio_bitrate_kbps,
            };
            let encoder = self.encoder.clone();
            let encoded = tokio::task::spawn_blocking(move || encoder.encode(&job))
                .await
                .map_err(|e| RecordingError::EncodingFailed(format!("encoder task failed: {}", e)))?;

            if let Err(e) = encoded {
                let _ = std::fs::remove_file(&config.output_path);
                return Err(e.into());
            }
            false
        };

        let (total_duration_ms, segment_count) = {
            let probe = self.probe.inner.read();
            (
                recorded_ms(&probe.segments, probe.process_time_ms()),
                probe.segments.len(),
            )
        };

        Ok(RecordingOutput {
            output_path: config.output_path.to_string_lossy().to_string(),
            total_duration_ms,
            segment_count,
            frame_count: frames.count,
            has_audio: audio.is_some() && !placeholder,
            unavailable_sources: active.unavailable.clone(),
            placeholder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::audio::AudioFormat;
    use crate::capture::traits::CaptureRegion;
    use crate::recorder::testing::{FakeFrameSource, ScriptedAudioInput, StubEncoder};
    use std::time::Duration;

    struct Harness {
        dir: TempDir,
        encoder: Arc<StubEncoder>,
        audio: Arc<ScriptedAudioInput>,
        session: CaptureSession,
    }

    impl Harness {
        fn new(source: FakeFrameSource, audio: ScriptedAudioInput, encoder: StubEncoder) -> Self {
            let encoder = Arc::new(encoder);
            let audio = Arc::new(audio);
            let session = CaptureSession::new(Arc::new(source), audio.clone(), encoder.clone());
            Self {
                dir: tempfile::tempdir().unwrap(),
                encoder,
                audio,
                session,
            }
        }

        fn simple() -> Self {
            Self::new(FakeFrameSource::new(), ScriptedAudioInput::new(), StubEncoder::new())
        }

        fn temp_root(&self) -> PathBuf {
            self.dir.path().join("tmp")
        }

        fn output(&self) -> PathBuf {
            self.dir.path().join("out").join("clip.mp4")
        }

        fn config(&self) -> CaptureConfig {
            let mut config = CaptureConfig::new(CaptureRegion::new(0, 0, 64, 64), self.output());
            config.frame_rate = 10;
            config.temp_root = Some(self.temp_root());
            config
        }

        fn temp_entries(&self) -> usize {
            std::fs::read_dir(self.temp_root())
                .map(|entries| entries.count())
                .unwrap_or(0)
        }
    }

    #[tokio::test]
    async fn test_start_then_stop_leaves_only_output() {
        let mut h = Harness::simple();
        let config = h.config();
        h.session.start(config).await.unwrap();
        assert_eq!(h.temp_entries(), 1);

        let output = h.session.stop().await.unwrap();

        assert_eq!(PathBuf::from(&output.output_path), h.output());
        assert!(output.frame_count >= 1);
        assert!(!output.placeholder);
        let outputs: Vec<_> = std::fs::read_dir(h.output().parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(outputs.len(), 1);
        assert_eq!(h.temp_entries(), 0);
        assert_eq!(h.session.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_recording_is_rejected() {
        let mut h = Harness::simple();
        let config = h.config();
        h.session.start(config).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let before = h.session.status();

        let config = h.config();
        let err = h.session.start(config).await.unwrap_err();
        assert!(matches!(err, RecordingError::AlreadyRunning));

        let after = h.session.status();
        assert_eq!(after.state, SessionState::Recording);
        assert_eq!(after.elapsed_ms, before.elapsed_ms);
        assert_eq!(h.temp_entries(), 1);

        h.session.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_seconds_at_ten_fps_without_audio() {
        let mut h = Harness::simple();
        let config = h.config();
        h.session.start(config).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        let output = h.session.stop().await.unwrap();

        assert!(
            (19..=21).contains(&output.frame_count),
            "captured {} frames",
            output.frame_count
        );
        assert!(!output.has_audio);

        let jobs = h.encoder.jobs();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].job.audio.is_none());
        assert_eq!(jobs[0].job.frame_rate, 10);
        assert_eq!(jobs[0].frames_on_disk as u64, output.frame_count);
        assert_eq!((jobs[0].job.frames.width, jobs[0].job.frames.height), (64, 64));
        assert_eq!(h.temp_entries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_excludes_time_and_frames() {
        let mut h = Harness::simple();
        let config = h.config();
        h.session.start(config).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        h.session.pause().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        let paused = h.session.status();
        assert_eq!(paused.state, SessionState::Paused);
        assert_eq!(paused.elapsed_ms, 1000);

        h.session.resume().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let output = h.session.stop().await.unwrap();

        assert_eq!(output.segment_count, 2);
        assert!((output.total_duration_ms - 2000.0).abs() < 1.0);
        assert!(
            (19..=21).contains(&output.frame_count),
            "captured {} frames",
            output.frame_count
        );
    }

    #[tokio::test]
    async fn test_missing_microphone_is_reported_once() {
        let mut h = Harness::new(
            FakeFrameSource::new(),
            ScriptedAudioInput::new().with_source(
                AudioSource::System,
                AudioFormat::new(48_000, 2),
                1200,
            ),
            StubEncoder::new(),
        );
        let mut events = h.session.subscribe();
        let mut config = h.config();
        config.record_system_audio = true;
        config.record_microphone = true;

        h.session.start(config).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let output = h.session.stop().await.unwrap();

        assert_eq!(output.unavailable_sources.len(), 1);
        assert_eq!(output.unavailable_sources[0].input, AudioSource::Microphone);
        assert!(output.has_audio);

        let mut unavailable_events = 0;
        while let Ok(event) = events.try_recv() {
            if let RecordingEvent::SourceUnavailable { input, .. } = event {
                assert_eq!(input, AudioSource::Microphone);
                unavailable_events += 1;
            }
        }
        assert_eq!(unavailable_events, 1);

        let jobs = h.encoder.jobs();
        let spec = jobs[0].audio_spec.unwrap();
        assert_eq!((spec.sample_rate, spec.channels), (48_000, 2));
        let samples = jobs[0].audio_samples.as_ref().unwrap();
        assert!(!samples.is_empty());
        assert!(samples.iter().all(|&s| s == 1200));
        assert_eq!(h.temp_entries(), 0);
    }

    #[tokio::test]
    async fn test_both_sources_are_mixed() {
        let mut h = Harness::new(
            FakeFrameSource::new(),
            ScriptedAudioInput::new()
                .with_source(AudioSource::System, AudioFormat::MICROPHONE, 1000)
                .with_source(AudioSource::Microphone, AudioFormat::MICROPHONE, 300),
            StubEncoder::new(),
        );
        let mut config = h.config();
        config.record_system_audio = true;
        config.record_microphone = true;

        h.session.start(config).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let output = h.session.stop().await.unwrap();

        assert!(output.unavailable_sources.is_empty());
        let jobs = h.encoder.jobs();
        let samples = jobs[0].audio_samples.as_ref().unwrap();
        assert!(samples.iter().any(|&s| s == 1300));
    }

    #[tokio::test]
    async fn test_video_failure_rolls_back_start() {
        let mut h = Harness::new(
            FakeFrameSource::new().refusing_prepare(),
            ScriptedAudioInput::new().with_source(
                AudioSource::Microphone,
                AudioFormat::MICROPHONE,
                100,
            ),
            StubEncoder::new(),
        );
        let mut config = h.config();
        config.record_microphone = true;

        let err = h.session.start(config).await.unwrap_err();
        assert!(matches!(err, RecordingError::SessionStartFailed(_)));
        assert_eq!(h.audio.open_count(), 0);
        assert_eq!(h.temp_entries(), 0);
        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(!h.output().exists());
    }

    #[tokio::test]
    async fn test_unavailable_encoder_refuses_start() {
        let mut h = Harness::new(
            FakeFrameSource::new(),
            ScriptedAudioInput::new(),
            StubEncoder::unavailable(),
        );

        let config = h.config();
        let err = h.session.start(config).await.unwrap_err();
        assert!(matches!(err, RecordingError::SessionStartFailed(_)));
        assert_eq!(h.session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_invalid_config_refuses_start() {
        let mut h = Harness::simple();
        let mut config = h.config();
        config.frame_rate = 0;

        let err = h.session.start(config).await.unwrap_err();
        assert!(matches!(err, RecordingError::InvalidConfig(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_frames_writes_placeholder() {
        let mut h = Harness::new(
            FakeFrameSource::new().failing_every(1),
            ScriptedAudioInput::new(),
            StubEncoder::new(),
        );
        let config = h.config();
        h.session.start(config).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let output = h.session.stop().await.unwrap();

        assert!(output.placeholder);
        assert_eq!(output.frame_count, 0);
        assert_eq!(std::fs::metadata(h.output()).unwrap().len(), 0);
        assert!(h.encoder.jobs().is_empty());
        assert_eq!(h.temp_entries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_frames_can_fail() {
        let mut h = Harness::new(
            FakeFrameSource::new().failing_every(1),
            ScriptedAudioInput::new(),
            StubEncoder::new(),
        );
        let mut config = h.config();
        config.empty_output = EmptyOutputPolicy::Fail;
        h.session.start(config).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let err = h.session.stop().await.unwrap_err();
        assert!(matches!(err, RecordingError::EncodingFailed(_)));
        assert!(!h.output().exists());
        assert_eq!(h.temp_entries(), 0);
        assert_eq!(h.session.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoder_failure_cleans_up() {
        let mut h = Harness::new(
            FakeFrameSource::new(),
            ScriptedAudioInput::new(),
            StubEncoder::failing(),
        );
        let mut events = h.session.subscribe();
        let config = h.config();
        h.session.start(config).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let err = h.session.stop().await.unwrap_err();
        assert!(matches!(err, RecordingError::EncodingFailed(_)));
        assert!(!h.output().exists());
        assert_eq!(h.temp_entries(), 0);
        assert_eq!(h.session.state(), SessionState::Idle);

        let mut saw_error = false;
        while let Ok(event) = events.try_recv() {
            saw_error |= matches!(event, RecordingEvent::Error(_));
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_control_requires_active_session() {
        let mut h = Harness::simple();
        assert!(matches!(h.session.stop().await, Err(RecordingError::NotRunning)));
        assert!(matches!(h.session.pause().await, Err(RecordingError::NotRunning)));
        assert!(matches!(h.session.resume().await, Err(RecordingError::NotRunning)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_can_restart() {
        let mut h = Harness::simple();
        let config = h.config();
        h.session.start(config).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        h.session.stop().await.unwrap();

        let config = h.config();
        h.session.start(config).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let output = h.session.stop().await.unwrap();
        assert_eq!(output.segment_count, 1);
        assert_eq!(h.encoder.jobs().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reports_output_size_after_stop() {
        let mut h = Harness::simple();
        let config = h.config();
        h.session.start(config).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let recording = h.session.status();
        assert!(recording.current_file_size_bytes > 0);
        assert!(recording.frames_captured >= 3);

        h.session.stop().await.unwrap();
        let stopped = h.session.status();
        assert_eq!(stopped.state, SessionState::Idle);
        assert_eq!(stopped.current_file_size_bytes, b"stub media".len() as u64);
    }
}
