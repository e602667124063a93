//! Recording commands
//!
//! The control surface used by the binary: each command takes the shared
//! [`RecorderState`], serializes access to the session, and reports failures
//! as an [`ErrorResponse`].

use crate::capture::audio::get_audio_input_devices;
use crate::capture::region::resolve_region;
use crate::capture::traits::{AudioDeviceInfo, DisplayInfo, RegionResolver, RegionSource};
use crate::config::{default_output_path, CaptureConfig};
use crate::export::types::{ExportFormat, ExportQuality};
use crate::recorder::state::{RecordingOutput, SessionStatus};
use crate::recorder::{CaptureSession, RecordingResult, StatusProbe};
use crate::utils::error::ErrorResponse;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Application state for recording
pub struct RecorderState {
    pub session: Arc<Mutex<CaptureSession>>,
    probe: StatusProbe,
    resolver: Arc<dyn RegionResolver>,
}

impl RecorderState {
    pub fn new(session: CaptureSession, resolver: Arc<dyn RegionResolver>) -> Self {
        let probe = session.probe();
        Self {
            session: Arc::new(Mutex::new(session)),
            probe,
            resolver,
        }
    }
}

impl Default for RecorderState {
    fn default() -> Self {
        Self::new(
            CaptureSession::with_defaults(),
            crate::capture::default_region_resolver(),
        )
    }
}

/// What the caller asks to record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRecordingRequest {
    #[serde(default)]
    pub region_source: RegionSource,
    pub frame_rate: Option<u32>,
    pub target_height: Option<u32>,
    #[serde(default)]
    pub record_system_audio: bool,
    #[serde(default)]
    pub record_microphone: bool,
    /// Exact output file; takes precedence over `output_dir`
    pub output_path: Option<PathBuf>,
    /// Directory for a timestamped output file
    pub output_dir: Option<PathBuf>,
    pub format: Option<ExportFormat>,
    pub quality: Option<ExportQuality>,
}

impl StartRecordingRequest {
    /// Resolve the region and fill in defaults
    pub fn into_config(self, resolver: &dyn RegionResolver) -> RecordingResult<CaptureConfig> {
        let region = resolve_region(&self.region_source, resolver)?;

        let output_path = match (self.output_path, self.output_dir) {
            (Some(path), _) => path,
            (None, Some(dir)) => default_output_path(&dir),
            (None, None) => default_output_path(&std::env::current_dir()?),
        };
        let output_path = match self.format {
            Some(format) if ExportFormat::from_path(&output_path) != Some(format) => {
                output_path.with_extension(format.extension())
            }
            _ => output_path,
        };

        let mut config = CaptureConfig::new(region, output_path);
        if let Some(frame_rate) = self.frame_rate {
            config.frame_rate = frame_rate;
        }
        if let Some(target_height) = self.target_height {
            config.target_height = target_height;
        }
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        config.format = self.format;
        config.record_system_audio = self.record_system_audio;
        config.record_microphone = self.record_microphone;
        Ok(config)
    }

    /// Apply the fields set on this request over a loaded config.
    ///
    /// Audio flags only switch sources on.
    pub fn override_config(&self, config: &mut CaptureConfig) {
        if let Some(path) = &self.output_path {
            config.output_path = path.clone();
        }
        if let Some(frame_rate) = self.frame_rate {
            config.frame_rate = frame_rate;
        }
        if let Some(target_height) = self.target_height {
            config.target_height = target_height;
        }
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if self.format.is_some() {
            config.format = self.format;
        }
        config.record_system_audio |= self.record_system_audio;
        config.record_microphone |= self.record_microphone;
    }
}

/// Get list of available audio input devices (microphones)
pub fn get_audio_devices() -> Vec<AudioDeviceInfo> {
    get_audio_input_devices()
}

/// Get list of available displays
pub fn get_displays() -> Vec<DisplayInfo> {
    crate::capture::get_displays()
}

/// Start recording
pub async fn start_recording(
    state: &RecorderState,
    request: StartRecordingRequest,
) -> Result<(), ErrorResponse> {
    let config = request.into_config(state.resolver.as_ref())?;
    start_with_config(state, config).await
}

/// Start recording with a fully built config
pub async fn start_with_config(
    state: &RecorderState,
    config: CaptureConfig,
) -> Result<(), ErrorResponse> {
    let mut session = state.session.lock().await;
    session.start(config).await.map_err(ErrorResponse::from)
}

/// Stop recording
pub async fn stop_recording(state: &RecorderState) -> Result<RecordingOutput, ErrorResponse> {
    let mut session = state.session.lock().await;
    session.stop().await.map_err(ErrorResponse::from)
}

/// Pause recording
pub async fn pause_recording(state: &RecorderState) -> Result<(), ErrorResponse> {
    let mut session = state.session.lock().await;
    session.pause().await.map_err(ErrorResponse::from)
}

/// Resume recording
pub async fn resume_recording(state: &RecorderState) -> Result<(), ErrorResponse> {
    let mut session = state.session.lock().await;
    session.resume().await.map_err(ErrorResponse::from)
}

/// Get current recording status without waiting on control commands
pub fn get_recording_status(state: &RecorderState) -> SessionStatus {
    state.probe.status()
}

/// Record with `config` until `limit` elapses or Ctrl-C is pressed, then stop
pub async fn record_until_interrupted(
    state: &RecorderState,
    config: CaptureConfig,
    limit: Option<Duration>,
) -> Result<RecordingOutput, ErrorResponse> {
    start_with_config(state, config).await?;

    let mut progress = tokio::time::interval(Duration::from_secs(1));
    let deadline = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                tracing::info!("Recording time limit reached");
                break;
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                }
                tracing::info!("Interrupted; stopping recording");
                break;
            }
            _ = progress.tick() => {
                let status = get_recording_status(state);
                tracing::debug!(
                    "Recording {}ms, {} frames, {} bytes",
                    status.elapsed_ms,
                    status.frames_captured,
                    status.current_file_size_bytes
                );
            }
        }
    }

    stop_recording(state).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::traits::{CaptureError, CaptureRegion, CaptureResult, WindowHandle};
    use crate::recorder::state::SessionState;
    use crate::recorder::testing::{FakeFrameSource, ScriptedAudioInput, StubEncoder};

    struct FixedResolver;

    impl RegionResolver for FixedResolver {
        fn primary_display_bounds(&self) -> CaptureResult<CaptureRegion> {
            Ok(CaptureRegion::new(0, 0, 320, 240))
        }

        fn window_bounds(&self, _handle: WindowHandle) -> CaptureResult<CaptureRegion> {
            Err(CaptureError::unavailable("window closed"))
        }
    }

    fn state() -> RecorderState {
        let session = CaptureSession::new(
            Arc::new(FakeFrameSource::new()),
            Arc::new(ScriptedAudioInput::new()),
            Arc::new(StubEncoder::new()),
        );
        RecorderState::new(session, Arc::new(FixedResolver))
    }

    fn request(dir: &std::path::Path) -> StartRecordingRequest {
        StartRecordingRequest {
            frame_rate: Some(10),
            output_path: Some(dir.join("clip.mp4")),
            ..Default::default()
        }
    }

    #[test]
    fn test_request_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StartRecordingRequest {
            output_dir: Some(dir.path().to_path_buf()),
            format: Some(ExportFormat::Webm),
            ..Default::default()
        }
        .into_config(&FixedResolver)
        .unwrap();

        assert_eq!(config.region, CaptureRegion::new(0, 0, 320, 240));
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.output_format(), ExportFormat::Webm);
        assert!(config.output_path.starts_with(dir.path()));
        assert_eq!(
            config.output_path.extension().and_then(|e| e.to_str()),
            Some("webm")
        );
    }

    #[test]
    fn test_flags_override_loaded_config() {
        let mut config = CaptureConfig::new(CaptureRegion::new(0, 0, 320, 240), "from-file.mp4");
        config.record_microphone = true;

        StartRecordingRequest {
            frame_rate: Some(12),
            record_system_audio: true,
            output_path: Some("from-flag.mp4".into()),
            ..Default::default()
        }
        .override_config(&mut config);

        assert_eq!(config.frame_rate, 12);
        assert_eq!(config.output_path, std::path::Path::new("from-flag.mp4"));
        assert!(config.record_system_audio);
        assert!(config.record_microphone);
        assert_eq!(config.target_height, 1080);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let state = state();

        start_recording(&state, request(dir.path())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(get_recording_status(&state).state, SessionState::Recording);

        let err = start_recording(&state, request(dir.path()))
            .await
            .unwrap_err();
        assert_eq!(err.code, "ALREADY_RUNNING");

        pause_recording(&state).await.unwrap();
        assert_eq!(get_recording_status(&state).state, SessionState::Paused);
        resume_recording(&state).await.unwrap();

        let output = stop_recording(&state).await.unwrap();
        assert!(output.output_path.ends_with("clip.mp4"));
        assert_eq!(get_recording_status(&state).state, SessionState::Idle);
    }

    #[tokio::test]
    async fn test_closed_window_is_capture_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let state = state();
        let request = StartRecordingRequest {
            region_source: RegionSource::NamedWindow(WindowHandle(7)),
            ..request(dir.path())
        };

        let err = start_recording(&state, request).await.unwrap_err();
        assert_eq!(err.code, "CAPTURE_UNAVAILABLE");
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_for_fixed_duration() {
        let dir = tempfile::tempdir().unwrap();
        let state = state();
        let config = request(dir.path()).into_config(&FixedResolver).unwrap();

        let output = record_until_interrupted(&state, config, Some(Duration::from_secs(2)))
            .await
            .unwrap();

        assert!((19..=21).contains(&output.frame_count));
        assert!(dir.path().join("clip.mp4").exists());
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let err = stop_recording(&state()).await.unwrap_err();
        assert_eq!(err.code, "NOT_RUNNING");
    }
}
