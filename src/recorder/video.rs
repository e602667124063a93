//! Paced screen capture
//!
//! Grabs one frame of the capture region every `1 / frame_rate` seconds and
//! persists it to the session's frame directory. Paused time is skipped:
//! the schedule shifts forward by however long the session was paused.

use crate::capture::traits::{CaptureRegion, FrameSource};
use crate::recorder::channel::{
    ChannelContext, ChannelOutput, ChannelType, PauseFlag, RecordingChannel, RecordingError,
    RecordingResult,
};
use crate::recorder::frames::{FrameSequence, FrameStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Upper bound on how long the loop sleeps between checks of the stop and
/// pause flags
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Display capture channel driven by a [`FrameSource`]
pub struct VideoCaptureLoop {
    id: String,
    source: Arc<dyn FrameSource>,
    region: CaptureRegion,
    frame_rate: u32,
    cancel: Arc<AtomicBool>,
    frames_captured: Arc<AtomicU64>,
    handle: Option<JoinHandle<FrameSequence>>,
}

impl VideoCaptureLoop {
    pub fn new(source: Arc<dyn FrameSource>, region: CaptureRegion, frame_rate: u32) -> Self {
        Self {
            id: format!("display-{}x{}", region.width, region.height),
            source,
            region,
            frame_rate: frame_rate.max(1),
            cancel: Arc::new(AtomicBool::new(false)),
            frames_captured: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    /// Counter of frames persisted so far, readable while the loop runs
    pub fn frames_counter(&self) -> Arc<AtomicU64> {
        self.frames_captured.clone()
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.frame_rate as u64)
    }
}

#[async_trait]
impl RecordingChannel for VideoCaptureLoop {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Display
    }

    async fn start(&mut self, ctx: &ChannelContext) -> RecordingResult<()> {
        if self.handle.is_some() {
            return Err(RecordingError::AlreadyRunning);
        }

        self.source.prepare(&self.region)?;
        let store = FrameStore::create(ctx.work_dir.join("frames"))?;

        self.cancel.store(false, Ordering::SeqCst);
        self.frames_captured.store(0, Ordering::SeqCst);

        let pacing = Pacing {
            source: self.source.clone(),
            region: self.region,
            interval: self.frame_interval(),
            pause: ctx.pause.clone(),
            cancel: self.cancel.clone(),
            frames_captured: self.frames_captured.clone(),
        };
        self.handle = Some(tokio::spawn(pacing.run(Arc::new(store))));

        tracing::info!(
            "Display capture started: region {} at {} fps",
            self.region,
            self.frame_rate
        );
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<ChannelOutput> {
        let handle = self.handle.take().ok_or(RecordingError::NotRunning)?;
        self.cancel.store(true, Ordering::SeqCst);

        let sequence = handle
            .await
            .map_err(|e| RecordingError::CaptureUnavailable(format!("capture task failed: {}", e)))?;

        tracing::info!("Display capture stopped. Captured {} frames", sequence.count);
        Ok(ChannelOutput::Frames(sequence))
    }

    fn is_recording(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for VideoCaptureLoop {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

/// State owned by the running capture task
struct Pacing {
    source: Arc<dyn FrameSource>,
    region: CaptureRegion,
    interval: Duration,
    pause: PauseFlag,
    cancel: Arc<AtomicBool>,
    frames_captured: Arc<AtomicU64>,
}

impl Pacing {
    async fn run(self, store: Arc<FrameStore>) -> FrameSequence {
        let mut next_due = Instant::now();
        let mut paused_since: Option<Instant> = None;
        let mut count = 0u64;

        loop {
            let now = Instant::now();

            let wait = if self.pause.is_paused() {
                paused_since.get_or_insert(now);
                POLL_INTERVAL
            } else {
                if let Some(since) = paused_since.take() {
                    next_due += now - since;
                }

                if now >= next_due {
                    if self.grab(&store, count).await {
                        count += 1;
                        self.frames_captured.store(count, Ordering::SeqCst);
                    }
                    // No catch-up after a stall
                    next_due = now + self.interval;
                }

                next_due
                    .saturating_duration_since(Instant::now())
                    .min(POLL_INTERVAL)
            };

            // Checked after the first grab so even an immediate stop yields a frame
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(wait).await;
        }

        FrameSequence {
            dir: store.dir().to_path_buf(),
            count,
            width: self.region.width,
            height: self.region.height,
        }
    }

    /// Capture and persist one frame. Returns whether it was kept.
    async fn grab(&self, store: &Arc<FrameStore>, index: u64) -> bool {
        let source = self.source.clone();
        let store = store.clone();
        let region = self.region;

        let result = tokio::task::spawn_blocking(move || -> Result<(), String> {
            let frame = source.capture(&region).map_err(|e| e.to_string())?;
            if frame.width != region.width || frame.height != region.height {
                return Err(format!(
                    "frame is {}x{}, expected {}x{}",
                    frame.width, frame.height, region.width, region.height
                ));
            }
            store
                .write(index, &frame)
                .map_err(|e| format!("failed to persist frame: {}", e))
        })
        .await;

        match result {
            Ok(Ok(())) => true,
            Ok(Err(reason)) => {
                tracing::warn!("Skipping frame {}: {}", index, reason);
                false
            }
            Err(e) => {
                tracing::error!("Frame capture task failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::testing::FakeFrameSource;

    fn region() -> CaptureRegion {
        CaptureRegion::new(0, 0, 64, 64)
    }

    async fn record_for(
        source: Arc<FakeFrameSource>,
        frame_rate: u32,
        schedule: &[(bool, Duration)],
    ) -> FrameSequence {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ChannelContext::new(dir.path(), PauseFlag::new());
        let mut video = VideoCaptureLoop::new(source, region(), frame_rate);
        video.start(&ctx).await.unwrap();

        for (paused, duration) in schedule {
            ctx.pause.set(*paused);
            tokio::time::sleep(*duration).await;
        }

        match video.stop().await.unwrap() {
            ChannelOutput::Frames(sequence) => {
                for i in 0..sequence.count {
                    assert!(sequence.frame_path(i).exists());
                }
                sequence
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_count_matches_rate() {
        let source = Arc::new(FakeFrameSource::new());
        let sequence = record_for(source, 10, &[(false, Duration::from_secs(2))]).await;
        assert!(
            (19..=21).contains(&sequence.count),
            "captured {} frames",
            sequence.count
        );
        assert_eq!((sequence.width, sequence.height), (64, 64));
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_time_not_captured() {
        let source = Arc::new(FakeFrameSource::new());
        let sequence = record_for(
            source,
            10,
            &[
                (false, Duration::from_secs(1)),
                (true, Duration::from_secs(3)),
                (false, Duration::from_secs(1)),
            ],
        )
        .await;
        assert!(
            (19..=21).contains(&sequence.count),
            "captured {} frames",
            sequence.count
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_captures_are_skipped() {
        let source = Arc::new(FakeFrameSource::new().failing_every(2));
        let sequence = record_for(source.clone(), 10, &[(false, Duration::from_secs(1))]).await;
        assert!(source.attempts() >= 10);
        assert!(sequence.count < source.attempts());
        assert!(sequence.count >= 4);
    }

    #[tokio::test]
    async fn test_prepare_failure_refuses_start() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ChannelContext::new(dir.path(), PauseFlag::new());
        let source = Arc::new(FakeFrameSource::new().refusing_prepare());
        let mut video = VideoCaptureLoop::new(source, region(), 30);

        let err = video.start(&ctx).await.unwrap_err();
        assert!(matches!(err, RecordingError::CaptureUnavailable(_)));
        assert!(!video.is_recording());
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ChannelContext::new(dir.path(), PauseFlag::new());
        let mut video = VideoCaptureLoop::new(Arc::new(FakeFrameSource::new()), region(), 30);

        video.start(&ctx).await.unwrap();
        assert!(matches!(
            video.start(&ctx).await,
            Err(RecordingError::AlreadyRunning)
        ));
        video.stop().await.unwrap();
    }
}
