//! Test doubles for the capture and encoding seams

use crate::capture::audio::{
    AudioChunk, AudioFormat, AudioInput, AudioSource, ChunkCallback, OpenStream,
};
use crate::capture::traits::{CaptureError, CaptureRegion, CaptureResult, CapturedFrame, FrameSource};
use crate::export::types::{EncodeJob, ExportError, MediaEncoder};
use crate::recorder::channel::{RecordingError, RecordingResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Frame source that returns solid frames instantly
#[derive(Default)]
pub struct FakeFrameSource {
    attempts: AtomicU64,
    fail_every: Option<u64>,
    refuse_prepare: bool,
}

impl FakeFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `n`th capture; `1` fails all of them
    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    pub fn refusing_prepare(mut self) -> Self {
        self.refuse_prepare = true;
        self
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl FrameSource for FakeFrameSource {
    fn prepare(&self, region: &CaptureRegion) -> CaptureResult<()> {
        if self.refuse_prepare {
            return Err(CaptureError::unavailable(format!("cannot capture {}", region)));
        }
        Ok(())
    }

    fn capture(&self, region: &CaptureRegion) -> CaptureResult<CapturedFrame> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_every.is_some_and(|n| attempt % n == 0) {
            return Err(CaptureError::unavailable("simulated capture failure"));
        }

        Ok(CapturedFrame {
            data: [40, 80, 120, 255].repeat((region.width * region.height) as usize),
            width: region.width,
            height: region.height,
        })
    }
}

/// Stops the feeder thread when the stream is dropped
struct Feeder {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for Feeder {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Audio input that feeds a constant amplitude every 10 ms.
///
/// Sources that were not scripted fail with `DeviceUnavailable`.
#[derive(Default)]
pub struct ScriptedAudioInput {
    sources: HashMap<AudioSource, (AudioFormat, i16)>,
    opens: AtomicUsize,
}

impl ScriptedAudioInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: AudioSource, format: AudioFormat, amplitude: i16) -> Self {
        self.sources.insert(source, (format, amplitude));
        self
    }

    /// Number of `open` calls, successful or not
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl AudioInput for ScriptedAudioInput {
    fn open(&self, source: AudioSource, mut on_chunk: ChunkCallback) -> RecordingResult<OpenStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let Some(&(format, amplitude)) = self.sources.get(&source) else {
            return Err(RecordingError::DeviceUnavailable {
                input: source,
                reason: "device not connected".to_string(),
            });
        };

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let chunk_len = (format.sample_rate / 100) as usize * format.channels as usize;

        let thread = std::thread::spawn(move || {
            while !thread_stop.load(Ordering::SeqCst) {
                on_chunk(AudioChunk {
                    source,
                    samples: vec![amplitude; chunk_len],
                    received_at: Instant::now(),
                });
                std::thread::sleep(Duration::from_millis(10));
            }
        });

        Ok(OpenStream::new(
            format,
            format!("scripted {}", source),
            Feeder {
                stop,
                thread: Some(thread),
            },
        ))
    }
}

/// What the stub encoder saw for one job
#[derive(Debug, Clone)]
pub struct EncodedJob {
    pub job: EncodeJob,
    /// Frame files present when encoding ran
    pub frames_on_disk: usize,
    /// Format of the soundtrack handed over, if any
    pub audio_spec: Option<hound::WavSpec>,
    pub audio_samples: Option<Vec<i16>>,
}

/// Encoder that writes a small file instead of running FFmpeg
#[derive(Default)]
pub struct StubEncoder {
    unavailable: bool,
    fail: bool,
    jobs: Mutex<Vec<EncodedJob>>,
}

impl StubEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn jobs(&self) -> Vec<EncodedJob> {
        self.jobs.lock().clone()
    }
}

impl MediaEncoder for StubEncoder {
    fn check_available(&self) -> Result<(), ExportError> {
        if self.unavailable {
            return Err(ExportError::Ffmpeg("encoder not installed".to_string()));
        }
        Ok(())
    }

    fn encode(&self, job: &EncodeJob) -> Result<(), ExportError> {
        if job.frames.is_empty() {
            return Err(ExportError::NoFrames);
        }
        if self.fail {
            std::fs::write(&job.output_path, b"partial")?;
            return Err(ExportError::Ffmpeg("simulated encoder failure".to_string()));
        }

        let frames_on_disk = std::fs::read_dir(&job.frames.dir)?.count();
        let (audio_spec, audio_samples) = match &job.audio {
            Some(path) => {
                let reader = hound::WavReader::open(path)
                    .map_err(|e| ExportError::Decoding(e.to_string()))?;
                let spec = reader.spec();
                let samples = reader
                    .into_samples::<i16>()
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| ExportError::Decoding(e.to_string()))?;
                (Some(spec), Some(samples))
            }
            None => (None, None),
        };

        std::fs::write(&job.output_path, b"stub media")?;
        self.jobs.lock().push(EncodedJob {
            job: job.clone(),
            frames_on_disk,
            audio_spec,
            audio_samples,
        });
        Ok(())
    }
}
