//! Audio capture channels
//!
//! Each requested source gets its own device stream and its own WAV sink in
//! the session's working directory. A source that cannot be opened is
//! reported and skipped; the others keep recording.

use crate::capture::audio::{AudioChunk, AudioFormat, AudioInput, AudioSource};
use crate::recorder::channel::{
    ChannelContext, ChannelOutput, ChannelType, PauseFlag, RecordingChannel, RecordingError,
    RecordingResult,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

type WavSink = hound::WavWriter<BufWriter<File>>;

/// A finished PCM file for one source
#[derive(Debug, Clone, PartialEq)]
pub struct PcmTrack {
    pub input: AudioSource,
    pub path: PathBuf,
    pub format: AudioFormat,
    /// Delay between session start and the first recorded buffer
    pub start_offset: Duration,
    /// Total interleaved samples written
    pub samples_written: u64,
}

impl PcmTrack {
    pub fn duration(&self) -> Duration {
        let frames = self.samples_written / self.format.channels.max(1) as u64;
        Duration::from_secs_f64(frames as f64 / self.format.sample_rate.max(1) as f64)
    }
}

#[derive(Default)]
struct SinkState {
    writer: Option<WavSink>,
    first_chunk_at: Option<Instant>,
    samples_written: u64,
    write_failed: bool,
}

impl SinkState {
    fn accept(&mut self, chunk: &AudioChunk) {
        if self.write_failed {
            return;
        }
        let Some(writer) = self.writer.as_mut() else {
            return;
        };

        for &sample in &chunk.samples {
            if let Err(e) = writer.write_sample(sample) {
                tracing::error!("Failed to write {} audio: {}", chunk.source, e);
                self.write_failed = true;
                return;
            }
        }

        self.first_chunk_at.get_or_insert(chunk.received_at);
        self.samples_written += chunk.samples.len() as u64;
    }
}

/// The device thread and what it was opened with
struct RunningStream {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
    path: PathBuf,
    format: AudioFormat,
    epoch: Instant,
}

/// One audio source recorded into one WAV file.
///
/// The device stream lives on a dedicated thread because platform stream
/// handles cannot move between threads.
pub struct AudioSourceChannel {
    id: String,
    source: AudioSource,
    input: Arc<dyn AudioInput>,
    sink: Arc<Mutex<SinkState>>,
    running: Option<RunningStream>,
}

impl AudioSourceChannel {
    pub fn new(source: AudioSource, input: Arc<dyn AudioInput>) -> Self {
        Self {
            id: format!("audio-{}", source.file_stem()),
            source,
            input,
            sink: Arc::new(Mutex::new(SinkState::default())),
            running: None,
        }
    }

    fn sink_path(work_dir: &Path, source: AudioSource) -> PathBuf {
        work_dir
            .join("audio")
            .join(format!("{}.wav", source.file_stem()))
    }
}

#[async_trait]
impl RecordingChannel for AudioSourceChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel_type(&self) -> ChannelType {
        self.source.into()
    }

    async fn start(&mut self, ctx: &ChannelContext) -> RecordingResult<()> {
        if self.running.is_some() {
            return Err(RecordingError::AlreadyRunning);
        }

        let path = Self::sink_path(&ctx.work_dir, self.source);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        *self.sink.lock() = SinkState::default();

        let (ready_tx, ready_rx) = oneshot::channel::<RecordingResult<AudioFormat>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let source = self.source;
        let input = self.input.clone();
        let sink = self.sink.clone();
        let pause: PauseFlag = ctx.pause.clone();
        let wav_path = path.clone();

        let thread = std::thread::Builder::new()
            .name(format!("audio-{}", source.file_stem()))
            .spawn(move || {
                let callback_sink = sink.clone();
                let opened = input.open(
                    source,
                    Box::new(move |chunk: AudioChunk| {
                        // Devices stay open while paused; what arrives is dropped
                        if pause.is_paused() {
                            return;
                        }
                        callback_sink.lock().accept(&chunk);
                    }),
                );

                let stream = match opened {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let spec = hound::WavSpec {
                    channels: stream.format.channels,
                    sample_rate: stream.format.sample_rate,
                    bits_per_sample: 16,
                    sample_format: hound::SampleFormat::Int,
                };
                match hound::WavWriter::create(&wav_path, spec) {
                    Ok(writer) => sink.lock().writer = Some(writer),
                    Err(e) => {
                        let _ = ready_tx.send(Err(RecordingError::SessionStartFailed(format!(
                            "failed to create {} sink: {}",
                            source, e
                        ))));
                        return;
                    }
                }

                tracing::info!("{} audio capture started on {}", source, stream.device_name);
                let _ = ready_tx.send(Ok(stream.format));

                // Hold the stream until asked to stop or the channel is dropped
                let _ = stop_rx.recv();
                drop(stream);
            })?;

        let format = match ready_rx.await {
            Ok(Ok(format)) => format,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(RecordingError::DeviceUnavailable {
                    input: self.source,
                    reason: "audio thread exited before the device opened".to_string(),
                });
            }
        };

        self.running = Some(RunningStream {
            stop_tx,
            thread,
            path,
            format,
            epoch: ctx.epoch,
        });
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<ChannelOutput> {
        let running = self.running.take().ok_or(RecordingError::NotRunning)?;
        let _ = running.stop_tx.send(());

        let thread = running.thread;
        tokio::task::spawn_blocking(move || {
            if thread.join().is_err() {
                tracing::error!("Audio thread panicked");
            }
        })
        .await
        .map_err(|e| RecordingError::EncodingFailed(format!("audio thread join failed: {}", e)))?;

        let state = std::mem::take(&mut *self.sink.lock());
        if let Some(writer) = state.writer {
            writer.finalize().map_err(|e| {
                RecordingError::EncodingFailed(format!("failed to finalize {} audio: {}", self.source, e))
            })?;
        }

        if state.samples_written == 0 {
            tracing::info!("No {} audio was captured", self.source);
            let _ = std::fs::remove_file(&running.path);
            return Ok(ChannelOutput::None);
        }

        let start_offset = state
            .first_chunk_at
            .map(|t| t.saturating_duration_since(running.epoch))
            .unwrap_or_default();

        tracing::info!(
            "{} audio capture stopped: {} samples",
            self.source,
            state.samples_written
        );

        Ok(ChannelOutput::Pcm(PcmTrack {
            input: self.source,
            path: running.path,
            format: running.format,
            start_offset,
            samples_written: state.samples_written,
        }))
    }

    fn is_recording(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for AudioSourceChannel {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop_tx.send(());
        }
    }
}

/// Records every requested audio source into its own sink
pub struct AudioCaptureLoop {
    input: Arc<dyn AudioInput>,
    channels: Vec<Box<dyn RecordingChannel>>,
}

impl AudioCaptureLoop {
    pub fn new(input: Arc<dyn AudioInput>) -> Self {
        Self {
            input,
            channels: Vec::new(),
        }
    }

    /// Open each source in turn.
    ///
    /// Returns the sources that failed to open. A failed source is left out
    /// of the recording but does not stop the others.
    pub async fn start(
        &mut self,
        ctx: &ChannelContext,
        sources: &[AudioSource],
    ) -> Vec<(AudioSource, RecordingError)> {
        let mut failures = Vec::new();

        for &source in sources {
            let mut channel: Box<dyn RecordingChannel> =
                Box::new(AudioSourceChannel::new(source, self.input.clone()));
            match channel.start(ctx).await {
                Ok(()) => self.channels.push(channel),
                Err(e) => {
                    tracing::warn!("{} audio unavailable: {}", source, e);
                    failures.push((source, e));
                }
            }
        }

        failures
    }

    /// Number of sources currently recording
    pub fn active_count(&self) -> usize {
        self.channels.iter().filter(|c| c.is_recording()).count()
    }

    /// Stop every source and collect the tracks that captured anything
    pub async fn stop(&mut self) -> Vec<PcmTrack> {
        let mut tracks = Vec::new();

        for mut channel in self.channels.drain(..) {
            match channel.stop().await {
                Ok(ChannelOutput::Pcm(track)) => {
                    tracing::debug!(
                        "{} track is {:.2}s long, starting {:?} into the session",
                        track.input,
                        track.duration().as_secs_f64(),
                        track.start_offset
                    );
                    tracks.push(track);
                }
                Ok(_) => {}
                Err(e) => tracing::error!(
                    "Failed to stop {} channel {}: {}",
                    channel.channel_type(),
                    channel.id(),
                    e
                ),
            }
        }

        tracks
    }
}
