//! Audio track mixing
//!
//! Combines the per-source WAV sinks into the single soundtrack handed to
//! the encoder. Tracks are streamed frame by frame: each is converted to a
//! common format, delayed relative to the earliest track, and summed with
//! clipping into one writer, so memory use does not grow with track length.

use crate::capture::audio::AudioFormat;
use crate::recorder::audio::PcmTrack;
use crate::recorder::channel::{RecordingError, RecordingResult};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

type SampleStream = hound::WavIntoSamples<BufReader<File>, i16>;

fn mix_error(context: &str, err: impl std::fmt::Display) -> RecordingError {
    RecordingError::EncodingFailed(format!("audio mix failed: {}: {}", context, err))
}

/// The soundtrack produced by [`mix_tracks`]
#[derive(Debug, Clone, PartialEq)]
pub struct MixedAudio {
    pub path: PathBuf,
    /// Delay between session start and the first sample of `path`
    pub start_offset: Duration,
}

/// Merge `tracks` into one WAV file at `dest`.
///
/// Returns `None` when there is nothing to mix. A single track is moved into
/// place as-is. The input files are removed in every case.
pub fn mix_tracks(tracks: Vec<PcmTrack>, dest: &Path) -> RecordingResult<Option<MixedAudio>> {
    let start_offset = tracks
        .iter()
        .map(|t| t.start_offset)
        .min()
        .unwrap_or_default();

    let result = match tracks.len() {
        0 => Ok(None),
        1 => move_track(&tracks[0].path, dest).map(Some),
        _ => mix_many(&tracks, start_offset, dest).map(|_| Some(dest.to_path_buf())),
    };

    for track in &tracks {
        if track.path != dest && track.path.exists() {
            let _ = std::fs::remove_file(&track.path);
        }
    }

    result.map(|mixed| mixed.map(|path| MixedAudio { path, start_offset }))
}

fn move_track(src: &Path, dest: &Path) -> RecordingResult<PathBuf> {
    if std::fs::rename(src, dest).is_err() {
        std::fs::copy(src, dest).map_err(|e| mix_error("copy", e))?;
        let _ = std::fs::remove_file(src);
    }
    Ok(dest.to_path_buf())
}

fn mix_many(tracks: &[PcmTrack], earliest: Duration, dest: &Path) -> RecordingResult<()> {
    let target = AudioFormat::new(
        tracks.iter().map(|t| t.format.sample_rate).max().unwrap_or(44_100),
        tracks.iter().map(|t| t.format.channels).max().unwrap_or(1),
    );

    let mut streams = tracks
        .iter()
        .map(|track| TrackStream::open(track, target, track.start_offset - earliest))
        .collect::<RecordingResult<Vec<_>>>()?;

    let spec = hound::WavSpec {
        channels: target.channels,
        sample_rate: target.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(dest, spec).map_err(|e| mix_error("create", e))?;

    let channels = target.channels as usize;
    let mut frame = vec![0i16; channels];
    let mut sum = vec![0i32; channels];
    let mut frames_written = 0u64;

    loop {
        sum.fill(0);
        let mut any = false;
        for stream in &mut streams {
            if stream.next_frame(&mut frame)? {
                any = true;
                for (acc, &sample) in sum.iter_mut().zip(&frame) {
                    *acc += sample as i32;
                }
            }
        }
        if !any {
            break;
        }

        for &value in &sum {
            writer
                .write_sample(clip(value))
                .map_err(|e| mix_error("write", e))?;
        }
        frames_written += 1;
    }
    writer.finalize().map_err(|e| mix_error("finalize", e))?;

    tracing::info!(
        "Mixed {} audio tracks into {} ({}Hz, {}ch, {} frames)",
        tracks.len(),
        dest.display(),
        target.sample_rate,
        target.channels,
        frames_written
    );
    Ok(())
}

/// Clip a sum of samples to the i16 range
fn clip(sum: i32) -> i16 {
    sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Frames needed to cover `offset` at `sample_rate`
fn silence_frames(offset: Duration, sample_rate: u32) -> u64 {
    (offset.as_secs_f64() * sample_rate as f64).round() as u64
}

/// Change the channel count of one interleaved frame.
///
/// Down to mono averages the frame. Otherwise output channel `c` copies
/// input channel `c % from`, so mono is duplicated across all outputs.
fn convert_frame(frame: &[i16], to: usize, out: &mut Vec<i16>) {
    out.clear();
    let from = frame.len().max(1);
    if to == 1 {
        let sum: i32 = frame.iter().map(|&s| s as i32).sum();
        out.push((sum / from as i32) as i16);
    } else {
        out.extend((0..to).map(|c| frame.get(c % from).copied().unwrap_or(0)));
    }
}

/// One track read as frames in the mix format.
///
/// Emits `lead` frames of silence, then the track resampled by linear
/// interpolation. Only two source frames are held at a time.
struct TrackStream {
    samples: SampleStream,
    in_channels: usize,
    out_channels: usize,
    in_frames: u64,
    out_frames: u64,
    step: f64,
    lead: u64,
    produced: u64,
    /// Source frames at `index` and `index + 1`, converted to the mix layout
    current: Vec<i16>,
    next: Vec<i16>,
    index: u64,
    loaded: bool,
    raw: Vec<i16>,
}

impl TrackStream {
    fn open(track: &PcmTrack, target: AudioFormat, delay: Duration) -> RecordingResult<Self> {
        let reader = hound::WavReader::open(&track.path).map_err(|e| mix_error("open", e))?;
        let spec = reader.spec();
        let in_frames = reader.duration() as u64;
        let (from_rate, to_rate) = (spec.sample_rate.max(1), target.sample_rate.max(1));

        Ok(Self {
            samples: reader.into_samples::<i16>(),
            in_channels: spec.channels.max(1) as usize,
            out_channels: target.channels.max(1) as usize,
            in_frames,
            out_frames: in_frames * to_rate as u64 / from_rate as u64,
            step: from_rate as f64 / to_rate as f64,
            lead: silence_frames(delay, to_rate),
            produced: 0,
            current: Vec::new(),
            next: Vec::new(),
            index: 0,
            loaded: false,
            raw: Vec::new(),
        })
    }

    /// Read the next source frame converted to the mix layout
    fn read_frame(&mut self, out: &mut Vec<i16>) -> RecordingResult<()> {
        self.raw.clear();
        for _ in 0..self.in_channels {
            match self.samples.next() {
                Some(sample) => self.raw.push(sample.map_err(|e| mix_error("decode", e))?),
                None => self.raw.push(0),
            }
        }
        convert_frame(&self.raw, self.out_channels, out);
        Ok(())
    }

    /// Source frame after `index`, or the last frame again at the end
    fn load_next(&mut self) -> RecordingResult<()> {
        if self.index + 1 < self.in_frames {
            let mut next = std::mem::take(&mut self.next);
            self.read_frame(&mut next)?;
            self.next = next;
        } else {
            self.next.clone_from(&self.current);
        }
        Ok(())
    }

    /// Fill `out` with the next frame. Returns false once the track is done.
    fn next_frame(&mut self, out: &mut [i16]) -> RecordingResult<bool> {
        if self.lead > 0 {
            self.lead -= 1;
            out.fill(0);
            return Ok(true);
        }
        if self.produced >= self.out_frames {
            return Ok(false);
        }

        if !self.loaded {
            let mut first = Vec::new();
            self.read_frame(&mut first)?;
            self.current = first;
            self.load_next()?;
            self.loaded = true;
        }

        let pos = self.produced as f64 * self.step;
        let target = (pos.floor() as u64).min(self.in_frames - 1);
        while self.index < target {
            std::mem::swap(&mut self.current, &mut self.next);
            self.index += 1;
            self.load_next()?;
        }

        let frac = pos - self.index as f64;
        for (c, slot) in out.iter_mut().enumerate() {
            let a = self.current[c] as f64;
            let b = self.next[c] as f64;
            *slot = (a + (b - a) * frac).round() as i16;
        }
        self.produced += 1;
        Ok(true)
    }
}
