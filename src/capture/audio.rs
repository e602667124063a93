//! Cross-platform audio capture using cpal
//!
//! Opens the microphone and the system-output loopback as device streams and
//! hands every delivered buffer to a callback as an [`AudioChunk`].

use crate::capture::traits::AudioDeviceInfo;
use crate::recorder::channel::{RecordingError, RecordingResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, StreamConfig};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::time::Instant;

/// Named audio inputs a session can record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioSource {
    /// Loopback of the default audio output
    System,
    /// Default input device
    Microphone,
}

impl AudioSource {
    /// File stem used for this source's sink
    pub fn file_stem(&self) -> &'static str {
        match self {
            AudioSource::System => "system",
            AudioSource::Microphone => "mic",
        }
    }
}

impl std::fmt::Display for AudioSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioSource::System => write!(f, "system"),
            AudioSource::Microphone => write!(f, "microphone"),
        }
    }
}

/// PCM layout of a sink. Samples are always signed 16-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    /// Microphone capture format: 44.1 kHz, 16-bit, mono
    pub const MICROPHONE: AudioFormat = AudioFormat {
        sample_rate: 44_100,
        channels: 1,
    };

    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }
}

/// One buffer delivered by a device
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub source: AudioSource,
    /// Interleaved samples
    pub samples: Vec<i16>,
    pub received_at: Instant,
}

/// Receives every buffer a stream delivers, on the device's callback thread
pub type ChunkCallback = Box<dyn FnMut(AudioChunk) + Send + 'static>;

/// A running device stream. Capture stops when this is dropped.
///
/// Not `Send`: it must be dropped on the thread that opened it.
pub struct OpenStream {
    pub format: AudioFormat,
    pub device_name: String,
    _stream: Box<dyn Any>,
}

impl OpenStream {
    pub fn new(format: AudioFormat, device_name: impl Into<String>, stream: impl Any) -> Self {
        Self {
            format,
            device_name: device_name.into(),
            _stream: Box::new(stream),
        }
    }
}

/// Opens capture streams for the named sources
pub trait AudioInput: Send + Sync {
    /// Open `source` and start delivering buffers to `on_chunk`.
    ///
    /// Fails with `DeviceUnavailable` when the device is missing or refuses
    /// the requested format.
    fn open(&self, source: AudioSource, on_chunk: ChunkCallback) -> RecordingResult<OpenStream>;
}

/// Device-backed audio input using the default cpal host
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalAudioInput;

impl CpalAudioInput {
    pub fn new() -> Self {
        Self
    }

    fn open_microphone(&self, on_chunk: ChunkCallback) -> RecordingResult<OpenStream> {
        let unavailable = |reason: String| RecordingError::DeviceUnavailable {
            input: AudioSource::Microphone,
            reason,
        };

        let device = get_default_input_device()
            .ok_or_else(|| unavailable("No default audio input device".to_string()))?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let sample_format = device
            .default_input_config()
            .map_err(|e| unavailable(format!("Failed to get audio config: {}", e)))?
            .sample_format();

        let stream_config = StreamConfig {
            channels: AudioFormat::MICROPHONE.channels,
            sample_rate: cpal::SampleRate(AudioFormat::MICROPHONE.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = build_stream(
            &device,
            &stream_config,
            sample_format,
            AudioSource::Microphone,
            on_chunk,
        )
        .map_err(unavailable)?;

        stream
            .play()
            .map_err(|e| unavailable(format!("Failed to start microphone stream: {}", e)))?;

        tracing::info!(
            "Microphone stream started: {} ({:?}, {}Hz, {}ch)",
            device_name,
            sample_format,
            stream_config.sample_rate.0,
            stream_config.channels
        );

        Ok(OpenStream::new(AudioFormat::MICROPHONE, device_name, stream))
    }

    fn open_loopback(&self, on_chunk: ChunkCallback) -> RecordingResult<OpenStream> {
        let unavailable = |reason: String| RecordingError::DeviceUnavailable {
            input: AudioSource::System,
            reason,
        };

        let (device, config) = find_loopback_device()
            .ok_or_else(|| unavailable("No loopback capture device found".to_string()))?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let sample_format = config.sample_format();
        let stream_config: StreamConfig = config.into();
        let format = AudioFormat::new(stream_config.sample_rate.0, stream_config.channels);

        let stream = build_stream(
            &device,
            &stream_config,
            sample_format,
            AudioSource::System,
            on_chunk,
        )
        .map_err(unavailable)?;

        stream
            .play()
            .map_err(|e| unavailable(format!("Failed to start loopback stream: {}", e)))?;

        tracing::info!(
            "System audio loopback stream started: {} ({}Hz, {}ch)",
            device_name,
            format.sample_rate,
            format.channels
        );

        Ok(OpenStream::new(format, device_name, stream))
    }
}

impl AudioInput for CpalAudioInput {
    fn open(&self, source: AudioSource, on_chunk: ChunkCallback) -> RecordingResult<OpenStream> {
        match source {
            AudioSource::Microphone => self.open_microphone(on_chunk),
            AudioSource::System => self.open_loopback(on_chunk),
        }
    }
}

/// Build an input stream that converts every buffer to i16
fn build_stream(
    device: &Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    source: AudioSource,
    on_chunk: ChunkCallback,
) -> Result<cpal::Stream, String> {
    let result = match sample_format {
        SampleFormat::F32 => build_converting_stream(device, config, source, on_chunk, f32_to_i16),
        SampleFormat::I16 => build_converting_stream(device, config, source, on_chunk, |s: i16| s),
        SampleFormat::U16 => build_converting_stream(device, config, source, on_chunk, u16_to_i16),
        other => return Err(format!("Unsupported sample format: {:?}", other)),
    };

    result.map_err(|e| format!("Failed to build {} stream: {}", source, e))
}

fn build_converting_stream<T, F>(
    device: &Device,
    config: &StreamConfig,
    source: AudioSource,
    mut on_chunk: ChunkCallback,
    convert: F,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    F: Fn(T) -> i16 + Send + 'static,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            on_chunk(AudioChunk {
                source,
                samples: data.iter().map(|&s| convert(s)).collect(),
                received_at: Instant::now(),
            });
        },
        move |err| tracing::error!("{} audio stream error: {}", source, err),
        None,
    )
}

pub(crate) fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

pub(crate) fn u16_to_i16(sample: u16) -> i16 {
    (sample as i32 - 32_768) as i16
}

/// Get list of available audio input devices
pub fn get_audio_input_devices() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    if let Ok(input_devices) = host.input_devices() {
        for device in input_devices {
            if let Ok(name) = device.name() {
                let is_default = default_name.as_ref() == Some(&name);
                devices.push(AudioDeviceInfo {
                    id: name.clone(),
                    name,
                    is_input: true,
                    is_default,
                });
            }
        }
    }

    devices
}

/// Get the default audio input device
pub fn get_default_input_device() -> Option<Device> {
    cpal::default_host().default_input_device()
}

/// Find a device that captures what the system is playing.
///
/// WASAPI supports loopback by opening an input stream on the default
/// output device. Other hosts expose loopback as "monitor" input devices.
#[cfg(target_os = "windows")]
fn find_loopback_device() -> Option<(Device, cpal::SupportedStreamConfig)> {
    let device = cpal::default_host().default_output_device()?;
    let config = device.default_output_config().ok()?;
    Some((device, config))
}

#[cfg(not(target_os = "windows"))]
fn find_loopback_device() -> Option<(Device, cpal::SupportedStreamConfig)> {
    let host = cpal::default_host();
    let devices = host.input_devices().ok()?;

    for device in devices {
        let is_monitor = device
            .name()
            .map(|name| name.to_lowercase().contains("monitor"))
            .unwrap_or(false);
        if is_monitor {
            if let Ok(config) = device.default_input_config() {
                return Some((device, config));
            }
        }
    }

    None
}
