//! FFmpeg-based encoding
//!
//! Captured frames are decoded and piped to an FFmpeg child process as raw
//! RGBA. The mixed soundtrack, if any, is passed as a second input and
//! muxed into the same container.

use super::types::{EncodeJob, ExportError, ExportFormat, MediaEncoder};
use crate::capture::traits::CapturedFrame;
use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};

/// Highest frame rate used for GIF output
const GIF_MAX_FPS: u32 = 15;

/// Encoder that shells out to an `ffmpeg` binary
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: String,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self::with_binary("ffmpeg")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn spawn(&self, args: &[String]) -> Result<(Child, ChildStdin), ExportError> {
        tracing::info!("Starting FFmpeg encoder: {:?}", args);

        let mut process = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExportError::Ffmpeg(format!("Failed to start FFmpeg encoder: {}", e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| ExportError::Ffmpeg("Failed to capture FFmpeg stdin".to_string()))?;

        Ok((process, stdin))
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaEncoder for FfmpegEncoder {
    fn check_available(&self) -> Result<(), ExportError> {
        let output = Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| ExportError::Ffmpeg(format!("FFmpeg not found ({}): {}", self.binary, e)))?;

        if !output.success() {
            return Err(ExportError::Ffmpeg(format!(
                "{} -version exited with {}",
                self.binary, output
            )));
        }
        Ok(())
    }

    fn encode(&self, job: &EncodeJob) -> Result<(), ExportError> {
        if job.frames.is_empty() {
            return Err(ExportError::NoFrames);
        }

        let args = build_encode_args(job);
        let (mut process, mut stdin) = self.spawn(&args)?;

        let mut written = 0u64;
        let mut write_error = None;
        for index in 0..job.frames.count {
            let frame = match read_matching_frame(job, index) {
                Ok(frame) => frame,
                Err(e) => {
                    drop(stdin);
                    let _ = process.kill();
                    let _ = process.wait();
                    return Err(e);
                }
            };

            // A failed write means FFmpeg exited; its stderr says why
            if let Err(e) = stdin.write_all(&frame.data) {
                write_error = Some(e);
                break;
            }
            written += 1;
        }

        // Close stdin to signal EOF to FFmpeg
        drop(stdin);

        let output = process
            .wait_with_output()
            .map_err(|e| ExportError::Ffmpeg(format!("Failed to wait for FFmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::Ffmpeg(format!(
                "FFmpeg exited with error: {}",
                stderr.trim()
            )));
        }
        if let Some(e) = write_error {
            return Err(ExportError::Encoding(format!("Failed to write frame: {}", e)));
        }

        tracing::info!(
            "FFmpeg encoder finished: {} frames written to {}",
            written,
            job.output_path.display()
        );
        Ok(())
    }
}

fn read_matching_frame(job: &EncodeJob, index: u64) -> Result<CapturedFrame, ExportError> {
    let frame = job.frames.read_frame(index)?;
    if frame.width != job.frames.width || frame.height != job.frames.height {
        return Err(ExportError::Encoding(format!(
            "frame {} is {}x{}, expected {}x{}",
            index, frame.width, frame.height, job.frames.width, job.frames.height
        )));
    }
    Ok(frame)
}

/// Height the output is scaled to; encoders need even dimensions
fn output_height(target_height: u32) -> u32 {
    (target_height & !1).max(2)
}

/// Length of the frame sequence at the output rate
fn video_duration_secs(job: &EncodeJob) -> f64 {
    job.frames.count as f64 / job.frame_rate.max(1) as f64
}

/// Build the FFmpeg command line for `job`
pub fn build_encode_args(job: &EncodeJob) -> Vec<String> {
    let height = output_height(job.target_height);
    let audio = job.audio.as_ref().filter(|_| job.format.supports_audio());

    let mut args = vec![
        "-y".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgba".to_string(),
        "-s".to_string(),
        format!("{}x{}", job.frames.width, job.frames.height),
        "-r".to_string(),
        job.frame_rate.to_string(),
        "-i".to_string(),
        "-".to_string(), // stdin for video frames
    ];

    if let Some(audio_path) = audio {
        if !job.audio_offset.is_zero() {
            args.extend([
                "-itsoffset".to_string(),
                format!("{:.3}", job.audio_offset.as_secs_f64()),
            ]);
        }
        args.extend([
            "-i".to_string(),
            audio_path.to_string_lossy().to_string(),
        ]);
    }

    let crf = job.quality.crf().to_string();
    match job.format {
        ExportFormat::Mp4 => {
            args.extend([
                "-vf".to_string(),
                format!("scale=-2:{}", height),
                "-c:v".to_string(),
                job.format.video_codec().to_string(),
                "-preset".to_string(),
                job.quality.h264_preset().to_string(),
                "-crf".to_string(),
                crf,
                "-pix_fmt".to_string(),
                "yuv420p".to_string(),
                "-movflags".to_string(),
                "+faststart".to_string(),
            ]);
        }
        ExportFormat::Webm => {
            args.extend([
                "-vf".to_string(),
                format!("scale=-2:{}", height),
                "-c:v".to_string(),
                job.format.video_codec().to_string(),
                "-crf".to_string(),
                crf,
                "-b:v".to_string(),
                "0".to_string(),
            ]);
        }
        ExportFormat::Gif => {
            // GIF needs a palette pass
            args.extend([
                "-vf".to_string(),
                format!(
                    "fps={},scale=-2:{}:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse",
                    job.frame_rate.min(GIF_MAX_FPS),
                    height
                ),
            ]);
        }
    }

    if let (Some(_), Some(codec)) = (audio, job.format.audio_codec()) {
        args.extend([
            "-map".to_string(),
            "0:v".to_string(),
            "-map".to_string(),
            "1:a".to_string(),
            "-c:a".to_string(),
            codec.to_string(),
            "-b:a".to_string(),
            format!("{}k", job.audio_bitrate_kbps),
            // The picture sets the length; trailing audio is cut
            "-t".to_string(),
            format!("{:.3}", video_duration_secs(job)),
        ]);
    }

    if job.format != ExportFormat::Gif {
        args.extend(["-r".to_string(), job.frame_rate.to_string()]);
    }

    args.push(job.output_path.to_string_lossy().to_string());
    args
}
