//! On-disk frame storage
//!
//! Captured frames are written as numbered PNG files in the session's
//! working directory and read back in order by the encoder.

use crate::capture::traits::CapturedFrame;
use crate::export::types::ExportError;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

fn frame_file_name(index: u64) -> String {
    format!("frame_{:06}.png", index)
}

/// Writes frames into a directory, one PNG per frame
#[derive(Debug)]
pub struct FrameStore {
    dir: PathBuf,
}

impl FrameStore {
    /// Create the frame directory
    pub fn create(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(frame_file_name(index))
    }

    /// Persist `frame` as frame number `index`.
    ///
    /// A partially written file is removed on failure so the directory only
    /// ever holds complete frames.
    pub fn write(&self, index: u64, frame: &CapturedFrame) -> io::Result<()> {
        let path = self.frame_path(index);
        let result = write_png(&path, frame);
        if result.is_err() {
            let _ = std::fs::remove_file(&path);
        }
        result
    }
}

fn write_png(path: &Path, frame: &CapturedFrame) -> io::Result<()> {
    if !frame.is_well_formed() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "frame buffer of {} bytes does not match {}x{}",
                frame.data.len(),
                frame.width,
                frame.height
            ),
        ));
    }

    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Fast);

    let mut writer = encoder
        .write_header()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    writer
        .write_image_data(&frame.data)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    writer
        .finish()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    Ok(())
}

/// The frames a capture loop produced, numbered `0..count`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSequence {
    pub dir: PathBuf,
    pub count: u64,
    pub width: u32,
    pub height: u32,
}

impl FrameSequence {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(frame_file_name(index))
    }

    /// Load frame `index` as RGBA data
    pub fn read_frame(&self, index: u64) -> Result<CapturedFrame, ExportError> {
        let file = File::open(self.frame_path(index))?;
        let decoder = png::Decoder::new(file);
        let mut reader = decoder
            .read_info()
            .map_err(|e| ExportError::Decoding(format!("PNG decode error: {}", e)))?;

        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| ExportError::Decoding(format!("PNG frame error: {}", e)))?;

        let data = match info.color_type {
            png::ColorType::Rgba => buf[..info.buffer_size()].to_vec(),
            png::ColorType::Rgb => {
                let rgb = &buf[..info.buffer_size()];
                let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
                for chunk in rgb.chunks(3) {
                    rgba.extend_from_slice(chunk);
                    rgba.push(255);
                }
                rgba
            }
            _ => {
                return Err(ExportError::Decoding(format!(
                    "Unsupported PNG color type: {:?}",
                    info.color_type
                )));
            }
        };

        Ok(CapturedFrame {
            data,
            width: info.width,
            height: info.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> CapturedFrame {
        CapturedFrame {
            data: rgba.repeat((width * height) as usize),
            width,
            height,
        }
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::create(dir.path().join("frames")).unwrap();
        store.write(0, &solid(4, 3, [10, 20, 30, 255])).unwrap();

        assert!(store.frame_path(0).ends_with("frame_000000.png"));

        let sequence = FrameSequence {
            dir: store.dir().to_path_buf(),
            count: 1,
            width: 4,
            height: 3,
        };
        let frame = sequence.read_frame(0).unwrap();
        assert_eq!((frame.width, frame.height), (4, 3));
        assert_eq!(&frame.data[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_malformed_frame_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::create(dir.path()).unwrap();
        let bad = CapturedFrame {
            data: vec![0; 7],
            width: 2,
            height: 2,
        };

        assert!(store.write(0, &bad).is_err());
        assert!(!store.frame_path(0).exists());
    }
}
