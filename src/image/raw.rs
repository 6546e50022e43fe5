//! Memory-mapped raw image stacks
//!
//! A raw stack is a headerless file of `count * width * height` signed
//! 16-bit little-endian pixels, frame after frame in row-major order.

use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use log::debug;
use memmap2::{Mmap, MmapOptions};

use crate::error::{Result, StreamError};

use super::{Frame, ImageSource};

const PIXEL_BYTES: usize = std::mem::size_of::<i16>();

/// Read-only view of a raw stack file
#[derive(Debug)]
pub struct RawStackSource {
    path: PathBuf,
    mmap: Mmap,
    width: usize,
    height: usize,
    count: usize,
}

impl RawStackSource {
    /// Map `path` as a stack of `width` x `height` frames
    pub fn open<P: AsRef<Path>>(path: P, width: usize, height: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if width == 0 || height == 0 {
            return Err(StreamError::invalid_parameter(
                "width/height",
                "Frame dimensions must be non-zero",
            ));
        }

        let file = File::open(&path)
            .map_err(|e| StreamError::from_io(e, &format!("Failed to open {}", path.display())))?;
        let len = file
            .metadata()
            .map_err(|e| StreamError::from_io(e, "Failed to read file metadata"))?
            .len() as usize;

        let frame_bytes = width * height * PIXEL_BYTES;
        if len == 0 || len % frame_bytes != 0 {
            return Err(StreamError::image(format!(
                "{} is {} bytes, not a whole number of {}x{} frames",
                path.display(),
                len,
                width,
                height
            )));
        }

        // Safety: the mapping is read-only and the file is not modified
        // while the source is alive.
        let mmap = unsafe {
            MmapOptions::new()
                .len(len)
                .map(&file)
                .map_err(|e| StreamError::from_io(e, "Failed to create memory mapping"))?
        };

        let count = len / frame_bytes;
        debug!(
            "Mapped {} frames of {}x{} from {}",
            count,
            width,
            height,
            path.display()
        );

        Ok(Self {
            path,
            mmap,
            width,
            height,
            count,
        })
    }

    /// Write frames as a raw stack
    pub fn write<P: AsRef<Path>>(path: P, frames: &[Frame]) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path)
            .map_err(|e| StreamError::from_io(e, &format!("Failed to create {}", path.display())))?;

        let mut bytes = Vec::new();
        for frame in frames {
            bytes.clear();
            bytes.reserve(frame.pixel_count() * PIXEL_BYTES);
            for pixel in frame.pixels() {
                bytes.extend_from_slice(&pixel.to_le_bytes());
            }
            file.write_all(&bytes)
                .map_err(|e| StreamError::from_io(e, "Failed to write frame"))?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

impl ImageSource for RawStackSource {
    fn image_count(&self) -> usize {
        self.count
    }

    fn image(&self, index: usize) -> Result<Frame> {
        if index >= self.count {
            return Err(StreamError::image(format!(
                "image {} requested from {} with {} frames",
                index,
                self.path.display(),
                self.count
            )));
        }

        let frame_bytes = self.width * self.height * PIXEL_BYTES;
        let start = index * frame_bytes;
        let pixels = self.mmap[start..start + frame_bytes]
            .chunks_exact(PIXEL_BYTES)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();

        Ok(Frame::from_parts(index, self.width, self.height, pixels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_map() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stack.raw");

        let frames = vec![
            Frame::new(0, 2, 2, vec![1, -2, 300, -400]).unwrap(),
            Frame::new(1, 2, 2, vec![i16::MAX, i16::MIN, 0, 7]).unwrap(),
        ];
        RawStackSource::write(&path, &frames).unwrap();

        let source = RawStackSource::open(&path, 2, 2).unwrap();
        assert_eq!(source.image_count(), 2);
        assert_eq!(source.image(1).unwrap().pixels(), frames[1].pixels());
        assert_eq!(source.image(0).unwrap().index(), 0);
        assert!(matches!(source.image(2), Err(StreamError::Image { .. })));
    }

    #[test]
    fn test_partial_frame_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.raw");
        std::fs::write(&path, [0u8; 14]).unwrap();

        let err = RawStackSource::open(&path, 2, 2).unwrap_err();
        assert!(matches!(err, StreamError::Image { .. }));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = RawStackSource::open(dir.path().join("absent.raw"), 2, 2).unwrap_err();
        assert!(matches!(err, StreamError::Io { .. }));
    }
}
