//! Shared, immutable 16-bit frames

use std::sync::Arc;

use crate::error::{Result, StreamError};

/// A gray-scale image with 16-bit pixels in row-major order.
///
/// Cloning a frame shares its pixel storage; the storage is freed when the
/// last clone is dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    index: usize,
    width: usize,
    height: usize,
    pixels: Arc<[i16]>,
}

impl Frame {
    /// Create a frame, checking that `pixels` matches the dimensions
    pub fn new(index: usize, width: usize, height: usize, pixels: Vec<i16>) -> Result<Self> {
        if pixels.len() != width * height {
            return Err(StreamError::image(format!(
                "frame {} has {} pixels, {}x{} needs {}",
                index,
                pixels.len(),
                width,
                height,
                width * height
            )));
        }
        Ok(Self {
            index,
            width,
            height,
            pixels: pixels.into(),
        })
    }

    /// Frame from pixels generated for exactly `width * height`
    pub(crate) fn from_parts(index: usize, width: usize, height: usize, pixels: Vec<i16>) -> Self {
        debug_assert_eq!(pixels.len(), width * height);
        Self {
            index,
            width,
            height,
            pixels: pixels.into(),
        }
    }

    /// Create a frame with every pixel set to `value`
    pub fn filled(index: usize, width: usize, height: usize, value: i16) -> Self {
        Self {
            index,
            width,
            height,
            pixels: vec![value; width * height].into(),
        }
    }

    /// Position of the frame in its stack
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixels(&self) -> &[i16] {
        &self.pixels
    }

    /// One row of pixels
    pub fn row(&self, row: usize) -> Option<&[i16]> {
        if row >= self.height {
            return None;
        }
        Some(&self.pixels[row * self.width..(row + 1) * self.width])
    }

    /// Whether the frame has the given dimensions
    pub fn has_size(&self, width: usize, height: usize) -> bool {
        self.width == width && self.height == height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_storage() {
        let frame = Frame::new(0, 2, 2, vec![1, 2, 3, 4]).unwrap();
        let copy = frame.clone();
        assert!(Arc::ptr_eq(&frame.pixels, &copy.pixels));
        assert_eq!(Arc::strong_count(&frame.pixels), 2);
        drop(copy);
        assert_eq!(Arc::strong_count(&frame.pixels), 1);
    }

    #[test]
    fn test_rows() {
        let frame = Frame::new(3, 3, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(frame.row(1), Some(&[4, 5, 6][..]));
        assert_eq!(frame.row(2), None);
        assert_eq!(frame.index(), 3);
        assert!(frame.has_size(3, 2));
    }

    #[test]
    fn test_size_mismatch() {
        let err = Frame::new(0, 4, 4, vec![0; 15]).unwrap_err();
        assert!(matches!(err, StreamError::Image { .. }));
    }
}
