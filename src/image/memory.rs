//! In-memory image stacks

use crate::error::{Result, StreamError};

use super::{Frame, ImageSource};

/// An image stack held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryImageSource {
    frames: Vec<Frame>,
}

impl MemoryImageSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    /// Build `count` frames of `width` x `height` from a pixel function
    /// `f(image, x, y)`
    pub fn from_fn<F>(width: usize, height: usize, count: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> i16,
    {
        let frames = (0..count)
            .map(|index| {
                let mut pixels = Vec::with_capacity(width * height);
                for y in 0..height {
                    for x in 0..width {
                        pixels.push(f(index, x, y));
                    }
                }
                Frame::from_parts(index, width, height, pixels)
            })
            .collect();
        Self { frames }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }
}

impl ImageSource for MemoryImageSource {
    fn image_count(&self) -> usize {
        self.frames.len()
    }

    fn image(&self, index: usize) -> Result<Frame> {
        self.frames.get(index).cloned().ok_or_else(|| {
            StreamError::image(format!(
                "image {} requested from a stack of {}",
                index,
                self.frames.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fn() {
        let source = MemoryImageSource::from_fn(3, 2, 2, |i, x, y| (i * 100 + y * 10 + x) as i16);
        assert_eq!(source.image_count(), 2);

        let frame = source.image(1).unwrap();
        assert_eq!(frame.pixels(), &[100, 101, 102, 110, 111, 112]);
        assert_eq!(frame.index(), 1);
    }

    #[test]
    fn test_out_of_range() {
        let source = MemoryImageSource::new(vec![Frame::filled(0, 2, 2, 1)]);
        assert!(matches!(source.image(1), Err(StreamError::Image { .. })));
    }
}
