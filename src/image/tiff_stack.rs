//! Multi-page 16-bit grayscale TIFF stacks
//!
//! Every page of the file is one frame. Pages are decoded once on open and
//! kept in memory; unsigned samples are reinterpreted as signed 16-bit
//! pixels, the same bits the device sees.

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use log::debug;
use tiff::{
    decoder::{Decoder, DecodingResult},
    encoder::{colortype, TiffEncoder},
    ColorType, TiffError,
};

use crate::error::{Result, StreamError};

use super::{Frame, ImageSource};

/// A TIFF file holding one frame per page
#[derive(Debug)]
pub struct TiffStackSource {
    path: PathBuf,
    frames: Vec<Frame>,
}

impl TiffStackSource {
    /// Decode every page of `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .map_err(|e| StreamError::from_io(e, &format!("Failed to open {}", path.display())))?;
        let mut decoder =
            Decoder::new(BufReader::new(file)).map_err(|e| tiff_error(&path, 0, e))?;

        let mut frames: Vec<Frame> = Vec::new();
        loop {
            let page = frames.len();
            let frame = decode_page(&mut decoder, &path, page)?;

            if let Some(first) = frames.first() {
                if !frame.has_size(first.width(), first.height()) {
                    return Err(StreamError::image(format!(
                        "{} page {} is {}x{}, page 0 is {}x{}",
                        path.display(),
                        page,
                        frame.width(),
                        frame.height(),
                        first.width(),
                        first.height()
                    )));
                }
            }
            frames.push(frame);

            if !decoder.more_images() {
                break;
            }
            decoder
                .next_image()
                .map_err(|e| tiff_error(&path, page + 1, e))?;
        }

        debug!(
            "Decoded {} pages of {}x{} from {}",
            frames.len(),
            frames[0].width(),
            frames[0].height(),
            path.display()
        );

        Ok(Self { path, frames })
    }

    /// Write frames as 16-bit grayscale pages
    pub fn write<P: AsRef<Path>>(path: P, frames: &[Frame]) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| StreamError::from_io(e, &format!("Failed to create {}", path.display())))?;
        let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(|e| tiff_error(path, 0, e))?;

        for (page, frame) in frames.iter().enumerate() {
            let samples: Vec<u16> = frame.pixels().iter().map(|&p| p as u16).collect();
            encoder
                .write_image::<colortype::Gray16>(frame.width() as u32, frame.height() as u32, &samples)
                .map_err(|e| tiff_error(path, page, e))?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn width(&self) -> usize {
        self.frames[0].width()
    }

    pub fn height(&self) -> usize {
        self.frames[0].height()
    }
}

impl ImageSource for TiffStackSource {
    fn image_count(&self) -> usize {
        self.frames.len()
    }

    fn image(&self, index: usize) -> Result<Frame> {
        self.frames.get(index).cloned().ok_or_else(|| {
            StreamError::image(format!(
                "image {} requested from {} with {} pages",
                index,
                self.path.display(),
                self.frames.len()
            ))
        })
    }
}

fn decode_page(decoder: &mut Decoder<BufReader<File>>, path: &Path, page: usize) -> Result<Frame> {
    let (width, height) = decoder.dimensions().map_err(|e| tiff_error(path, page, e))?;
    match decoder.colortype().map_err(|e| tiff_error(path, page, e))? {
        ColorType::Gray(16) => {}
        other => {
            return Err(StreamError::image(format!(
                "{} page {} is {:?}, expected 16-bit grayscale",
                path.display(),
                page,
                other
            )))
        }
    }

    let pixels = match decoder.read_image().map_err(|e| tiff_error(path, page, e))? {
        DecodingResult::U16(samples) => samples.into_iter().map(|s| s as i16).collect(),
        DecodingResult::I16(samples) => samples,
        _ => {
            return Err(StreamError::image(format!(
                "{} page {} does not hold 16-bit samples",
                path.display(),
                page
            )))
        }
    };

    Frame::new(page, width as usize, height as usize, pixels)
}

fn tiff_error(path: &Path, page: usize, error: TiffError) -> StreamError {
    match error {
        TiffError::IoError(e) => {
            StreamError::from_io(e, &format!("Failed to read {} page {}", path.display(), page))
        }
        other => StreamError::image(format!("{} page {}: {}", path.display(), page, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_decode_pages() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stack.tif");

        let frames = vec![
            Frame::new(0, 3, 2, vec![1, -2, 300, -400, 5, 6]).unwrap(),
            Frame::new(1, 3, 2, vec![i16::MAX, i16::MIN, 0, 7, 8, 9]).unwrap(),
            Frame::filled(2, 3, 2, 100),
        ];
        TiffStackSource::write(&path, &frames).unwrap();

        let source = TiffStackSource::open(&path).unwrap();
        assert_eq!(source.image_count(), 3);
        assert_eq!((source.width(), source.height()), (3, 2));
        for (i, frame) in frames.iter().enumerate() {
            let decoded = source.image(i).unwrap();
            assert_eq!(decoded.index(), i);
            assert_eq!(decoded.pixels(), frame.pixels());
        }
        assert!(matches!(source.image(3), Err(StreamError::Image { .. })));
    }

    #[test]
    fn test_mixed_page_sizes_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mixed.tif");
        TiffStackSource::write(&path, &[Frame::filled(0, 4, 4, 0), Frame::filled(1, 2, 8, 0)])
            .unwrap();

        let err = TiffStackSource::open(&path).unwrap_err();
        assert!(matches!(err, StreamError::Image { .. }));
    }

    #[test]
    fn test_eight_bit_pages_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gray8.tif");
        {
            let file = File::create(&path).unwrap();
            let mut encoder = TiffEncoder::new(BufWriter::new(file)).unwrap();
            encoder.write_image::<colortype::Gray8>(2, 2, &[0u8, 1, 2, 3]).unwrap();
        }

        let err = TiffStackSource::open(&path).unwrap_err();
        assert!(matches!(err, StreamError::Image { .. }));
    }

    #[test]
    fn test_not_a_tiff() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.tif");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(TiffStackSource::open(&path).is_err());

        let err = TiffStackSource::open(dir.path().join("absent.tif")).unwrap_err();
        assert!(matches!(err, StreamError::Io { .. }));
    }
}
