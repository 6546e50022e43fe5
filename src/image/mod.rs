//! Image stacks fed to the device

pub mod frame;
pub mod memory;
pub mod raw;
pub mod synthetic;
pub mod tiff_stack;

pub use frame::Frame;
pub use memory::MemoryImageSource;
pub use raw::RawStackSource;
pub use synthetic::SyntheticSource;
pub use tiff_stack::TiffStackSource;

use crate::error::Result;

/// An ordered collection of equally sized frames
pub trait ImageSource {
    /// Number of frames in the stack
    fn image_count(&self) -> usize;

    /// Load frame `index`
    fn image(&self, index: usize) -> Result<Frame>;
}

impl<S: ImageSource + ?Sized> ImageSource for &S {
    fn image_count(&self) -> usize {
        (**self).image_count()
    }

    fn image(&self, index: usize) -> Result<Frame> {
        (**self).image(index)
    }
}

impl<S: ImageSource + ?Sized> ImageSource for Box<S> {
    fn image_count(&self) -> usize {
        (**self).image_count()
    }

    fn image(&self, index: usize) -> Result<Frame> {
        (**self).image(index)
    }
}
