//! Scalar values of the dataflow engine configuration

use serde::{Deserialize, Serialize};

use crate::{
    device::DeviceConstants,
    error::{Result, StreamError},
};

/// Scalar values written to the kernels before execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scalars {
    /// Total number of images to process
    pub total_images: usize,
    /// Size of an object that covers one pixel, in nanometers
    pub nm_per_px: f64,
    /// First image to process, earlier images are ignored
    pub start_image: usize,
    /// Threshold above image background for the signal finder
    pub bg_threshold_factor: u64,
    /// Width in pixels of each image frame
    pub img_width: usize,
    /// Height in pixels of each image frame
    pub img_height: usize,
    /// Threshold for the signal separator, signals below are discarded
    pub separator_threshold_factor: f64,
}

impl Default for Scalars {
    fn default() -> Self {
        Self {
            total_images: 0,
            nm_per_px: 102.0,
            start_image: 0,
            bg_threshold_factor: 4,
            img_width: 0,
            img_height: 0,
            separator_threshold_factor: 0.7,
        }
    }
}

impl Scalars {
    /// Scalars for a stack of `total_images` frames of `width` x `height`
    pub fn for_stack(width: usize, height: usize, total_images: usize) -> Self {
        Self {
            img_width: width,
            img_height: height,
            total_images,
            ..Default::default()
        }
    }

    /// Pixels in one frame
    pub fn frame_pixels(&self) -> usize {
        self.img_width * self.img_height
    }

    /// Pixels in the whole run
    pub fn total_pixels(&self) -> u64 {
        self.frame_pixels() as u64 * self.total_images as u64
    }

    /// Check the scalars against the maxima compiled into the device
    pub fn validate(&self, constants: &DeviceConstants) -> Result<()> {
        if self.img_width == 0 || self.img_height == 0 {
            return Err(StreamError::configuration(format!(
                "image size {}x{} is empty",
                self.img_width, self.img_height
            )));
        }

        if self.total_images == 0 {
            return Err(StreamError::configuration("no images to process"));
        }

        if self.img_width > constants.max_img_width || self.img_height > constants.max_img_height
        {
            return Err(StreamError::configuration(format!(
                "image size {}x{} exceeds device maximum {}x{}",
                self.img_width,
                self.img_height,
                constants.max_img_width,
                constants.max_img_height
            )));
        }

        if self.start_image >= self.total_images {
            return Err(StreamError::configuration(format!(
                "start image {} is beyond the {} images of the run",
                self.start_image, self.total_images
            )));
        }

        Ok(())
    }

    /// Check that a frame splits into whole slots of `slot_length` pixels.
    ///
    /// Partial final slots are not supported.
    pub fn check_slot_length(&self, slot_length: usize) -> Result<()> {
        if slot_length == 0 {
            return Err(StreamError::configuration("send slot length must be non-zero"));
        }
        let pixels = self.frame_pixels();
        if pixels % slot_length != 0 {
            return Err(StreamError::configuration(format!(
                "frame of {}x{} = {} pixels is not a multiple of the send slot length {}",
                self.img_width, self.img_height, pixels, slot_length
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constants() -> DeviceConstants {
        DeviceConstants {
            max_img_width: 512,
            max_img_height: 512,
            estimator_result_bitsize: 256,
            max_channel_bytes: None,
        }
    }

    #[test]
    fn test_defaults_match_reference_run() {
        let scalars = Scalars::default();
        assert_eq!(scalars.nm_per_px, 102.0);
        assert_eq!(scalars.bg_threshold_factor, 4);
        assert_eq!(scalars.separator_threshold_factor, 0.7);
        assert_eq!(scalars.start_image, 0);
    }

    #[test]
    fn test_validate_against_maxima() {
        Scalars::for_stack(512, 512, 1).validate(&constants()).unwrap();

        let err = Scalars::for_stack(513, 64, 1).validate(&constants()).unwrap_err();
        assert!(matches!(err, StreamError::Configuration { .. }));

        let err = Scalars::for_stack(64, 1024, 1).validate(&constants()).unwrap_err();
        assert!(err.to_string().contains("exceeds device maximum"));
    }

    #[test]
    fn test_validate_empty_runs() {
        assert!(Scalars::for_stack(0, 64, 1).validate(&constants()).is_err());
        assert!(Scalars::for_stack(64, 64, 0).validate(&constants()).is_err());
    }

    #[test]
    fn test_pixel_counts() {
        let scalars = Scalars::for_stack(64, 32, 10);
        assert_eq!(scalars.frame_pixels(), 2048);
        assert_eq!(scalars.total_pixels(), 20480);
    }

    #[test]
    fn test_slot_length_split() {
        let scalars = Scalars::for_stack(4, 4, 1);
        scalars.check_slot_length(4).unwrap();
        scalars.check_slot_length(16).unwrap();
        assert!(scalars.check_slot_length(3).unwrap_err().is_configuration());
        assert!(scalars.check_slot_length(0).is_err());
    }
}
