//! Result records streamed back from the signal estimator

use bytemuck::{Pod, Zeroable};

/// Marks the end of one image's results; carries no measurement
pub const END_OF_IMAGE: i32 = -1;

/// Marks that the last pixel of the whole run has been processed
pub const LAST_PIXEL: i32 = -2;

/// One record as laid out in the `to_host` stream.
///
/// The layout is fixed by the device: a signed 32-bit image index followed
/// by seven single-precision fields, 256 bits in total.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct ResultRecord {
    /// Image (frame) number, or one of the reserved markers
    pub img: i32,
    /// Total charge / intensity
    pub q: f32,
    /// X position of the signal center with sub-pixel accuracy
    pub mu_x: f32,
    /// Y position of the signal center with sub-pixel accuracy
    pub mu_y: f32,
    /// Width of the signal in x direction, squared
    pub sigma_x: f32,
    /// Width of the signal in y direction, squared
    pub sigma_y: f32,
    /// Confidence of the x position, squared
    pub delta_mu_x: f32,
    /// Confidence of the y position, squared
    pub delta_mu_y: f32,
}

impl ResultRecord {
    /// Size of a record in bits, as declared by the device
    pub const BITS: usize = 8 * std::mem::size_of::<ResultRecord>();

    /// Frame boundary marker
    pub fn end_of_image() -> Self {
        Self {
            img: END_OF_IMAGE,
            ..Default::default()
        }
    }

    /// Whole-run termination marker
    pub fn last_pixel() -> Self {
        Self {
            img: LAST_PIXEL,
            ..Default::default()
        }
    }

    /// Whether this record carries a measurement
    pub fn is_measurement(&self) -> bool {
        self.img >= 0
    }

    pub fn is_end_of_image(&self) -> bool {
        self.img == END_OF_IMAGE
    }

    pub fn is_last_pixel(&self) -> bool {
        self.img == LAST_PIXEL
    }
}

/// Check whether a received slot terminates the run.
///
/// Only the final record of a slot is inspected; the device pads the last
/// slot so that the sentinel lands there.
pub fn end_of_results(slot: &[ResultRecord]) -> bool {
    slot.last().map_or(false, ResultRecord::is_last_pixel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        assert_eq!(std::mem::size_of::<ResultRecord>(), 32);
        assert_eq!(ResultRecord::BITS, 256);
        assert_eq!(std::mem::align_of::<ResultRecord>(), 4);
    }

    #[test]
    fn test_markers() {
        assert!(ResultRecord::end_of_image().is_end_of_image());
        assert!(!ResultRecord::end_of_image().is_measurement());
        assert!(ResultRecord::last_pixel().is_last_pixel());

        let rec = ResultRecord { img: 0, ..Default::default() };
        assert!(rec.is_measurement());
    }

    #[test]
    fn test_end_of_results_only_checks_last_record() {
        let slot = [ResultRecord::last_pixel(), ResultRecord::end_of_image()];
        assert!(!end_of_results(&slot));

        let slot = [ResultRecord { img: 3, ..Default::default() }, ResultRecord::last_pixel()];
        assert!(end_of_results(&slot));

        assert!(!end_of_results(&[]));
    }
}
