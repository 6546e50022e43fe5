//! Generated test stacks: a Gaussian spot drifting over a flat background

use crate::error::{Result, StreamError};

use super::{Frame, ImageSource};

pub const DEFAULT_BACKGROUND: i16 = 100;
pub const DEFAULT_AMPLITUDE: f64 = 1000.0;
pub const DEFAULT_SIGMA: f64 = 1.5;

/// Deterministic stack of frames with one spot each
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    width: usize,
    height: usize,
    count: usize,
    background: i16,
    amplitude: f64,
    sigma: f64,
}

impl SyntheticSource {
    pub fn new(width: usize, height: usize, count: usize) -> Self {
        Self {
            width,
            height,
            count,
            background: DEFAULT_BACKGROUND,
            amplitude: DEFAULT_AMPLITUDE,
            sigma: DEFAULT_SIGMA,
        }
    }

    pub fn with_background(mut self, background: i16) -> Self {
        self.background = background;
        self
    }

    pub fn with_spot(mut self, amplitude: f64, sigma: f64) -> Self {
        self.amplitude = amplitude;
        self.sigma = sigma;
        self
    }

    /// Spot center of frame `index`, in pixels
    pub fn spot_center(&self, index: usize) -> (f64, f64) {
        let span_x = self.width.saturating_sub(1).max(1) as f64;
        let span_y = self.height.saturating_sub(1).max(1) as f64;
        let t = if self.count > 1 {
            index as f64 / (self.count - 1) as f64
        } else {
            0.5
        };
        let x = span_x * (0.25 + 0.5 * t);
        let y = span_y * (0.75 - 0.5 * t);
        (x, y)
    }
}

impl ImageSource for SyntheticSource {
    fn image_count(&self) -> usize {
        self.count
    }

    fn image(&self, index: usize) -> Result<Frame> {
        if index >= self.count {
            return Err(StreamError::image(format!(
                "image {} requested from a synthetic stack of {}",
                index, self.count
            )));
        }

        let (cx, cy) = self.spot_center(index);
        let two_sigma_sq = 2.0 * self.sigma * self.sigma;
        let mut pixels = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let dx = x as f64 - cx;
                let dy = y as f64 - cy;
                let spot = self.amplitude * (-(dx * dx + dy * dy) / two_sigma_sq).exp();
                let value = (self.background as f64 + spot).round();
                pixels.push(value.clamp(i16::MIN as f64, i16::MAX as f64) as i16);
            }
        }

        Ok(Frame::from_parts(index, self.width, self.height, pixels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spot_peak_near_center() {
        let source = SyntheticSource::new(16, 16, 3);
        let frame = source.image(1).unwrap();
        let (cx, cy) = source.spot_center(1);

        let (peak, _) = frame
            .pixels()
            .iter()
            .enumerate()
            .max_by_key(|(_, &v)| v)
            .unwrap();
        let (px, py) = ((peak % 16) as f64, (peak / 16) as f64);
        assert!((px - cx).abs() <= 1.0);
        assert!((py - cy).abs() <= 1.0);
    }

    #[test]
    fn test_deterministic() {
        let source = SyntheticSource::new(8, 4, 2);
        assert_eq!(source.image(0).unwrap(), source.image(0).unwrap());
        assert_ne!(source.image(0).unwrap(), source.image(1).unwrap());
    }

    #[test]
    fn test_flat_background() {
        let source = SyntheticSource::new(4, 4, 1).with_spot(0.0, 1.0).with_background(42);
        assert!(source.image(0).unwrap().pixels().iter().all(|&p| p == 42));
        assert!(source.image(1).is_err());
    }
}
