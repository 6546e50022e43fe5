//! Centroid estimator used by the simulated device
//!
//! Produces one measurement per frame from background-corrected intensity
//! moments. It is deliberately simple: the transport only cares that records
//! arrive in slot-sized batches with boundary and sentinel markers.

use std::collections::VecDeque;

use crate::record::ResultRecord;

/// Per-run parameters read from the applied actions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorParams {
    pub img_width: usize,
    pub img_height: usize,
    pub total_images: usize,
    pub nm_per_px: f64,
}

/// Assembles streamed pixels into frames and emits result records
#[derive(Debug)]
pub struct FrameEstimator {
    params: EstimatorParams,
    frame: Vec<i16>,
    frames_done: usize,
    finished: bool,
}

impl FrameEstimator {
    pub fn new(params: EstimatorParams) -> Self {
        Self {
            frame: Vec::with_capacity(params.img_width * params.img_height),
            params,
            frames_done: 0,
            finished: false,
        }
    }

    pub fn frames_done(&self) -> usize {
        self.frames_done
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed pixels in stream order, appending any completed records to `out`.
    ///
    /// After the last frame an end-of-image record and the sentinel are
    /// queued; pixels arriving after that are ignored.
    pub fn feed(&mut self, pixels: &[i16], out: &mut VecDeque<ResultRecord>) {
        let frame_len = self.params.img_width * self.params.img_height;
        let mut rest = pixels;

        while !rest.is_empty() && !self.finished {
            let take = (frame_len - self.frame.len()).min(rest.len());
            self.frame.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.frame.len() == frame_len {
                if let Some(record) = self.measure(self.frames_done as i32) {
                    out.push_back(record);
                }
                out.push_back(ResultRecord::end_of_image());
                self.frame.clear();
                self.frames_done += 1;

                if self.frames_done == self.params.total_images {
                    self.finished = true;
                    out.push_back(ResultRecord::last_pixel());
                }
            }
        }
    }

    fn measure(&self, img: i32) -> Option<ResultRecord> {
        let width = self.params.img_width;
        let count = self.frame.len() as f64;
        let background = self.frame.iter().map(|&p| p as f64).sum::<f64>() / count;

        let mut q = 0.0;
        let mut sx = 0.0;
        let mut sy = 0.0;
        for (i, &p) in self.frame.iter().enumerate() {
            let signal = (p as f64 - background).max(0.0);
            q += signal;
            sx += signal * (i % width) as f64;
            sy += signal * (i / width) as f64;
        }
        if q <= 0.0 {
            return None;
        }

        let (mx, my) = (sx / q, sy / q);
        let mut vx = 0.0;
        let mut vy = 0.0;
        for (i, &p) in self.frame.iter().enumerate() {
            let signal = (p as f64 - background).max(0.0);
            vx += signal * ((i % width) as f64 - mx).powi(2);
            vy += signal * ((i / width) as f64 - my).powi(2);
        }

        let scale = self.params.nm_per_px;
        let sigma_x = vx / q * scale * scale;
        let sigma_y = vy / q * scale * scale;

        Some(ResultRecord {
            img,
            q: q as f32,
            mu_x: (mx * scale) as f32,
            mu_y: (my * scale) as f32,
            sigma_x: sigma_x as f32,
            sigma_y: sigma_y as f32,
            delta_mu_x: (sigma_x / q) as f32,
            delta_mu_y: (sigma_y / q) as f32,
        })
    }
}
