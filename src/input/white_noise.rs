//! Spatially uniform white-noise luminance
//!
//! Every `period` ms a new value is drawn from `N(mean, contrast·mean)`,
//! using the first contrast before `switch` and the second after. Negative
//! draws are clipped to zero and values are scaled to the 0–255 range.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use super::{Frame, FramePoll, FrameSource};
use crate::error::{Result, RetinaError};

#[derive(Debug)]
pub struct WhiteNoise {
    period: f64,
    switch_time: f64,
    before: Normal<f64>,
    after: Normal<f64>,
    // Both streams start from the same seed
    rng_before: StdRng,
    rng_after: StdRng,
    frame: Frame,
}

impl WhiteNoise {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mean: f64,
        contrast1: f64,
        contrast2: f64,
        period: f64,
        switch_time: f64,
        rows: usize,
        cols: usize,
        seed: u64,
    ) -> Result<Self> {
        if period < 1.0 {
            return Err(RetinaError::Input(format!(
                "white noise period must be at least 1 ms, got {}",
                period
            )));
        }
        let normal = |contrast: f64| {
            Normal::new(mean, (contrast * mean).abs())
                .map_err(|e| RetinaError::Input(format!("white noise distribution: {}", e)))
        };
        Ok(Self {
            period,
            switch_time,
            before: normal(contrast1)?,
            after: normal(contrast2)?,
            rng_before: StdRng::seed_from_u64(seed),
            rng_after: StdRng::seed_from_u64(seed),
            frame: Frame::uniform(rows, cols, 1.0),
        })
    }
}

impl FrameSource for WhiteNoise {
    fn frame_at(&mut self, t: f64) -> FramePoll<'_> {
        if (t as i64) % (self.period as i64) == 0 {
            let value = if t < self.switch_time {
                self.before.sample(&mut self.rng_before)
            } else {
                self.after.sample(&mut self.rng_after)
            };
            self.frame.fill(value.max(0.0) * 255.0);
        }
        FramePoll::Ready(&self.frame)
    }

    fn shape(&self) -> (usize, usize) {
        (self.frame.rows(), self.frame.cols())
    }
}
