//! Grating jittered by fixational eye movements
//!
//! Every `jitter_period` ms a centre and a surround displacement are drawn from
//! `N(0, step_size)`. Pixels closer than `circle_radius` to the centre use the
//! centre jitter, the rest the surround jitter. A type flag of 1 makes centre
//! and surround move together (their generators share a seed); `switch`
//! selects which of the two flags applies.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use super::{Frame, FramePoll, FrameSource};
use crate::error::{Result, RetinaError};

/// Parameters of `fixationalMovGrating`, in script order
#[derive(Clone, Debug, PartialEq)]
pub struct FixationalParams {
    pub rows: usize,
    pub cols: usize,
    pub circle_radius: f64,
    pub jitter_period: f64,
    pub spatial_period: f64,
    pub step_size: f64,
    pub luminance: f64,
    pub contrast: f64,
    pub orientation: f64,
    pub weights: [f64; 3],
    pub type1: i32,
    pub type2: i32,
    pub switch_time: f64,
}

/// Centre and surround generators for one regime
#[derive(Debug)]
struct JitterPair {
    centre: StdRng,
    surround: StdRng,
}

impl JitterPair {
    fn new(seeder: &mut StdRng, coupled: bool) -> Self {
        let seed = seeder.gen::<u64>();
        let surround_seed = if coupled { seed } else { seeder.gen::<u64>() };
        Self {
            centre: StdRng::seed_from_u64(seed),
            surround: StdRng::seed_from_u64(surround_seed),
        }
    }

    fn draw(&mut self, dist: &Normal<f64>) -> (f64, f64) {
        (dist.sample(&mut self.centre), dist.sample(&mut self.surround))
    }
}

#[derive(Debug)]
pub struct FixationalGrating {
    p: FixationalParams,
    jitter: Normal<f64>,
    before: JitterPair,
    after: JitterPair,
    frame: Frame,
}

impl FixationalGrating {
    /// `seed` fixes all jitter draws; `None` seeds from entropy
    pub fn new(p: FixationalParams, seed: Option<u64>) -> Result<Self> {
        if p.jitter_period < 1.0 {
            return Err(RetinaError::Input(format!(
                "jitter period must be at least 1 ms, got {}",
                p.jitter_period
            )));
        }
        let jitter = Normal::new(0.0, p.step_size.abs())
            .map_err(|e| RetinaError::Input(format!("jitter distribution: {}", e)))?;
        let mut seeder = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let before = JitterPair::new(&mut seeder, p.type1 == 1);
        let after = JitterPair::new(&mut seeder, p.type2 == 1);
        let frame = Frame::uniform(p.rows, p.cols, 0.0);
        Ok(Self {
            p,
            jitter,
            before,
            after,
            frame,
        })
    }

    fn render(&mut self, centre: f64, surround: f64) {
        let amplitude = self.p.contrast * self.p.luminance;
        let (sin, cos) = self.p.orientation.sin_cos();
        // Same centre convention as the plain grating
        let x0 = (self.p.rows / 2) as f64;
        let y0 = (self.p.cols / 2) as f64;

        for row in 0..self.p.rows {
            for col in 0..self.p.cols {
                let dx = col as f64 - x0;
                let dy = row as f64 - y0;
                let j = if (dx * dx + dy * dy).sqrt() < self.p.circle_radius {
                    centre
                } else {
                    surround
                };
                let arg = PI / 2.0 + (((dx + j) * cos + (dy + j) * sin) / self.p.spatial_period) * 2.0 * PI;
                let c = arg.cos();
                for (ch, grid) in self.frame.channels_mut().iter_mut().enumerate() {
                    let w = self.p.weights[ch];
                    grid[(row, col)] = w * self.p.luminance + w * amplitude * c;
                }
            }
        }
    }
}

impl FrameSource for FixationalGrating {
    fn frame_at(&mut self, t: f64) -> FramePoll<'_> {
        if (t as i64) % (self.p.jitter_period as i64) == 0 {
            let (centre, surround) = if t < self.p.switch_time {
                self.before.draw(&self.jitter)
            } else {
                self.after.draw(&self.jitter)
            };
            self.render(centre, surround);
        }
        FramePoll::Ready(&self.frame)
    }

    fn shape(&self) -> (usize, usize) {
        (self.p.rows, self.p.cols)
    }
}
