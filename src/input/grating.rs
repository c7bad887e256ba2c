//! Sinusoidal gratings
//!
//! A grating run has up to three phases, measured in simulation-time units:
//! a uniform background of `length1 / step`, the grating itself for
//! `length2 / step`, and for the static type the contrast-reversed grating
//! for `length3 / step`. Outside these phases the last frame is held.

use std::f64::consts::PI;

use super::{Frame, FramePoll, FrameSource};

/// Grating parameters, in script order
#[derive(Clone, Debug, PartialEq)]
pub struct GratingParams {
    /// 0 drifting, 1 counter-phase, 2 static with reversal
    pub kind: i32,
    pub step: f64,
    pub length1: f64,
    pub length2: f64,
    pub length3: f64,
    pub rows: usize,
    pub cols: usize,
    /// Temporal frequency
    pub freq: f64,
    /// Spatial period in pixels
    pub period: f64,
    pub luminance: f64,
    pub contrast: f64,
    /// Spatial phase (cycles, halved)
    pub phi_s: f64,
    /// Temporal phase (cycles, halved)
    pub phi_t: f64,
    /// Orientation in radians
    pub orientation: f64,
    pub weights: [f64; 3],
    /// Per-channel phase in units of π
    pub phases: [f64; 3],
}

#[derive(Debug)]
pub struct Grating {
    p: GratingParams,
    background: f64,
    first: f64,
    second: f64,
    frame: Frame,
}

impl Grating {
    pub fn new(p: GratingParams) -> Self {
        let background = (p.length1 / p.step).trunc();
        let first = (p.length2 / p.step).trunc();
        let second = if p.kind == 2 {
            (p.length3 / p.step).trunc()
        } else {
            0.0
        };
        let frame = Frame::uniform(p.rows, p.cols, 0.0);
        Self {
            p,
            background,
            first,
            second,
            frame,
        }
    }

    /// Spatial phase argument of the cosine at `(row, col)`, in cycles
    fn spatial(&self, row: usize, col: usize) -> f64 {
        // The centre pairs the column axis with rows/2 and vice versa
        let x = col as f64 - (self.p.rows / 2) as f64;
        let y = row as f64 - (self.p.cols / 2) as f64;
        let (sin, cos) = self.p.orientation.sin_cos();
        (x * cos + y * sin) / self.p.period + self.p.phi_s / 2.0
    }

    fn render(&mut self, t: f64) {
        let amplitude = self.p.contrast * self.p.luminance;
        let drift = self.p.freq * self.p.step * t;
        let counter = ((self.p.freq * self.p.step * t + self.p.phi_t / 2.0) * 2.0 * PI).cos();
        let reversed = t >= self.background + self.first;

        for row in 0..self.p.rows {
            for col in 0..self.p.cols {
                let s = self.spatial(row, col);
                for ch in 0..3 {
                    let w = self.p.weights[ch];
                    let phase = self.p.phases[ch] * PI;
                    let v = match self.p.kind {
                        0 => w * self.p.luminance + w * amplitude * ((s - drift) * 2.0 * PI + phase).cos(),
                        1 => w * self.p.luminance + w * amplitude * (s * 2.0 * PI + phase).cos() * counter,
                        _ if reversed => {
                            w * self.p.luminance - w * amplitude * (s * 2.0 * PI + phase).cos()
                        }
                        _ => w * self.p.luminance + w * amplitude * (s * 2.0 * PI + phase).cos(),
                    };
                    self.frame.channels_mut()[ch][(row, col)] = v;
                }
            }
        }
    }
}

impl FrameSource for Grating {
    fn frame_at(&mut self, t: f64) -> FramePoll<'_> {
        let end_first = self.background + self.first;
        if t >= 0.0 && t < self.background {
            for (ch, grid) in self.frame.channels_mut().iter_mut().enumerate() {
                grid.fill(self.p.weights[ch] * self.p.luminance);
            }
        } else if t >= self.background && t < end_first {
            self.render(t);
        } else if t >= end_first && t < end_first + self.second {
            self.render(t);
        }
        FramePoll::Ready(&self.frame)
    }

    fn shape(&self) -> (usize, usize) {
        (self.p.rows, self.p.cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(kind: i32) -> GratingParams {
        GratingParams {
            kind,
            step: 1.0,
            length1: 5.0,
            length2: 10.0,
            length3: 10.0,
            rows: 8,
            cols: 8,
            freq: 0.1,
            period: 4.0,
            luminance: 100.0,
            contrast: 0.5,
            phi_s: 0.0,
            phi_t: 0.0,
            orientation: 0.0,
            weights: [1.0, 1.0, 0.5],
            phases: [0.0, 0.0, 0.0],
        }
    }

    fn pixel(g: &mut Grating, t: f64, ch: usize, row: usize, col: usize) -> f64 {
        match g.frame_at(t) {
            FramePoll::Ready(f) => f.channel(ch).unwrap()[(row, col)],
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_background_is_weighted_luminance() {
        let mut g = Grating::new(params(0));
        assert_eq!(pixel(&mut g, 0.0, 0, 3, 3), 100.0);
        assert_eq!(pixel(&mut g, 4.0, 2, 0, 7), 50.0);
    }

    #[test]
    fn test_drifting_grating_shape() {
        let mut g = Grating::new(params(0));
        // centre column 4 (rows / 2), t = 5 -> drift 0.5 cycles
        let v = pixel(&mut g, 5.0, 0, 0, 4);
        assert!((v - (100.0 + 50.0 * (-PI).cos())).abs() < 1e-9);
        // bounded by luminance ± amplitude
        for t in 5..15 {
            let v = pixel(&mut g, t as f64, 1, 2, 6);
            assert!(v >= 50.0 - 1e-9 && v <= 150.0 + 1e-9);
        }
    }

    #[test]
    fn test_static_grating_reverses() {
        let mut g = Grating::new(params(2));
        let forward = pixel(&mut g, 6.0, 0, 1, 5);
        let reversed = pixel(&mut g, 16.0, 0, 1, 5);
        assert!((forward - 100.0 + (reversed - 100.0)).abs() < 1e-9);
        // held after the last phase
        assert_eq!(pixel(&mut g, 40.0, 0, 1, 5), reversed);
    }

    #[test]
    fn test_counter_phase_modulates_amplitude() {
        let mut p = params(1);
        p.freq = 0.25;
        let mut g = Grating::new(p);
        // cos(2π·0.25·t) is zero at t = 5 (odd quarter cycle) -> background
        let v = pixel(&mut g, 5.0, 0, 0, 0);
        assert!((v - 100.0).abs() < 1e-9);
    }
}
