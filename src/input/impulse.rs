//! Flash of constant amplitude over a constant offset

use super::{Frame, FramePoll, FrameSource};

#[derive(Clone, Debug)]
pub struct Impulse {
    /// Flash onset (ms, inclusive)
    start: f64,
    /// Flash offset (ms, inclusive)
    stop: f64,
    amplitude: f64,
    offset: f64,
    frame: Frame,
}

impl Impulse {
    pub fn new(start: f64, stop: f64, amplitude: f64, offset: f64, rows: usize, cols: usize) -> Self {
        Self {
            start,
            stop,
            amplitude,
            offset,
            frame: Frame::uniform(rows, cols, offset),
        }
    }

    /// Luminance at time `t`
    pub fn value_at(&self, t: f64) -> f64 {
        if t >= self.start && t <= self.stop {
            self.amplitude + self.offset
        } else {
            self.offset
        }
    }
}

impl FrameSource for Impulse {
    fn frame_at(&mut self, t: f64) -> FramePoll<'_> {
        let v = self.value_at(t);
        self.frame.fill(v);
        FramePoll::Ready(&self.frame)
    }

    fn shape(&self) -> (usize, usize) {
        (self.frame.rows(), self.frame.cols())
    }
}
