//! # Input - frame sources driving a retina graph
//!
//! One source is active at a time, selected by the last `Input` command.
//!
//! | Script kind | Source | Frames |
//! |-------------|--------|--------|
//! | impulse | [`Impulse`] | flash between `start` and `stop` |
//! | whiteNoise | [`WhiteNoise`] | spatially uniform Gaussian luminance |
//! | grating | [`Grating`] | drifting, counter-phase or static sinusoid |
//! | fixationalMovGrating | [`FixationalGrating`] | jittered centre/surround grating |
//! | sequence | [`FrameSequence`] | image files from a directory |
//! | streaming | [`StreamingInput`] | frames pushed from another thread |
//!
//! Generated frames have three channels (red, green, blue). Decoded grayscale
//! images have one channel, which the graph broadcasts to all three.

use crate::grid::Grid;

mod fixational;
mod grating;
mod impulse;
mod sequence;
mod streaming;
mod white_noise;

pub use fixational::{FixationalGrating, FixationalParams};
pub use grating::{Grating, GratingParams};
pub use impulse::Impulse;
pub use sequence::FrameSequence;
pub use streaming::{FrameSender, StreamingInput};
pub use white_noise::WhiteNoise;

/// One raw input image with one or three channels
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    channels: Vec<Grid>,
}

impl Frame {
    /// Single-channel frame
    pub fn mono(grid: Grid) -> Self {
        Self { channels: vec![grid] }
    }

    pub fn rgb(red: Grid, green: Grid, blue: Grid) -> Self {
        Self {
            channels: vec![red, green, blue],
        }
    }

    /// Three identical channels holding `value`
    pub fn uniform(rows: usize, cols: usize, value: f64) -> Self {
        let g = Grid::filled(rows, cols, value);
        Self::rgb(g.clone(), g.clone(), g)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&Grid> {
        self.channels.get(index)
    }

    pub fn channels_mut(&mut self) -> &mut [Grid] {
        &mut self.channels
    }

    pub fn rows(&self) -> usize {
        self.channels.first().map_or(0, Grid::rows)
    }

    pub fn cols(&self) -> usize {
        self.channels.first().map_or(0, Grid::cols)
    }

    /// Channel mean
    pub fn luminance(&self) -> Grid {
        let mut lum = Grid::new(self.rows(), self.cols());
        for c in &self.channels {
            lum += c;
        }
        if !self.channels.is_empty() {
            lum *= 1.0 / self.channels.len() as f64;
        }
        lum
    }

    /// Copy `other` into self, reusing channel buffers
    pub fn assign(&mut self, other: &Frame) {
        self.channels.resize_with(other.channels.len(), Grid::default);
        for (dst, src) in self.channels.iter_mut().zip(&other.channels) {
            dst.assign(src);
        }
    }

    pub fn fill(&mut self, value: f64) {
        self.channels.iter_mut().for_each(|c| c.fill(value));
    }
}

/// Result of asking a source for the frame of one step
#[derive(Debug)]
pub enum FramePoll<'a> {
    Ready(&'a Frame),
    /// Nothing published yet; retry the same step
    Stall,
    /// The source is exhausted
    End,
}

/// Frame source contract
pub trait FrameSource {
    /// Frame for simulation time `t` (ms)
    fn frame_at(&mut self, t: f64) -> FramePoll<'_>;

    /// Frame shape `(rows, cols)`
    fn shape(&self) -> (usize, usize);
}

/// Input variants - the facade for all sources
#[derive(Debug)]
pub enum InputSource {
    Impulse(Impulse),
    WhiteNoise(WhiteNoise),
    Grating(Grating),
    Fixational(FixationalGrating),
    Sequence(FrameSequence),
    Streaming(StreamingInput),
}

impl InputSource {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Impulse(_) => "impulse",
            Self::WhiteNoise(_) => "whiteNoise",
            Self::Grating(_) => "grating",
            Self::Fixational(_) => "fixationalMovGrating",
            Self::Sequence(_) => "sequence",
            Self::Streaming(_) => "streaming",
        }
    }

    fn source_mut(&mut self) -> &mut dyn FrameSource {
        match self {
            Self::Impulse(s) => s,
            Self::WhiteNoise(s) => s,
            Self::Grating(s) => s,
            Self::Fixational(s) => s,
            Self::Sequence(s) => s,
            Self::Streaming(s) => s,
        }
    }

    fn source(&self) -> &dyn FrameSource {
        match self {
            Self::Impulse(s) => s,
            Self::WhiteNoise(s) => s,
            Self::Grating(s) => s,
            Self::Fixational(s) => s,
            Self::Sequence(s) => s,
            Self::Streaming(s) => s,
        }
    }
}

impl FrameSource for InputSource {
    fn frame_at(&mut self, t: f64) -> FramePoll<'_> {
        self.source_mut().frame_at(t)
    }

    fn shape(&self) -> (usize, usize) {
        self.source().shape()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luminance_is_channel_mean() {
        let f = Frame::rgb(
            Grid::filled(1, 2, 3.0),
            Grid::filled(1, 2, 6.0),
            Grid::filled(1, 2, 0.0),
        );
        assert_eq!(f.luminance().as_slice(), &[3.0, 3.0]);
        assert_eq!((f.rows(), f.cols()), (1, 2));
    }

    #[test]
    fn test_assign_changes_channel_count() {
        let mut f = Frame::uniform(2, 2, 1.0);
        f.assign(&Frame::mono(Grid::filled(3, 1, 5.0)));
        assert_eq!(f.channel_count(), 1);
        assert_eq!(f.channel(0).unwrap().sum(), 15.0);
    }

    #[test]
    fn test_facade_dispatch() {
        let mut input = InputSource::Impulse(Impulse::new(0.0, 1.0, 2.0, 0.5, 2, 3));
        assert_eq!(input.kind_name(), "impulse");
        assert_eq!(input.shape(), (2, 3));
        match input.frame_at(0.0) {
            FramePoll::Ready(f) => assert_eq!(f.channel(1).unwrap()[(1, 2)], 2.5),
            other => panic!("unexpected {:?}", other),
        }
    }
}
