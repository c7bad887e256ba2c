//! Spike generation - converting a grid of input values into spike trains
//!
//! Two output modules share the same input-to-rate mapping ([`RateCode`]):
//!
//! - [`SpikingOutput`] (`spikes`): deterministic phase oscillators
//! - [`PointProcessOutput`] (`stochasticSpikes`): time-warped gamma renewal
//!   processes with refractoriness
//!
//! Both collect a [`SpikeTrain`] sorted by time then neuron index and write it
//! as a `.spk` text file when the run finishes.

mod point_process;
mod rate;
mod train;

pub use point_process::{PointProcessOutput, ProcessState};
pub use rate::{RateCode, SpikingOutput};
pub use train::{Spike, SpikeTrain};
