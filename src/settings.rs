//! Simulation and run configuration
//!
//! [`SimulationSettings`] is filled in by the script interpreter;
//! [`RunOptions`] comes from the command line.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::grid::Geometry;

/// Global simulation parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Step length (ms)
    pub step: f64,
    /// Total simulated time per trial (ms)
    pub sim_time: f64,
    pub num_trials: usize,
    /// Zero-based index of the running trial
    pub current_trial: usize,
    pub pixels_per_degree: f64,
    pub rows: usize,
    pub cols: usize,
    /// Steps each input frame is held for
    pub repetitions: usize,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            step: 1.0,
            sim_time: 0.0,
            num_trials: 1,
            current_trial: 0,
            pixels_per_degree: 1.0,
            rows: 1,
            cols: 1,
            repetitions: 1,
        }
    }
}

impl SimulationSettings {
    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.rows, self.cols, self.step, self.pixels_per_degree)
    }

    /// Step times of one trial, `0, step, 2·step, …` below `sim_time`
    pub fn step_times(&self) -> impl Iterator<Item = f64> {
        let step = self.step;
        let steps = if step > 0.0 {
            (self.sim_time / step).ceil().max(0.0) as usize
        } else {
            0
        };
        (0..steps).map(move |k| k as f64 * step)
    }
}

/// Command-line options of the driver
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    pub script: PathBuf,
    /// Directory receiving spike files, sequences and multimeter traces
    pub results: PathBuf,
    pub verbose: bool,
}

impl RunOptions {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            results: PathBuf::from("results"),
            verbose: false,
        }
    }
}
