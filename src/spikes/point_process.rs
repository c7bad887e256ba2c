//! Stochastic spike generation by time warping
//!
//! Each pixel owns a stationary renewal process with unit mean rate whose
//! intervals are Gamma(shape, 1/shape) distributed (shape ∞ gives intervals of
//! exactly 1). The process runs on an unwarped clock `u`; during a slot the
//! clock advances at the instantaneous firing rate `r`, so real time and
//! unwarped time are related by `u = u_start + r·(t − t_start)`.
//!
//! After every spike a refractory period is drawn and no spike of that neuron
//! may occur before it has elapsed.

use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Gamma, Normal};

use super::rate::RateCode;
use super::train::{Spike, SpikeTrain};
use crate::error::Result;
use crate::grid::{Geometry, Grid};
use crate::module::{Parameter, Stage, SynapseKind};

/// Per-neuron process state
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProcessState {
    /// Unwarped clock at the start of the next slot
    pub clock: f64,
    /// Unwarped time of the next spike
    pub next_spike: f64,
    /// Real time (s) before which the neuron cannot fire
    pub earliest: f64,
    /// Refractory period drawn at the last spike (s)
    pub refractory: f64,
}

/// `stochasticSpikes` output module
#[derive(Debug)]
pub struct PointProcessOutput {
    code: RateCode,
    gamma_shape: f64,
    refractory_mean: f64,
    refractory_std_dev: f64,
    path: PathBuf,
    step: f64,
    sim_time: f64,
    active: bool,
    states: Vec<ProcessState>,
    input: Grid,
    train: SpikeTrain,
    rng: StdRng,
}

impl PointProcessOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let code = RateCode::default();
        let rng = code.rng();
        Self {
            code,
            gamma_shape: f64::INFINITY,
            refractory_mean: 0.0,
            refractory_std_dev: 0.0,
            path: path.into(),
            step: 1.0,
            sim_time: 0.0,
            active: false,
            states: Vec::new(),
            input: Grid::default(),
            train: SpikeTrain::new(),
            rng,
        }
    }

    pub fn train(&self) -> &SpikeTrain {
        &self.train
    }

    pub fn states(&self) -> &[ProcessState] {
        &self.states
    }

    /// Unit-mean inter-spike interval on the unwarped axis
    fn draw_interval(&mut self) -> f64 {
        if !self.gamma_shape.is_finite() {
            return 1.0;
        }
        Gamma::new(self.gamma_shape, 1.0 / self.gamma_shape)
            .map(|g| g.sample(&mut self.rng))
            .unwrap_or(1.0)
    }

    fn draw_refractory(&mut self) -> f64 {
        if self.refractory_std_dev <= 0.0 {
            return self.refractory_mean;
        }
        Normal::new(self.refractory_mean, self.refractory_std_dev)
            .map(|n| n.sample(&mut self.rng))
            .unwrap_or(self.refractory_mean)
            .max(0.0)
    }
}

impl Stage for PointProcessOutput {
    fn set_parameters(&mut self, params: &[Parameter]) -> Result<()> {
        for p in params {
            if self.code.apply(p)? {
                continue;
            }
            match p.name.as_str() {
                "Gamma_shape" => {
                    if p.value <= 0.0 {
                        return Err(p.invalid("> 0"));
                    }
                    self.gamma_shape = p.value;
                }
                "Refractory_period" => {
                    if p.value < 0.0 {
                        return Err(p.invalid(">= 0"));
                    }
                    self.refractory_mean = p.value;
                }
                "Refractory_std_dev" => {
                    if p.value < 0.0 {
                        return Err(p.invalid(">= 0"));
                    }
                    self.refractory_std_dev = p.value;
                }
                _ => return Err(p.unknown(self.stage_name())),
            }
        }
        self.rng = self.code.rng();
        Ok(())
    }

    fn allocate(&mut self, geometry: &Geometry) -> Result<()> {
        self.step = geometry.step;
        self.input = geometry.zeros();
        let n = geometry.area();
        let mut states = Vec::with_capacity(n);
        for _ in 0..n {
            let interval = self.draw_interval();
            let next_spike = if self.code.random_init {
                // (0, interval]
                interval * (1.0 - self.rng.gen::<f64>())
            } else {
                interval
            };
            states.push(ProcessState {
                clock: 0.0,
                next_spike,
                earliest: f64::NEG_INFINITY,
                refractory: self.refractory_mean,
            });
        }
        self.states = states;
        Ok(())
    }

    fn feed_input(&mut self, sim_time: f64, input: &Grid, _synapse: SynapseKind, _port: usize) {
        self.sim_time = sim_time;
        self.active = self.code.converts(sim_time, self.step);
        self.input.assign(input);
    }

    fn update(&mut self) -> Result<()> {
        let slot_start = self.sim_time / 1000.0;
        let slot_len = self.step / 1000.0;
        let slot_end = slot_start + slot_len;
        let mut slot = Vec::new();

        for neuron in 0..self.states.len() {
            let value = self.input.as_slice().get(neuron).copied().unwrap_or(0.0);
            let rate = if self.active { self.code.rate(value) } else { 0.0 };
            if rate <= 0.0 {
                continue;
            }

            let mut state = self.states[neuron];
            loop {
                let warped = slot_start + (state.next_spike - state.clock) / rate;
                let t = warped.max(state.earliest).max(slot_start);
                if t >= slot_end {
                    break;
                }
                slot.push(Spike::new(neuron, t));

                let spike_clock = state.clock + rate * (t - slot_start);
                state.next_spike = spike_clock + self.draw_interval();
                state.refractory = self.draw_refractory();
                state.earliest = t + state.refractory;
            }
            state.clock += rate * slot_len;
            self.states[neuron] = state;
        }

        self.train.push_slot(slot);
        Ok(())
    }

    fn output(&self) -> &Grid {
        &self.input
    }

    fn finish(&mut self) -> Result<()> {
        self.train.save(&self.path)
    }

    fn stage_name(&self) -> &'static str {
        "stochasticSpikes"
    }
}
