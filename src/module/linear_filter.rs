//! LinearFilter - temporal ARMA recursion applied independently to every pixel
//!
//! ```text
//! y(k) = ( Σ_j b[j]·x(k-j) − Σ_{i≥1} a[i]·y(k-i) ) / a[0]
//! ```
//!
//! Input and output histories are ring buffers; nothing is reallocated per step.

use super::traits::{Parameter, Stage, SynapseKind};
use crate::error::Result;
use crate::grid::{Geometry, Grid};

/// Closed-form coefficient presets
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum TemporalKernel {
    /// y = x
    #[default]
    Identity,
    /// Single pole with time constant `tau` (ms)
    Exponential { tau: f64 },
    /// Cascade of `order + 1` poles sharing `tau / order`
    Gamma { tau: f64, order: u32 },
}

impl TemporalKernel {
    /// `(a, b)` coefficient vectors for a step of `step` ms
    pub fn coefficients(&self, step: f64) -> (Vec<f64>, Vec<f64>) {
        match *self {
            Self::Identity => (vec![1.0], vec![1.0]),
            Self::Exponential { tau } => {
                let c = (-step / tau).exp();
                (vec![1.0, -c], vec![1.0 - c])
            }
            Self::Gamma { tau, order } => {
                let poles = order as i32 + 1;
                let tau_c = if order > 0 { tau / order as f64 } else { tau };
                let c = (-step / tau_c).exp();
                let a = (0..=poles)
                    .map(|i| (-c).powi(i) * binomial(poles as u32, i as u32))
                    .collect();
                (a, vec![(1.0 - c).powi(poles)])
            }
        }
    }
}

fn binomial(n: u32, k: u32) -> f64 {
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Per-pixel recursive temporal filter
#[derive(Clone, Debug, Default)]
pub struct LinearFilter {
    kernel: TemporalKernel,
    a: Vec<f64>,
    b: Vec<f64>,
    inputs: Vec<Grid>,
    outputs: Vec<Grid>,
    input_head: usize,
    output_head: usize,
    scratch: Grid,
}

impl LinearFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kernel(kernel: TemporalKernel) -> Self {
        Self { kernel, ..Self::default() }
    }

    pub fn kernel(&self) -> TemporalKernel {
        self.kernel
    }

    /// Denominator coefficients (valid after `allocate`)
    pub fn a(&self) -> &[f64] {
        &self.a
    }

    /// Numerator coefficients (valid after `allocate`)
    pub fn b(&self) -> &[f64] {
        &self.b
    }

    fn history_len(&self) -> usize {
        self.outputs.len()
    }
}

impl Stage for LinearFilter {
    fn set_parameters(&mut self, params: &[Parameter]) -> Result<()> {
        if params.is_empty() {
            return Ok(());
        }

        let mut tau = 0.0;
        let mut order = 0u32;
        let mut gamma = false;

        for p in params {
            match p.name.as_str() {
                "tau" => tau = p.value,
                "n" => {
                    if p.value < 0.0 {
                        return Err(p.invalid(">= 0"));
                    }
                    order = p.value as u32;
                }
                "Exp" => gamma = false,
                "Gamma" => gamma = true,
                _ => return Err(p.unknown(self.stage_name())),
            }
        }

        if tau <= 0.0 {
            return Err(crate::RetinaError::parameter(format!(
                "LinearFilter time constant must be > 0, got {}",
                tau
            )));
        }

        self.kernel = if gamma {
            TemporalKernel::Gamma { tau, order }
        } else {
            TemporalKernel::Exponential { tau }
        };
        Ok(())
    }

    fn allocate(&mut self, geometry: &Geometry) -> Result<()> {
        let (a, b) = self.kernel.coefficients(geometry.step);
        self.inputs = vec![geometry.zeros(); b.len()];
        self.outputs = vec![geometry.zeros(); a.len()];
        self.scratch = geometry.zeros();
        self.input_head = 0;
        self.output_head = 0;
        self.a = a;
        self.b = b;
        Ok(())
    }

    fn feed_input(&mut self, _sim_time: f64, input: &Grid, _synapse: SynapseKind, _port: usize) {
        if let Some(slot) = self.inputs.get_mut(self.input_head) {
            slot.assign(input);
        }
    }

    fn update(&mut self) -> Result<()> {
        let n_out = self.history_len();
        let n_in = self.inputs.len();
        if n_out == 0 || n_in == 0 {
            return Ok(());
        }

        // The oldest output slot becomes the newest one
        self.output_head = (self.output_head + n_out - 1) % n_out;

        let current = &self.inputs[self.input_head];
        self.scratch.reset(current.rows(), current.cols());
        for (j, &bj) in self.b.iter().enumerate() {
            let x = &self.inputs[(self.input_head + j) % n_in];
            self.scratch.add_scaled(x, bj);
        }
        for (k, &ak) in self.a.iter().enumerate().skip(1) {
            let y = &self.outputs[(self.output_head + k) % n_out];
            self.scratch.add_scaled(y, -ak);
        }
        if self.a[0] != 1.0 {
            self.scratch *= 1.0 / self.a[0];
        }
        std::mem::swap(&mut self.outputs[self.output_head], &mut self.scratch);

        self.input_head = (self.input_head + n_in - 1) % n_in;
        Ok(())
    }

    fn output(&self) -> &Grid {
        self.outputs
            .get(self.output_head)
            .unwrap_or(&self.scratch)
    }

    fn stage_name(&self) -> &'static str {
        "LinearFilter"
    }
}
