//! ShortTermPlasticity - static nonlinearity with an adaptive offset
//!
//! ```text
//! km∞   = kd / (|x| + ε)
//! km    = km∞ + (km − km∞)·exp(−Δt/τ)
//! P     = P + kf·(km·|x| − P)
//! y     = (slope·max(x, th) + offset + P)^exponent
//! ```

use super::traits::{Parameter, Stage, SynapseKind};
use crate::error::Result;
use crate::grid::{Geometry, Grid};

/// Keeps `km∞` finite for a zero input
const INPUT_EPSILON: f64 = 1e-2;

#[derive(Clone, Debug)]
pub struct ShortTermPlasticity {
    slope: f64,
    offset: f64,
    exponent: f64,
    threshold: Option<f64>,
    kf: f64,
    kd: f64,
    tau: f64,
    decay: f64,
    km: Grid,
    p: Grid,
    output: Grid,
}

impl Default for ShortTermPlasticity {
    fn default() -> Self {
        Self {
            slope: 1.0,
            offset: 0.0,
            exponent: 1.0,
            threshold: None,
            kf: 0.0,
            kd: 0.0,
            tau: 1.0,
            decay: 0.0,
            km: Grid::default(),
            p: Grid::default(),
            output: Grid::default(),
        }
    }
}

impl ShortTermPlasticity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adaptive offset `P`
    pub fn plasticity(&self) -> &Grid {
        &self.p
    }
}

impl Stage for ShortTermPlasticity {
    fn set_parameters(&mut self, params: &[Parameter]) -> Result<()> {
        for p in params {
            match p.name.as_str() {
                "slope" => self.slope = p.value,
                "offset" => self.offset = p.value,
                "exponent" => self.exponent = p.value,
                "threshold" => self.threshold = Some(p.value),
                "kf" => self.kf = p.value,
                "kd" => self.kd = p.value,
                "tau" => {
                    if p.value <= 0.0 {
                        return Err(p.invalid("> 0"));
                    }
                    self.tau = p.value;
                }
                _ => return Err(p.unknown(self.stage_name())),
            }
        }
        Ok(())
    }

    fn allocate(&mut self, geometry: &Geometry) -> Result<()> {
        self.decay = (-geometry.step / self.tau).exp();
        self.km = geometry.zeros();
        self.p = geometry.zeros();
        self.output = geometry.zeros();
        Ok(())
    }

    fn feed_input(&mut self, _sim_time: f64, input: &Grid, _synapse: SynapseKind, _port: usize) {
        self.output.assign(input);
    }

    fn update(&mut self) -> Result<()> {
        let Self {
            slope,
            offset,
            exponent,
            threshold,
            kf,
            kd,
            decay,
            ..
        } = *self;

        for ((y, km), p) in self
            .output
            .as_mut_slice()
            .iter_mut()
            .zip(self.km.as_mut_slice())
            .zip(self.p.as_mut_slice())
        {
            let x = *y;
            let km_inf = kd / (x.abs() + INPUT_EPSILON);
            *km = km_inf + (*km - km_inf) * decay;
            *p += kf * (*km * x.abs() - *p);

            let x = match threshold {
                Some(th) if x < th => th,
                _ => x,
            };
            *y = (x * slope + offset + *p).powf(exponent);
        }
        Ok(())
    }

    fn output(&self) -> &Grid {
        &self.output
    }

    fn stage_name(&self) -> &'static str {
        "ShortTermPlasticity"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stp(params: &[(&str, f64)]) -> ShortTermPlasticity {
        let mut s = ShortTermPlasticity::new();
        let params: Vec<_> = params.iter().map(|&(k, v)| Parameter::new(k, v)).collect();
        s.set_parameters(&params).unwrap();
        s.allocate(&Geometry::new(1, 1, 1.0, 1.0)).unwrap();
        s
    }

    fn step(s: &mut ShortTermPlasticity, x: f64) -> f64 {
        s.feed_input(0.0, &Grid::filled(1, 1, x), SynapseKind::Current, 0);
        s.update().unwrap();
        s.output()[(0, 0)]
    }

    #[test]
    fn test_without_plasticity_is_static() {
        let mut s = stp(&[("slope", 2.0), ("offset", 1.0), ("exponent", 1.0)]);
        assert_eq!(step(&mut s, 3.0), 7.0);
        assert_eq!(step(&mut s, -1.0), -1.0);
    }

    #[test]
    fn test_offset_adapts_to_steady_input() {
        let mut s = stp(&[("kf", 0.5), ("kd", 2.0), ("tau", 5.0)]);
        let mut last = 0.0;
        for _ in 0..500 {
            last = step(&mut s, 4.0);
        }
        // P → km∞·|x| = kd·|x| / (|x| + ε)
        let p_inf = 2.0 * 4.0 / (4.0 + INPUT_EPSILON);
        assert!((s.plasticity()[(0, 0)] - p_inf).abs() < 1e-9);
        assert!((last - (4.0 + p_inf)).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_clamps_signal_only() {
        let mut s = stp(&[("threshold", 0.0)]);
        assert_eq!(step(&mut s, -3.0), 0.0);
    }

    #[test]
    fn test_invalid_tau() {
        let mut s = ShortTermPlasticity::new();
        assert!(s.set_parameters(&[Parameter::new("tau", 0.0)]).is_err());
        assert!(s.set_parameters(&[Parameter::new("max", 1.0)]).is_err());
    }
}
