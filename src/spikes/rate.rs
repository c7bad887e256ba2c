//! Deterministic spike generation
//!
//! Every pixel drives a phase oscillator. Over one slot of length Δ the
//! firing rate is ramped linearly from the previous slot's rate `a` to the
//! current rate `b`, so the accumulated phase after τ seconds is
//!
//! ```text
//! Φ(τ) = a·τ + k·τ²        k = (b − a) / (2Δ)
//! ```
//!
//! A spike fires whenever Φ reaches the remaining phase ρ (then ρ + 1, ρ + 2,
//! …). The phase left at the end of the slot carries over, so a rate change
//! between slots never resets or skips a cycle.

use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gamma, Normal};

use super::train::{Spike, SpikeTrain};
use crate::error::Result;
use crate::grid::{Geometry, Grid};
use crate::module::{Parameter, Stage, SynapseKind};

/// Input-to-rate mapping and conversion window shared by both spike generators
#[derive(Clone, Debug)]
pub struct RateCode {
    /// Inputs below this produce no activity
    pub threshold: f64,
    /// Hz per input unit above threshold
    pub freq_per_inp: f64,
    /// Saturation rate in Hz (`Max_freq`, or `1 / Min_period`)
    pub max_freq: f64,
    /// Floor rate in Hz inside the conversion window (`1 / Max_period`)
    pub min_freq: f64,
    /// Conversion window in ms
    pub start_time: f64,
    pub end_time: f64,
    pub random_init: bool,
    pub seed: Option<u64>,
}

impl Default for RateCode {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            freq_per_inp: 1.0,
            max_freq: f64::INFINITY,
            min_freq: 0.0,
            start_time: 0.0,
            end_time: f64::INFINITY,
            random_init: false,
            seed: None,
        }
    }
}

impl RateCode {
    /// Consume a parameter this struct owns. Returns false for foreign names.
    pub fn apply(&mut self, p: &Parameter) -> Result<bool> {
        match p.name.as_str() {
            "Input_threshold" => self.threshold = p.value,
            "Freq_per_inp" => {
                if p.value < 0.0 {
                    return Err(p.invalid(">= 0"));
                }
                self.freq_per_inp = p.value;
            }
            "Max_freq" => {
                if p.value < 0.0 {
                    return Err(p.invalid(">= 0"));
                }
                self.max_freq = p.value;
            }
            // Period limits in seconds
            "Min_period" => {
                if p.value < 0.0 {
                    return Err(p.invalid(">= 0"));
                }
                self.max_freq = if p.value > 0.0 { 1.0 / p.value } else { f64::INFINITY };
            }
            "Max_period" => {
                if p.value <= 0.0 {
                    return Err(p.invalid("> 0"));
                }
                self.min_freq = 1.0 / p.value;
            }
            "Start_time" => self.start_time = p.value,
            "End_time" => self.end_time = p.value,
            "Random_init" => self.random_init = p.value > 0.0,
            "Seed" => self.seed = Some(p.value as u64),
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Rate (Hz) driven by one input value, before the limits
    pub fn drive(&self, value: f64) -> f64 {
        if value < self.threshold {
            0.0
        } else {
            (value - self.threshold) * self.freq_per_inp
        }
    }

    /// Noise-free firing rate (Hz) for one input value
    pub fn rate(&self, value: f64) -> f64 {
        limit(self.drive(value), self.min_freq, self.max_freq)
    }

    /// True when the slot `[t, t + step)` lies inside the conversion window
    pub fn converts(&self, sim_time: f64, step: f64) -> bool {
        sim_time >= self.start_time && sim_time + step <= self.end_time
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Saturate `rate` to `[min_freq, max_freq]`, never below 0
fn limit(rate: f64, min_freq: f64, max_freq: f64) -> f64 {
    rate.max(min_freq).min(max_freq).max(0.0)
}

/// Rate whose period is `period` seconds; non-positive periods are unbounded
fn period_to_rate(period: f64) -> f64 {
    if period > 0.0 {
        1.0 / period
    } else {
        f64::INFINITY
    }
}

/// Seconds from the start of the slot until the phase integral reaches `target`.
///
/// `None` when the rate ramp never gets there.
fn crossing_time(a: f64, k: f64, target: f64) -> Option<f64> {
    // Positive root of k·τ² + a·τ − target = 0 in its cancellation-free form
    let disc = (a * a + 4.0 * k * target).max(0.0);
    let denom = a + disc.sqrt();
    (denom > 0.0).then(|| (2.0 * target / denom).max(0.0))
}

/// `spikes` output module
#[derive(Debug)]
pub struct SpikingOutput {
    code: RateCode,
    rate_std_dev: f64,
    /// Spread (s) of the Gamma-distributed period drawn each slot
    period_std_dev: f64,
    /// Spread (s) of the Gaussian jitter on both period limits
    limit_std_dev: f64,
    path: PathBuf,
    step: f64,
    sim_time: f64,
    active: bool,
    /// Phase (cycles) still to run before the next spike
    phase: Vec<f64>,
    /// Rate at the end of the previous slot
    prev_rate: Vec<f64>,
    primed: bool,
    input: Grid,
    train: SpikeTrain,
    rng: StdRng,
}

impl SpikingOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let code = RateCode::default();
        let rng = code.rng();
        Self {
            code,
            rate_std_dev: 0.0,
            period_std_dev: 0.0,
            limit_std_dev: 0.0,
            path: path.into(),
            step: 1.0,
            sim_time: 0.0,
            active: false,
            phase: Vec::new(),
            prev_rate: Vec::new(),
            primed: false,
            input: Grid::default(),
            train: SpikeTrain::new(),
            rng,
        }
    }

    pub fn rate_code(&self) -> &RateCode {
        &self.code
    }

    pub fn train(&self) -> &SpikeTrain {
        &self.train
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn noisy_rate(&mut self, value: f64) -> f64 {
        let mut rate = self.code.drive(value);
        if rate > 0.0 && self.rate_std_dev > 0.0 {
            rate += Normal::new(0.0, self.rate_std_dev)
                .map(|n| n.sample(&mut self.rng))
                .unwrap_or(0.0);
        }
        if rate > 0.0 && self.period_std_dev > 0.0 {
            // Gamma with mean 1/rate and the requested spread
            let period = 1.0 / rate;
            let var = self.period_std_dev * self.period_std_dev;
            rate = Gamma::new(period * period / var, var / period)
                .map(|g| period_to_rate(g.sample(&mut self.rng)))
                .unwrap_or(rate);
        }

        let (mut min_freq, mut max_freq) = (self.code.min_freq, self.code.max_freq);
        if self.limit_std_dev > 0.0 {
            if let Ok(jitter) = Normal::new(0.0, self.limit_std_dev) {
                let min_period = 1.0 / max_freq + jitter.sample(&mut self.rng);
                let max_period = 1.0 / min_freq + jitter.sample(&mut self.rng);
                max_freq = period_to_rate(min_period);
                min_freq = if max_period.is_finite() {
                    period_to_rate(max_period)
                } else {
                    0.0
                };
            }
        }
        limit(rate, min_freq, max_freq)
    }
}

impl Stage for SpikingOutput {
    fn set_parameters(&mut self, params: &[Parameter]) -> Result<()> {
        for p in params {
            if self.code.apply(p)? {
                continue;
            }
            match p.name.as_str() {
                "Rate_std_dev" => {
                    if p.value < 0.0 {
                        return Err(p.invalid(">= 0"));
                    }
                    self.rate_std_dev = p.value;
                }
                "Spike_std_dev" => {
                    if p.value < 0.0 {
                        return Err(p.invalid(">= 0"));
                    }
                    self.period_std_dev = p.value;
                }
                "Limit_std_dev" => {
                    if p.value < 0.0 {
                        return Err(p.invalid(">= 0"));
                    }
                    self.limit_std_dev = p.value;
                }
                _ => return Err(p.unknown(self.stage_name())),
            }
        }
        self.rng = self.code.rng();
        Ok(())
    }

    fn allocate(&mut self, geometry: &Geometry) -> Result<()> {
        let n = geometry.area();
        self.step = geometry.step;
        self.input = geometry.zeros();
        self.prev_rate = vec![0.0; n];
        self.primed = false;
        self.phase = if self.code.random_init {
            // (0, 1]
            (0..n).map(|_| 1.0 - self.rng.gen::<f64>()).collect()
        } else {
            vec![1.0; n]
        };
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
        let mut slot = Vec::new();

        for neuron in 0..self.phase.len() {
            let value = self.input.as_slice().get(neuron).copied().unwrap_or(0.0);
            let b = if self.active { self.noisy_rate(value) } else { 0.0 };
            let a = if self.primed { self.prev_rate[neuron] } else { b };
            let k = (b - a) / (2.0 * slot_len);

            let mut target = self.phase[neuron];
            while let Some(tau) = crossing_time(a, k, target) {
                if tau >= slot_len {
                    break;
                }
                slot.push(Spike::new(neuron, slot_start + tau));
                target += 1.0;
            }

            // Phase accumulated over the whole slot
            self.phase[neuron] = target - (a + b) * slot_len / 2.0;
            self.prev_rate[neuron] = b;
        }
        self.primed = true;
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
        "spikes"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(params: &[(&str, f64)], rows: usize, cols: usize) -> SpikingOutput {
        let mut out = SpikingOutput::new("unused.spk");
        let params: Vec<_> = params.iter().map(|&(k, v)| Parameter::new(k, v)).collect();
        out.set_parameters(&params).unwrap();
        out.allocate(&Geometry::new(rows, cols, 1.0, 1.0)).unwrap();
        out
    }

    fn run(out: &mut SpikingOutput, input: &Grid, from: usize, steps: usize) {
        for t in from..from + steps {
            out.feed_input(t as f64, input, SynapseKind::Current, 0);
            out.update().unwrap();
        }
    }

    #[test]
    fn test_crossing_time_cases() {
        // constant rate: target / a
        assert!((crossing_time(10.0, 0.0, 1.0).unwrap() - 0.1).abs() < 1e-12);
        // rising from zero: sqrt(target / k)
        assert!((crossing_time(0.0, 4.0, 1.0).unwrap() - 0.5).abs() < 1e-12);
        // silent
        assert!(crossing_time(0.0, 0.0, 1.0).is_none());
        // falling ramp that never reaches the target
        let tau = crossing_time(1.0, -10.0, 5.0).unwrap();
        assert!(tau > 0.05);
    }

    #[test]
    fn test_constant_rate_is_periodic() {
        // 2 units above threshold at 100 Hz per unit -> 200 Hz, 5 ms period
        let mut out = generator(&[("Input_threshold", 1.0), ("Freq_per_inp", 100.0)], 1, 1);
        run(&mut out, &Grid::filled(1, 1, 3.0), 0, 98);
        let times: Vec<_> = out.train().times_of(0).collect();
        assert_eq!(times.len(), 19);
        for (i, t) in times.iter().enumerate() {
            assert!((t - 0.005 * (i + 1) as f64).abs() < 1e-9, "spike {} at {}", i, t);
        }
    }

    #[test]
    fn test_below_threshold_is_silent() {
        let mut out = generator(&[("Input_threshold", 5.0), ("Freq_per_inp", 100.0)], 2, 2);
        run(&mut out, &Grid::filled(2, 2, 4.9), 0, 50);
        assert!(out.train().is_empty());
    }

    #[test]
    fn test_max_freq_saturates() {
        let mut out = generator(&[("Freq_per_inp", 1000.0), ("Max_freq", 100.0)], 1, 1);
        run(&mut out, &Grid::filled(1, 1, 50.0), 0, 995);
        assert_eq!(out.train().len(), 99);
    }

    #[test]
    fn test_period_limits() {
        let mut code = RateCode::default();
        for (name, value) in [("Freq_per_inp", 1000.0), ("Min_period", 0.01), ("Max_period", 0.05)] {
            assert!(code.apply(&Parameter::new(name, value)).unwrap());
        }
        assert_eq!(code.rate(50.0), 100.0);
        // Below threshold the neuron still fires at the slowest period
        assert_eq!(code.rate(-1.0), 20.0);
        assert_eq!(code.rate(0.03), 30.0);

        assert!(code.apply(&Parameter::new("Min_period", 0.0)).unwrap());
        assert_eq!(code.max_freq, f64::INFINITY);
        assert!(code.apply(&Parameter::new("Max_period", 0.0)).is_err());
        assert!(code.apply(&Parameter::new("Min_period", -1.0)).is_err());
    }

    #[test]
    fn test_min_period_caps_spike_count() {
        // 1/Min_period = 100 Hz, same as Max_freq 100
        let mut out = generator(&[("Freq_per_inp", 1000.0), ("Min_period", 0.01)], 1, 1);
        run(&mut out, &Grid::filled(1, 1, 50.0), 0, 995);
        assert_eq!(out.train().len(), 99);
    }

    #[test]
    fn test_period_noise_keeps_mean_rate() {
        let mut out = generator(
            &[
                ("Freq_per_inp", 100.0),
                ("Spike_std_dev", 0.002),
                ("Limit_std_dev", 0.0005),
                ("Min_period", 0.004),
                ("Seed", 9.0),
            ],
            2,
            2,
        );
        run(&mut out, &Grid::filled(2, 2, 1.0), 0, 2000);
        assert!(out.train().is_ordered());
        // 10 ms mean period for 2 s; Gamma periods give a rate slightly above 100 Hz
        for neuron in 0..4 {
            let n = out.train().times_of(neuron).count() as f64;
            assert!(n > 170.0 && n < 260.0, "neuron {}: {} spikes", neuron, n);
        }

        let mut quiet = SpikingOutput::new("x.spk");
        assert!(quiet.set_parameters(&[Parameter::new("Spike_std_dev", -1.0)]).is_err());
        assert!(quiet.set_parameters(&[Parameter::new("Limit_std_dev", -1.0)]).is_err());
    }

    #[test]
    fn test_rate_change_keeps_phase() {
        // 100 Hz for 15 ms leaves half a cycle, which at 50 Hz takes 10 ms more
        let mut out = generator(&[("Freq_per_inp", 100.0)], 1, 1);
        run(&mut out, &Grid::filled(1, 1, 1.0), 0, 15);
        run(&mut out, &Grid::filled(1, 1, 0.5), 15, 30);
        let times: Vec<_> = out.train().times_of(0).collect();
        assert_eq!(times.len(), 3);
        assert!((times[0] - 0.010).abs() < 1e-9);
        // ramp slot [15, 16) runs at 75 Hz on average, the rest at 50 Hz
        let after_ramp = 0.5 - 0.075 * 1.0;
        let expected = 0.016 + after_ramp / 50.0;
        assert!((times[1] - expected).abs() < 1e-9, "{} vs {}", times[1], expected);
        assert!((times[2] - expected - 0.020).abs() < 1e-9);
    }

    #[test]
    fn test_window_and_ordering() {
        let mut out = generator(
            &[("Freq_per_inp", 10.0), ("Start_time", 20.0), ("End_time", 60.0), ("Random_init", 1.0), ("Seed", 7.0)],
            3,
            4,
        );
        let input = Grid::from_vec(3, 4, (0..12).map(|i| 10.0 + 5.0 * i as f64).collect()).unwrap();
        run(&mut out, &input, 0, 100);
        assert!(!out.train().is_empty());
        assert!(out.train().is_ordered());
        assert!(out.train().spikes().iter().all(|s| s.time >= 0.020 && s.time < 0.061));
    }

    #[test]
    fn test_finish_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spikes.spk");
        let mut out = SpikingOutput::new(&path);
        out.set_parameters(&[Parameter::new("Freq_per_inp", 500.0)]).unwrap();
        out.allocate(&Geometry::new(1, 1, 1.0, 1.0)).unwrap();
        run(&mut out, &Grid::filled(1, 1, 1.0), 0, 10);
        out.finish().unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        // spikes at 2, 4, 6 and 8 ms
        assert_eq!(text.lines().count(), 2 + 4);
    }

    #[test]
    fn test_unknown_parameter() {
        let mut out = SpikingOutput::new("x.spk");
        assert!(out.set_parameters(&[Parameter::new("Gamma_shape", 2.0)]).is_err());
    }
}
