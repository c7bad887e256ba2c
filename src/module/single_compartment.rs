//! SingleCompartment - exponential integrator of a passive membrane
//!
//! Every pixel is one compartment obeying `dV/dt = (V∞ − V) / τ`. Inputs are
//! held constant over a step, which makes the exponential update exact:
//!
//! ```text
//! V(t+Δt) = V∞ + (V(t) − V∞)·exp(−Δt/τ)
//! ```
//!
//! With conductance ports the leak `1/Rm` joins the synaptic conductances and
//! `τ = Cm / g_total`; with current ports only, `τ = taum` and `V∞ = El + Rm·ΣI`.

use super::traits::{Parameter, Stage, SynapseKind};
use crate::error::Result;
use crate::grid::{Geometry, Grid};

/// Added to the total conductance so it never reaches zero
const CONDUCTANCE_EPSILON: f64 = 1e-9;

#[derive(Clone, Debug)]
pub struct SingleCompartment {
    current_ports: usize,
    conductance_ports: usize,
    /// Membrane resistance; 0 disables the leak conductance
    rm: f64,
    cm: f64,
    taum: f64,
    e_leak: f64,
    /// Reversal potential per conductance port
    reversal: Vec<f64>,
    step: f64,
    currents: Vec<Grid>,
    conductances: Vec<Grid>,
    potential: Grid,
    // Per-step scratch
    v_inf: Grid,
    total_g: Grid,
}

impl Default for SingleCompartment {
    fn default() -> Self {
        Self {
            current_ports: 0,
            conductance_ports: 0,
            rm: 1.0,
            cm: 1.0,
            taum: 1.0,
            e_leak: 0.0,
            reversal: Vec::new(),
            step: 1.0,
            currents: Vec::new(),
            conductances: Vec::new(),
            potential: Grid::default(),
            v_inf: Grid::default(),
            total_g: Grid::default(),
        }
    }
}

impl SingleCompartment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ports(current_ports: usize, conductance_ports: usize) -> Self {
        Self {
            current_ports,
            conductance_ports,
            reversal: vec![0.0; conductance_ports],
            ..Self::default()
        }
    }

    pub fn leak_reversal(&self) -> f64 {
        self.e_leak
    }

    pub fn reversal_potentials(&self) -> &[f64] {
        &self.reversal
    }

    /// Membrane potential grid
    pub fn potential(&self) -> &Grid {
        &self.potential
    }

    /// Assign the collected `E` values: one value is shared by every port and
    /// the leak, several values go to the ports in order and the last one is
    /// also the leak reversal.
    fn apply_reversals(&mut self, values: &[f64]) {
        match values {
            [] => {}
            [e] => {
                self.e_leak = *e;
                self.reversal.iter_mut().for_each(|r| *r = *e);
            }
            many => {
                for (r, e) in self.reversal.iter_mut().zip(many.iter()) {
                    *r = *e;
                }
                if let Some(last) = many.last() {
                    self.e_leak = *last;
                }
            }
        }
    }

    fn leak_conductance(&self) -> f64 {
        if self.rm > 0.0 {
            1.0 / self.rm
        } else {
            0.0
        }
    }
}

impl Stage for SingleCompartment {
    fn set_parameters(&mut self, params: &[Parameter]) -> Result<()> {
        let mut reversals = Vec::new();
        for p in params {
            match p.name.as_str() {
                "number_current_ports" => {
                    if p.value < 0.0 {
                        return Err(p.invalid(">= 0"));
                    }
                    self.current_ports = p.value as usize;
                }
                "number_conductance_ports" => {
                    if p.value < 0.0 {
                        return Err(p.invalid(">= 0"));
                    }
                    self.conductance_ports = p.value as usize;
                    self.reversal.resize(self.conductance_ports, self.e_leak);
                }
                "Rm" => {
                    if p.value < 0.0 {
                        return Err(p.invalid(">= 0"));
                    }
                    self.rm = p.value;
                }
                "tau" => {
                    if p.value <= 0.0 {
                        return Err(p.invalid("> 0"));
                    }
                    self.taum = p.value;
                }
                "Cm" => {
                    if p.value <= 0.0 {
                        return Err(p.invalid("> 0"));
                    }
                    self.cm = p.value;
                }
                "E" => reversals.push(p.value),
                _ => return Err(p.unknown(self.stage_name())),
            }
        }
        self.apply_reversals(&reversals);
        Ok(())
    }

    fn allocate(&mut self, geometry: &Geometry) -> Result<()> {
        self.step = geometry.step;
        self.currents = vec![geometry.zeros(); self.current_ports];
        self.conductances = vec![geometry.zeros(); self.conductance_ports];
        self.potential = Grid::filled(geometry.rows, geometry.cols, self.e_leak);
        self.v_inf = geometry.zeros();
        self.total_g = geometry.zeros();
        Ok(())
    }

    fn feed_input(&mut self, _sim_time: f64, input: &Grid, synapse: SynapseKind, port: usize) {
        let (slots, declared) = match synapse {
            SynapseKind::Current => (&mut self.currents, self.current_ports),
            SynapseKind::Conductance => (&mut self.conductances, self.conductance_ports),
        };
        match slots.get_mut(port) {
            Some(slot) => slot.assign(input),
            None => log::warn!(
                "SingleCompartment: {:?} port {} ignored, only {} declared",
                synapse,
                port,
                declared
            ),
        }
    }

    fn update(&mut self) -> Result<()> {
        let step = self.step;

        if self.conductance_ports > 0 {
            let g_leak = self.leak_conductance();
            self.total_g.fill(g_leak + CONDUCTANCE_EPSILON);
            self.v_inf.fill(g_leak * self.e_leak);
            for (g, &e) in self.conductances.iter().zip(self.reversal.iter()) {
                self.total_g += g;
                self.v_inf.add_scaled(g, e);
            }
            for i in &self.currents {
                self.v_inf += i;
            }

            let cm = self.cm;
            let v_inf = self.v_inf.as_mut_slice();
            let total_g = self.total_g.as_slice();
            for ((v, vi), &g) in self
                .potential
                .as_mut_slice()
                .iter_mut()
                .zip(v_inf.iter_mut())
                .zip(total_g)
            {
                *vi /= g;
                let decay = (-step * g / cm).exp();
                *v = *vi + (*v - *vi) * decay;
            }
        } else {
            self.v_inf.fill(0.0);
            for i in &self.currents {
                self.v_inf += i;
            }
            let (rm, e_leak) = (self.rm, self.e_leak);
            let decay = (-step / self.taum).exp();
            self.potential.zip_inplace(&self.v_inf, |v, sum_i| {
                let v_inf = e_leak + rm * sum_i;
                v_inf + (v - v_inf) * decay
            });
        }
        Ok(())
    }

    fn output(&self) -> &Grid {
        &self.potential
    }

    fn stage_name(&self) -> &'static str {
        "SingleCompartment"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> Geometry {
        Geometry::new(2, 3, 0.5, 1.0)
    }

    #[test]
    fn test_current_only_closed_form() {
        let mut sc = SingleCompartment::new();
        sc.set_parameters(&[
            Parameter::new("number_current_ports", 1.0),
            Parameter::new("number_conductance_ports", 0.0),
            Parameter::new("Rm", 2.0),
            Parameter::new("tau", 10.0),
            Parameter::new("E", -1.0),
        ])
        .unwrap();
        sc.allocate(&geometry()).unwrap();

        let input = Grid::filled(2, 3, 3.0);
        let v_inf = -1.0 + 2.0 * 3.0;
        let decay = (-0.5f64 / 10.0).exp();
        let mut expected = -1.0;
        for _ in 0..20 {
            sc.feed_input(0.0, &input, SynapseKind::Current, 0);
            sc.update().unwrap();
            expected = v_inf + (expected - v_inf) * decay;
            assert!((sc.output()[(1, 2)] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_conductance_steady_state_is_monotonic() {
        for cm in [0.1, 1.0, 50.0] {
            let mut sc = SingleCompartment::new();
            sc.set_parameters(&[
                Parameter::new("number_current_ports", 1.0),
                Parameter::new("number_conductance_ports", 2.0),
                Parameter::new("Rm", 4.0),
                Parameter::new("Cm", cm),
                Parameter::new("E", 10.0),
                Parameter::new("E", -5.0),
                Parameter::new("E", 0.0),
            ])
            .unwrap();
            assert_eq!(sc.reversal_potentials(), &[10.0, -5.0]);
            assert_eq!(sc.leak_reversal(), 0.0);
            sc.allocate(&geometry()).unwrap();

            let g1 = Grid::filled(2, 3, 0.5);
            let g2 = Grid::filled(2, 3, 0.25);
            let i = Grid::filled(2, 3, 0.1);
            let total = 0.5 + 0.25 + 0.25 + CONDUCTANCE_EPSILON;
            let v_inf = (0.5 * 10.0 + 0.25 * -5.0 + 0.25 * 0.0 + 0.1) / total;

            let mut prev = sc.output()[(0, 0)];
            for _ in 0..20_000 {
                sc.feed_input(0.0, &i, SynapseKind::Current, 0);
                sc.feed_input(0.0, &g1, SynapseKind::Conductance, 0);
                sc.feed_input(0.0, &g2, SynapseKind::Conductance, 1);
                sc.update().unwrap();
                let v = sc.output()[(0, 0)];
                assert!(v >= prev - 1e-12, "not monotonic for Cm {}", cm);
                assert!(v <= v_inf + 1e-9);
                prev = v;
            }
            assert!((prev - v_inf).abs() < 1e-6, "Cm {}: {} vs {}", cm, prev, v_inf);
        }
    }

    #[test]
    fn test_single_reversal_is_broadcast() {
        let mut sc = SingleCompartment::with_ports(0, 3);
        sc.set_parameters(&[Parameter::new("E", 7.0)]).unwrap();
        assert_eq!(sc.reversal_potentials(), &[7.0, 7.0, 7.0]);
        assert_eq!(sc.leak_reversal(), 7.0);
    }

    #[test]
    fn test_zero_rm_has_no_leak() {
        let mut sc = SingleCompartment::new();
        sc.set_parameters(&[
            Parameter::new("number_conductance_ports", 1.0),
            Parameter::new("Rm", 0.0),
            Parameter::new("E", 2.0),
        ])
        .unwrap();
        sc.allocate(&geometry()).unwrap();
        let g = Grid::filled(2, 3, 1.0);
        for _ in 0..200 {
            sc.feed_input(0.0, &g, SynapseKind::Conductance, 0);
            sc.update().unwrap();
        }
        assert!(sc.output().as_slice().iter().all(|v| v.is_finite()));
        assert!((sc.output()[(0, 0)] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_extra_port_ignored() {
        let mut sc = SingleCompartment::with_ports(1, 0);
        sc.allocate(&geometry()).unwrap();
        sc.feed_input(0.0, &Grid::filled(2, 3, 100.0), SynapseKind::Current, 1);
        sc.update().unwrap();
        assert_eq!(sc.output().sum(), 0.0);
    }

    #[test]
    fn test_invalid_parameters() {
        let mut sc = SingleCompartment::new();
        assert!(sc.set_parameters(&[Parameter::new("tau", 0.0)]).is_err());
        assert!(sc.set_parameters(&[Parameter::new("Cm", -1.0)]).is_err());
        assert!(sc.set_parameters(&[Parameter::new("Rm", -1.0)]).is_err());
        assert!(sc.set_parameters(&[Parameter::new("gain", 1.0)]).is_err());
    }
}
