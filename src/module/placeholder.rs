//! Default `Output` module: keeps what it is fed and computes nothing

use super::traits::{Parameter, Stage, SynapseKind};
use crate::error::Result;
use crate::grid::{Geometry, Grid};

/// Holds the last accumulated grid of every port
#[derive(Clone, Debug, Default)]
pub struct OutputBuffer {
    ports: Vec<Grid>,
    empty: Grid,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last grid received on `port`
    pub fn port(&self, port: usize) -> Option<&Grid> {
        self.ports.get(port)
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }
}

impl Stage for OutputBuffer {
    fn set_parameters(&mut self, params: &[Parameter]) -> Result<()> {
        match params.first() {
            Some(p) => Err(p.unknown(self.stage_name())),
            None => Ok(()),
        }
    }

    fn allocate(&mut self, geometry: &Geometry) -> Result<()> {
        self.empty = geometry.zeros();
        self.ports.clear();
        Ok(())
    }

    fn feed_input(&mut self, _sim_time: f64, input: &Grid, _synapse: SynapseKind, port: usize) {
        if self.ports.len() <= port {
            self.ports.resize(port + 1, Grid::default());
        }
        self.ports[port].assign(input);
    }

    fn update(&mut self) -> Result<()> {
        Ok(())
    }

    fn output(&self) -> &Grid {
        self.ports.first().unwrap_or(&self.empty)
    }

    fn stage_name(&self) -> &'static str {
        "Output"
    }
}
