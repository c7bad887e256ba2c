//! ModuleKind - Facade Enum
//!
//! The closed set of stage variants a graph can hold. The graph only talks to
//! stages through this enum and the [`Stage`] trait it implements.

use std::path::PathBuf;

use super::{
    gauss_filter::GaussFilter,
    linear_filter::LinearFilter,
    nonlinearity::{Shape, StaticNonLinearity},
    placeholder::OutputBuffer,
    plasticity::ShortTermPlasticity,
    sequence_output::SequenceOutput,
    single_compartment::SingleCompartment,
    Parameter, Port, Stage, SynapseKind,
};
use crate::error::Result;
use crate::grid::{Geometry, Grid};
use crate::spikes::{PointProcessOutput, SpikingOutput};

/// Stage variants - the facade for all modules
#[derive(Debug)]
pub enum ModuleKind {
    /// Default `Output` until a script declares one
    Placeholder(OutputBuffer),
    LinearFilter(LinearFilter),
    GaussFilter(GaussFilter),
    SingleCompartment(SingleCompartment),
    NonLinearity(StaticNonLinearity),
    Plasticity(ShortTermPlasticity),
    /// `spikes` output
    Spiking(SpikingOutput),
    /// `stochasticSpikes` output
    PointProcess(PointProcessOutput),
    /// `sequence` output
    Sequence(SequenceOutput),
}

impl ModuleKind {
    /// Stage for a `Create` type name
    pub fn from_type_name(name: &str) -> Option<Self> {
        if let Some(shape) = Shape::from_type_name(name) {
            return Some(Self::NonLinearity(StaticNonLinearity::new(shape)));
        }
        match name {
            "LinearFilter" => Some(Self::LinearFilter(LinearFilter::new())),
            "GaussFilter" => Some(Self::GaussFilter(GaussFilter::default())),
            "SingleCompartment" => Some(Self::SingleCompartment(SingleCompartment::new())),
            "ShortTermPlasticity" => Some(Self::Plasticity(ShortTermPlasticity::new())),
            _ => None,
        }
    }

    /// Stage for an `Output` kind, writing to `path`
    pub fn output(kind: &str, path: impl Into<PathBuf>) -> Option<Self> {
        match kind {
            "spikes" => Some(Self::Spiking(SpikingOutput::new(path))),
            "stochasticSpikes" => Some(Self::PointProcess(PointProcessOutput::new(path))),
            "sequence" => Some(Self::Sequence(SequenceOutput::new(path))),
            _ => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }

    pub fn stage(&self) -> &dyn Stage {
        match self {
            Self::Placeholder(s) => s,
            Self::LinearFilter(s) => s,
            Self::GaussFilter(s) => s,
            Self::SingleCompartment(s) => s,
            Self::NonLinearity(s) => s,
            Self::Plasticity(s) => s,
            Self::Spiking(s) => s,
            Self::PointProcess(s) => s,
            Self::Sequence(s) => s,
        }
    }

    pub fn stage_mut(&mut self) -> &mut dyn Stage {
        match self {
            Self::Placeholder(s) => s,
            Self::LinearFilter(s) => s,
            Self::GaussFilter(s) => s,
            Self::SingleCompartment(s) => s,
            Self::NonLinearity(s) => s,
            Self::Plasticity(s) => s,
            Self::Spiking(s) => s,
            Self::PointProcess(s) => s,
            Self::Sequence(s) => s,
        }
    }
}

/// One node of the retina graph
#[derive(Debug)]
pub struct Module {
    id: String,
    ports: Vec<Port>,
    kind: ModuleKind,
}

impl Module {
    pub fn new(id: impl Into<String>, kind: ModuleKind) -> Self {
        Self {
            id: id.into(),
            ports: Vec::new(),
            kind,
        }
    }

    /// The no-op `Output` every graph starts with
    pub fn placeholder() -> Self {
        Self::new("Output", ModuleKind::Placeholder(OutputBuffer::new()))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn add_port(&mut self, port: Port) {
        self.ports.push(port);
    }

    pub fn kind(&self) -> &ModuleKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut ModuleKind {
        &mut self.kind
    }

    pub fn set_parameters(&mut self, params: &[Parameter]) -> Result<()> {
        self.kind.stage_mut().set_parameters(params)
    }

    pub fn allocate(&mut self, geometry: &Geometry) -> Result<()> {
        self.kind.stage_mut().allocate(geometry)
    }

    /// Hand the accumulator of port `index` to the stage.
    ///
    /// Ports are numbered separately per synapse kind, so the stage sees the
    /// position of this port among the ports of the same kind.
    pub fn feed_port(&mut self, sim_time: f64, index: usize, input: &Grid) {
        let Some(port) = self.ports.get(index) else {
            return;
        };
        let synapse = port.synapse();
        let sub_index = self.ports[..index]
            .iter()
            .filter(|p| p.synapse() == synapse)
            .count();
        self.kind
            .stage_mut()
            .feed_input(sim_time, input, synapse, sub_index);
    }

    pub fn update(&mut self) -> Result<()> {
        self.kind.stage_mut().update()
    }

    pub fn output(&self) -> &Grid {
        self.kind.stage().output()
    }

    pub fn finish(&mut self) -> Result<()> {
        self.kind.stage_mut().finish()
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.stage().stage_name()
    }
}
