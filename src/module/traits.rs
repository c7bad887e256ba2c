//! Core Traits - the capability interface every stage implements
//!
//! ## Stage Lifecycle
//!
//! 1. constructed with identity parameters
//! 2. `set_parameters` (script driven, may be called more than once)
//! 3. `allocate` once the final grid shape and step are known
//! 4. `feed_input` per port, then `update`, once per simulation step
//! 5. `finish` at the end of a trial (flushes files)

use crate::error::{Result, RetinaError};
use crate::grid::{Geometry, Grid};

/// How a port's accumulated grid is interpreted by the receiving stage
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SynapseKind {
    /// Injected current
    #[default]
    Current,
    /// Synaptic conductance
    Conductance,
}

impl SynapseKind {
    /// Parse the script token (`Current` or `Conductance`)
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Current" => Some(Self::Current),
            "Conductance" => Some(Self::Conductance),
            _ => None,
        }
    }
}

/// Operation applied to every source after the first
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sign {
    Add,
    Subtract,
}

impl Sign {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "+" => Some(Self::Add),
            "-" => Some(Self::Subtract),
            _ => None,
        }
    }
}

/// One input of a module: signed combination of named sources
#[derive(Clone, Debug, PartialEq)]
pub struct Port {
    sources: Vec<String>,
    signs: Vec<Sign>,
    synapse: SynapseKind,
}

impl Port {
    /// Build a port. There must be exactly one sign per source after the first.
    pub fn new(sources: Vec<String>, signs: Vec<Sign>, synapse: SynapseKind) -> Result<Self> {
        if sources.is_empty() {
            return Err(RetinaError::Connection("port without sources".into()));
        }
        if signs.len() + 1 != sources.len() {
            return Err(RetinaError::Connection(format!(
                "{} sources need {} signs, got {}",
                sources.len(),
                sources.len() - 1,
                signs.len()
            )));
        }
        Ok(Self { sources, signs, synapse })
    }

    /// Single-source port
    pub fn single(source: impl Into<String>, synapse: SynapseKind) -> Self {
        Self {
            sources: vec![source.into()],
            signs: Vec::new(),
            synapse,
        }
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn signs(&self) -> &[Sign] {
        &self.signs
    }

    pub fn synapse(&self) -> SynapseKind {
        self.synapse
    }

    /// Sources after the first, paired with their sign
    pub fn signed_tail(&self) -> impl Iterator<Item = (&str, Sign)> {
        self.sources[1..]
            .iter()
            .map(String::as_str)
            .zip(self.signs.iter().copied())
    }
}

/// One `name value` entry of a parameter block
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self { name: name.into(), value }
    }

    /// Error for a name the stage does not know
    pub fn unknown(&self, stage: &str) -> RetinaError {
        RetinaError::parameter(format!("unknown {} parameter '{}'", stage, self.name))
    }

    /// Error for a value outside its valid range
    pub fn invalid(&self, expected: &str) -> RetinaError {
        RetinaError::parameter(format!(
            "invalid value {} for '{}' (expected {})",
            self.value, self.name, expected
        ))
    }
}

/// Unified trait for all processing stages
pub trait Stage: Send {
    /// Apply a parameter block. Unknown names and invalid values are rejected.
    fn set_parameters(&mut self, params: &[Parameter]) -> Result<()>;

    /// Size buffers and derive coefficients for the final geometry
    fn allocate(&mut self, geometry: &Geometry) -> Result<()>;

    /// Receive the accumulated grid of one port.
    ///
    /// `port` is the index among the ports of the same synapse kind.
    fn feed_input(&mut self, sim_time: f64, input: &Grid, synapse: SynapseKind, port: usize);

    /// Advance internal state by one step
    fn update(&mut self) -> Result<()>;

    /// Most recent output grid
    fn output(&self) -> &Grid;

    /// Flush accumulated results at the end of a run
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    /// Stage type name, as written in scripts
    fn stage_name(&self) -> &'static str;
}
