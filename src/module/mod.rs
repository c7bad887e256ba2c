//! # Modules - the processing stages of a retina graph
//!
//! Every stage consumes one accumulated grid per port and produces one output
//! grid per step.
//!
//! ## Stages
//!
//! | Script type | Stage | State |
//! |-------------|-------|-------|
//! | LinearFilter | [`LinearFilter`] | input/output ring buffers |
//! | GaussFilter | [`GaussFilter`] | coefficient tables |
//! | SingleCompartment | [`SingleCompartment`] | membrane potential |
//! | *NonLinearity | [`StaticNonLinearity`] | none |
//! | ShortTermPlasticity | [`ShortTermPlasticity`] | km, P |
//! | Output `sequence` | [`SequenceOutput`] | open INR file |
//!
//! The spike-generating outputs live in [`crate::spikes`].

// Core trait and port bookkeeping
mod traits;
pub use traits::{Parameter, Port, Sign, Stage, SynapseKind};

// Stages
mod gauss_filter;
mod linear_filter;
mod nonlinearity;
mod placeholder;
mod plasticity;
mod sequence_output;
mod single_compartment;

pub use gauss_filter::{GaussFilter, RecursiveCoefficients};
pub use linear_filter::{LinearFilter, TemporalKernel};
pub use nonlinearity::{Shape, StaticNonLinearity};
pub use placeholder::OutputBuffer;
pub use plasticity::ShortTermPlasticity;
pub use sequence_output::{inr_header, SequenceOutput, INR_HEADER_LEN};
pub use single_compartment::SingleCompartment;

// Facade enum and graph node
mod model;
pub use model::{Module, ModuleKind};
