//! # retina-sim - Layered Retina Simulator
//!
//! A retina model is a directed graph of processing stages (temporal and
//! spatial filters, nonlinearities, membrane integrators, spike generators)
//! described by a small script and driven by a fixed-step simulation loop.
//!
//! ## Core Components
//!
//! - **Script**: line-oriented description language, parsed fail-fast
//! - **RetinaGraph**: module ownership, wiring, colour decomposition, stepping
//! - **Modules**: LinearFilter, GaussFilter, SingleCompartment, nonlinearities
//! - **Spikes**: deterministic and stochastic rate-to-spike conversion
//! - **Input**: impulse, white noise, gratings, image sequences, streamed frames
//!
//! ## One Step
//!
//! 1. the input source produces the frame for time `t`
//! 2. the frame is split into cone, rod and RGB planes
//! 3. every port of every module receives its signed combination of sources
//! 4. every module updates, in declaration order
//!
//! ## Example
//!
//! ```ignore
//! use retina_sim::{DisplaySettings, Interpreter, RetinaGraph};
//!
//! let mut graph = RetinaGraph::new();
//! let mut display = DisplaySettings::default();
//! Interpreter::new("results").run_file("model.py".as_ref(), &mut graph, &mut display)?;
//!
//! graph.allocate()?;
//! let times: Vec<f64> = graph.settings().step_times().collect();
//! for t in times {
//!     graph.feed_input(t)?;
//!     graph.update()?;
//! }
//! graph.finish()?;
//! ```

// Error types
mod error;
pub use error::{Result, RetinaError};

// Dense grids and shared geometry
pub mod grid;
pub use grid::{Geometry, Grid};

// Processing stages
pub mod module;
pub use module::{Module, ModuleKind, Parameter, Port, Sign, Stage, SynapseKind};

// Spike generation
pub mod spikes;
pub use spikes::{PointProcessOutput, Spike, SpikeTrain, SpikingOutput};

// Frame sources
pub mod input;
pub use input::{Frame, FramePoll, FrameSource, InputSource};

// Graph
pub mod retina;
pub use retina::{InputStatus, RetinaGraph};

// Script language
pub mod script;
pub use script::{Interpreter, ScriptError};

// Configuration and recordings
pub mod display;
pub mod multimeter;
pub mod settings;
pub use display::DisplaySettings;
pub use multimeter::{Multimeter, MultimeterKind, MultimeterSpec};
pub use settings::{RunOptions, SimulationSettings};
