//! # RetinaGraph - module ownership, wiring and stepping
//!
//! The graph owns every module in insertion order. Index 0 is always the
//! `Output` module: a placeholder until the script declares a real one.
//!
//! ## One step
//!
//! ```text
//! feed_input(t):  frame = input.frame_at(t)
//!                 colour planes  <- frame
//!                 for every module, for every port:
//!                     acc = first source ± remaining sources
//!                     module.feed(acc)
//! update():       every module, in insertion order
//! ```
//!
//! Sources are read before any module updates, so a module always sees the
//! outputs its sources produced in the previous step. Evaluation order is
//! the declaration order; nothing is sorted.

mod color;

pub use color::{is_channel, ColorChannels, CHANNEL_NAMES};

use crate::error::{Result, RetinaError};
use crate::grid::{Geometry, Grid};
use crate::input::{Frame, FramePoll, FrameSource, InputSource};
use crate::module::{Module, Port, Sign, SynapseKind};
use crate::settings::SimulationSettings;

/// Identifier of the graph's output module
pub const OUTPUT_ID: &str = "Output";

/// Outcome of feeding one step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputStatus {
    /// A frame was consumed and every port was fed
    Ready,
    /// The input has no frame yet; retry the same step
    Stall,
    /// The input is exhausted
    End,
}

/// Directed graph of processing modules
#[derive(Debug)]
pub struct RetinaGraph {
    settings: SimulationSettings,
    modules: Vec<Module>,
    input: Option<InputSource>,
    colors: ColorChannels,
    frame: Frame,
    accumulator: Grid,
}

impl Default for RetinaGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RetinaGraph {
    pub fn new() -> Self {
        Self::with_settings(SimulationSettings::default())
    }

    pub fn with_settings(settings: SimulationSettings) -> Self {
        Self {
            settings,
            modules: vec![Module::placeholder()],
            input: None,
            colors: ColorChannels::default(),
            frame: Frame::default(),
            accumulator: Grid::default(),
        }
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SimulationSettings {
        &mut self.settings
    }

    pub fn geometry(&self) -> Geometry {
        self.settings.geometry()
    }

    // =========================================================================
    // Building
    // =========================================================================

    /// Append a processing module. IDs must be unique.
    pub fn add_module(&mut self, module: Module) -> Result<()> {
        if module.id() == OUTPUT_ID || self.position(module.id()).is_some() {
            return Err(RetinaError::Connection(format!(
                "module '{}' already exists",
                module.id()
            )));
        }
        log::debug!("module {} ({}) added", module.id(), module.type_name());
        self.modules.push(module);
        Ok(())
    }

    /// Install the output module in slot 0.
    ///
    /// Only the first declaration replaces the placeholder; later ones are
    /// ignored with a warning and `false` is returned. Ports already connected
    /// to the placeholder move to the new module.
    pub fn add_output(&mut self, mut module: Module) -> bool {
        if !self.modules[0].kind().is_placeholder() {
            log::warn!(
                "Output module already added, ignoring '{}' ({})",
                module.id(),
                module.type_name()
            );
            return false;
        }
        for port in self.modules[0].ports() {
            module.add_port(port.clone());
        }
        log::debug!("output module {} ({}) installed", module.id(), module.type_name());
        self.modules[0] = module;
        true
    }

    /// Wire `sources` (combined with `signs`) into a new port of `target`.
    ///
    /// Sources are colour channels or modules other than the output. If any
    /// of them cannot be resolved the whole connection is rejected.
    pub fn connect(
        &mut self,
        sources: Vec<String>,
        target: &str,
        signs: Vec<Sign>,
        synapse: SynapseKind,
    ) -> Result<()> {
        let target_index = self.target_position(target).ok_or_else(|| {
            RetinaError::Connection(format!("unknown target module '{}'", target))
        })?;

        for source in &sources {
            if is_channel(source) {
                continue;
            }
            match self.source_position(source) {
                Some(index) => {
                    if target_index != 0 && index > target_index {
                        log::warn!(
                            "'{}' is declared after '{}' and is read one step late",
                            source,
                            target
                        );
                    }
                }
                None => {
                    log::warn!("connection to '{}' rejected: unknown source '{}'", target, source);
                    return Err(RetinaError::Connection(format!(
                        "unknown source module '{}'",
                        source
                    )));
                }
            }
        }

        let port = Port::new(sources, signs, synapse)?;
        log::debug!("{:?} connected to {}", port.sources(), target);
        self.modules[target_index].add_port(port);
        Ok(())
    }

    /// Select the input source. The grid shape follows the source and each
    /// frame is shown for one step.
    pub fn set_input(&mut self, input: InputSource) {
        let (rows, cols) = input.shape();
        self.settings.rows = rows;
        self.settings.cols = cols;
        self.settings.repetitions = 1;
        log::debug!("input {} ({}x{})", input.kind_name(), rows, cols);
        self.input = Some(input);
    }

    pub fn input(&self) -> Option<&InputSource> {
        self.input.as_ref()
    }

    pub fn input_mut(&mut self) -> Option<&mut InputSource> {
        self.input.as_mut()
    }

    /// Size every buffer for the final geometry
    pub fn allocate(&mut self) -> Result<()> {
        if self.input.is_none() {
            return Err(RetinaError::Input("no input source selected".into()));
        }
        let geometry = self.geometry();
        self.colors = ColorChannels::new(geometry.rows, geometry.cols);
        self.frame = Frame::uniform(geometry.rows, geometry.cols, 0.0);
        self.accumulator = geometry.zeros();
        for module in &mut self.modules {
            module.allocate(&geometry)?;
        }
        log::info!(
            "retina allocated: {} modules, {}x{} grid, step {} ms",
            self.modules.len(),
            geometry.rows,
            geometry.cols,
            geometry.step
        );
        Ok(())
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Fetch the frame for time `t` (ms) and feed every port of every module
    pub fn feed_input(&mut self, t: f64) -> Result<InputStatus> {
        let input = self
            .input
            .as_mut()
            .ok_or_else(|| RetinaError::Input("no input source selected".into()))?;
        match input.frame_at(t) {
            FramePoll::Ready(frame) => {
                let (rows, cols) = (self.settings.rows, self.settings.cols);
                if frame.rows() != rows || frame.cols() != cols {
                    return Err(RetinaError::Input(format!(
                        "frame at {} ms is {}x{}, the grid is {}x{}",
                        t,
                        frame.rows(),
                        frame.cols(),
                        rows,
                        cols
                    )));
                }
                self.frame.assign(frame)
            }
            FramePoll::Stall => return Ok(InputStatus::Stall),
            FramePoll::End => return Ok(InputStatus::End),
        }
        self.colors.decompose(&self.frame);

        for i in 0..self.modules.len() {
            for j in 0..self.modules[i].ports().len() {
                let port = &self.modules[i].ports()[j];
                accumulate(&self.modules, &self.colors, port, &mut self.accumulator);
                self.modules[i].feed_port(t, j, &self.accumulator);
            }
        }
        Ok(InputStatus::Ready)
    }

    /// Advance every module by one step, in insertion order
    pub fn update(&mut self) -> Result<()> {
        for module in &mut self.modules {
            module.update()?;
        }
        Ok(())
    }

    /// Flush every module. All modules are flushed even if one fails; the
    /// first error is returned.
    pub fn finish(&mut self) -> Result<()> {
        let mut first_error = None;
        for module in &mut self.modules {
            if let Err(e) = module.finish() {
                log::warn!("flushing {} failed: {}", module.id(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Last raw frame
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn module(&self, id: &str) -> Option<&Module> {
        self.target_position(id).map(|i| &self.modules[i])
    }

    pub fn module_mut(&mut self, id: &str) -> Option<&mut Module> {
        self.target_position(id).map(move |i| &mut self.modules[i])
    }

    pub fn output_module(&self) -> &Module {
        &self.modules[0]
    }

    /// True if `id` names a module that can be used as a source
    pub fn has_module(&self, id: &str) -> bool {
        self.source_position(id).is_some()
    }

    /// Output grid of a module or plane of a colour channel
    pub fn grid_of(&self, name: &str) -> Option<&Grid> {
        self.colors
            .channel(name)
            .or_else(|| self.source_position(name).map(|i| self.modules[i].output()))
    }

    /// Value read by a host simulator for output `cell`.
    ///
    /// `cell = port·rows·cols + row·cols + col`; the value is taken from the
    /// first source of that port of the output module. Unknown cells read 0.
    pub fn output_value(&self, cell: usize) -> f64 {
        let area = self.settings.rows * self.settings.cols;
        if area == 0 {
            return 0.0;
        }
        let (port, offset) = (cell / area, cell % area);
        self.modules[0]
            .ports()
            .get(port)
            .and_then(|p| p.sources().first())
            .and_then(|source| self.grid_of(source))
            .and_then(|grid| grid.as_slice().get(offset).copied())
            .unwrap_or(0.0)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.modules.iter().position(|m| m.id() == id)
    }

    /// Connection target: any module, with `Output` always naming slot 0
    fn target_position(&self, id: &str) -> Option<usize> {
        if id == OUTPUT_ID {
            Some(0)
        } else {
            self.position(id)
        }
    }

    /// Connection source: any module except the output slot
    fn source_position(&self, id: &str) -> Option<usize> {
        self.modules
            .iter()
            .skip(1)
            .position(|m| m.id() == id)
            .map(|i| i + 1)
    }
}

/// Build the signed combination of a port's sources into `acc`
fn accumulate(modules: &[Module], colors: &ColorChannels, port: &Port, acc: &mut Grid) {
    let lookup = |name: &str| {
        colors.channel(name).or_else(|| {
            modules
                .iter()
                .skip(1)
                .find(|m| m.id() == name)
                .map(Module::output)
        })
    };

    let Some(first) = port.sources().first().and_then(|s| lookup(s)) else {
        return;
    };
    acc.assign(first);
    for (name, sign) in port.signed_tail() {
        if let Some(grid) = lookup(name) {
            match sign {
                Sign::Add => *acc += grid,
                Sign::Subtract => *acc -= grid,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Impulse, StreamingInput};
    use crate::module::{GaussFilter, LinearFilter, ModuleKind, Parameter, Stage};

    fn graph(rows: usize, cols: usize) -> RetinaGraph {
        let mut g = RetinaGraph::new();
        g.set_input(InputSource::Impulse(Impulse::new(0.0, 5.0, 10.0, 0.0, rows, cols)));
        g
    }

    fn identity(id: &str) -> Module {
        Module::new(id, ModuleKind::LinearFilter(LinearFilter::new()))
    }

    #[test]
    fn test_fresh_graph_has_placeholder_output() {
        let g = RetinaGraph::new();
        assert_eq!(g.module_count(), 1);
        assert_eq!(g.output_module().id(), OUTPUT_ID);
        assert!(g.output_module().kind().is_placeholder());
        assert!(!g.has_module(OUTPUT_ID));
    }

    #[test]
    fn test_output_replaced_once() {
        let mut g = graph(1, 1);
        g.add_module(identity("bip")).unwrap();
        g.connect(vec!["bip".into()], OUTPUT_ID, vec![], SynapseKind::Current)
            .unwrap();

        let first = ModuleKind::output("sequence", "first.inr").unwrap();
        assert!(g.add_output(Module::new("Output", first)));
        assert_eq!(g.output_module().ports().len(), 1);
        assert_eq!(g.output_module().type_name(), "sequence");

        let second = ModuleKind::output("spikes", "second.spk").unwrap();
        assert!(!g.add_output(Module::new("Output", second)));
        assert_eq!(g.output_module().type_name(), "sequence");
        assert_eq!(g.module_count(), 2);
    }

    #[test]
    fn test_duplicate_module_rejected() {
        let mut g = graph(1, 1);
        g.add_module(identity("bip")).unwrap();
        assert!(g.add_module(identity("bip")).is_err());
        assert!(g.add_module(identity("Output")).is_err());
    }

    #[test]
    fn test_unresolved_source_rejects_connection() {
        let mut g = graph(1, 1);
        g.add_module(identity("A")).unwrap();
        g.add_module(identity("T")).unwrap();
        let err = g
            .connect(
                vec!["A".into(), "ghost".into()],
                "T",
                vec![Sign::Add],
                SynapseKind::Current,
            )
            .unwrap_err();
        assert!(matches!(err, RetinaError::Connection(_)));
        assert!(g.module("T").unwrap().ports().is_empty());

        assert!(g
            .connect(vec!["A".into()], "nowhere", vec![], SynapseKind::Current)
            .is_err());
        // The output slot is never a source
        assert!(g
            .connect(vec![OUTPUT_ID.into()], "T", vec![], SynapseKind::Current)
            .is_err());
    }

    #[test]
    fn test_signed_accumulation() {
        let mut g = graph(2, 2);
        for id in ["A", "B", "C", "T"] {
            g.add_module(identity(id)).unwrap();
        }
        for (id, channel) in [("A", "red_channel"), ("B", "L_cones"), ("C", "rods")] {
            g.connect(vec![channel.into()], id, vec![], SynapseKind::Current)
                .unwrap();
        }
        g.connect(
            vec!["A".into(), "B".into(), "C".into()],
            "T",
            vec![Sign::Add, Sign::Subtract],
            SynapseKind::Current,
        )
        .unwrap();
        g.allocate().unwrap();

        // Sources settle after one step, T sees them one step later
        for step in 0..2 {
            assert_eq!(g.feed_input(step as f64).unwrap(), InputStatus::Ready);
            g.update().unwrap();
        }
        let a = g.module("A").unwrap().output();
        let b = g.module("B").unwrap().output();
        let c = g.module("C").unwrap().output();
        let t = g.module("T").unwrap().output();
        assert_eq!(a[(0, 0)], 10.0);
        for i in 0..4 {
            let want = a.as_slice()[i] + b.as_slice()[i] - c.as_slice()[i];
            assert!((t.as_slice()[i] - want).abs() < 1e-12);
        }
    }

    #[test]
    fn test_output_value_reads_first_source() {
        let mut g = graph(2, 3);
        g.add_module(identity("bip")).unwrap();
        g.connect(vec!["red_channel".into()], "bip", vec![], SynapseKind::Current)
            .unwrap();
        g.connect(vec!["bip".into()], OUTPUT_ID, vec![], SynapseKind::Current)
            .unwrap();
        g.connect(vec!["rods".into()], OUTPUT_ID, vec![], SynapseKind::Current)
            .unwrap();
        g.allocate().unwrap();
        g.feed_input(0.0).unwrap();
        g.update().unwrap();

        assert_eq!(g.output_value(5), 10.0);
        let rods = g.grid_of("rods").unwrap()[(1, 2)];
        assert_eq!(g.output_value(6 + 5), rods);
        assert_eq!(g.output_value(100), 0.0);
    }

    #[test]
    fn test_wrong_sized_stream_frame_never_reaches_modules() {
        let mut stream = StreamingInput::new(4, 4);
        let tx = stream.sender().unwrap();
        let mut g = RetinaGraph::new();
        g.set_input(InputSource::Streaming(stream));
        let gauss = GaussFilter::new(0.5).space_variant(0.5, 0.0);
        g.add_module(Module::new("gauss", ModuleKind::GaussFilter(gauss))).unwrap();
        g.connect(vec!["L_cones".into()], "gauss", vec![], SynapseKind::Current)
            .unwrap();
        g.allocate().unwrap();

        tx.send(Frame::uniform(6, 6, 1.0));
        assert_eq!(g.feed_input(0.0).unwrap(), InputStatus::Stall);
        g.update().unwrap();
        assert_eq!(g.module("gauss").unwrap().output().len(), 16);

        tx.send(Frame::uniform(4, 4, 1.0));
        assert_eq!(g.feed_input(0.0).unwrap(), InputStatus::Ready);
        g.update().unwrap();
        assert_eq!(g.module("gauss").unwrap().output().len(), 16);
    }

    #[test]
    fn test_missing_input() {
        let mut g = RetinaGraph::new();
        assert!(matches!(g.allocate(), Err(RetinaError::Input(_))));
        assert!(g.feed_input(0.0).is_err());
    }

    #[test]
    fn test_impulse_through_exponential_filter() {
        let mut g = graph(2, 2);
        let mut filter = LinearFilter::new();
        filter
            .set_parameters(&[Parameter::new("tau", 2.0), Parameter::new("Exp", 0.0)])
            .unwrap();
        g.add_module(Module::new("L1", ModuleKind::LinearFilter(filter))).unwrap();
        g.connect(vec!["L_cones".into()], "L1", vec![], SynapseKind::Current)
            .unwrap();
        g.connect(vec!["L1".into()], OUTPUT_ID, vec![], SynapseKind::Current)
            .unwrap();
        g.allocate().unwrap();

        let gain = 0.0193339 + 0.1191920 + 0.9503041;
        let c = (-1.0f64 / 2.0).exp();
        let mut expected = 0.0;
        let mut trace = Vec::new();
        for step in 0..10 {
            let t = step as f64;
            g.feed_input(t).unwrap();
            g.update().unwrap();

            let x = if t <= 5.0 { 10.0 * gain } else { 0.0 };
            expected = c * expected + (1.0 - c) * x;
            let y = g.module("L1").unwrap().output()[(1, 1)];
            assert!((y - expected).abs() < 1e-9, "step {}: {} vs {}", step, y, expected);
            trace.push(y);
        }
        // Rising through the pulse, decaying after it
        assert!(trace[..6].windows(2).all(|w| w[1] > w[0]));
        assert!(trace[6..].windows(2).all(|w| w[1] < w[0]));
        // Output port holds the filter value of the previous step
        assert!((g.output_value(0) - trace[9]).abs() < 1e-12);
    }
}
