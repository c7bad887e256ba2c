//! Verb dispatcher: turns token lines into graph and display mutations
//!
//! Parsing is fail-fast. The first malformed line sets the abort flag, is
//! reported as `Incorrect syntax in line <n>: <message>`, and nothing after
//! it is applied.

use std::fs;
use std::path::{Path, PathBuf};

use super::tokenizer::tokenize;
use super::ScriptError;
use crate::display::DisplaySettings;
use crate::error::{Result, RetinaError};
use crate::input::{
    FixationalGrating, FixationalParams, FrameSequence, Grating, GratingParams, Impulse,
    InputSource, StreamingInput, WhiteNoise,
};
use crate::module::{Module, ModuleKind, Parameter, Sign, SynapseKind};
use crate::multimeter::{MultimeterKind, MultimeterSpec, INPUT_SOURCE};
use crate::retina::RetinaGraph;

const GRATING_PARAMS: [&str; 20] = [
    "type",
    "step",
    "length1",
    "length2",
    "length3",
    "sizeX",
    "sizeY",
    "freq",
    "period",
    "Lum",
    "Contr",
    "phi_s",
    "phi_t",
    "orientation",
    "red_weight",
    "green_weight",
    "blue_weight",
    "red_phase",
    "green_phase",
    "blue_phase",
];

const FIXATIONAL_PARAMS: [&str; 15] = [
    "sizeX",
    "sizeY",
    "circle_radius",
    "jitter_period",
    "spatial_period",
    "step_size",
    "Lum",
    "Contr",
    "orientation",
    "red_weight",
    "green_weight",
    "blue_weight",
    "type1",
    "type2",
    "switch",
];

const WHITE_NOISE_PARAMS: [&str; 7] =
    ["mean", "contrast1", "contrast2", "period", "switch", "sizeX", "sizeY"];

const IMPULSE_PARAMS: [&str; 6] = ["start", "stop", "amplitude", "offset", "sizeX", "sizeY"];

/// Parameter names whose value is the next token itself
const NAME_VALUED: [&str; 2] = ["type", "spaceVariantSigma"];

type LineResult<T> = std::result::Result<T, String>;

/// Cursor over the tokens of one line
struct Tokens<'a> {
    items: &'a [String],
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(items: &'a [String]) -> Self {
        Self { items, pos: 0 }
    }

    fn peek(&self) -> Option<&'a str> {
        self.items.get(self.pos).map(String::as_str)
    }

    fn next(&mut self, what: &str) -> LineResult<&'a str> {
        let t = self
            .peek()
            .ok_or_else(|| format!("Expected {}", what))?;
        self.pos += 1;
        Ok(t)
    }

    fn expect(&mut self, literal: &str) -> LineResult<()> {
        match self.peek() {
            Some(t) if t == literal => {
                self.pos += 1;
                Ok(())
            }
            Some(t) => Err(format!("Expected '{}', found '{}'", literal, t)),
            None => Err(format!("Expected '{}'", literal)),
        }
    }

    fn number(&mut self, what: &str) -> LineResult<f64> {
        let t = self.next(what)?;
        parse_value(t).ok_or_else(|| format!("Expected {}, found '{}'", what, t))
    }

    fn flag(&mut self, what: &str) -> LineResult<bool> {
        match self.next(what)? {
            "True" => Ok(true),
            "False" => Ok(false),
            t => Err(format!("Expected 'True' or 'False' for {}, found '{}'", what, t)),
        }
    }

    /// `{ <v> }`
    fn braced_number(&mut self, what: &str) -> LineResult<f64> {
        self.expect("{")
            .map_err(|_| format!("Expected '{{' and '}}' around {}", what))?;
        let v = self.number(what)?;
        self.expect("}")
            .map_err(|_| format!("Expected '{{' and '}}' around {}", what))?;
        Ok(v)
    }

    /// Fixed-order `name value` list closed by `}`; the `{` is consumed by
    /// the caller
    fn named_list(&mut self, kind: &str, names: &[&str]) -> LineResult<Vec<f64>> {
        let usage = || {
            let list: Vec<String> = names.iter().map(|n| format!("'{}'", n)).collect();
            format!("Expected parameter list of {}: {}", kind, list.join(","))
        };
        let mut values = Vec::with_capacity(names.len());
        for name in names {
            if self.peek() != Some(*name) {
                return Err(usage());
            }
            self.pos += 1;
            values.push(self.number(name).map_err(|_| usage())?);
        }
        Ok(values)
    }

    /// Free `name value` block, `{` already consumed.
    ///
    /// `type` and `spaceVariantSigma` take their value token as the
    /// parameter name; `E { v1 v2 }` yields one entry per value.
    fn parameter_block(&mut self) -> LineResult<Vec<Parameter>> {
        let mut params = Vec::new();
        loop {
            let name = self.next("'}' closing the parameter list")?;
            if name == "}" {
                return Ok(params);
            }
            let value = self
                .next("a parameter value")
                .map_err(|_| "Incorrect parameter format".to_string())?;
            if NAME_VALUED.contains(&name) {
                params.push(Parameter::new(value, 0.0));
            } else if value == "{" {
                loop {
                    match self.next("'}' closing the value list")? {
                        "}" => break,
                        v => {
                            let v = parse_value(v)
                                .ok_or_else(|| format!("Expected a number for '{}', found '{}'", name, v))?;
                            params.push(Parameter::new(name, v));
                        }
                    }
                }
            } else {
                let v = parse_value(value)
                    .ok_or_else(|| format!("Expected a number for '{}', found '{}'", name, value))?;
                params.push(Parameter::new(name, v));
            }
        }
    }

    /// Optional parameter block
    fn optional_block(&mut self) -> LineResult<Vec<Parameter>> {
        if self.peek() == Some("{") {
            self.pos += 1;
            self.parameter_block()
        } else {
            Ok(Vec::new())
        }
    }
}

fn parse_value(token: &str) -> Option<f64> {
    match token {
        "True" => Some(1.0),
        "False" => Some(0.0),
        t => t.parse().ok(),
    }
}

fn positive(v: f64, what: &str) -> LineResult<f64> {
    if v > 0.0 {
        Ok(v)
    } else {
        Err(format!("Expected a positive {} (>0)", what))
    }
}

/// Script interpreter for one trial
#[derive(Debug)]
pub struct Interpreter {
    results: PathBuf,
    aborted: bool,
    lines: usize,
}

impl Interpreter {
    /// `results` is where output modules write their files
    pub fn new(results: impl Into<PathBuf>) -> Self {
        Self {
            results: results.into(),
            aborted: false,
            lines: 0,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Lines processed so far, including the one that aborted
    pub fn lines_processed(&self) -> usize {
        self.lines
    }

    /// Read and run a script file
    pub fn run_file(
        &mut self,
        path: &Path,
        graph: &mut RetinaGraph,
        display: &mut DisplaySettings,
    ) -> Result<()> {
        let text = fs::read_to_string(path).map_err(|e| {
            RetinaError::Input(format!("cannot read retina script {}: {}", path.display(), e))
        })?;
        self.run_str(&text, graph, display)
    }

    /// Run every line of `text`, stopping at the first error
    pub fn run_str(
        &mut self,
        text: &str,
        graph: &mut RetinaGraph,
        display: &mut DisplaySettings,
    ) -> Result<()> {
        for (i, line) in text.lines().enumerate() {
            if self.aborted {
                break;
            }
            let line_no = i + 1;
            self.lines = line_no;
            if let Err(message) = self.run_line(line, line_no, graph, display) {
                self.aborted = true;
                let err = ScriptError { line: line_no, message };
                log::error!("{}", err);
                log::error!("Aborting parsing of retina file.");
                return Err(err.into());
            }
        }
        Ok(())
    }

    fn run_line(
        &self,
        line: &str,
        line_no: usize,
        graph: &mut RetinaGraph,
        display: &mut DisplaySettings,
    ) -> LineResult<()> {
        let tokens = tokenize(line, line_no);
        let mut t = Tokens::new(&tokens);
        match t.peek() {
            None => return Ok(()),
            Some("retina") => t.pos += 1,
            Some(_) => return Err("neither 'retina' nor '#' token found at line beginning".into()),
        }

        match t.next("an action command")? {
            "Create" => self.create(&mut t, graph),
            "Connect" => self.connect(&mut t, graph),
            "TempStep" => {
                graph.settings_mut().step = positive(t.number("temporal step value")?, "value")?;
                Ok(())
            }
            "PixelsPerDegree" => {
                let v = t.braced_number("pixels per degree")?;
                graph.settings_mut().pixels_per_degree = positive(v, "parameter")?;
                Ok(())
            }
            "NRepetitions" => {
                let v = positive(t.number("number of repetitions")?, "number of repetitions")?;
                log::debug!("NRepetitions {} accepted, frames are shown once", v);
                Ok(())
            }
            "DisplayDelay" => {
                let v = t.number("display delay")?;
                if v < 0.0 {
                    return Err("Expected positive or zero value (>=0)".into());
                }
                display.delay = v;
                Ok(())
            }
            "DisplayWindows" => {
                display.windows_per_row = positive(t.number("number of windows")?, "value")? as usize;
                Ok(())
            }
            "Input" => self.input(&mut t, graph),
            "DensityScheme" | "SetDensity" => Ok(()),
            "Show" => self.show(&mut t, graph, display),
            "DisplayZoom" => {
                display.zoom = positive(t.braced_number("zoom")?, "value")?;
                Ok(())
            }
            "multimeter" => self.multimeter(&mut t, graph, display),
            "SimTime" => {
                graph.settings_mut().sim_time = positive(t.number("simulation time value")?, "time value")?;
                Ok(())
            }
            "NumTrials" => {
                graph.settings_mut().num_trials =
                    positive(t.number("number of trials value")?, "value")? as usize;
                Ok(())
            }
            "Output" => self.output(&mut t, graph),
            _ => Err("Unknown action command".into()),
        }
    }

    fn create(&self, t: &mut Tokens, graph: &mut RetinaGraph) -> LineResult<()> {
        let type_name = t.next("module type")?;
        let id = t.next("module ID")?;
        let kind = ModuleKind::from_type_name(type_name).ok_or("Unknown module type")?;
        match t.next("parameter start")? {
            "{" => {}
            _ => return Err("Incorrect parameter start format".into()),
        }
        let params = t.parameter_block()?;

        let mut module = Module::new(id, kind);
        module
            .set_parameters(&params)
            .map_err(|e| format!("Error setting specified parameters: {}", e))?;
        graph
            .add_module(module)
            .map_err(|e| e.to_string())
    }

    fn connect(&self, t: &mut Tokens, graph: &mut RetinaGraph) -> LineResult<()> {
        let mut sources = Vec::new();
        let mut signs = Vec::new();

        if t.peek() == Some("{") {
            t.pos += 1;
            sources.push(t.next("source module ID")?.to_string());
            loop {
                match t.next("'}' closing the source list")? {
                    "}" => break,
                    tok => {
                        let sign = Sign::from_token(tok).ok_or("Neither '+' or '-' token found")?;
                        signs.push(sign);
                        sources.push(t.next("source module ID")?.to_string());
                    }
                }
            }
        } else {
            sources.push(t.next("source module ID")?.to_string());
        }

        let target = t
            .next("target module ID")
            .map_err(|_| "Expected two module IDs and correct format".to_string())?;
        let synapse = t.next("synapse type")?;
        let synapse = SynapseKind::from_token(synapse)
            .ok_or_else(|| format!("Expected 'Current' or 'Conductance', found '{}'", synapse))?;

        graph
            .connect(sources, target, signs, synapse)
            .map_err(|e| format!("Error connecting specified modules: {}", e))
    }

    fn input(&self, t: &mut Tokens, graph: &mut RetinaGraph) -> LineResult<()> {
        let kind = t.next("input type")?;
        let source = match kind {
            "sequence" => {
                let dir = t.next("input directory")?;
                let params = t.optional_block()?;
                let mut seq = FrameSequence::open(Path::new(dir)).map_err(|e| e.to_string())?;
                seq.set_parameters(&params).map_err(|e| e.to_string())?;
                InputSource::Sequence(seq)
            }
            "streaming" => {
                let endpoint = t.next("stream endpoint")?;
                let params = t.optional_block()?;
                let (mut rows, mut cols) = (1, 1);
                for p in &params {
                    match p.name.as_str() {
                        "sizeX" => rows = p.value.max(1.0) as usize,
                        "sizeY" => cols = p.value.max(1.0) as usize,
                        _ => return Err(p.unknown("streaming").to_string()),
                    }
                }
                log::info!("streaming input '{}' ({}x{})", endpoint, rows, cols);
                InputSource::Streaming(StreamingInput::new(rows, cols))
            }
            "grating" | "fixationalMovGrating" | "whiteNoise" | "impulse" => {
                t.expect("{")
                    .map_err(|_| "Parameter start token ('{') not found".to_string())?;
                self.generator(kind, t, graph)?
            }
            _ => return Err("Unknown input type".into()),
        };
        graph.set_input(source);
        Ok(())
    }

    fn generator(&self, kind: &str, t: &mut Tokens, graph: &RetinaGraph) -> LineResult<InputSource> {
        let source = match kind {
            "grating" => {
                let v = t.named_list(kind, &GRATING_PARAMS)?;
                InputSource::Grating(Grating::new(GratingParams {
                    kind: v[0] as i32,
                    step: v[1],
                    length1: v[2],
                    length2: v[3],
                    length3: v[4],
                    rows: v[5] as usize,
                    cols: v[6] as usize,
                    freq: v[7],
                    period: v[8],
                    luminance: v[9],
                    contrast: v[10],
                    phi_s: v[11],
                    phi_t: v[12],
                    orientation: v[13],
                    weights: [v[14], v[15], v[16]],
                    phases: [v[17], v[18], v[19]],
                }))
            }
            "fixationalMovGrating" => {
                let v = t.named_list(kind, &FIXATIONAL_PARAMS)?;
                let seed = if t.peek() == Some("Seed") {
                    t.pos += 1;
                    Some(t.number("seed")? as u64)
                } else {
                    None
                };
                let p = FixationalParams {
                    rows: v[0] as usize,
                    cols: v[1] as usize,
                    circle_radius: v[2],
                    jitter_period: v[3],
                    spatial_period: v[4],
                    step_size: v[5],
                    luminance: v[6],
                    contrast: v[7],
                    orientation: v[8],
                    weights: [v[9], v[10], v[11]],
                    type1: v[12] as i32,
                    type2: v[13] as i32,
                    switch_time: v[14],
                };
                InputSource::Fixational(FixationalGrating::new(p, seed).map_err(|e| e.to_string())?)
            }
            "whiteNoise" => {
                let v = t.named_list(kind, &WHITE_NOISE_PARAMS)?;
                let seed = graph.settings().current_trial as u64;
                let noise = WhiteNoise::new(v[0], v[1], v[2], v[3], v[4], v[5] as usize, v[6] as usize, seed)
                    .map_err(|e| e.to_string())?;
                InputSource::WhiteNoise(noise)
            }
            _ => {
                let v = t.named_list(kind, &IMPULSE_PARAMS)?;
                InputSource::Impulse(Impulse::new(v[0], v[1], v[2], v[3], v[4] as usize, v[5] as usize))
            }
        };
        t.expect("}")?;
        Ok(source)
    }

    fn show(&self, t: &mut Tokens, graph: &RetinaGraph, display: &mut DisplaySettings) -> LineResult<()> {
        let id = t.next("module ID")?;
        if id != INPUT_SOURCE && !graph.has_module(id) {
            return Err("Specified module ID not found".into());
        }
        let shown = t.flag("the module ID")?;
        t.expect("margin")?;
        let margin = t.number("margin value")?;
        display.show(id, shown, margin);
        Ok(())
    }

    fn multimeter(
        &self,
        t: &mut Tokens,
        graph: &RetinaGraph,
        display: &mut DisplaySettings,
    ) -> LineResult<()> {
        let kind = t.next("multimeter type")?;
        if !matches!(kind, "spatial" | "temporal" | "Linear-Nonlinear") {
            return Err(
                "Expected any of the parameters for multimeter: 'spatial','temporal','Linear-Nonlinear'".into(),
            );
        }
        let title = t.next("multimeter title")?.to_string();
        let source = t.next("module ID")?.to_string();
        t.expect("{")
            .map_err(|_| "Expected parameter list start token ('{')".to_string())?;
        if source != INPUT_SOURCE && !graph.has_module(&source) {
            return Err("Parameter syntax error or specified module ID not found".into());
        }

        let kind = match kind {
            "spatial" => {
                let usage = "Expected spatial multimeter parameter list: 'timeStep','rowcol','value','Show'";
                t.expect("timeStep").map_err(|_| usage.to_string())?;
                let time_step = t.number("timeStep")?;
                t.expect("rowcol").map_err(|_| usage.to_string())?;
                let row = t.flag("rowcol")?;
                t.expect("value").map_err(|_| usage.to_string())?;
                let index = t.number("value")?.max(0.0) as usize;
                MultimeterKind::Spatial { time_step, row, index }
            }
            "temporal" => {
                let v = t
                    .named_list("temporal multimeter", &["x", "y"])
                    .map_err(|_| "Expected temporal multimeter parameter list: 'x','y','Show'".to_string())?;
                MultimeterKind::Temporal {
                    x: v[0].max(0.0) as usize,
                    y: v[1].max(0.0) as usize,
                }
            }
            _ => {
                let v = t
                    .named_list("Linear-Nonlinear multimeter", &["x", "y", "segment", "interval", "start", "stop"])
                    .map_err(|_| {
                        "Expected Linear-Nonlinear multimeter parameter list: 'x','y','segment','interval','start','stop','Show'"
                            .to_string()
                    })?;
                MultimeterKind::LinearNonlinear {
                    x: v[0].max(0.0) as usize,
                    y: v[1].max(0.0) as usize,
                    segment: v[2],
                    interval: v[3],
                    start: v[4],
                    stop: v[5],
                }
            }
        };
        t.expect("}")?;
        t.expect("Show")?;
        let show = t.flag("Show")?;
        let start_time = if t.peek() == Some("startTime") {
            t.pos += 1;
            t.number("startTime value")?
        } else {
            0.0
        };

        display.add_multimeter(MultimeterSpec {
            title,
            source,
            kind,
            show,
            start_time,
        });
        Ok(())
    }

    fn output(&self, t: &mut Tokens, graph: &mut RetinaGraph) -> LineResult<()> {
        let kind = t.next("output type")?;
        let id = t.next("output module ID")?;
        if !id.starts_with("Output") {
            return Err(format!("Output module ID must start with 'Output', found '{}'", id));
        }
        let file = match t.peek() {
            Some("{") | None => match kind {
                "sequence" => "sequence.inr",
                _ => "spikes.spk",
            },
            Some(_) => t.next("output file")?,
        };
        let params = t.optional_block()?;

        let stage = ModuleKind::output(kind, self.results.join(file))
            .ok_or_else(|| format!("Unknown output type '{}'", kind))?;
        let mut module = Module::new(id, stage);
        module
            .set_parameters(&params)
            .map_err(|e| format!("Error setting specified parameters: {}", e))?;
        graph.add_output(module);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Stage;
    use crate::multimeter::MultimeterKind;

    fn run(text: &str) -> (Interpreter, RetinaGraph, DisplaySettings, Result<()>) {
        let mut interp = Interpreter::new("results");
        let mut graph = RetinaGraph::new();
        let mut display = DisplaySettings::default();
        let res = interp.run_str(text, &mut graph, &mut display);
        (interp, graph, display, res)
    }

    const MODEL: &str = "\
# Simulation parameters
retina.TempStep('1') # ms
retina.SimTime('10')
retina.NumTrials('2')
retina.PixelsPerDegree({'5'})
retina.DisplayZoom({'10.0'})
retina.Input('impulse',{'start','0.0','stop','5.0','amplitude','10.0','offset','0.0','sizeX','2','sizeY','2'})

retina.Create('LinearFilter','tmp_photo',{'type','Gamma','tau','30.0','n','1.0'})
retina.Create('LinearFilter','L1',{'tau','2','Exp','0'})
retina.Create('GaussFilter','gauss',{'sigma','0.3','spaceVariantSigma','False'})
retina.Create('SingleCompartment','bip',{'number_current_ports','1.0','number_conductance_ports','1.0','Rm','0.0','Cm','100.0','E',{'0.0','-10.0'}})
retina.Create('StaticNonLinearity','snl',{'slope','-0.1','offset','0.0','exponent','1.0'})

retina.Connect('L_cones','tmp_photo','Current')
retina.Connect('L_cones','L1','Current')
retina.Connect({'tmp_photo',-,'L1'},'gauss','Current')
retina.Connect('gauss','bip','Current')
retina.Connect('snl','bip','Conductance')
retina.Connect('bip','Output','Current')

retina.Show('Input','True','margin','0')
retina.Show('bip','True','margin','2')
retina.multimeter('temporal','bip trace','bip',{'x','1','y','0'},'Show','True','startTime','3')
retina.multimeter('spatial','gauss row','gauss',{'timeStep','4','rowcol','True','value','1'},'Show','False')
";

    #[test]
    fn test_full_model() {
        let (interp, graph, display, res) = run(MODEL);
        res.unwrap();
        assert!(!interp.is_aborted());

        let s = graph.settings();
        assert_eq!((s.step, s.sim_time, s.num_trials), (1.0, 10.0, 2));
        assert_eq!(s.pixels_per_degree, 5.0);
        assert_eq!((s.rows, s.cols), (2, 2));
        assert_eq!(display.zoom, 10.0);

        assert_eq!(graph.module_count(), 6);
        let gauss = graph.module("gauss").unwrap();
        assert_eq!(gauss.ports()[0].sources(), &["tmp_photo", "L1"]);
        assert_eq!(gauss.ports()[0].signs(), &[Sign::Subtract]);
        assert_eq!(graph.module("bip").unwrap().ports().len(), 2);
        assert_eq!(graph.output_module().ports().len(), 1);

        match graph.module("bip").unwrap().kind() {
            ModuleKind::SingleCompartment(sc) => {
                assert_eq!(sc.reversal_potentials(), &[0.0]);
                assert_eq!(sc.leak_reversal(), -10.0);
            }
            other => panic!("unexpected {:?}", other),
        }
        match graph.module("tmp_photo").unwrap().kind() {
            ModuleKind::LinearFilter(f) => {
                assert!(matches!(f.kernel(), crate::module::TemporalKernel::Gamma { order: 1, .. }))
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(display.is_shown("Input") && display.is_shown("bip"));
        assert_eq!(display.multimeters.len(), 2);
        assert_eq!(display.multimeters[0].title, "bip trace");
        assert_eq!(display.multimeters[0].start_time, 3.0);
        assert_eq!(display.multimeters[0].kind, MultimeterKind::Temporal { x: 1, y: 0 });
        assert_eq!(
            display.multimeters[1].kind,
            MultimeterKind::Spatial { time_step: 4.0, row: true, index: 1 }
        );
    }

    #[test]
    fn test_plain_form_matches_call_form() {
        let plain = "\
retina TempStep 0.5
retina Input impulse { start 0 stop 5 amplitude 10 offset 0 sizeX 3 sizeY 4 }
retina Create LinearFilter L1 { tau 2 Exp 0 }
retina Connect L_cones L1 Current
";
        let call = "\
retina.TempStep('0.5')
retina.Input('impulse',{'start','0','stop','5','amplitude','10','offset','0','sizeX','3','sizeY','4'})
retina.Create('LinearFilter','L1',{'tau','2','Exp','0'})
retina.Connect('L_cones','L1','Current')
";
        let (_, a, _, ra) = run(plain);
        let (_, b, _, rb) = run(call);
        ra.unwrap();
        rb.unwrap();
        assert_eq!(a.settings(), b.settings());
        assert_eq!(a.module_count(), b.module_count());
        assert_eq!(
            a.module("L1").unwrap().ports(),
            b.module("L1").unwrap().ports()
        );
    }

    #[test]
    fn test_abort_stops_at_bad_line() {
        let text = "\
retina TempStep 2
retina Input impulse { start 0 stop 5 amplitude 10 offset 0 sizeX 1 sizeY 1 }
retina Create LinearFilter A { tau 2 }
retina Frobnicate now
retina Create LinearFilter B { tau 2 }
retina SimTime 99
";
        let (interp, graph, _, res) = run(text);
        let err = res.unwrap_err();
        assert!(err.is_script());
        assert_eq!(err.to_string(), "Incorrect syntax in line 4: Unknown action command");
        assert!(interp.is_aborted());
        assert_eq!(interp.lines_processed(), 4);
        assert!(graph.module("A").is_some());
        assert!(graph.module("B").is_none());
        assert_eq!(graph.settings().sim_time, 0.0);
        assert_eq!(graph.settings().step, 2.0);
    }

    #[test]
    fn test_grammar_violations() {
        let cases = [
            ("hello", "neither 'retina' nor '#' token found at line beginning"),
            ("retina Create Retina R { }", "Unknown module type"),
            ("retina Create LinearFilter R tau 2", "Incorrect parameter start format"),
            ("retina Create LinearFilter R { tau -1 }", "Error setting specified parameters"),
            ("retina TempStep 0", "Expected a positive value (>0)"),
            ("retina Connect { L_cones * rods } x Current", "Neither '+' or '-' token found"),
            ("retina Connect L_cones ghost Current", "Error connecting specified modules"),
            ("retina Input impulse { start 0 stop 5 }", "Expected parameter list of impulse"),
            ("retina Input movie { }", "Unknown input type"),
            ("retina Show ghost True margin 0", "Specified module ID not found"),
            ("retina PixelsPerDegree 5", "Expected '{' and '}' around pixels per degree"),
            ("retina Output spikes Spikes { }", "must start with 'Output'"),
            ("retina multimeter voltage m Input { x 0 y 0 } Show True", "Expected any of the parameters"),
        ];
        for (line, message) in cases {
            let (_, _, _, res) = run(line);
            let err = res.unwrap_err().to_string();
            assert!(err.starts_with("Incorrect syntax in line 1: "), "{}", err);
            assert!(err.contains(message), "'{}' gave '{}'", line, err);
        }
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let (interp, _, _, res) = run("\n# retina Frobnicate\n   \n### header ###\nretina SimTime 5 # trailing\n");
        res.unwrap();
        assert_eq!(interp.lines_processed(), 5);
    }

    #[test]
    fn test_reserved_verbs_are_no_ops() {
        let (_, graph, _, res) = run("retina NRepetitions 3\nretina DensityScheme anything\nretina SetDensity x y");
        res.unwrap();
        assert_eq!(graph.settings().repetitions, 1);
    }

    #[test]
    fn test_output_declaration() {
        let text = "\
retina Input impulse { start 0 stop 5 amplitude 10 offset 0 sizeX 2 sizeY 2 }
retina Create LinearFilter L1 { tau 2 }
retina Connect L_cones L1 Current
retina Connect L1 Output Current
retina.Output('spikes','Output',{'Input_threshold','0.5','Freq_per_inp','20','Seed','3'})
retina.Output('stochasticSpikes','Output2','other.spk',{'Gamma_shape','2'})
";
        let (interp, graph, _, res) = run(text);
        res.unwrap();
        assert!(!interp.is_aborted());
        let out = graph.output_module();
        assert_eq!(out.type_name(), "spikes");
        assert_eq!(out.ports().len(), 1);
        match out.kind() {
            ModuleKind::Spiking(s) => {
                assert_eq!(s.path(), Path::new("results/spikes.spk"));
                assert_eq!(s.rate_code().threshold, 0.5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_output_parameter_error_aborts() {
        let (_, graph, _, res) = run("retina Output sequence Output out.inr { InFramesPerOut 0 }");
        assert!(res.is_err());
        assert!(graph.output_module().kind().is_placeholder());
    }

    #[test]
    fn test_white_noise_seeded_by_trial() {
        let text = "retina Input whiteNoise { mean 0.5 contrast1 0.5 contrast2 0.1 period 1 switch 100 sizeX 1 sizeY 1 }";
        let mut graph = RetinaGraph::new();
        graph.settings_mut().current_trial = 3;
        let mut display = DisplaySettings::default();
        Interpreter::new("results").run_str(text, &mut graph, &mut display).unwrap();
        assert_eq!(graph.input().unwrap().kind_name(), "whiteNoise");
        assert_eq!((graph.settings().rows, graph.settings().cols), (1, 1));
    }

    #[test]
    fn test_sequence_and_streaming_inputs() {
        let dir = tempfile::tempdir().unwrap();
        image::GrayImage::from_pixel(4, 3, image::Luma([9]))
            .save(dir.path().join("f0.png"))
            .unwrap();
        let line = format!(
            "retina.Input('sequence','{}',{{'InputFramePeriod','100'}})",
            dir.path().display()
        );
        let (_, graph, _, res) = run(&line);
        res.unwrap();
        assert_eq!((graph.settings().rows, graph.settings().cols), (3, 4));

        let (_, graph, _, res) = run("retina Input sequence '/no/such/dir' { }");
        assert!(res.is_err());
        assert!(graph.input().is_none());

        let (_, graph, _, res) = run("retina Input streaming 'tcp://localhost:5555' { sizeX 5 sizeY 6 }");
        res.unwrap();
        assert_eq!(graph.input().unwrap().kind_name(), "streaming");
        assert_eq!((graph.settings().rows, graph.settings().cols), (5, 6));
    }

    #[test]
    fn test_type_token_becomes_parameter_name() {
        let (_, graph, _, res) = run(
            "retina Create GaussFilter g { sigma 0.5 spaceVariantSigma True K 0.2 R0 1 }",
        );
        res.unwrap();
        match graph.module("g").unwrap().kind() {
            ModuleKind::GaussFilter(g) => {
                assert!(g.is_space_variant());
                assert_eq!(g.stage_name(), "GaussFilter");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
