//! retina-sim - run a retina script
//!
//! # Usage
//!
//! ```bash
//! # Run a model, results go to ./results
//! retina-sim Retina_scripts/example_1.py
//!
//! # Debug logging and a custom results directory
//! retina-sim -v --results out/run1 Retina_scripts/example_1.py
//! ```
//!
//! # Exit Codes
//!
//! - 0: every trial ran to completion
//! - 1: the script aborted or a trial failed
//! - 2: invalid arguments

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use retina_sim::{
    DisplaySettings, InputStatus, Interpreter, Multimeter, RetinaGraph, RunOptions,
};

/// Attempts per step before a stalled input is given up on
const MAX_STALLS: usize = 500;
const STALL_WAIT: Duration = Duration::from_millis(10);

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let mut verbose = false;
    let mut results = None;
    let mut script = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => verbose = true,
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--results" => match iter.next() {
                Some(dir) => results = Some(PathBuf::from(dir)),
                None => {
                    eprintln!("Error: --results needs a directory\n");
                    print_help();
                    return ExitCode::from(2);
                }
            },
            _ if arg.starts_with('-') => {
                eprintln!("Unknown option: {}\n", arg);
                print_help();
                return ExitCode::from(2);
            }
            _ => script = Some(arg.clone()),
        }
    }

    let Some(script) = script else {
        eprintln!("Error: No retina script specified\n");
        print_help();
        return ExitCode::from(2);
    };

    let mut opts = RunOptions::new(script);
    opts.verbose = verbose;
    if let Some(dir) = results {
        opts.results = dir;
    }

    let level = if opts.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(opts: &RunOptions) -> anyhow::Result<()> {
    let mut trial = 0;
    let mut trials = 1;

    while trial < trials {
        let mut graph = RetinaGraph::new();
        graph.settings_mut().current_trial = trial;
        let mut display = DisplaySettings::default();

        Interpreter::new(&opts.results)
            .run_file(&opts.script, &mut graph, &mut display)
            .with_context(|| format!("parsing {}", opts.script.display()))?;

        trials = graph.settings().num_trials;
        log::info!("trial {}/{}", trial + 1, trials);
        run_trial(&mut graph, &display, opts, MAX_STALLS)
            .with_context(|| format!("trial {}", trial + 1))?;
        trial += 1;
    }
    Ok(())
}

fn run_trial(
    graph: &mut RetinaGraph,
    display: &DisplaySettings,
    opts: &RunOptions,
    max_stalls: usize,
) -> anyhow::Result<()> {
    graph.allocate()?;

    let mut meters: Vec<Multimeter> = display
        .multimeters
        .iter()
        .cloned()
        .map(Multimeter::new)
        .collect();

    // Outputs are flushed whether or not the step loop completed
    let stepped = simulate(graph, &mut meters, max_stalls);
    let flushed = flush(graph, &meters, &opts.results);
    let steps = stepped?;
    flushed?;
    log::info!("{} steps simulated", steps);
    Ok(())
}

/// Run the step loop, returning the number of completed steps
fn simulate(graph: &mut RetinaGraph, meters: &mut [Multimeter], max_stalls: usize) -> anyhow::Result<usize> {
    let records_input = meters.iter().any(|m| m.spec().records_input());
    let step = graph.settings().step;
    let times: Vec<f64> = graph.settings().step_times().collect();
    let mut steps = 0usize;

    'steps: for t in times {
        let mut stalls = 0;
        loop {
            match graph.feed_input(t)? {
                InputStatus::Ready => break,
                InputStatus::End => {
                    log::info!("input exhausted at {} ms", t);
                    break 'steps;
                }
                InputStatus::Stall => {
                    stalls += 1;
                    if stalls > max_stalls {
                        bail!("no input frame for {} ms after {} attempts", t, max_stalls);
                    }
                    thread::sleep(STALL_WAIT);
                }
            }
        }
        graph.update()?;
        steps += 1;

        let luminance = records_input.then(|| graph.frame().luminance());
        for meter in meters.iter_mut() {
            if meter.spec().records_input() {
                if let Some(lum) = &luminance {
                    meter.record(t, step, lum);
                }
            } else if let Some(grid) = graph.grid_of(&meter.spec().source) {
                meter.record(t, step, grid);
            }
        }
    }
    Ok(steps)
}

/// Flush every module and save every multimeter, reporting the first failure
fn flush(graph: &mut RetinaGraph, meters: &[Multimeter], results: &Path) -> anyhow::Result<()> {
    let mut outcome = graph.finish().context("flushing outputs");
    for meter in meters {
        if let Err(e) = meter.save(results) {
            log::warn!("multimeter '{}' not saved: {}", meter.spec().title, e);
            if outcome.is_ok() {
                outcome = Err(e).with_context(|| format!("writing multimeter '{}'", meter.spec().title));
            }
        }
    }
    outcome
}

fn print_help() {
    eprintln!(
        r#"retina-sim - discrete-time retina model simulator

USAGE:
    retina-sim [OPTIONS] <script>

OPTIONS:
    -v, --verbose        Debug logging
    --results <dir>      Output directory (default: results)
    -h, --help           Show this help

The script describes the model line by line, for example:
    retina.TempStep('1')
    retina.SimTime('1200')
    retina.Input('impulse',{{'start','0','stop','5','amplitude','10','offset','0','sizeX','2','sizeY','2'}})
    retina.Create('LinearFilter','L1',{{'tau','2','Exp','0'}})
    retina.Connect('L_cones','L1','Current')
    retina.Connect('L1','Output','Current')"#
    );
}
