//! Multimeters - recordings of one module (or the input) over a run
//!
//! | Kind | Records |
//! |------|---------|
//! | temporal | value at `(x = column, y = row)` every step from `start_time` |
//! | spatial | one row or column at `time_step` |
//! | Linear-Nonlinear | declaration only |
//!
//! Recordings are written at the end of a trial as two-column text files.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grid::Grid;

/// Source name that refers to the raw input luminance
pub const INPUT_SOURCE: &str = "Input";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MultimeterKind {
    Temporal {
        x: usize,
        y: usize,
    },
    Spatial {
        /// Snapshot time (ms)
        time_step: f64,
        /// true: record a row, false: record a column
        row: bool,
        /// Row or column index
        index: usize,
    },
    LinearNonlinear {
        x: usize,
        y: usize,
        segment: f64,
        interval: f64,
        start: f64,
        stop: f64,
    },
}

/// A multimeter declaration from the script
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultimeterSpec {
    pub title: String,
    /// Module ID or [`INPUT_SOURCE`]
    pub source: String,
    pub kind: MultimeterKind,
    pub show: bool,
    /// Temporal recordings start here (ms)
    pub start_time: f64,
}

impl MultimeterSpec {
    pub fn records_input(&self) -> bool {
        self.source == INPUT_SOURCE
    }
}

/// Live recording for one declaration
#[derive(Clone, Debug)]
pub struct Multimeter {
    spec: MultimeterSpec,
    samples: Vec<(f64, f64)>,
    taken: bool,
}

impl Multimeter {
    pub fn new(spec: MultimeterSpec) -> Self {
        Self {
            spec,
            samples: Vec::new(),
            taken: false,
        }
    }

    pub fn spec(&self) -> &MultimeterSpec {
        &self.spec
    }

    /// Recorded `(abscissa, value)` pairs: time for temporal recordings,
    /// position for spatial ones
    pub fn samples(&self) -> &[(f64, f64)] {
        &self.samples
    }

    /// Sample `grid` at simulation time `t`
    pub fn record(&mut self, t: f64, step: f64, grid: &Grid) {
        match self.spec.kind {
            MultimeterKind::Temporal { x, y } => {
                if t >= self.spec.start_time {
                    if let Some(v) = grid.get(y, x) {
                        self.samples.push((t, v));
                    }
                }
            }
            MultimeterKind::Spatial { time_step, row, index } => {
                if self.taken || (t - time_step).abs() >= step / 2.0 {
                    return;
                }
                self.taken = true;
                if row {
                    if index < grid.rows() {
                        let values = grid.row(index);
                        self.samples
                            .extend(values.iter().enumerate().map(|(c, &v)| (c as f64, v)));
                    }
                } else if index < grid.cols() {
                    let values = grid.column(index);
                    self.samples
                        .extend(values.into_iter().enumerate().map(|(r, v)| (r as f64, v)));
                }
            }
            MultimeterKind::LinearNonlinear { .. } => {}
        }
    }

    /// Drop what was recorded in the previous trial
    pub fn reset(&mut self) {
        self.samples.clear();
        self.taken = false;
    }

    /// Write `<dir>/<title>.txt`; returns the path, or `None` when there is
    /// nothing to write
    pub fn save(&self, dir: &Path) -> Result<Option<PathBuf>> {
        if matches!(self.spec.kind, MultimeterKind::LinearNonlinear { .. }) {
            log::debug!("Linear-Nonlinear multimeter '{}' is not recorded", self.spec.title);
            return Ok(None);
        }
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.txt", self.spec.title));
        let mut out = BufWriter::new(File::create(&path)?);
        for (a, v) in &self.samples {
            writeln!(out, "{} {}", a, v)?;
        }
        out.flush()?;
        log::info!(
            "multimeter '{}': {} samples written to {}",
            self.spec.title,
            self.samples.len(),
            path.display()
        );
        Ok(Some(path))
    }
}
