//! GaussFilter - recursive (Young–van Vliet) spatial Gaussian smoothing
//!
//! Each axis is filtered with a third-order causal pass followed by an
//! anticausal pass. The anticausal pass starts from the Triggs–Sdika
//! boundary state so that a constant line stays constant.
//!
//! ## Space-variant mode
//!
//! With `spaceVariantSigma True` every pixel gets its own sigma
//! `σ / density(r)`, where `r` is the distance (degrees) from the grid centre:
//!
//! ```text
//! density(r) = 1                    if r <= R0
//!            = 1 / (1 + K (r - R0))  otherwise
//! ```
//!
//! Both passes read the coefficients of the pixel being written, and the
//! boundary matrix of the pixel that closes the line.

use rayon::prelude::*;

use super::traits::{Parameter, Stage, SynapseKind};
use crate::error::Result;
use crate::grid::{Geometry, Grid};

/// Coefficients of one recursive Gaussian (normalised so `B + b1 + b2 + b3 = 1`)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecursiveCoefficients {
    pub gain: f64,
    pub b1: f64,
    pub b2: f64,
    pub b3: f64,
    /// Boundary-correction matrix for the anticausal pass
    pub m: [[f64; 3]; 3],
}

impl RecursiveCoefficients {
    /// Derive the coefficients for `sigma` expressed in pixels
    pub fn from_sigma(sigma: f64) -> Self {
        let q = if sigma < 2.5 {
            3.97156 - 4.14554 * (1.0 - 0.26891 * sigma).sqrt()
        } else {
            0.98711 * sigma - 0.96330
        };
        let q2 = q * q;
        let q3 = q2 * q;

        let b0 = 1.57825 + 2.44413 * q + 1.4281 * q2 + 0.422205 * q3;
        let b1 = (2.44413 * q + 2.85619 * q2 + 1.26661 * q3) / b0;
        let b2 = (-1.4281 * q2 - 1.26661 * q3) / b0;
        let b3 = (0.422205 * q3) / b0;
        let gain = 1.0 - (b1 + b2 + b3);

        Self {
            gain,
            b1,
            b2,
            b3,
            m: boundary_matrix(b1, b2, b3),
        }
    }
}

/// Triggs & Sdika, "Boundary Conditions for Young–van Vliet Recursive Filtering"
fn boundary_matrix(b1: f64, b2: f64, b3: f64) -> [[f64; 3]; 3] {
    let mut m = [
        [
            -b3 * b1 + 1.0 - b3 * b3 - b2,
            (b3 + b1) * (b2 + b3 * b1),
            b3 * (b1 + b3 * b2),
        ],
        [
            b1 + b3 * b2,
            -(b2 - 1.0) * (b2 + b3 * b1),
            -(b3 * b1 + b3 * b3 + b2 - 1.0) * b3,
        ],
        [
            b3 * b1 + b2 + b1 * b1 - b2 * b2,
            b1 * b2 + b3 * b2 * b2 - b1 * b3 * b3 - b3 * b3 * b3 - b3 * b2 + b3,
            b3 * (b1 + b3 * b2),
        ],
    ];
    let norm = (1.0 + b1 - b2 + b3) * (1.0 + b2 + (b1 - b3) * b3);
    for row in m.iter_mut() {
        for v in row.iter_mut() {
            *v /= norm;
        }
    }
    m
}

/// Coefficients seen by one line of samples
#[derive(Clone, Copy, Debug)]
enum LineCoefficients<'a> {
    Uniform(&'a RecursiveCoefficients),
    PerSample(&'a [RecursiveCoefficients]),
}

impl<'a> LineCoefficients<'a> {
    #[inline]
    fn at(&self, i: usize) -> &'a RecursiveCoefficients {
        match *self {
            Self::Uniform(c) => c,
            Self::PerSample(cs) => &cs[i],
        }
    }
}

/// Filter one line in place (causal then anticausal pass)
fn filter_line(line: &mut [f64], scratch: &mut Vec<f64>, coeffs: LineCoefficients<'_>) {
    let n = line.len();
    if n == 0 {
        return;
    }
    if n < 3 {
        // Pad with the last sample so the boundary state is defined
        let last = line[n - 1];
        let mut padded = [line[0], line.get(1).copied().unwrap_or(last), last];
        let pad_coeffs = match coeffs {
            LineCoefficients::Uniform(c) => LineCoefficients::Uniform(c),
            LineCoefficients::PerSample(cs) => LineCoefficients::Uniform(&cs[n - 1]),
        };
        filter_line(&mut padded, scratch, pad_coeffs);
        line.copy_from_slice(&padded[..n]);
        return;
    }

    scratch.clear();
    scratch.resize(n, 0.0);
    let t = scratch;
    let s0 = line[0];

    // Causal pass, the signal is assumed constant before the first sample
    let c = coeffs.at(0);
    t[0] = (c.gain + c.b1 + c.b2 + c.b3) * s0;
    let c = coeffs.at(1);
    t[1] = c.gain * line[1] + c.b1 * t[0] + (c.b2 + c.b3) * s0;
    let c = coeffs.at(2);
    t[2] = c.gain * line[2] + c.b1 * t[1] + c.b2 * t[0] + c.b3 * s0;
    for j in 3..n {
        let c = coeffs.at(j);
        t[j] = c.gain * line[j] + c.b1 * t[j - 1] + c.b2 * t[j - 2] + c.b3 * t[j - 3];
    }

    // Anticausal pass started from the boundary state
    let u = line[n - 1];
    let m = &coeffs.at(n - 1).m;
    let d = [t[n - 1] - u, t[n - 2] - u, t[n - 3] - u];
    let w_m1 = u + m[0][0] * d[0] + m[0][1] * d[1] + m[0][2] * d[2];
    let w = u + m[1][0] * d[0] + m[1][1] * d[1] + m[1][2] * d[2];
    let w_p1 = u + m[2][0] * d[0] + m[2][1] * d[1] + m[2][2] * d[2];

    t[n - 1] = w_m1;
    let c = coeffs.at(n - 2);
    t[n - 2] = c.gain * t[n - 2] + c.b1 * t[n - 1] + c.b2 * w + c.b3 * w_p1;
    let c = coeffs.at(n - 3);
    t[n - 3] = c.gain * t[n - 3] + c.b1 * t[n - 2] + c.b2 * t[n - 1] + c.b3 * w;
    for j in (0..n.saturating_sub(3)).rev() {
        let c = coeffs.at(j);
        t[j] = c.gain * t[j] + c.b1 * t[j + 1] + c.b2 * t[j + 2] + c.b3 * t[j + 3];
    }

    line.copy_from_slice(t);
}

#[derive(Clone, Debug, Default)]
enum CoefficientTable {
    #[default]
    Unallocated,
    Uniform(RecursiveCoefficients),
    /// Row-major table plus its transpose for the column pass
    SpaceVariant {
        by_row: Vec<RecursiveCoefficients>,
        by_col: Vec<RecursiveCoefficients>,
    },
}

/// Separable recursive Gaussian blur
#[derive(Clone, Debug)]
pub struct GaussFilter {
    /// Standard deviation in degrees
    sigma: f64,
    space_variant: bool,
    k: f64,
    r0: f64,
    table: CoefficientTable,
    columns: Vec<f64>,
    output: Grid,
}

impl Default for GaussFilter {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            space_variant: false,
            k: 0.0,
            r0: 0.0,
            table: CoefficientTable::Unallocated,
            columns: Vec::new(),
            output: Grid::default(),
        }
    }
}

impl GaussFilter {
    pub fn new(sigma: f64) -> Self {
        Self { sigma, ..Self::default() }
    }

    /// Enable the eccentricity-dependent sigma
    pub fn space_variant(mut self, k: f64, r0: f64) -> Self {
        self.space_variant = true;
        self.k = k;
        self.r0 = r0;
        self
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn is_space_variant(&self) -> bool {
        self.space_variant
    }

    /// Relative cell density at `r` degrees from the centre
    pub fn density(&self, r: f64) -> f64 {
        if r > self.r0 {
            1.0 / (1.0 + self.k * (r - self.r0))
        } else {
            1.0
        }
    }

    /// Coefficients used at `(row, col)` (valid after `allocate`)
    pub fn coefficients_at(&self, row: usize, col: usize) -> Option<RecursiveCoefficients> {
        match &self.table {
            CoefficientTable::Unallocated => None,
            CoefficientTable::Uniform(c) => Some(*c),
            CoefficientTable::SpaceVariant { by_row, .. } => {
                by_row.get(row * self.output.cols() + col).copied()
            }
        }
    }

    /// Column pass followed by row pass, in place
    fn filter(&mut self, grid: &mut Grid) {
        let rows = grid.rows();
        let cols = grid.cols();
        if rows == 0 || cols == 0 {
            return;
        }

        // Vertical pass on a column-major copy
        self.columns.clear();
        self.columns.reserve(rows * cols);
        for c in 0..cols {
            self.columns.extend((0..rows).map(|r| grid[(r, c)]));
        }
        match &self.table {
            CoefficientTable::Unallocated => return,
            CoefficientTable::Uniform(coeffs) => {
                self.columns.par_chunks_mut(rows).for_each_init(Vec::new, |scratch, line| {
                    filter_line(line, scratch, LineCoefficients::Uniform(coeffs))
                });
            }
            CoefficientTable::SpaceVariant { by_col, .. } => {
                self.columns
                    .par_chunks_mut(rows)
                    .zip(by_col.par_chunks(rows))
                    .for_each_init(Vec::new, |scratch, (line, cs)| {
                        filter_line(line, scratch, LineCoefficients::PerSample(cs))
                    });
            }
        }
        for c in 0..cols {
            for r in 0..rows {
                grid[(r, c)] = self.columns[c * rows + r];
            }
        }

        // Horizontal pass directly on the rows
        let data = grid.as_mut_slice();
        match &self.table {
            CoefficientTable::Unallocated => {}
            CoefficientTable::Uniform(coeffs) => {
                data.par_chunks_mut(cols).for_each_init(Vec::new, |scratch, line| {
                    filter_line(line, scratch, LineCoefficients::Uniform(coeffs))
                });
            }
            CoefficientTable::SpaceVariant { by_row, .. } => {
                data.par_chunks_mut(cols)
                    .zip(by_row.par_chunks(cols))
                    .for_each_init(Vec::new, |scratch, (line, cs)| {
                        filter_line(line, scratch, LineCoefficients::PerSample(cs))
                    });
            }
        }
    }
}

impl Stage for GaussFilter {
    fn set_parameters(&mut self, params: &[Parameter]) -> Result<()> {
        for p in params {
            match p.name.as_str() {
                "sigma" => {
                    if p.value < 0.0 {
                        return Err(p.invalid(">= 0"));
                    }
                    self.sigma = p.value;
                }
                "True" => self.space_variant = true,
                "False" => self.space_variant = false,
                "K" => self.k = p.value,
                "R0" => self.r0 = p.value,
                _ => return Err(p.unknown(self.stage_name())),
            }
        }
        Ok(())
    }

    fn allocate(&mut self, geometry: &Geometry) -> Result<()> {
        let ppd = geometry.pixels_per_degree;
        let sigma_px = self.sigma * ppd;
        let (rows, cols) = (geometry.rows, geometry.cols);
        self.output = geometry.zeros();

        self.table = if !self.space_variant {
            CoefficientTable::Uniform(RecursiveCoefficients::from_sigma(sigma_px))
        } else {
            let centre_r = (rows / 2) as f64;
            let centre_c = (cols / 2) as f64;
            let mut by_row = Vec::with_capacity(rows * cols);
            for r in 0..rows {
                for c in 0..cols {
                    let dr = r as f64 - centre_r;
                    let dc = c as f64 - centre_c;
                    let eccentricity = (dr * dr + dc * dc).sqrt() / ppd;
                    let local = sigma_px / self.density(eccentricity);
                    by_row.push(RecursiveCoefficients::from_sigma(local));
                }
            }
            let mut by_col = Vec::with_capacity(rows * cols);
            for c in 0..cols {
                for r in 0..rows {
                    by_col.push(by_row[r * cols + c]);
                }
            }
            CoefficientTable::SpaceVariant { by_row, by_col }
        };
        log::debug!(
            "GaussFilter sigma {} deg ({} px), space variant: {}",
            self.sigma,
            sigma_px,
            self.space_variant
        );
        Ok(())
    }

    fn feed_input(&mut self, _sim_time: f64, input: &Grid, _synapse: SynapseKind, _port: usize) {
        self.output.assign(input);
    }

    fn update(&mut self) -> Result<()> {
        let mut grid = std::mem::take(&mut self.output);
        self.filter(&mut grid);
        self.output = grid;
        Ok(())
    }

    fn output(&self) -> &Grid {
        &self.output
    }

    fn stage_name(&self) -> &'static str {
        "GaussFilter"
    }
}
