//! Grid - dense 2-D buffers exchanged between stages
//!
//! Every stage of the model produces one `Grid` per step. Storage is row-major,
//! so the flat offset of `(row, col)` is `row * cols + col`; spike neuron
//! indices use the same offset.

use serde::{Deserialize, Serialize};
use std::ops::{AddAssign, Index, IndexMut, MulAssign, SubAssign};

/// Shape and time base shared by the whole graph
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Grid height (the script's `sizeX`)
    pub rows: usize,
    /// Grid width (the script's `sizeY`)
    pub cols: usize,
    /// Simulation step in milliseconds
    pub step: f64,
    /// Spatial scale used by the Gaussian filters
    pub pixels_per_degree: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            rows: 1,
            cols: 1,
            step: 1.0,
            pixels_per_degree: 1.0,
        }
    }
}

impl Geometry {
    pub fn new(rows: usize, cols: usize, step: f64, pixels_per_degree: f64) -> Self {
        Self { rows, cols, step, pixels_per_degree }
    }

    /// Number of pixels in one grid
    pub fn area(&self) -> usize {
        self.rows * self.cols
    }

    /// Zero grid with this shape
    pub fn zeros(&self) -> Grid {
        Grid::new(self.rows, self.cols)
    }
}

/// Row-major matrix of f64 samples
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Grid {
    /// Zero-filled grid
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    /// Grid with every sample set to `value`
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Wrap an existing row-major buffer. Returns `None` on a size mismatch.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Option<Self> {
        (data.len() == rows * cols).then_some(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn same_shape(&self, other: &Grid) -> bool {
        self.rows == other.rows && self.cols == other.cols
    }

    /// Sample at `(row, col)`, `None` when out of bounds
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        if row < self.rows && col < self.cols {
            self.data[row * self.cols + col] = value;
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// One row as a slice
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// One column, copied out
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.data[r * self.cols + col]).collect()
    }

    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    /// Reshape to `rows x cols` and zero every sample
    pub fn reset(&mut self, rows: usize, cols: usize) {
        self.rows = rows;
        self.cols = cols;
        self.data.clear();
        self.data.resize(rows * cols, 0.0);
    }

    /// Copy `other` into self, adopting its shape. Reuses the allocation.
    pub fn assign(&mut self, other: &Grid) {
        self.rows = other.rows;
        self.cols = other.cols;
        self.data.clear();
        self.data.extend_from_slice(&other.data);
    }

    pub fn map_inplace(&mut self, f: impl Fn(f64) -> f64) {
        self.data.iter_mut().for_each(|v| *v = f(*v));
    }

    /// Elementwise combination with another grid of the same shape
    pub fn zip_inplace(&mut self, other: &Grid, f: impl Fn(f64, f64) -> f64) {
        self.data
            .iter_mut()
            .zip(other.data.iter())
            .for_each(|(a, &b)| *a = f(*a, b));
    }

    /// `self += factor * other`
    pub fn add_scaled(&mut self, other: &Grid, factor: f64) {
        self.zip_inplace(other, |a, b| a + factor * b);
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            0.0
        } else {
            self.sum() / self.data.len() as f64
        }
    }

    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

impl Index<(usize, usize)> for Grid {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        &self.data[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for Grid {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        &mut self.data[row * self.cols + col]
    }
}

impl AddAssign<&Grid> for Grid {
    fn add_assign(&mut self, rhs: &Grid) {
        self.zip_inplace(rhs, |a, b| a + b);
    }
}

impl SubAssign<&Grid> for Grid {
    fn sub_assign(&mut self, rhs: &Grid) {
        self.zip_inplace(rhs, |a, b| a - b);
    }
}

impl MulAssign<f64> for Grid {
    fn mul_assign(&mut self, rhs: f64) {
        self.map_inplace(|v| v * rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_layout() {
        let mut g = Grid::new(2, 3);
        g[(1, 2)] = 5.0;
        assert_eq!(g.as_slice()[5], 5.0);
        assert_eq!(g.get(1, 2), Some(5.0));
        assert_eq!(g.get(2, 0), None);
        assert_eq!(g.row(1), &[0.0, 0.0, 5.0]);
        assert_eq!(g.column(2), vec![0.0, 5.0]);
    }

    #[test]
    fn test_signed_accumulation() {
        let a = Grid::filled(2, 2, 1.0);
        let b = Grid::filled(2, 2, 2.0);
        let c = Grid::filled(2, 2, 0.5);
        let mut acc = a.clone();
        acc += &b;
        acc -= &c;
        assert!(acc.as_slice().iter().all(|&v| (v - 2.5).abs() < 1e-12));
    }

    #[test]
    fn test_assign_adopts_shape() {
        let mut g = Grid::new(1, 1);
        g.assign(&Grid::filled(3, 4, 7.0));
        assert_eq!((g.rows(), g.cols()), (3, 4));
        assert_eq!(g.sum(), 84.0);
    }

    #[test]
    fn test_from_vec_checks_size() {
        assert!(Grid::from_vec(2, 2, vec![0.0; 3]).is_none());
        assert!(Grid::from_vec(2, 2, vec![0.0; 4]).is_some());
    }
}
