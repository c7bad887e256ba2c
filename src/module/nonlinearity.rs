//! Static nonlinearities - memoryless pointwise transfer functions
//!
//! | Shape | Script type | Function |
//! |---|---|---|
//! | Polynomial | StaticNonLinearity | `(slope·max(x, th) + offset)^exponent` |
//! | Piecewise | CustomNonLinearity | first segment with `start ≤ x < end` |
//! | SymmetricSigmoid | SymmetricSigmoidNonLinearity | `sgn(x)·max / (1 + e^(−|x|·slope + offset))` |
//! | Sigmoid | SigmoidNonLinearity | `max / (1 + e^(−x·slope + offset))` |

use super::traits::{Parameter, Stage, SynapseKind};
use crate::error::Result;
use crate::grid::{Geometry, Grid};

/// Transfer function family
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Shape {
    #[default]
    Polynomial,
    Piecewise,
    SymmetricSigmoid,
    Sigmoid,
}

impl Shape {
    /// Shape selected by a module type name of the script
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "StaticNonLinearity" => Some(Self::Polynomial),
            "CustomNonLinearity" => Some(Self::Piecewise),
            "SymmetricSigmoidNonLinearity" => Some(Self::SymmetricSigmoid),
            "SigmoidNonLinearity" => Some(Self::Sigmoid),
            _ => None,
        }
    }
}

/// Per-segment coefficient lists. Only the piecewise shape reads past index 0.
#[derive(Clone, Debug, Default)]
struct Segments {
    slope: Vec<f64>,
    offset: Vec<f64>,
    /// Exponent for the polynomial shapes, saturation for the sigmoids
    exponent: Vec<f64>,
    threshold: Vec<f64>,
    start: Vec<f64>,
    end: Vec<f64>,
}

impl Segments {
    fn list_mut(&mut self, name: &str) -> Option<&mut Vec<f64>> {
        match name {
            "slope" => Some(&mut self.slope),
            "offset" => Some(&mut self.offset),
            "exponent" | "max" => Some(&mut self.exponent),
            "threshold" => Some(&mut self.threshold),
            "start" => Some(&mut self.start),
            "end" => Some(&mut self.end),
            _ => None,
        }
    }

    fn slope(&self, k: usize) -> f64 {
        self.slope.get(k).copied().unwrap_or(1.0)
    }

    fn offset(&self, k: usize) -> f64 {
        self.offset.get(k).copied().unwrap_or(0.0)
    }

    fn exponent(&self, k: usize) -> f64 {
        self.exponent.get(k).copied().unwrap_or(1.0)
    }

    fn count(&self) -> usize {
        self.slope.len().min(self.start.len()).min(self.end.len())
    }
}

#[derive(Clone, Debug, Default)]
pub struct StaticNonLinearity {
    shape: Shape,
    segments: Segments,
    output: Grid,
}

impl StaticNonLinearity {
    pub fn new(shape: Shape) -> Self {
        Self { shape, ..Self::default() }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Transfer function applied to one sample
    pub fn apply(&self, x: f64) -> f64 {
        let s = &self.segments;
        match self.shape {
            Shape::Polynomial => {
                let x = match s.threshold.first() {
                    Some(&th) if x < th => th,
                    _ => x,
                };
                (x * s.slope(0) + s.offset(0)).powf(s.exponent(0))
            }
            Shape::Piecewise => (0..s.count())
                .find(|&k| x >= s.start[k] && x < s.end[k])
                .map(|k| (x * s.slope(k) + s.offset(k)).powf(s.exponent(k)))
                .unwrap_or(x),
            Shape::SymmetricSigmoid => {
                let sign = if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    0.0
                };
                sign * s.exponent(0) / (1.0 + (-x.abs() * s.slope(0) + s.offset(0)).exp())
            }
            Shape::Sigmoid => s.exponent(0) / (1.0 + (-x * s.slope(0) + s.offset(0)).exp()),
        }
    }
}

impl Stage for StaticNonLinearity {
    fn set_parameters(&mut self, params: &[Parameter]) -> Result<()> {
        // A list named in this block replaces the previous one
        let mut touched: Vec<&str> = Vec::new();
        for p in params {
            let name = p.name.as_str();
            let stage = self.stage_name();
            let list = self.segments.list_mut(name).ok_or_else(|| p.unknown(stage))?;
            if !touched.contains(&name) {
                list.clear();
                touched.push(name);
            }
            list.push(p.value);
        }
        Ok(())
    }

    fn allocate(&mut self, geometry: &Geometry) -> Result<()> {
        self.output = geometry.zeros();
        Ok(())
    }

    fn feed_input(&mut self, _sim_time: f64, input: &Grid, _synapse: SynapseKind, _port: usize) {
        self.output.assign(input);
    }

    fn update(&mut self) -> Result<()> {
        let mut grid = std::mem::take(&mut self.output);
        grid.map_inplace(|x| self.apply(x));
        self.output = grid;
        Ok(())
    }

    fn output(&self) -> &Grid {
        &self.output
    }

    fn stage_name(&self) -> &'static str {
        match self.shape {
            Shape::Polynomial => "StaticNonLinearity",
            Shape::Piecewise => "CustomNonLinearity",
            Shape::SymmetricSigmoid => "SymmetricSigmoidNonLinearity",
            Shape::Sigmoid => "SigmoidNonLinearity",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nl(shape: Shape, params: &[(&str, f64)]) -> StaticNonLinearity {
        let mut n = StaticNonLinearity::new(shape);
        let params: Vec<_> = params.iter().map(|&(k, v)| Parameter::new(k, v)).collect();
        n.set_parameters(&params).unwrap();
        n
    }

    #[test]
    fn test_polynomial_with_threshold() {
        let n = nl(
            Shape::Polynomial,
            &[("slope", 2.0), ("offset", 1.0), ("exponent", 2.0), ("threshold", 0.0)],
        );
        assert_eq!(n.apply(1.0), 9.0);
        assert_eq!(n.apply(-5.0), 1.0);
    }

    #[test]
    fn test_polynomial_defaults_are_identity() {
        let n = StaticNonLinearity::new(Shape::Polynomial);
        assert_eq!(n.apply(-3.25), -3.25);
    }

    #[test]
    fn test_piecewise_first_matching_segment() {
        let n = nl(
            Shape::Piecewise,
            &[
                ("slope", 0.0),
                ("offset", -1.0),
                ("exponent", 1.0),
                ("start", f64::NEG_INFINITY),
                ("end", 0.0),
                ("slope", 2.0),
                ("offset", 0.0),
                ("exponent", 1.0),
                ("start", 0.0),
                ("end", 10.0),
            ],
        );
        assert_eq!(n.apply(-4.0), -1.0);
        assert_eq!(n.apply(3.0), 6.0);
        // outside every segment
        assert_eq!(n.apply(12.0), 12.0);
    }

    #[test]
    fn test_sigmoids() {
        let s = nl(Shape::Sigmoid, &[("slope", 1.0), ("offset", 0.0), ("max", 4.0)]);
        assert!((s.apply(0.0) - 2.0).abs() < 1e-12);
        assert!(s.apply(50.0) > 3.999);

        let sym = nl(Shape::SymmetricSigmoid, &[("slope", 1.0), ("offset", 0.0), ("max", 4.0)]);
        assert!((sym.apply(2.0) + sym.apply(-2.0)).abs() < 1e-12);
        assert_eq!(sym.apply(0.0), 0.0);
    }

    #[test]
    fn test_repeated_block_replaces_lists() {
        let mut n = nl(Shape::Polynomial, &[("slope", 3.0)]);
        n.set_parameters(&[Parameter::new("slope", 5.0)]).unwrap();
        assert_eq!(n.apply(1.0), 5.0);
        assert!(n.set_parameters(&[Parameter::new("tau", 1.0)]).is_err());
    }

    #[test]
    fn test_update_applies_pointwise() {
        let mut n = nl(Shape::Polynomial, &[("slope", -1.0)]);
        n.allocate(&Geometry::new(1, 2, 1.0, 1.0)).unwrap();
        let input = Grid::from_vec(1, 2, vec![1.0, -2.0]).unwrap();
        n.feed_input(0.0, &input, SynapseKind::Current, 0);
        n.update().unwrap();
        assert_eq!(n.output().as_slice(), &[-1.0, 2.0]);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Shape::from_type_name("CustomNonLinearity"), Some(Shape::Piecewise));
        assert_eq!(Shape::from_type_name("GaussFilter"), None);
    }
}
