//! Colour decomposition of raw frames into cone and rod responses
//!
//! sRGB → XYZ, then XYZ → LMS (Hunt-Pointer-Estévez). The rod response is
//! the unweighted mean of the three cone channels.

use crate::grid::Grid;
use crate::input::Frame;

/// Fixed source names that are always resolvable
pub const CHANNEL_NAMES: [&str; 7] = [
    "L_cones",
    "M_cones",
    "S_cones",
    "rods",
    "red_channel",
    "green_channel",
    "blue_channel",
];

pub fn is_channel(name: &str) -> bool {
    CHANNEL_NAMES.contains(&name)
}

// Rows: X, Y, Z. Columns apply to (blue, green, red).
const RGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.1191920, 0.9503041],
];

// Rows: S, M. L is Z itself.
const XYZ_TO_SM: [[f64; 3]; 2] = [
    [0.38971, 0.68898, -0.07868],
    [-0.22981, 1.1834, 0.04641],
];

/// Per-step colour planes derived from the current frame
#[derive(Clone, Debug, Default)]
pub struct ColorChannels {
    red: Grid,
    green: Grid,
    blue: Grid,
    l_cones: Grid,
    m_cones: Grid,
    s_cones: Grid,
    rods: Grid,
}

impl ColorChannels {
    pub fn new(rows: usize, cols: usize) -> Self {
        let g = Grid::new(rows, cols);
        Self {
            red: g.clone(),
            green: g.clone(),
            blue: g.clone(),
            l_cones: g.clone(),
            m_cones: g.clone(),
            s_cones: g.clone(),
            rods: g,
        }
    }

    /// Recompute every plane from `frame`. A single-channel frame feeds red,
    /// green and blue alike.
    pub fn decompose(&mut self, frame: &Frame) {
        let Some(first) = frame.channel(0) else {
            return;
        };
        let (r, g, b) = match (frame.channel(1), frame.channel(2)) {
            (Some(g), Some(b)) => (first, g, b),
            _ => (first, first, first),
        };
        self.red.assign(r);
        self.green.assign(g);
        self.blue.assign(b);

        for plane in [&mut self.l_cones, &mut self.m_cones, &mut self.s_cones, &mut self.rods] {
            plane.reset(r.rows(), r.cols());
        }

        let n = r.len();
        let (rs, gs, bs) = (r.as_slice(), g.as_slice(), b.as_slice());
        let l = self.l_cones.as_mut_slice();
        for i in 0..n {
            let rgb = [bs[i], gs[i], rs[i]];
            let xyz = RGB_TO_XYZ.map(|row| row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2]);
            l[i] = xyz[2];
            let [s, m] = XYZ_TO_SM.map(|row| row[0] * xyz[0] + row[1] * xyz[1] + row[2] * xyz[2]);
            self.s_cones.as_mut_slice()[i] = s;
            self.m_cones.as_mut_slice()[i] = m;
        }
        for i in 0..n {
            let mean = (self.l_cones.as_slice()[i]
                + self.m_cones.as_slice()[i]
                + self.s_cones.as_slice()[i])
                / 3.0;
            self.rods.as_mut_slice()[i] = mean;
        }
    }

    /// Plane for a fixed channel name
    pub fn channel(&self, name: &str) -> Option<&Grid> {
        match name {
            "L_cones" => Some(&self.l_cones),
            "M_cones" => Some(&self.m_cones),
            "S_cones" => Some(&self.s_cones),
            "rods" => Some(&self.rods),
            "red_channel" => Some(&self.red),
            "green_channel" => Some(&self.green),
            "blue_channel" => Some(&self.blue),
            _ => None,
        }
    }
}
