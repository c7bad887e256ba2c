//! Display configuration collected from the script
//!
//! Nothing is drawn; the settings are kept so a front end can pick them up
//! and so multimeter declarations reach the driver.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::multimeter::MultimeterSpec;

/// `Show` entry of one module (or `Input`)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShowEntry {
    pub shown: bool,
    pub margin: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    /// Delay between refreshes (ms)
    pub delay: f64,
    pub zoom: f64,
    pub windows_per_row: usize,
    pub shown: BTreeMap<String, ShowEntry>,
    pub multimeters: Vec<MultimeterSpec>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            delay: 0.0,
            zoom: 1.0,
            windows_per_row: 4,
            shown: BTreeMap::new(),
            multimeters: Vec::new(),
        }
    }
}

impl DisplaySettings {
    /// Record a `Show` command. Showing a module also shows the input.
    pub fn show(&mut self, id: &str, shown: bool, margin: f64) {
        let margin = margin.max(0.0);
        self.shown.insert(id.to_string(), ShowEntry { shown, margin });
        if shown && id != "Input" {
            self.shown
                .entry("Input".to_string())
                .or_insert(ShowEntry { shown: true, margin: 0.0 })
                .shown = true;
        }
    }

    pub fn is_shown(&self, id: &str) -> bool {
        self.shown.get(id).is_some_and(|e| e.shown)
    }

    pub fn add_multimeter(&mut self, spec: MultimeterSpec) {
        self.multimeters.push(spec);
    }
}
