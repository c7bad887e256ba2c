//! Spike lists and the `.spk` activity file

use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Result, RetinaError};

/// One output event
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spike {
    /// Row-major pixel offset of the firing neuron
    pub neuron: usize,
    /// Firing time in seconds
    pub time: f64,
}

impl Spike {
    pub fn new(neuron: usize, time: f64) -> Self {
        Self { neuron, time }
    }

    /// Time first, neuron index on ties
    pub fn chronological(a: &Spike, b: &Spike) -> Ordering {
        a.time
            .partial_cmp(&b.time)
            .unwrap_or(Ordering::Equal)
            .then(a.neuron.cmp(&b.neuron))
    }
}

/// Time-ordered spike list accumulated over a run
#[derive(Clone, Debug, Default)]
pub struct SpikeTrain {
    spikes: Vec<Spike>,
}

impl SpikeTrain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort the spikes of one slot and append them
    pub fn push_slot(&mut self, mut slot: Vec<Spike>) {
        slot.sort_by(Spike::chronological);
        self.spikes.extend(slot);
    }

    pub fn spikes(&self) -> &[Spike] {
        &self.spikes
    }

    pub fn len(&self) -> usize {
        self.spikes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spikes.is_empty()
    }

    /// Spike times of one neuron, in order
    pub fn times_of(&self, neuron: usize) -> impl Iterator<Item = f64> + '_ {
        self.spikes
            .iter()
            .filter(move |s| s.neuron == neuron)
            .map(|s| s.time)
    }

    /// True when no spike precedes an earlier one
    pub fn is_ordered(&self) -> bool {
        self.spikes
            .windows(2)
            .all(|w| Spike::chronological(&w[0], &w[1]) != Ordering::Greater)
    }

    /// Write the activity file: two comment lines then `<neuron> <time>` per spike
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path).map_err(|e| {
            RetinaError::Output(format!("unable to open spike file {}: {}", path.display(), e))
        })?;
        let mut out = BufWriter::new(file);
        writeln!(
            out,
            "% Output activity file generated by retina-sim on {}",
            chrono::Local::now().format("%a %b %e %H:%M:%S %Y")
        )?;
        writeln!(out, "% <neuron index from 0> <spike time in seconds>")?;
        for s in &self.spikes {
            writeln!(out, "{} {}", s.neuron, s.time)?;
        }
        out.flush()?;
        log::info!("{} spikes written to {}", self.spikes.len(), path.display());
        Ok(())
    }
}
