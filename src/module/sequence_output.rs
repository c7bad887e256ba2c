//! SequenceOutput - records a module's grid as an INRIMAGE-4 volume
//!
//! The file starts with a fixed 256-byte text header which is only known at
//! the end of the run, so space is reserved up front and the header is written
//! by `finish` once the frame count is final. Frames follow as native-endian
//! `f64`, row-major.

use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::traits::{Parameter, Stage, SynapseKind};
use crate::error::{Result, RetinaError};
use crate::grid::{Geometry, Grid};

/// Size of the INR header block
pub const INR_HEADER_LEN: usize = 256;
const INR_HEADER_END: &str = "\n##}\n";

/// Render the padded header for a volume of `frames` grids
pub fn inr_header(rows: usize, cols: usize, frames: usize, voxel_x: f64, voxel_y: f64) -> Vec<u8> {
    let cpu = if cfg!(target_endian = "little") { "pc" } else { "sun" };
    let text = format!(
        "#INRIMAGE-4#{{\nXDIM={}\nYDIM={}\nZDIM={}\nVDIM=1\nVX={}\nVY={}\nVZ=1\nTYPE=double\nPIXSIZE=64 bits\nSCALE=2**0\nCPU={}\n",
        cols, rows, frames, voxel_x, voxel_y, cpu
    );
    let mut header = vec![b' '; INR_HEADER_LEN];
    let body = text.len().min(INR_HEADER_LEN - INR_HEADER_END.len());
    header[..body].copy_from_slice(&text.as_bytes()[..body]);
    header[INR_HEADER_LEN - INR_HEADER_END.len()..].copy_from_slice(INR_HEADER_END.as_bytes());
    header
}

/// `sequence` output module
#[derive(Debug)]
pub struct SequenceOutput {
    path: PathBuf,
    voxel_x: f64,
    voxel_y: f64,
    start_time: f64,
    end_time: f64,
    frames_per_output: usize,
    step: f64,
    sim_time: f64,
    skipped: usize,
    written: usize,
    file: Option<BufWriter<File>>,
    input: Grid,
}

impl SequenceOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            voxel_x: 1.0,
            voxel_y: 1.0,
            start_time: 0.0,
            end_time: f64::INFINITY,
            frames_per_output: 1,
            step: 1.0,
            sim_time: 0.0,
            skipped: 0,
            written: 0,
            file: None,
            input: Grid::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames written so far
    pub fn frames_written(&self) -> usize {
        self.written
    }

    fn write_frame(&mut self) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        for v in self.input.as_slice() {
            file.write_all(&v.to_ne_bytes())?;
        }
        self.written += 1;
        Ok(())
    }
}

impl Stage for SequenceOutput {
    fn set_parameters(&mut self, params: &[Parameter]) -> Result<()> {
        for p in params {
            match p.name.as_str() {
                "Voxel_X_size" | "Voxel_Y_size" | "Start_time" | "End_time" if p.value < 0.0 => {
                    return Err(p.invalid(">= 0"));
                }
                "Voxel_X_size" => self.voxel_x = p.value,
                "Voxel_Y_size" => self.voxel_y = p.value,
                "Start_time" => self.start_time = p.value,
                "End_time" => self.end_time = p.value,
                "InFramesPerOut" => {
                    if p.value < 1.0 {
                        return Err(p.invalid(">= 1"));
                    }
                    self.frames_per_output = p.value as usize;
                }
                _ => return Err(p.unknown(self.stage_name())),
            }
        }
        Ok(())
    }

    fn allocate(&mut self, geometry: &Geometry) -> Result<()> {
        self.step = geometry.step;
        self.input = geometry.zeros();
        self.skipped = 0;
        self.written = 0;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.path).map_err(|e| {
            RetinaError::Output(format!(
                "unable to create sequence file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        let mut file = BufWriter::new(file);
        file.seek(SeekFrom::Start(INR_HEADER_LEN as u64))?;
        self.file = Some(file);
        Ok(())
    }

    fn feed_input(&mut self, sim_time: f64, input: &Grid, _synapse: SynapseKind, _port: usize) {
        self.input.assign(input);
        self.sim_time = sim_time;
    }

    fn update(&mut self) -> Result<()> {
        if self.sim_time >= self.start_time && self.sim_time + self.step <= self.end_time {
            self.skipped += 1;
            if self.skipped >= self.frames_per_output {
                self.write_frame()?;
                self.skipped = 0;
            }
        }
        Ok(())
    }

    fn output(&self) -> &Grid {
        &self.input
    }

    fn finish(&mut self) -> Result<()> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        let header = inr_header(
            self.input.rows(),
            self.input.cols(),
            self.written,
            self.voxel_x,
            self.voxel_y,
        );
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header)?;
        file.flush()?;
        log::info!(
            "{} frames written to sequence file {}",
            self.written,
            self.path.display()
        );
        Ok(())
    }

    fn stage_name(&self) -> &'static str {
        "sequence"
    }
}
