//! Image sequence read from a directory
//!
//! Files are taken in alphabetical order and decoded up front; all of them must
//! share the size of the first one. The frame shown
//! at time `t` is `floor(t / InputFramePeriod) + SkipNInitFrames`.

use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use super::{Frame, FramePoll, FrameSource};
use crate::error::{Result, RetinaError};
use crate::grid::Grid;
use crate::module::Parameter;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Convert a decoded image into a frame of 0–255 values
pub fn frame_from_image(img: &DynamicImage) -> Frame {
    let (w, h) = (img.width() as usize, img.height() as usize);
    if img.color().channel_count() <= 2 {
        let luma = img.to_luma8();
        let data = luma.pixels().map(|p| p.0[0] as f64).collect();
        Frame::mono(Grid::from_vec(h, w, data).unwrap_or_else(|| Grid::new(h, w)))
    } else {
        let rgb = img.to_rgb8();
        let mut channels = [Grid::new(h, w), Grid::new(h, w), Grid::new(h, w)];
        for (x, y, p) in rgb.enumerate_pixels() {
            for (ch, grid) in channels.iter_mut().enumerate() {
                grid[(y as usize, x as usize)] = p.0[ch] as f64;
            }
        }
        let [r, g, b] = channels;
        Frame::rgb(r, g, b)
    }
}

#[derive(Debug)]
pub struct FrameSequence {
    directory: PathBuf,
    frames: Vec<Frame>,
    /// Milliseconds each frame stays on
    frame_period: f64,
    skip: usize,
    repeat_last: bool,
}

impl FrameSequence {
    /// Frames already in memory
    pub fn from_frames(frames: Vec<Frame>) -> Result<Self> {
        let Some(first) = frames.first() else {
            return Err(RetinaError::Input("empty frame sequence".into()));
        };
        let shape = (first.rows(), first.cols());
        if let Some(i) = frames.iter().position(|f| (f.rows(), f.cols()) != shape) {
            return Err(RetinaError::Input(format!(
                "frame {} is {}x{}, the first frame is {}x{}",
                i,
                frames[i].rows(),
                frames[i].cols(),
                shape.0,
                shape.1
            )));
        }
        Ok(Self {
            directory: PathBuf::new(),
            frames,
            frame_period: 1.0,
            skip: 0,
            repeat_last: true,
        })
    }

    /// Decode every image file in `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(dir).map_err(|e| {
            RetinaError::Input(format!("cannot open input directory {}: {}", dir.display(), e))
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let mut frames: Vec<Frame> = Vec::with_capacity(paths.len());
        for path in &paths {
            let frame = frame_from_image(&image::open(path)?);
            if let Some(first) = frames.first() {
                if (frame.rows(), frame.cols()) != (first.rows(), first.cols()) {
                    return Err(RetinaError::Input(format!(
                        "{} is {}x{}, the first frame is {}x{}",
                        path.display(),
                        frame.rows(),
                        frame.cols(),
                        first.rows(),
                        first.cols()
                    )));
                }
            }
            frames.push(frame);
        }
        log::info!("{} frames loaded from {}", frames.len(), dir.display());

        let mut seq = Self::from_frames(frames).map_err(|_| {
            RetinaError::Input(format!("no image files in {}", dir.display()))
        })?;
        seq.directory = dir.to_path_buf();
        Ok(seq)
    }

    pub fn set_parameters(&mut self, params: &[Parameter]) -> Result<()> {
        for p in params {
            match p.name.as_str() {
                "InputFramePeriod" => {
                    if p.value <= 0.0 {
                        return Err(p.invalid("> 0"));
                    }
                    self.frame_period = p.value;
                }
                "SkipNInitFrames" => {
                    if p.value < 0.0 {
                        return Err(p.invalid(">= 0"));
                    }
                    self.skip = p.value as usize;
                }
                "RepeatLastFrame" => self.repeat_last = p.value != 0.0,
                _ => return Err(p.unknown("sequence")),
            }
        }
        Ok(())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame index shown at `t`, `None` past the end without repetition
    pub fn index_at(&self, t: f64) -> Option<usize> {
        let index = (t / self.frame_period).floor().max(0.0) as usize + self.skip;
        if index < self.frames.len() {
            Some(index)
        } else if self.repeat_last {
            Some(self.frames.len() - 1)
        } else {
            None
        }
    }
}

impl FrameSource for FrameSequence {
    fn frame_at(&mut self, t: f64) -> FramePoll<'_> {
        match self.index_at(t) {
            Some(i) => FramePoll::Ready(&self.frames[i]),
            None => FramePoll::End,
        }
    }

    fn shape(&self) -> (usize, usize) {
        self.frames
            .first()
            .map_or((0, 0), |f| (f.rows(), f.cols()))
    }
}
