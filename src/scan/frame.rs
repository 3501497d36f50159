use std::fs;
use std::path::{Path, PathBuf};

use image::{RgbaImage, imageops::FilterType};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Fixed-size RGBA sample buffer, sized once when the source is acquired.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

/// A live feed of frames, e.g. a camera.
pub trait FrameSource: Send {
    /// Opens the feed and reports its frame dimensions.
    fn acquire(&mut self) -> Result<(u32, u32)>;
    fn release(&mut self);
    fn is_acquired(&self) -> bool;
    fn frame_ready(&self) -> bool;
    /// Copies the current frame into `buffer`; false when nothing was sampled.
    fn sample(&mut self, buffer: &mut FrameBuffer) -> bool;
}

/// Replays the still images of a directory as a looping feed.
pub struct ImageSequenceSource {
    dir: PathBuf,
    frames: Vec<RgbaImage>,
    cursor: usize,
    acquired: bool,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            frames: Vec::new(),
            cursor: 0,
            acquired: false,
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn acquire(&mut self) -> Result<(u32, u32)> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| Error::MediaAccess(format!("{}: {e}", self.dir.display())))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_image(p))
            .collect();
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in &paths {
            let frame = image::open(path)
                .map_err(|e| Error::MediaAccess(format!("{}: {e}", path.display())))?
                .to_rgba8();
            frames.push(frame);
        }
        let Some(first) = frames.first() else {
            return Err(Error::MediaAccess(format!(
                "no frames found in {}",
                self.dir.display()
            )));
        };
        let dims = first.dimensions();

        info!(frames = frames.len(), width = dims.0, height = dims.1, "frame source opened");
        self.frames = frames;
        self.cursor = 0;
        self.acquired = true;
        Ok(dims)
    }

    fn release(&mut self) {
        if self.acquired {
            debug!("frame source released");
        }
        self.frames.clear();
        self.acquired = false;
    }

    fn is_acquired(&self) -> bool {
        self.acquired
    }

    fn frame_ready(&self) -> bool {
        self.acquired && !self.frames.is_empty()
    }

    fn sample(&mut self, buffer: &mut FrameBuffer) -> bool {
        if !self.frame_ready() {
            return false;
        }
        let frame = &self.frames[self.cursor % self.frames.len()];
        self.cursor = self.cursor.wrapping_add(1);

        if frame.dimensions() == (buffer.width(), buffer.height()) {
            buffer.pixels_mut().copy_from_slice(frame.as_raw());
        } else {
            let scaled = image::imageops::resize(
                frame,
                buffer.width(),
                buffer.height(),
                FilterType::Triangle,
            );
            buffer.pixels_mut().copy_from_slice(scaled.as_raw());
        }
        true
    }
}
