//! Scroll progress to frame index, and frame index to canvas.

use std::sync::Arc;

use image::RgbaImage;
use tracing::{trace, warn};

use super::canvas::Canvas;
use crate::events::FrameLoaded;
use crate::frames::DeviceProfile;

/// Frame shown for scroll progress `progress` (clamped to `[0, 1]`).
pub fn frame_index_for(progress: f64, frame_count: usize) -> usize {
    if frame_count == 0 {
        return 0;
    }
    let last = (frame_count - 1) as f64;
    (progress.clamp(0.0, 1.0) * last).round() as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The frame was copied to the canvas.
    Drawn(usize),
    /// The frame is already on the canvas.
    Unchanged(usize),
    /// The frame is not loaded yet; the canvas keeps its previous contents.
    Pending(usize),
}

impl RenderOutcome {
    pub fn index(&self) -> usize {
        match self {
            Self::Drawn(i) | Self::Unchanged(i) | Self::Pending(i) => *i,
        }
    }
}

#[derive(Debug)]
pub struct Playhead {
    frames: Vec<Option<Arc<RgbaImage>>>,
    canvas: Canvas,
    position: f64,
}

impl Playhead {
    pub fn new(profile: &DeviceProfile, canvas_handle: &str) -> Self {
        Self {
            frames: vec![None; profile.frame_count()],
            canvas: Canvas::new(canvas_handle, profile.canvas_width, profile.canvas_height),
            position: 0.0,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Continuous frame position in `[0, frame_count - 1]`.
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn current_index(&self) -> usize {
        self.position.round() as usize
    }

    pub fn is_loaded(&self, index: usize) -> bool {
        self.frames.get(index).is_some_and(Option::is_some)
    }

    pub fn loaded_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_some()).count()
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Move the playhead to `progress` and draw the nearest frame if it is
    /// available. Never waits for a load.
    pub fn seek(&mut self, progress: f64) -> RenderOutcome {
        let last = self.frames.len().saturating_sub(1) as f64;
        self.position = progress.clamp(0.0, 1.0) * last;
        self.render()
    }

    fn render(&mut self) -> RenderOutcome {
        let index = self.current_index();
        if self.canvas.drawn() == Some(index) {
            return RenderOutcome::Unchanged(index);
        }
        match self.frames.get(index).and_then(Option::as_ref) {
            Some(frame) => {
                self.canvas.draw(index, frame);
                trace!(index, "frame drawn");
                RenderOutcome::Drawn(index)
            }
            None => {
                trace!(index, "frame not loaded; draw skipped");
                RenderOutcome::Pending(index)
            }
        }
    }

    /// Store a loaded frame; redraw when it is the one the playhead wants.
    pub fn insert(&mut self, loaded: FrameLoaded) -> Option<RenderOutcome> {
        let FrameLoaded { index, image } = loaded;
        let Some(slot) = self.frames.get_mut(index) else {
            warn!(index, frames = self.frames.len(), "dropping frame outside the sequence");
            return None;
        };
        *slot = Some(image);
        (index == self.current_index()).then(|| self.render())
    }
}
