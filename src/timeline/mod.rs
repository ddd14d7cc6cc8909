//! The virtual timeline shared by the playhead, captions, camera and audio.
//!
//! Scroll progress `t ∈ [0, 1]` maps linearly onto `[0, L]` where
//! `L = frame_count / frame_rate / 100`. Everything choreographed against
//! the video is keyed to positions in this domain, never to pixels.

pub mod audio;
pub mod choreo;
pub mod motion;

use crate::config::{Configuration, ScrollTriggerConfig};

/// Tolerance used when comparing timeline positions and phase sums.
pub const TIMELINE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualTimeline {
    frame_count: usize,
    frame_rate: f64,
    length: f64,
}

impl VirtualTimeline {
    pub fn new(frame_count: usize, frame_rate: f64) -> Self {
        Self {
            frame_count,
            frame_rate,
            length: frame_count as f64 / frame_rate / 100.0,
        }
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Timeline position for a (clamped) scroll progress.
    pub fn position(&self, progress: f64) -> f64 {
        progress.clamp(0.0, 1.0) * self.length
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= 0.0 && time <= self.length + TIMELINE_EPSILON
    }
}

/// Clamp observer output into `[0, 1]`; `None` for values that carry no
/// position at all (NaN), which callers drop.
pub fn clamp_progress(progress: f64) -> Option<f64> {
    if progress.is_nan() {
        None
    } else {
        Some(progress.clamp(0.0, 1.0))
    }
}

/// Pixel scroll region mapped onto progress, as the page's scroll observer
/// reports it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollTrigger {
    pub start: f64,
    pub end: f64,
    pub scrub: bool,
    pub pin: bool,
}

impl ScrollTrigger {
    pub fn from_config(cfg: &Configuration) -> Self {
        let ScrollTriggerConfig {
            start, scrub, pin, ..
        } = cfg.scroll_trigger;
        Self {
            start,
            end: cfg.scroll_end(),
            scrub,
            pin,
        }
    }

    /// Progress through the region for a scroll offset, clamped to `[0, 1]`.
    pub fn progress(&self, offset: f64) -> f64 {
        let span = self.end - self.start;
        if span <= 0.0 || offset.is_nan() {
            return 0.0;
        }
        ((offset - self.start) / span).clamp(0.0, 1.0)
    }

    /// The section stays pinned while progress is strictly inside the region.
    pub fn is_pinned(&self, offset: f64) -> bool {
        self.pin && offset >= self.start && offset < self.end
    }
}
