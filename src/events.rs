use std::sync::Arc;

use image::RgbaImage;

use crate::frames::FrameUrl;
use crate::timeline::choreo::ItemId;

/// A decoded frame on its way from the loader to the renderer.
#[derive(Debug, Clone)]
pub struct FrameLoaded {
    pub index: usize,
    pub image: Arc<RgbaImage>,
}

/// Outcome of one frame load. Every dispatched asset settles exactly once.
#[derive(Debug, Clone)]
pub enum FrameSettled {
    Loaded {
        index: usize,
        url: FrameUrl,
        image: Arc<RgbaImage>,
        cached: bool,
    },
    Failed {
        index: usize,
        url: FrameUrl,
        reason: String,
    },
}

impl FrameSettled {
    pub fn index(&self) -> usize {
        match self {
            Self::Loaded { index, .. } | Self::Failed { index, .. } => *index,
        }
    }
}

/// Visibility transitions emitted while the timeline is scrubbed.
///
/// `fade` is the transition length in timeline units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimelineEvent {
    Appear { id: ItemId, fade: f64 },
    Disappear { id: ItemId, fade: f64 },
    Dismissed { id: ItemId, fade: f64 },
}

impl TimelineEvent {
    pub fn id(&self) -> ItemId {
        match self {
            Self::Appear { id, .. } | Self::Disappear { id, .. } | Self::Dismissed { id, .. } => *id,
        }
    }
}

/// Start/stop calls for the external audio sprite engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCommand {
    Start { sprite: String },
    Stop { sprite: String },
}
