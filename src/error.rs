use std::path::PathBuf;

use thiserror::Error;

/// Library error type for scroll-reel operations.
///
/// Everything here is a configuration or usage defect detected before (or
/// outside of) scroll handling. Runtime asset failures are not errors; the
/// loader logs them and keeps going.
#[derive(Debug, Error)]
pub enum Error {
    /// A computed frame URL has no backing file in the asset catalog.
    #[error("frame {index} resolves to {url}, which does not exist under {root}")]
    MissingFrame {
        index: usize,
        url: String,
        root: PathBuf,
    },

    /// A frame index outside `[0, frame_count)` was requested.
    #[error("frame index {index} is out of range for {frame_count} frames")]
    FrameOutOfRange { index: usize, frame_count: usize },

    /// The device profile yields no frames at all.
    #[error("device profile {0} resolves to zero frames")]
    EmptyFrameSet(String),

    /// Motion phases do not tile the virtual timeline.
    #[error("invalid motion phase layout: {0}")]
    PhaseLayout(String),

    /// A timeline item's visibility window does not fit on the virtual timeline.
    #[error("timeline item {copy:?} at {time} with window {gap} does not fit in [0, {length}]")]
    ItemOutOfRange {
        copy: String,
        time: f64,
        gap: f64,
        length: f64,
    },

    /// No timeline item exists with this id.
    #[error("unknown timeline item {0}")]
    UnknownItem(usize),

    /// Only stickers can be dismissed.
    #[error("timeline item {0} is a caption and cannot be dismissed")]
    NotDismissible(usize),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Timeline data file is not valid JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
