//! Frame URL resolution for the exported image sequence.
//!
//! Frames are exported once at full rate and named
//! `<device>/<prefix><number>.<extension>` with a 1-based, zero-padded
//! frame number. A device profile may keep only every `reducer`-th frame,
//! so playhead index `i` maps to source frame `floor(i * reducer) + 1`.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::FrameNaming;
use crate::error::{Error, Result};
use crate::timeline::VirtualTimeline;

/// Widest viewport still treated as a phone when held in portrait.
const MOBILE_MAX_WIDTH: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Device {
    Mobile,
    Desktop,
}

impl Device {
    /// Pick the device class for a viewport, once, at startup.
    pub fn for_viewport(width: u32, height: u32) -> Self {
        if height > width && width <= MOBILE_MAX_WIDTH {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Desktop => "desktop",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable per-session description of the frame set and canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceProfile {
    pub device: Device,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub total_frame_count: usize,
    pub reducer: f64,
    pub base_frame_rate: f64,
}

impl DeviceProfile {
    /// Number of frames actually loaded and played.
    pub fn frame_count(&self) -> usize {
        (self.total_frame_count as f64 / self.reducer).floor() as usize
    }

    /// Playback rate after reduction, so reduced sequences keep their length.
    pub fn frame_rate(&self) -> f64 {
        self.base_frame_rate / self.reducer
    }

    pub fn timeline(&self) -> VirtualTimeline {
        VirtualTimeline::new(self.frame_count(), self.frame_rate())
    }

    /// 1-based number of the captured frame shown at playhead index `index`.
    pub fn source_frame_number(&self, index: usize) -> usize {
        (index as f64 * self.reducer).floor() as usize + 1
    }
}

/// Asset URL relative to the assets root, always `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameUrl(String);

impl FrameUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |p, part| p.join(part))
    }
}

impl fmt::Display for FrameUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameAsset {
    pub index: usize,
    pub url: FrameUrl,
    pub path: PathBuf,
}

/// Compute the URL for playhead index `index`. Pure; does not touch disk.
pub fn resolve(profile: &DeviceProfile, naming: &FrameNaming, index: usize) -> Result<FrameUrl> {
    let frame_count = profile.frame_count();
    if index >= frame_count {
        return Err(Error::FrameOutOfRange { index, frame_count });
    }
    let number = profile.source_frame_number(index);
    Ok(FrameUrl(format!(
        "{device}/{prefix}{number:0width$}.{ext}",
        device = profile.device,
        prefix = naming.prefix,
        width = naming.digits,
        ext = naming.extension,
    )))
}

/// Index of the files present under the assets root.
#[derive(Debug, Clone)]
pub struct FrameCatalog {
    root: PathBuf,
    files: HashSet<String>,
}

impl FrameCatalog {
    pub fn scan(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut files = HashSet::new();
        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = entry.map_err(|err| {
                Error::Io(
                    err.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("walkdir loop detected")),
                )
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(key);
        }
        debug!(root = %root.display(), files = files.len(), "indexed frame assets");
        Ok(Self { root, files })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains(&self, url: &FrameUrl) -> bool {
        self.files.contains(url.as_str())
    }

    /// Resolve every frame of `profile`, failing on the first missing file.
    pub fn assets(&self, profile: &DeviceProfile, naming: &FrameNaming) -> Result<Vec<FrameAsset>> {
        let frame_count = profile.frame_count();
        if frame_count == 0 {
            return Err(Error::EmptyFrameSet(profile.device.to_string()));
        }
        let mut assets = Vec::with_capacity(frame_count);
        for index in 0..frame_count {
            let url = resolve(profile, naming, index)?;
            if !self.contains(&url) {
                return Err(Error::MissingFrame {
                    index,
                    url: url.to_string(),
                    root: self.root.clone(),
                });
            }
            let path = url.to_path(&self.root);
            assets.push(FrameAsset { index, url, path });
        }
        info!(
            device = %profile.device,
            frames = frame_count,
            reducer = profile.reducer,
            "resolved frame assets"
        );
        Ok(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(total: usize, reducer: f64) -> DeviceProfile {
        DeviceProfile {
            device: Device::Desktop,
            canvas_width: 4,
            canvas_height: 4,
            total_frame_count: total,
            reducer,
            base_frame_rate: 25.0,
        }
    }

    #[test]
    fn resolves_reduced_source_numbers() {
        let p = profile(1625, 1.5);
        let naming = FrameNaming::default();
        assert_eq!(
            resolve(&p, &naming, 0).unwrap().as_str(),
            "desktop/frames__0001.webp"
        );
        assert_eq!(
            resolve(&p, &naming, 1).unwrap().as_str(),
            "desktop/frames__0002.webp"
        );
        assert_eq!(
            resolve(&p, &naming, 2).unwrap().as_str(),
            "desktop/frames__0004.webp"
        );
        assert_eq!(
            resolve(&p, &naming, 1082).unwrap().as_str(),
            "desktop/frames__1624.webp"
        );
    }

    #[test]
    fn source_number_matches_floor_formula_for_every_index() {
        let p = profile(1625, 1.5);
        let naming = FrameNaming::default();
        for i in 0..p.frame_count() {
            let url = resolve(&p, &naming, i).unwrap();
            let expected = format!("{:04}", (i as f64 * 1.5).floor() as usize + 1);
            assert!(url.as_str().contains(&expected), "{url} vs {expected}");
            assert_eq!(url, resolve(&p, &naming, i).unwrap());
        }
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let p = profile(10, 1.0);
        let err = resolve(&p, &FrameNaming::default(), 10).unwrap_err();
        assert!(matches!(
            err,
            Error::FrameOutOfRange {
                index: 10,
                frame_count: 10
            }
        ));
    }

    #[test]
    fn viewport_selects_device() {
        assert_eq!(Device::for_viewport(390, 844), Device::Mobile);
        assert_eq!(Device::for_viewport(1024, 1366), Device::Mobile);
        assert_eq!(Device::for_viewport(1366, 1024), Device::Desktop);
        assert_eq!(Device::for_viewport(1280, 1600), Device::Desktop);
    }

    #[test]
    fn catalog_fails_fast_on_missing_frame() {
        let dir = tempfile::tempdir().unwrap();
        let frames = dir.path().join("desktop");
        std::fs::create_dir_all(&frames).unwrap();
        for n in [1, 2] {
            std::fs::write(frames.join(format!("frames__{n:04}.webp")), b"x").unwrap();
        }
        let catalog = FrameCatalog::scan(dir.path()).unwrap();
        let err = catalog
            .assets(&profile(3, 1.0), &FrameNaming::default())
            .unwrap_err();
        match err {
            Error::MissingFrame { index, url, .. } => {
                assert_eq!(index, 2);
                assert_eq!(url, "desktop/frames__0003.webp");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let assets = catalog
            .assets(&profile(2, 1.0), &FrameNaming::default())
            .unwrap();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[1].path, frames.join("frames__0002.webp"));
    }
}
