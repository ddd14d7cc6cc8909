use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::frames::{Device, DeviceProfile};
use crate::timeline::choreo::{DepthRule, DepthTable};
use crate::timeline::motion::{Axis, MotionPlan};

pub const DEFAULT_CANVAS_HANDLE: &str = "video-canvas";

/// Canvas size and downsampling for one device class.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DeviceSettings {
    pub width: u32,
    pub height: u32,
    /// Keep every `reducer`-th captured frame (1.0 = all frames).
    pub reducer: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct DeviceTable {
    pub mobile: DeviceSettings,
    pub desktop: DeviceSettings,
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self {
            mobile: DeviceSettings {
                width: 1080,
                height: 1920,
                reducer: 1.5,
            },
            desktop: DeviceSettings {
                width: 2400,
                height: 1350,
                reducer: 1.5,
            },
        }
    }
}

impl DeviceTable {
    pub fn get(&self, device: Device) -> &DeviceSettings {
        match device {
            Device::Mobile => &self.mobile,
            Device::Desktop => &self.desktop,
        }
    }
}

/// File naming of the exported frame sequence.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct FrameNaming {
    pub prefix: String,
    pub extension: String,
    /// Zero-padded width of the frame number.
    pub digits: usize,
}

impl Default for FrameNaming {
    fn default() -> Self {
        Self {
            prefix: "frames__".into(),
            extension: "webp".into(),
            digits: 4,
        }
    }
}

/// Scroll region that drives the playhead and the timelines.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ScrollTriggerConfig {
    /// Scroll offset (px) where progress starts.
    pub start: f64,
    /// Scroll offset (px) where progress reaches 1; defaults to `duration`.
    pub end: Option<f64>,
    pub scrub: bool,
    pub pin: bool,
}

impl Default for ScrollTriggerConfig {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: None,
            scrub: true,
            pin: true,
        }
    }
}

/// Visibility windows and placement tuning for captions and stickers.
///
/// All durations are virtual timeline units, not seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ChoreographyConfig {
    /// Length of the window an item stays visible after its scheduled time.
    pub gap: f64,
    pub caption_fade_in: f64,
    pub sticker_fade_in: f64,
    pub fade_out: f64,
    pub dismiss_fade: f64,
    /// The intro overlay fades out over `[0, intro-fade]`.
    pub intro_fade: f64,
    /// Stickers rest this many pixels above their configured y.
    pub sticker_rise: f64,
    pub depth: DepthTable,
}

impl Default for ChoreographyConfig {
    fn default() -> Self {
        Self {
            gap: 0.02,
            caption_fade_in: 0.02,
            sticker_fade_in: 0.01,
            fade_out: 0.01,
            dismiss_fade: 0.1,
            intro_fade: 0.02,
            sticker_rise: 30.0,
            depth: DepthTable::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PhaseConfig {
    pub name: String,
    /// Timeline position where this phase takes over from the previous one.
    pub start: f64,
    pub axis: Axis,
    /// Relative movement along `axis` over the whole phase.
    #[serde(default)]
    pub by: Option<f64>,
    /// Move the depth axis in step with caption placement instead of `by`.
    #[serde(default)]
    pub follow_timeline: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct MotionConfig {
    pub phases: Vec<PhaseConfig>,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            phases: vec![
                PhaseConfig {
                    name: "advance".into(),
                    start: 0.0,
                    axis: Axis::Depth,
                    by: None,
                    follow_timeline: true,
                },
                PhaseConfig {
                    name: "lateral".into(),
                    start: 0.455,
                    axis: Axis::Lateral,
                    by: Some(-400.0),
                    follow_timeline: false,
                },
                PhaseConfig {
                    name: "retreat".into(),
                    start: 0.545,
                    axis: Axis::Depth,
                    by: Some(-1200.0),
                    follow_timeline: false,
                },
            ],
        }
    }
}

impl MotionConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            !self.phases.is_empty(),
            "motion.phases must include at least one phase"
        );
        ensure!(
            self.phases[0].start == 0.0,
            "motion.phases[0] must start at 0, got {}",
            self.phases[0].start
        );
        for pair in self.phases.windows(2) {
            ensure!(
                pair[1].start > pair[0].start,
                "motion phase {} must start after {} ({} <= {})",
                pair[1].name,
                pair[0].name,
                pair[1].start,
                pair[0].start
            );
        }
        for phase in &self.phases {
            ensure!(
                phase.start.is_finite(),
                "motion phase {} has a non-finite start",
                phase.name
            );
            match (phase.by, phase.follow_timeline) {
                (Some(_), true) => anyhow::bail!(
                    "motion phase {} sets both by and follow-timeline",
                    phase.name
                ),
                (None, false) => anyhow::bail!(
                    "motion phase {} needs either by or follow-timeline",
                    phase.name
                ),
                (None, true) => ensure!(
                    phase.axis == Axis::Depth,
                    "motion phase {}: follow-timeline only applies to the depth axis",
                    phase.name
                ),
                (Some(by), false) => ensure!(
                    by.is_finite(),
                    "motion phase {} has a non-finite by",
                    phase.name
                ),
            }
        }
        Ok(())
    }
}

/// An audio sprite played while the timeline is inside `[start, stop)`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AudioCueConfig {
    pub sprite: String,
    pub start: f64,
    pub stop: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Directory holding one sub-directory of frames per device.
    pub assets_root: PathBuf,
    /// Stable handle of the drawing surface.
    pub canvas_handle: String,
    /// Scroll distance (px) of the video section; also the depth unit scale.
    pub duration: f64,
    /// Number of frames in the captured sequence before reduction.
    pub total_frames: usize,
    /// Capture frame rate before reduction.
    pub base_frame_rate: f64,
    /// Number of frames fetched concurrently per batch.
    pub batch_size: usize,
    /// Share of frames that must be loaded before the loading screen lifts.
    pub ready_fraction: f64,
    /// The loading indicator never reports completion before this much time.
    #[serde(with = "humantime_serde")]
    pub min_loading_duration: Duration,
    pub frame_naming: FrameNaming,
    pub devices: DeviceTable,
    pub scroll_trigger: ScrollTriggerConfig,
    pub choreography: ChoreographyConfig,
    pub motion: MotionConfig,
    pub audio_cues: Vec<AudioCueConfig>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            assets_root: PathBuf::from("assets/frames"),
            canvas_handle: DEFAULT_CANVAS_HANDLE.into(),
            duration: 8000.0,
            total_frames: 1625,
            base_frame_rate: 25.0,
            batch_size: 10,
            ready_fraction: 0.5,
            min_loading_duration: Duration::ZERO,
            frame_naming: FrameNaming::default(),
            devices: DeviceTable::default(),
            scroll_trigger: ScrollTriggerConfig::default(),
            choreography: ChoreographyConfig::default(),
            motion: MotionConfig::default(),
            audio_cues: Vec::new(),
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    pub fn profile(&self, device: Device) -> DeviceProfile {
        let settings = self.devices.get(device);
        DeviceProfile {
            device,
            canvas_width: settings.width,
            canvas_height: settings.height,
            total_frame_count: self.total_frames,
            reducer: settings.reducer,
            base_frame_rate: self.base_frame_rate,
        }
    }

    /// Scroll offset where the video section ends.
    pub fn scroll_end(&self) -> f64 {
        self.scroll_trigger.end.unwrap_or(self.duration)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.total_frames > 0,
            "total-frames must be greater than zero"
        );
        ensure!(
            self.base_frame_rate.is_finite() && self.base_frame_rate > 0.0,
            "base-frame-rate must be positive"
        );
        ensure!(
            self.duration.is_finite() && self.duration > 0.0,
            "duration must be positive"
        );
        ensure!(self.batch_size > 0, "batch-size must be greater than zero");
        ensure!(
            self.ready_fraction > 0.0 && self.ready_fraction <= 1.0,
            "ready-fraction must be within (0, 1]"
        );
        ensure!(
            !self.canvas_handle.is_empty(),
            "canvas-handle must not be empty"
        );
        ensure!(
            self.frame_naming.digits > 0,
            "frame-naming.digits must be greater than zero"
        );
        ensure!(
            self.scroll_trigger.scrub,
            "scroll-trigger.scrub must be enabled; discrete playback is not supported"
        );
        ensure!(
            self.scroll_end() > self.scroll_trigger.start,
            "scroll-trigger.end must lie after scroll-trigger.start"
        );

        let choreo = &self.choreography;
        for (name, value) in [
            ("gap", choreo.gap),
            ("caption-fade-in", choreo.caption_fade_in),
            ("sticker-fade-in", choreo.sticker_fade_in),
            ("fade-out", choreo.fade_out),
            ("dismiss-fade", choreo.dismiss_fade),
            ("intro-fade", choreo.intro_fade),
        ] {
            ensure!(
                value.is_finite() && value >= 0.0,
                "choreography.{name} must be a non-negative number"
            );
        }
        ensure!(choreo.gap > 0.0, "choreography.gap must be positive");
        for (name, rule) in choreo.depth.rules() {
            rule_is_finite(name, rule)?;
        }

        self.motion.validate()?;
        for device in [Device::Mobile, Device::Desktop] {
            let settings = self.devices.get(device);
            ensure!(
                settings.width > 0 && settings.height > 0,
                "devices.{device} must have a non-empty canvas"
            );
            ensure!(
                settings.reducer.is_finite() && settings.reducer >= 1.0,
                "devices.{device}.reducer must be >= 1"
            );
            let profile = self.profile(device);
            ensure!(
                profile.frame_count() > 0,
                "devices.{device} resolves to zero frames"
            );
            let timeline = profile.timeline();
            MotionPlan::from_config(&self.motion, timeline, self.duration)
                .with_context(|| format!("invalid motion phases for {device}"))?;
            for cue in &self.audio_cues {
                ensure!(
                    cue.start >= 0.0 && cue.start < cue.stop && cue.stop <= timeline.length(),
                    "audio cue {} must satisfy 0 <= start < stop <= {:.4} on {device}",
                    cue.sprite,
                    timeline.length()
                );
            }
        }
        Ok(self)
    }
}

fn rule_is_finite(name: &str, rule: &DepthRule) -> Result<()> {
    ensure!(
        rule.sign.is_finite() && rule.offset.is_finite() && rule.x_offset.is_finite(),
        "choreography.depth.{name} must contain finite numbers"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_reference_deployment() {
        let cfg = Configuration::default().validated().unwrap();
        let profile = cfg.profile(Device::Desktop);
        assert_eq!(profile.frame_count(), 1083);
        assert!((profile.frame_rate() - 25.0 / 1.5).abs() < 1e-12);
        assert_eq!(cfg.scroll_end(), 8000.0);
    }

    #[test]
    fn rejects_zero_batch_size() {
        let cfg = Configuration {
            batch_size: 0,
            ..Configuration::default()
        };
        let err = cfg.validated().unwrap_err();
        assert!(err.to_string().contains("batch-size"));
    }

    #[test]
    fn rejects_phase_with_both_targets() {
        let mut cfg = Configuration::default();
        cfg.motion.phases[1].follow_timeline = true;
        assert!(cfg.validated().is_err());
    }

    #[test]
    fn rejects_phase_starting_past_the_timeline() {
        let mut cfg = Configuration::default();
        cfg.motion.phases[2].start = 5.0;
        let err = cfg.validated().unwrap_err();
        assert!(format!("{err:#}").contains("motion"));
    }
}
