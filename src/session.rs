//! One scroll-driven playback session.
//!
//! The session owns everything the scroll position drives. Applying a
//! progress value is a single non-blocking step: the playhead, captions,
//! camera and audio cues are all recomputed from that one value, and the
//! only state kept between steps is what was last applied.

use crate::config::Configuration;
use crate::error::Result;
use crate::events::{AudioCommand, FrameLoaded, TimelineEvent};
use crate::frames::DeviceProfile;
use crate::render::playhead::{Playhead, RenderOutcome};
use crate::timeline::audio::AudioCues;
use crate::timeline::choreo::{Choreographer, ItemId, TimelineData};
use crate::timeline::motion::{CameraPose, MotionPlan};
use crate::timeline::{ScrollTrigger, VirtualTimeline, clamp_progress};

/// Everything that changed (or holds) after one scroll step.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneUpdate {
    pub progress: f64,
    /// Position on the virtual timeline.
    pub time: f64,
    pub frame: RenderOutcome,
    pub camera: CameraPose,
    pub phase: String,
    pub visible: Vec<ItemId>,
    pub intro_opacity: f64,
    pub events: Vec<TimelineEvent>,
    pub audio: Vec<AudioCommand>,
}

#[derive(Debug)]
pub struct ScrollSession {
    profile: DeviceProfile,
    timeline: VirtualTimeline,
    trigger: ScrollTrigger,
    playhead: Playhead,
    choreographer: Choreographer,
    motion: MotionPlan,
    audio: AudioCues,
    progress: Option<f64>,
}

impl ScrollSession {
    pub fn new(cfg: &Configuration, profile: DeviceProfile, data: &TimelineData) -> Result<Self> {
        let timeline = profile.timeline();
        let motion = MotionPlan::from_config(&cfg.motion, timeline, cfg.duration)?;
        let choreographer = Choreographer::new(data, &cfg.choreography, timeline, cfg.duration)?;
        tracing::info!(
            device = %profile.device,
            frames = profile.frame_count(),
            frame_rate = profile.frame_rate(),
            length = timeline.length(),
            "scroll session ready"
        );
        Ok(Self {
            profile,
            timeline,
            trigger: ScrollTrigger::from_config(cfg),
            playhead: Playhead::new(&profile, &cfg.canvas_handle),
            choreographer,
            motion,
            audio: AudioCues::new(&cfg.audio_cues),
            progress: None,
        })
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn timeline(&self) -> VirtualTimeline {
        self.timeline
    }

    pub fn trigger(&self) -> &ScrollTrigger {
        &self.trigger
    }

    pub fn playhead(&self) -> &Playhead {
        &self.playhead
    }

    pub fn choreographer(&self) -> &Choreographer {
        &self.choreographer
    }

    pub fn motion(&self) -> &MotionPlan {
        &self.motion
    }

    /// Last applied progress, if any.
    pub fn progress(&self) -> Option<f64> {
        self.progress
    }

    /// Apply observer progress. Values outside `[0, 1]` are clamped; NaN is
    /// ignored and the previous state stays on screen.
    pub fn apply(&mut self, progress: f64) -> Option<SceneUpdate> {
        let progress = clamp_progress(progress)?;
        self.progress = Some(progress);
        let time = self.timeline.position(progress);
        let frame = self.playhead.seek(progress);
        let events = self.choreographer.update(time);
        let audio = self.audio.update(time);
        Some(SceneUpdate {
            progress,
            time,
            frame,
            camera: self.motion.sample(time),
            phase: self.motion.phase_at(time).name.clone(),
            visible: self.choreographer.visible(),
            intro_opacity: self.choreographer.intro_opacity(time),
            events,
            audio,
        })
    }

    /// Apply a raw scroll offset in pixels through the scroll trigger.
    pub fn apply_offset(&mut self, offset: f64) -> Option<SceneUpdate> {
        let progress = self.trigger.progress(offset);
        self.apply(progress)
    }

    pub fn frame_loaded(&mut self, frame: FrameLoaded) -> Option<RenderOutcome> {
        self.playhead.insert(frame)
    }

    pub fn dismiss(&mut self, id: ItemId) -> Result<Option<TimelineEvent>> {
        self.choreographer.dismiss(id)
    }
}
