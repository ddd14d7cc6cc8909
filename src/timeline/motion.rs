//! Camera motion phases over the virtual timeline.
//!
//! The camera moves along one axis at a time. Phases tile `[0, L]` with no
//! gaps or overlaps; each one starts where the previous one left both axes,
//! so sampling is continuous across phase boundaries.

use serde::Deserialize;
use tracing::debug;

use super::{TIMELINE_EPSILON, VirtualTimeline};
use crate::config::MotionConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Axis {
    /// Into/out of the screen (the `z` translation of the caption layer).
    Depth,
    /// Sideways (the `x` translation of the caption layer).
    Lateral,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraPose {
    pub x: f64,
    pub depth: f64,
}

impl CameraPose {
    fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Depth => self.depth,
            Axis::Lateral => self.x,
        }
    }

    fn with(mut self, axis: Axis, value: f64) -> Self {
        match axis {
            Axis::Depth => self.depth = value,
            Axis::Lateral => self.x = value,
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionPhase {
    pub name: String,
    pub start: f64,
    pub duration: f64,
    pub axis: Axis,
    pub from: f64,
    pub to: f64,
}

impl MotionPhase {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    fn value_at(&self, time: f64) -> f64 {
        if self.duration <= 0.0 {
            return self.to;
        }
        let k = ((time - self.start) / self.duration).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * k
    }
}

#[derive(Debug, Clone)]
pub struct MotionPlan {
    length: f64,
    phases: Vec<MotionPhase>,
}

impl MotionPlan {
    /// Validate explicit phases against a timeline of `length`.
    pub fn new(length: f64, phases: Vec<MotionPhase>) -> Result<Self> {
        let Some(first) = phases.first() else {
            return Err(Error::PhaseLayout("no phases configured".into()));
        };
        if first.start.abs() > TIMELINE_EPSILON {
            return Err(Error::PhaseLayout(format!(
                "first phase {} starts at {} instead of 0",
                first.name, first.start
            )));
        }
        let mut pose = CameraPose::default();
        let mut cursor = 0.0;
        let mut total = 0.0;
        for phase in &phases {
            if phase.duration.is_nan() || phase.duration < 0.0 {
                return Err(Error::PhaseLayout(format!(
                    "phase {} has negative duration {}",
                    phase.name, phase.duration
                )));
            }
            if (phase.start - cursor).abs() > TIMELINE_EPSILON {
                return Err(Error::PhaseLayout(format!(
                    "phase {} starts at {} but the previous phase ends at {}",
                    phase.name, phase.start, cursor
                )));
            }
            if (phase.from - pose.get(phase.axis)).abs() > TIMELINE_EPSILON {
                return Err(Error::PhaseLayout(format!(
                    "phase {} starts its {:?} motion at {} instead of {}",
                    phase.name,
                    phase.axis,
                    phase.from,
                    pose.get(phase.axis)
                )));
            }
            pose = pose.with(phase.axis, phase.to);
            cursor = phase.end();
            total += phase.duration;
        }
        if (total - length).abs() > TIMELINE_EPSILON {
            return Err(Error::PhaseLayout(format!(
                "phase durations sum to {total} but the timeline is {length} long"
            )));
        }
        Ok(Self { length, phases })
    }

    /// Build the plan from configured phase starts; the last phase runs to
    /// the end of the timeline.
    pub fn from_config(
        cfg: &MotionConfig,
        timeline: VirtualTimeline,
        duration_units: f64,
    ) -> Result<Self> {
        let length = timeline.length();
        let mut pose = CameraPose::default();
        let mut phases = Vec::with_capacity(cfg.phases.len());
        for (i, phase) in cfg.phases.iter().enumerate() {
            let end = cfg.phases.get(i + 1).map_or(length, |next| next.start);
            if phase.start >= length {
                return Err(Error::PhaseLayout(format!(
                    "phase {} starts at {} but the timeline ends at {length}",
                    phase.name, phase.start
                )));
            }
            let duration = end - phase.start;
            let delta = match phase.by {
                Some(by) => by,
                None => duration_units * duration / length,
            };
            let from = pose.get(phase.axis);
            pose = pose.with(phase.axis, from + delta);
            phases.push(MotionPhase {
                name: phase.name.clone(),
                start: phase.start,
                duration,
                axis: phase.axis,
                from,
                to: from + delta,
            });
        }
        let plan = Self::new(length, phases)?;
        debug!(
            phases = ?plan.phases.iter().map(|p| (&p.name, p.start, p.duration)).collect::<Vec<_>>(),
            "motion plan ready"
        );
        Ok(plan)
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn phases(&self) -> &[MotionPhase] {
        &self.phases
    }

    pub fn phase_at(&self, time: f64) -> &MotionPhase {
        let time = time.clamp(0.0, self.length);
        let idx = self
            .phases
            .partition_point(|p| p.start <= time)
            .saturating_sub(1);
        &self.phases[idx]
    }

    /// Camera pose at timeline position `time` (clamped to `[0, L]`).
    pub fn sample(&self, time: f64) -> CameraPose {
        let time = time.clamp(0.0, self.length);
        let mut pose = CameraPose::default();
        for phase in &self.phases {
            if phase.start > time {
                break;
            }
            pose = pose.with(phase.axis, phase.value_at(time));
        }
        pose
    }
}
