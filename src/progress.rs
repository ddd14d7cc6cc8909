//! Loading progress: the real loaded count blended with a minimum-duration
//! estimate, reported as a percentage plus a one-shot completion.

use std::time::Duration;

use tracing::info;

/// Count of settled frames against the number needed to start playback.
///
/// `target` may be smaller than the frame count: playback starts once a
/// "good enough" share of the frames is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    loaded: usize,
    target: usize,
}

impl LoadProgress {
    pub fn new(target: usize) -> Self {
        Self { loaded: 0, target }
    }

    /// Target for `frame_count` frames when `ready_fraction` of them suffice.
    pub fn for_frames(frame_count: usize, ready_fraction: f64) -> Self {
        let target = (frame_count as f64 * ready_fraction).ceil() as usize;
        Self::new(target.clamp(1, frame_count.max(1)))
    }

    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn target(&self) -> usize {
        self.target
    }

    /// Count one more settled frame. The count never goes down.
    pub fn record(&mut self) {
        self.loaded = self.loaded.saturating_add(1);
    }

    pub fn ratio(&self) -> f64 {
        if self.target == 0 {
            return 1.0;
        }
        (self.loaded as f64 / self.target as f64).clamp(0.0, 1.0)
    }

    /// Whole percent, rounded down so that 100 means the target is reached.
    pub fn percent(&self) -> u8 {
        (self.ratio() * 100.0).floor() as u8
    }

    pub fn is_complete(&self) -> bool {
        self.loaded >= self.target
    }
}

/// Receives what the loading screen shows.
pub trait ProgressDisplay {
    fn show_percent(&mut self, percent: u8);
    /// Called once, when loading is declared complete.
    fn complete(&mut self, elapsed: Duration);
}

/// Display that writes progress to the log.
#[derive(Debug, Default)]
pub struct LogProgressDisplay;

impl ProgressDisplay for LogProgressDisplay {
    fn show_percent(&mut self, percent: u8) {
        info!(percent, "loading");
    }

    fn complete(&mut self, elapsed: Duration) {
        info!(
            elapsed = %humantime::format_duration(elapsed),
            "total loading time"
        );
    }
}

/// What a display should do after an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUpdate {
    Percent(u8),
    Complete,
}

/// Turns progress observations into display updates.
///
/// The shown value is the larger of the real progress and
/// `elapsed / min_duration`; it never goes down, stays below 100 until the
/// real progress is complete and the minimum duration has passed, and
/// completion is reported exactly once.
#[derive(Debug, Clone)]
pub struct ProgressMeter {
    min_duration: Duration,
    shown: Option<u8>,
    completed: bool,
}

impl ProgressMeter {
    pub fn new(min_duration: Duration) -> Self {
        Self {
            min_duration,
            shown: None,
            completed: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn shown(&self) -> Option<u8> {
        self.shown
    }

    fn time_ratio(&self, elapsed: Duration) -> f64 {
        if self.min_duration.is_zero() {
            return 0.0;
        }
        (elapsed.as_secs_f64() / self.min_duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    pub fn observe(&mut self, progress: LoadProgress, elapsed: Duration) -> Vec<ProgressUpdate> {
        if self.completed {
            return Vec::new();
        }
        let done = progress.is_complete() && elapsed >= self.min_duration;
        let blended = progress.ratio().max(self.time_ratio(elapsed));
        let mut percent = (blended * 100.0).floor() as u8;
        if !done {
            percent = percent.min(99);
        }
        let percent = self.shown.map_or(percent, |prev| prev.max(percent));

        let mut updates = Vec::new();
        if self.shown != Some(percent) {
            self.shown = Some(percent);
            updates.push(ProgressUpdate::Percent(percent));
        }
        if done {
            self.completed = true;
            updates.push(ProgressUpdate::Complete);
        }
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(loaded: usize, target: usize) -> LoadProgress {
        let mut p = LoadProgress::new(target);
        for _ in 0..loaded {
            p.record();
        }
        p
    }

    #[test]
    fn ratio_is_clamped() {
        assert_eq!(progress(0, 10).ratio(), 0.0);
        assert_eq!(progress(5, 10).percent(), 50);
        assert_eq!(progress(25, 10).ratio(), 1.0);
        assert_eq!(progress(25, 10).percent(), 100);
    }

    #[test]
    fn target_uses_ready_fraction() {
        assert_eq!(LoadProgress::for_frames(1083, 0.5).target(), 542);
        assert_eq!(LoadProgress::for_frames(10, 1.0).target(), 10);
        assert_eq!(LoadProgress::for_frames(1, 0.01).target(), 1);
    }

    #[test]
    fn completion_fires_once() {
        let mut meter = ProgressMeter::new(Duration::ZERO);
        assert_eq!(
            meter.observe(progress(1, 2), Duration::ZERO),
            vec![ProgressUpdate::Percent(50)]
        );
        assert_eq!(
            meter.observe(progress(2, 2), Duration::ZERO),
            vec![ProgressUpdate::Percent(100), ProgressUpdate::Complete]
        );
        assert!(meter.observe(progress(3, 2), Duration::ZERO).is_empty());
        assert!(meter.is_complete());
    }

    #[test]
    fn minimum_duration_holds_back_completion() {
        let mut meter = ProgressMeter::new(Duration::from_secs(2));
        assert_eq!(
            meter.observe(progress(10, 10), Duration::from_millis(500)),
            vec![ProgressUpdate::Percent(99)]
        );
        assert!(!meter.is_complete());
        assert_eq!(
            meter.observe(progress(10, 10), Duration::from_secs(2)),
            vec![ProgressUpdate::Percent(100), ProgressUpdate::Complete]
        );
    }

    #[test]
    fn time_estimate_leads_but_never_regresses() {
        let mut meter = ProgressMeter::new(Duration::from_secs(10));
        assert_eq!(
            meter.observe(progress(1, 10), Duration::from_secs(5)),
            vec![ProgressUpdate::Percent(50)]
        );
        // real progress jumped ahead of the clock
        assert_eq!(
            meter.observe(progress(8, 10), Duration::from_secs(6)),
            vec![ProgressUpdate::Percent(80)]
        );
        // clock behind real progress: shown value holds
        assert!(
            meter
                .observe(progress(8, 10), Duration::from_secs(7))
                .is_empty()
        );
        assert_eq!(meter.shown(), Some(80));
    }
}
