//! Audio cue windows keyed to the virtual timeline.
//!
//! Playback belongs to an external sprite engine; this only decides when to
//! call start and stop.

use tracing::{debug, info};

use crate::config::AudioCueConfig;
use crate::events::AudioCommand;

/// External audio sprite player.
pub trait AudioEngine {
    fn start(&mut self, sprite: &str);
    fn stop(&mut self, sprite: &str);

    fn apply(&mut self, command: &AudioCommand) {
        match command {
            AudioCommand::Start { sprite } => self.start(sprite),
            AudioCommand::Stop { sprite } => self.stop(sprite),
        }
    }
}

/// Engine that only logs, for headless runs.
#[derive(Debug, Default)]
pub struct LogAudioEngine;

impl AudioEngine for LogAudioEngine {
    fn start(&mut self, sprite: &str) {
        info!(sprite, "audio start");
    }

    fn stop(&mut self, sprite: &str) {
        info!(sprite, "audio stop");
    }
}

#[derive(Debug, Clone)]
struct Cue {
    sprite: String,
    start: f64,
    stop: f64,
    active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AudioCues {
    cues: Vec<Cue>,
}

impl AudioCues {
    pub fn new(cues: &[AudioCueConfig]) -> Self {
        Self {
            cues: cues
                .iter()
                .map(|c| Cue {
                    sprite: c.sprite.clone(),
                    start: c.start,
                    stop: c.stop,
                    active: false,
                })
                .collect(),
        }
    }

    pub fn active(&self) -> impl Iterator<Item = &str> {
        self.cues
            .iter()
            .filter(|c| c.active)
            .map(|c| c.sprite.as_str())
    }

    /// Start cues the timeline entered and stop the ones it left. A window
    /// jumped over in one update stays silent.
    pub fn update(&mut self, time: f64) -> Vec<AudioCommand> {
        let mut commands = Vec::new();
        for cue in &mut self.cues {
            let inside = time >= cue.start && time < cue.stop;
            if inside == cue.active {
                continue;
            }
            cue.active = inside;
            let sprite = cue.sprite.clone();
            commands.push(if inside {
                AudioCommand::Start { sprite }
            } else {
                AudioCommand::Stop { sprite }
            });
        }
        if !commands.is_empty() {
            debug!(time, ?commands, "audio cue changes");
        }
        commands
    }
}
