//! Captions and stickers scheduled against the virtual timeline.
//!
//! Each item is placed once (x, y and, for captions, a depth in the same
//! unit space as the camera motion) and is only visible inside a short
//! window `[time, time + gap)`. Scrubbing diffs the new position against
//! the last applied one and emits appear/disappear transitions.

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use super::VirtualTimeline;
use crate::config::ChoreographyConfig;
use crate::error::{Error, Result};
use crate::events::TimelineEvent;

/// `sign * base + offset` in depth, `x + x_offset` sideways.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DepthRule {
    pub sign: f64,
    pub offset: f64,
    #[serde(default)]
    pub x_offset: f64,
}

impl DepthRule {
    const fn new(offset: f64, x_offset: f64) -> Self {
        Self {
            sign: -1.0,
            offset,
            x_offset,
        }
    }
}

/// Placement rules for the four flag combinations, tuned per deployment so
/// captions met during different camera phases do not overlap.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct DepthTable {
    pub plain: DepthRule,
    pub horizontal: DepthRule,
    pub backwards: DepthRule,
    pub horizontal_backwards: DepthRule,
}

impl Default for DepthTable {
    fn default() -> Self {
        Self {
            plain: DepthRule::new(0.0, 0.0),
            horizontal: DepthRule::new(200.0, 0.0),
            backwards: DepthRule::new(1450.0, 350.0),
            horizontal_backwards: DepthRule::new(200.0, 350.0),
        }
    }
}

impl DepthTable {
    pub fn rule(&self, flags: ItemFlags) -> &DepthRule {
        match (flags.horizontal, flags.backwards) {
            (false, false) => &self.plain,
            (true, false) => &self.horizontal,
            (false, true) => &self.backwards,
            (true, true) => &self.horizontal_backwards,
        }
    }

    pub fn rules(&self) -> [(&'static str, &DepthRule); 4] {
        [
            ("plain", &self.plain),
            ("horizontal", &self.horizontal),
            ("backwards", &self.backwards),
            ("horizontal-backwards", &self.horizontal_backwards),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptionEntry {
    pub time: f64,
    pub x: f64,
    pub y: f64,
    pub copy: String,
    #[serde(default)]
    pub horizontal: bool,
    #[serde(default)]
    pub backwards: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StickerEntry {
    pub time: f64,
    pub x: f64,
    pub y: f64,
    pub copy: String,
    pub color: String,
}

/// The timeline data file: captions (`timelines`) and dismissible `stickers`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimelineData {
    #[serde(default)]
    pub timelines: Vec<CaptionEntry>,
    #[serde(default)]
    pub stickers: Vec<StickerEntry>,
}

impl TimelineData {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&s)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub usize);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemFlags {
    pub horizontal: bool,
    pub backwards: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Caption,
    Sticker { color: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineItem {
    pub id: ItemId,
    pub time: f64,
    pub x: f64,
    pub y: f64,
    pub copy: String,
    pub flags: ItemFlags,
    pub kind: ItemKind,
}

/// Where an item sits on screen. Stickers carry no depth; they slide up from
/// `from_y` to `y` when they appear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub from_y: f64,
    pub depth: Option<f64>,
}

/// Depth of a caption scheduled at `time`, before the flag adjustment.
pub fn base_depth(time: f64, frame_rate: f64, duration_units: f64, frame_count: usize) -> f64 {
    time * 100.0 * frame_rate * duration_units / frame_count as f64
}

#[derive(Debug, Clone)]
struct Scheduled {
    item: TimelineItem,
    placement: Placement,
    fade_in: f64,
    visible: bool,
    dismissed: bool,
}

impl Scheduled {
    fn window_end(&self, gap: f64) -> f64 {
        self.item.time + gap
    }

    fn in_window(&self, time: f64, gap: f64) -> bool {
        time >= self.item.time && time < self.window_end(gap)
    }
}

#[derive(Debug, Clone)]
pub struct Choreographer {
    items: Vec<Scheduled>,
    gap: f64,
    fade_out: f64,
    dismiss_fade: f64,
    intro_fade: f64,
    last_time: Option<f64>,
}

impl Choreographer {
    pub fn new(
        data: &TimelineData,
        cfg: &ChoreographyConfig,
        timeline: VirtualTimeline,
        duration_units: f64,
    ) -> Result<Self> {
        let mut items = Vec::with_capacity(data.timelines.len() + data.stickers.len());

        for entry in &data.timelines {
            check_time(&entry.copy, entry.time, cfg.gap, timeline)?;
            let flags = ItemFlags {
                horizontal: entry.horizontal,
                backwards: entry.backwards,
            };
            let rule = cfg.depth.rule(flags);
            let base = base_depth(
                entry.time,
                timeline.frame_rate(),
                duration_units,
                timeline.frame_count(),
            );
            let item = TimelineItem {
                id: ItemId(items.len()),
                time: entry.time,
                x: entry.x,
                y: entry.y,
                copy: entry.copy.clone(),
                flags,
                kind: ItemKind::Caption,
            };
            let placement = Placement {
                x: entry.x + rule.x_offset,
                y: entry.y,
                from_y: entry.y,
                depth: Some(rule.sign * base + rule.offset),
            };
            items.push(Scheduled {
                item,
                placement,
                fade_in: cfg.caption_fade_in,
                visible: false,
                dismissed: false,
            });
        }

        for entry in &data.stickers {
            check_time(&entry.copy, entry.time, cfg.gap, timeline)?;
            let item = TimelineItem {
                id: ItemId(items.len()),
                time: entry.time,
                x: entry.x,
                y: entry.y,
                copy: entry.copy.clone(),
                flags: ItemFlags::default(),
                kind: ItemKind::Sticker {
                    color: entry.color.clone(),
                },
            };
            let placement = Placement {
                x: entry.x,
                y: entry.y - cfg.sticker_rise,
                from_y: entry.y,
                depth: None,
            };
            items.push(Scheduled {
                item,
                placement,
                fade_in: cfg.sticker_fade_in,
                visible: false,
                dismissed: false,
            });
        }

        info!(
            captions = data.timelines.len(),
            stickers = data.stickers.len(),
            "timeline items scheduled"
        );
        Ok(Self {
            items,
            gap: cfg.gap,
            fade_out: cfg.fade_out,
            dismiss_fade: cfg.dismiss_fade,
            intro_fade: cfg.intro_fade,
            last_time: None,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &TimelineItem> {
        self.items.iter().map(|s| &s.item)
    }

    pub fn item(&self, id: ItemId) -> Option<&TimelineItem> {
        self.items.get(id.0).map(|s| &s.item)
    }

    pub fn placement(&self, id: ItemId) -> Option<Placement> {
        self.items.get(id.0).map(|s| s.placement)
    }

    /// `[appear, disappear)` of an item.
    pub fn window(&self, id: ItemId) -> Option<(f64, f64)> {
        self.items
            .get(id.0)
            .map(|s| (s.item.time, s.window_end(self.gap)))
    }

    pub fn is_visible(&self, id: ItemId) -> bool {
        self.items.get(id.0).is_some_and(|s| s.visible)
    }

    pub fn is_dismissed(&self, id: ItemId) -> bool {
        self.items.get(id.0).is_some_and(|s| s.dismissed)
    }

    pub fn visible(&self) -> Vec<ItemId> {
        self.items
            .iter()
            .filter(|s| s.visible)
            .map(|s| s.item.id)
            .collect()
    }

    /// Opacity at `time`: ramps in over the item's fade-in, 0 outside its
    /// window or once dismissed.
    pub fn opacity_at(&self, id: ItemId, time: f64) -> f64 {
        let Some(s) = self.items.get(id.0) else {
            return 0.0;
        };
        if s.dismissed || !s.in_window(time, self.gap) {
            return 0.0;
        }
        if s.fade_in <= 0.0 {
            return 1.0;
        }
        ((time - s.item.time) / s.fade_in).clamp(0.0, 1.0)
    }

    /// The intro overlay fades out at the very start of the timeline.
    pub fn intro_opacity(&self, time: f64) -> f64 {
        if self.intro_fade <= 0.0 {
            return if time > 0.0 { 0.0 } else { 1.0 };
        }
        1.0 - (time / self.intro_fade).clamp(0.0, 1.0)
    }

    /// Move to timeline position `time` and report visibility changes.
    ///
    /// An item whose whole window was skipped by this update still gets its
    /// appear and disappear, in that order.
    pub fn update(&mut self, time: f64) -> Vec<TimelineEvent> {
        let previous = self.last_time.replace(time);
        let gap = self.gap;
        let fade_out = self.fade_out;
        let mut events = Vec::new();
        for s in self.items.iter_mut().filter(|s| !s.dismissed) {
            let id = s.item.id;
            let now_visible = s.in_window(time, gap);
            match (s.visible, now_visible) {
                (false, true) => events.push(TimelineEvent::Appear {
                    id,
                    fade: s.fade_in,
                }),
                (true, false) => events.push(TimelineEvent::Disappear {
                    id,
                    fade: fade_out,
                }),
                (false, false) => {
                    if let Some(prev) = previous {
                        let (lo, hi) = if prev <= time { (prev, time) } else { (time, prev) };
                        if lo < s.item.time && hi >= s.window_end(gap) {
                            events.push(TimelineEvent::Appear {
                                id,
                                fade: s.fade_in,
                            });
                            events.push(TimelineEvent::Disappear {
                                id,
                                fade: fade_out,
                            });
                        }
                    }
                }
                (true, true) => {}
            }
            s.visible = now_visible;
        }
        if !events.is_empty() {
            debug!(time, count = events.len(), "timeline transitions");
        }
        events
    }

    /// Hide a sticker for good. Repeated dismissals return `None`.
    pub fn dismiss(&mut self, id: ItemId) -> Result<Option<TimelineEvent>> {
        let s = self.items.get_mut(id.0).ok_or(Error::UnknownItem(id.0))?;
        if s.item.kind == ItemKind::Caption {
            return Err(Error::NotDismissible(id.0));
        }
        if s.dismissed {
            return Ok(None);
        }
        s.dismissed = true;
        s.visible = false;
        debug!(%id, copy = %s.item.copy, "sticker dismissed");
        Ok(Some(TimelineEvent::Dismissed {
            id,
            fade: self.dismiss_fade,
        }))
    }
}

// The whole visibility window has to fit, or the item could never leave.
fn check_time(copy: &str, time: f64, gap: f64, timeline: VirtualTimeline) -> Result<()> {
    if time.is_finite() && timeline.contains(time) && timeline.contains(time + gap) {
        Ok(())
    } else {
        Err(Error::ItemOutOfRange {
            copy: copy.to_string(),
            time,
            gap,
            length: timeline.length(),
        })
    }
}
