use std::collections::HashMap;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use scroll_reel::config::{Configuration, DeviceSettings, FrameNaming, PhaseConfig};
use scroll_reel::events::{FrameLoaded, TimelineEvent};
use scroll_reel::frames::{Device, FrameCatalog};
use scroll_reel::progress::LoadProgress;
use scroll_reel::session::ScrollSession;
use scroll_reel::tasks;
use scroll_reel::tasks::loader::DiskFetcher;
use scroll_reel::timeline::audio::AudioEngine;
use scroll_reel::timeline::choreo::{CaptionEntry, ItemId, StickerEntry, TimelineData};
use scroll_reel::timeline::motion::Axis;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

fn ten_captions() -> TimelineData {
    TimelineData {
        timelines: (0..10)
            .map(|k| CaptionEntry {
                time: 0.02 + k as f64 * 0.06,
                x: 0.0,
                y: 0.0,
                copy: format!("caption {k}"),
                horizontal: k % 2 == 1,
                backwards: k >= 8,
            })
            .collect(),
        stickers: vec![],
    }
}

fn sweep(steps: usize) -> (ScrollSession, HashMap<ItemId, Vec<TimelineEvent>>) {
    let cfg = Configuration::default();
    let profile = cfg.profile(Device::Desktop);
    let data = ten_captions();
    let mut session = ScrollSession::new(&cfg, profile, &data).unwrap();
    let gap = cfg.choreography.gap;
    let mut seen: HashMap<ItemId, Vec<TimelineEvent>> = HashMap::new();

    for step in 0..=steps {
        let update = session.apply(step as f64 / steps as f64).unwrap();
        for (k, entry) in data.timelines.iter().enumerate() {
            let id = ItemId(k);
            let expected = update.time >= entry.time && update.time < entry.time + gap;
            assert_eq!(
                update.visible.contains(&id),
                expected,
                "{id} at time {}",
                update.time
            );
        }
        for event in update.events {
            seen.entry(event.id()).or_default().push(event);
        }
    }
    (session, seen)
}

fn assert_appear_then_disappear(seen: &HashMap<ItemId, Vec<TimelineEvent>>) {
    assert_eq!(seen.len(), 10);
    for (id, events) in seen {
        assert_eq!(events.len(), 2, "{id}: {events:?}");
        assert!(matches!(events[0], TimelineEvent::Appear { .. }), "{id}: {events:?}");
        assert!(matches!(events[1], TimelineEvent::Disappear { .. }), "{id}: {events:?}");
    }
}

#[test]
fn fine_sweep_shows_each_caption_only_inside_its_window() {
    let (session, seen) = sweep(4000);
    assert_appear_then_disappear(&seen);
    assert!(session.choreographer().visible().is_empty());
}

#[test]
fn coarse_sweep_still_pairs_every_transition() {
    let (_, seen) = sweep(10);
    assert_appear_then_disappear(&seen);
}

#[test]
fn scrubbing_backwards_replays_the_window() {
    let cfg = Configuration::default();
    let profile = cfg.profile(Device::Desktop);
    let mut session = ScrollSession::new(&cfg, profile, &ten_captions()).unwrap();
    let length = session.timeline().length();
    let inside = (0.02 + 0.01) / length;

    let update = session.apply(inside).unwrap();
    assert_eq!(update.visible, vec![ItemId(0)]);
    let update = session.apply(0.0).unwrap();
    assert!(update.visible.is_empty());
    assert!(matches!(update.events[..], [TimelineEvent::Disappear { id: ItemId(0), .. }]));
    let update = session.apply(inside).unwrap();
    assert!(matches!(update.events[..], [TimelineEvent::Appear { id: ItemId(0), .. }]));
}

#[test]
fn camera_follows_phases_across_the_sweep() {
    let cfg = Configuration::default();
    let profile = cfg.profile(Device::Desktop);
    let mut session = ScrollSession::new(&cfg, profile, &ten_captions()).unwrap();
    let start = session.apply(0.0).unwrap();
    assert_eq!(start.phase, "advance");
    assert_eq!(start.camera.x, 0.0);
    assert_eq!(start.camera.depth, 0.0);

    let end = session.apply(1.0).unwrap();
    assert_eq!(end.phase, "retreat");
    assert!((end.camera.x + 400.0).abs() < 1e-6);
    let advance = session.motion().phases()[0].to;
    assert!((end.camera.depth - (advance - 1200.0)).abs() < 1e-6);
    assert!(advance > 0.0);
}

#[derive(Default)]
struct NullAudio;

impl AudioEngine for NullAudio {
    fn start(&mut self, _sprite: &str) {}
    fn stop(&mut self, _sprite: &str) {}
}

fn tiny_config(root: &std::path::Path) -> Configuration {
    let mut cfg = Configuration {
        assets_root: root.to_path_buf(),
        total_frames: 6,
        batch_size: 2,
        frame_naming: FrameNaming {
            extension: "png".into(),
            ..FrameNaming::default()
        },
        ..Configuration::default()
    };
    cfg.devices.desktop = DeviceSettings {
        width: 4,
        height: 3,
        reducer: 1.5,
    };
    // the whole timeline is only 0.0024 long
    cfg.choreography.gap = 0.001;
    cfg.motion.phases = vec![PhaseConfig {
        name: "advance".into(),
        start: 0.0,
        axis: Axis::Depth,
        by: None,
        follow_timeline: true,
    }];
    cfg
}

fn shade(number: usize) -> Rgba<u8> {
    Rgba([number as u8 * 40, 0, 0, 255])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn frames_on_disk_reach_the_canvas_through_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let device_dir = dir.path().join("desktop");
    std::fs::create_dir_all(&device_dir).unwrap();
    for number in 1..=6 {
        RgbaImage::from_pixel(4, 3, shade(number))
            .save(device_dir.join(format!("frames__{number:04}.png")))
            .unwrap();
    }

    let cfg = tiny_config(dir.path());
    let profile = cfg.profile(Device::Desktop);
    assert_eq!(profile.frame_count(), 4);
    let catalog = FrameCatalog::scan(&cfg.assets_root).unwrap();
    let assets = catalog.assets(&profile, &cfg.frame_naming).unwrap();
    let sources: Vec<_> = assets.iter().map(|a| a.url.to_string()).collect();
    assert_eq!(
        sources,
        vec![
            "desktop/frames__0001.png",
            "desktop/frames__0002.png",
            "desktop/frames__0004.png",
            "desktop/frames__0005.png",
        ]
    );

    let data = TimelineData {
        timelines: vec![],
        stickers: vec![StickerEntry {
            time: 0.0,
            x: 1.0,
            y: 40.0,
            copy: "hello".into(),
            color: "yellow".into(),
        }],
    };
    let session = ScrollSession::new(&cfg, profile, &data).unwrap();

    let (loaded_tx, loaded_rx) = mpsc::channel::<FrameLoaded>(8);
    let (progress_tx, progress_rx) =
        watch::channel(LoadProgress::for_frames(profile.frame_count(), cfg.ready_fraction));
    let (scroll_tx, scroll_rx) = watch::channel(0.0_f64);
    let (dismiss_tx, dismiss_rx) = mpsc::channel::<ItemId>(4);
    let cancel = CancellationToken::new();

    let scroll = tokio::spawn(tasks::scroll::run(
        session,
        scroll_rx,
        loaded_rx,
        dismiss_rx,
        NullAudio,
        cancel.clone(),
    ));
    scroll_tx.send_replace(1.0);

    let report = tasks::loader::run(
        assets,
        Arc::new(DiskFetcher),
        cfg.batch_size,
        loaded_tx,
        progress_tx,
        cancel.clone(),
    )
    .await
    .unwrap();
    assert_eq!(report.loaded, 4);
    assert_eq!(report.batches, 2);
    assert!(progress_rx.borrow().is_complete());

    dismiss_tx.send(ItemId(0)).await.unwrap();
    drop(dismiss_tx);
    // let the dismissal land before the scroll source closes
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    drop(scroll_tx);

    let session = tokio::time::timeout(std::time::Duration::from_secs(5), scroll)
        .await
        .expect("scroll task did not exit")
        .unwrap()
        .unwrap();
    let playhead = session.playhead();
    assert_eq!(playhead.loaded_count(), 4);
    assert_eq!(playhead.current_index(), 3);
    assert_eq!(playhead.canvas().drawn(), Some(3));
    assert_eq!(playhead.canvas().pixels().get_pixel(0, 0), &shade(5));
    assert!(session.choreographer().is_dismissed(ItemId(0)));
}

#[test]
fn missing_frame_fails_before_loading_starts() {
    let dir = tempfile::tempdir().unwrap();
    let device_dir = dir.path().join("desktop");
    std::fs::create_dir_all(&device_dir).unwrap();
    for number in [1, 2, 5] {
        RgbaImage::from_pixel(4, 3, shade(number))
            .save(device_dir.join(format!("frames__{number:04}.png")))
            .unwrap();
    }
    let cfg = tiny_config(dir.path());
    let catalog = FrameCatalog::scan(&cfg.assets_root).unwrap();
    let err = catalog
        .assets(&cfg.profile(Device::Desktop), &cfg.frame_naming)
        .unwrap_err();
    assert!(err.to_string().contains("frames__0004.png"), "{err}");
}
