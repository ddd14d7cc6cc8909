//! Binary entrypoint for scroll-reel.
//!
//! Loads the frame set with live progress, then plays it back from scroll
//! offsets read line by line on stdin (`<offset-px>` or `dismiss <id>`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use scroll_reel::config::Configuration;
use scroll_reel::events::FrameLoaded;
use scroll_reel::frames::{Device, FrameCatalog};
use scroll_reel::progress::{LoadProgress, LogProgressDisplay};
use scroll_reel::session::ScrollSession;
use scroll_reel::tasks;
use scroll_reel::tasks::loader::DiskFetcher;
use scroll_reel::timeline::audio::LogAudioEngine;
use scroll_reel::timeline::choreo::{ItemId, TimelineData};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DeviceArg {
    Mobile,
    Desktop,
}

impl From<DeviceArg> for Device {
    fn from(arg: DeviceArg) -> Self {
        match arg {
            DeviceArg::Mobile => Device::Mobile,
            DeviceArg::Desktop => Device::Desktop,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "scroll-reel",
    version,
    about = "scroll-driven frame sequence player"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Timeline data file with captions and stickers
    #[arg(long, value_name = "FILE", default_value = "timeline.json")]
    timeline: PathBuf,
    /// Force a device profile instead of deriving it from --viewport
    #[arg(long, value_enum)]
    device: Option<DeviceArg>,
    /// Viewport size used to pick the device profile
    #[arg(long, value_name = "WxH", default_value = "1920x1080")]
    viewport: String,
    /// Print the choreography for N evenly spaced scroll steps and exit
    #[arg(long, value_name = "STEPS")]
    sweep: Option<usize>,
    /// Write the final canvas to this PNG file
    #[arg(long, value_name = "FILE")]
    snapshot: Option<PathBuf>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(format!("scroll_reel={level}").parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

fn parse_viewport(raw: &str) -> Result<(u32, u32)> {
    let Some((w, h)) = raw.split_once(['x', 'X']) else {
        bail!("viewport must look like WIDTHxHEIGHT, got {raw:?}");
    };
    let w = w.trim().parse().context("invalid viewport width")?;
    let h = h.trim().parse().context("invalid viewport height")?;
    Ok((w, h))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    let cfg = Configuration::from_yaml_file(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?
        .validated()
        .context("invalid configuration values")?;
    tracing::debug!("Loaded configuration from {}:\n{:#?}", args.config.display(), cfg);

    let device = match args.device {
        Some(device) => device.into(),
        None => {
            let (w, h) = parse_viewport(&args.viewport)?;
            Device::for_viewport(w, h)
        }
    };
    let profile = cfg.profile(device);
    let data = TimelineData::from_json_file(&args.timeline)
        .with_context(|| format!("failed to load timeline from {}", args.timeline.display()))?;
    let session = ScrollSession::new(&cfg, profile, &data).context("invalid timeline setup")?;

    if let Some(steps) = args.sweep {
        run_sweep(session, steps);
        return Ok(());
    }

    let catalog = FrameCatalog::scan(&cfg.assets_root)
        .with_context(|| format!("failed to index {}", cfg.assets_root.display()))?;
    let assets = catalog
        .assets(&profile, &cfg.frame_naming)
        .context("frame set does not match the device profile")?;

    // Channels
    let (loaded_tx, loaded_rx) = mpsc::channel::<FrameLoaded>(cfg.batch_size * 2); // Loader -> Scroll
    let (progress_tx, progress_rx) = watch::channel(LoadProgress::for_frames(
        profile.frame_count(),
        cfg.ready_fraction,
    )); // Loader -> Progress display
    let (scroll_tx, scroll_rx) = watch::channel(0.0_f64); // Observer -> Scroll (last value wins)
    let (dismiss_tx, dismiss_rx) = mpsc::channel::<ItemId>(16); // Observer -> Scroll

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut workers = JoinSet::new();

    // FrameLoader
    workers.spawn({
        let cancel = cancel.clone();
        let batch_size = cfg.batch_size;
        async move {
            tasks::loader::run(
                assets,
                Arc::new(DiskFetcher),
                batch_size,
                loaded_tx,
                progress_tx,
                cancel,
            )
            .await
            .map(|_| ())
            .context("loader task failed")
        }
    });

    // Loading screen
    workers.spawn({
        let cancel = cancel.clone();
        let min_duration = cfg.min_loading_duration;
        async move {
            tasks::progress::run(
                progress_rx,
                LogProgressDisplay,
                min_duration,
                Duration::from_millis(100),
                cancel,
            )
            .await
            .map(|_| ())
            .context("progress task failed")
        }
    });

    // Scroll playback
    let scroll = tokio::spawn(tasks::scroll::run(
        session,
        scroll_rx,
        loaded_rx,
        dismiss_rx,
        LogAudioEngine,
        cancel.clone(),
    ));

    let trigger = scroll_reel::timeline::ScrollTrigger::from_config(&cfg);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line.context("failed to read stdin")?,
        };
        let Some(line) = line else {
            tracing::info!("stdin closed; finishing playback");
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(id) = line.strip_prefix("dismiss ") {
            match id.trim().parse::<usize>() {
                Ok(id) => {
                    forward_dismiss(&dismiss_tx, ItemId(id)).await;
                }
                Err(err) => tracing::warn!("bad dismiss id {id:?}: {err}"),
            }
            continue;
        }
        match line.parse::<f64>() {
            Ok(offset) => {
                scroll_tx.send_replace(trigger.progress(offset));
            }
            Err(err) => tracing::warn!("ignoring input {line:?}: {err}"),
        }
    }

    // Let loading settle before the scroll source closes
    while let Some(res) = workers.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }
    drop(scroll_tx);
    drop(dismiss_tx);

    let session = scroll.await.context("scroll task panicked")??;
    if let Some(path) = args.snapshot {
        session.playhead().canvas().save_png(&path)?;
        tracing::info!(
            path = %path.display(),
            frame = ?session.playhead().canvas().drawn(),
            "canvas snapshot written"
        );
    }
    Ok(())
}

/// Hand a dismissal to the scroll task. Returns false (and logs) when the
/// task has already exited.
async fn forward_dismiss(tx: &mpsc::Sender<ItemId>, id: ItemId) -> bool {
    match tx.send(id).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(%id, "dismiss dropped; scroll task is gone: {err}");
            false
        }
    }
}

fn run_sweep(mut session: ScrollSession, steps: usize) {
    let steps = steps.max(1);
    let timeline = session.timeline();
    println!(
        "# scroll sweep\n# device: {}\n# frames: {}\n# timeline length: {:.4}\n# steps: {}\n",
        session.profile().device,
        timeline.frame_count(),
        timeline.length(),
        steps
    );
    for step in 0..=steps {
        let progress = step as f64 / steps as f64;
        let Some(update) = session.apply(progress) else {
            continue;
        };
        println!(
            "{:>5.3}  t={:.4}  frame={:>5}  {:<8} x={:>8.1} z={:>9.1}  intro={:.2}",
            update.progress,
            update.time,
            update.frame.index(),
            update.phase,
            update.camera.x,
            update.camera.depth,
            update.intro_opacity,
        );
        for event in &update.events {
            let copy = session
                .choreographer()
                .item(event.id())
                .map_or("", |item| item.copy.as_str());
            println!("         {event:?} {copy:?}");
        }
        for command in &update.audio {
            println!("         {command:?}");
        }
    }
}
