use std::time::Duration;

use anyhow::Result;
use tokio::select;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::progress::{LoadProgress, ProgressDisplay, ProgressMeter, ProgressUpdate};

/// Drive the loading display from loader progress snapshots.
///
/// With a minimum loading duration the display is also refreshed on `tick`
/// so the time estimate keeps moving between frame loads. Returns the
/// display once completion has been reported (or loading stopped short).
pub async fn run<D: ProgressDisplay>(
    mut progress_rx: watch::Receiver<LoadProgress>,
    mut display: D,
    min_duration: Duration,
    tick: Duration,
    cancel: CancellationToken,
) -> Result<D> {
    let started = Instant::now();
    let mut meter = ProgressMeter::new(min_duration);
    let mut ticker = interval(tick.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut loader_done = false;

    loop {
        let snapshot = *progress_rx.borrow_and_update();
        for update in meter.observe(snapshot, started.elapsed()) {
            match update {
                ProgressUpdate::Percent(percent) => display.show_percent(percent),
                ProgressUpdate::Complete => display.complete(started.elapsed()),
            }
        }
        if meter.is_complete() {
            debug!("loading complete");
            break;
        }

        if loader_done {
            if !snapshot.is_complete() {
                warn!(
                    loaded = snapshot.loaded(),
                    target = snapshot.target(),
                    "frame loading stopped before the ready target"
                );
                break;
            }
            // only the minimum duration is left to wait out
            select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            continue;
        }

        select! {
            _ = cancel.cancelled() => break,
            changed = progress_rx.changed() => {
                if changed.is_err() {
                    loader_done = true;
                }
            }
            _ = ticker.tick(), if !min_duration.is_zero() => {}
        }
    }
    Ok(display)
}
