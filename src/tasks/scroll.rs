use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::Receiver;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::FrameLoaded;
use crate::session::ScrollSession;
use crate::timeline::audio::AudioEngine;
use crate::timeline::choreo::ItemId;

/// The single update path for a session.
///
/// Scroll progress arrives on a `watch` channel, so rapid updates collapse to
/// the latest value. Loaded frames and sticker dismissals are applied between
/// scroll steps. Ends when the scroll source goes away or on cancel and hands
/// the session back.
pub async fn run<A: AudioEngine>(
    mut session: ScrollSession,
    mut progress_rx: watch::Receiver<f64>,
    mut loaded_rx: Receiver<FrameLoaded>,
    mut dismiss_rx: Receiver<ItemId>,
    mut audio: A,
    cancel: CancellationToken,
) -> Result<ScrollSession> {
    loop {
        select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting scroll task");
                break;
            }

            changed = progress_rx.changed() => {
                if changed.is_err() {
                    debug!("scroll source closed");
                    break;
                }
                let progress = *progress_rx.borrow_and_update();
                let Some(update) = session.apply(progress) else {
                    warn!(progress, "ignoring non-numeric scroll progress");
                    continue;
                };
                for command in &update.audio {
                    audio.apply(command);
                }
                for event in &update.events {
                    debug!(?event, "timeline transition");
                }
                debug!(
                    progress = update.progress,
                    time = update.time,
                    frame = ?update.frame,
                    camera_x = update.camera.x,
                    camera_depth = update.camera.depth,
                    visible = update.visible.len(),
                    "scroll applied"
                );
            }

            Some(frame) = loaded_rx.recv() => {
                if let Some(outcome) = session.frame_loaded(frame) {
                    debug!(?outcome, "late frame reached the playhead");
                }
            }

            Some(id) = dismiss_rx.recv() => match session.dismiss(id) {
                Ok(Some(event)) => info!(?event, "sticker dismissed"),
                Ok(None) => debug!(%id, "sticker already dismissed"),
                Err(err) => warn!("dismiss rejected: {err}"),
            },
        }
    }
    // frames already delivered still belong on the canvas
    while let Ok(frame) = loaded_rx.try_recv() {
        session.frame_loaded(frame);
    }
    Ok(session)
}
