use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use image::RgbaImage;
use tokio::sync::mpsc::Sender;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::events::{FrameLoaded, FrameSettled};
use crate::frames::{FrameAsset, FrameUrl};
use crate::progress::LoadProgress;

/// Fetches and decodes one frame. Runs on the blocking pool.
pub trait FrameFetcher: Send + Sync + 'static {
    fn fetch(&self, asset: &FrameAsset) -> Result<RgbaImage>;
}

/// Reads frames from the asset directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFetcher;

impl FrameFetcher for DiskFetcher {
    fn fetch(&self, asset: &FrameAsset) -> Result<RgbaImage> {
        decode_rgba8(&asset.path)
    }
}

// Decodes an image to RGBA8, sniffing the format from content first.
fn decode_rgba8(path: &Path) -> Result<RgbaImage> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?;
    Ok(img.to_rgba8())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub failed: usize,
    pub cache_hits: usize,
    pub batches: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Batched frame loader with a content cache keyed by URL.
///
/// Batches run strictly one after another; within a batch every distinct URL
/// is fetched concurrently. A failed frame still settles (and counts towards
/// progress) so the loading screen cannot get stuck.
pub struct FrameLoader<F> {
    fetcher: Arc<F>,
    batch_size: usize,
    cache: HashMap<FrameUrl, Arc<RgbaImage>>,
}

impl<F: FrameFetcher> FrameLoader<F> {
    pub fn new(fetcher: Arc<F>, batch_size: usize) -> Self {
        Self {
            fetcher,
            batch_size: batch_size.max(1),
            cache: HashMap::new(),
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    #[instrument(skip_all, fields(frames = assets.len(), batch_size = self.batch_size))]
    pub async fn load(
        &mut self,
        assets: &[FrameAsset],
        to_renderer: &Sender<FrameLoaded>,
        progress: &watch::Sender<LoadProgress>,
        cancel: &CancellationToken,
    ) -> Result<LoadReport> {
        let started = Instant::now();
        let mut sink = Settle {
            to_renderer,
            progress,
            renderer_open: true,
            report: LoadReport::default(),
        };

        for (batch_no, batch) in assets.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                info!(batch = batch_no, "cancel received; stopping frame loads");
                sink.report.cancelled = true;
                break;
            }
            self.load_batch(batch, &mut sink).await;
            sink.report.batches += 1;
            debug!(
                batch = batch_no,
                loaded = sink.report.loaded,
                failed = sink.report.failed,
                "batch settled"
            );
        }

        let mut report = sink.report;
        report.elapsed = started.elapsed();
        info!(
            loaded = report.loaded,
            failed = report.failed,
            cache_hits = report.cache_hits,
            batches = report.batches,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "frame loading finished"
        );
        Ok(report)
    }

    /// Load one batch, settling each frame as soon as its fetch finishes.
    /// Returns once every entry in the batch has settled.
    async fn load_batch(&mut self, batch: &[FrameAsset], sink: &mut Settle<'_>) {
        let mut waiting: HashMap<FrameUrl, Vec<usize>> = HashMap::new();
        let mut tasks: JoinSet<(FrameUrl, Result<RgbaImage>)> = JoinSet::new();

        for asset in batch {
            if let Some(image) = self.cache.get(&asset.url) {
                sink.settle(FrameSettled::Loaded {
                    index: asset.index,
                    url: asset.url.clone(),
                    image: Arc::clone(image),
                    cached: true,
                })
                .await;
                continue;
            }
            match waiting.entry(asset.url.clone()) {
                Entry::Occupied(mut e) => e.get_mut().push(asset.index),
                Entry::Vacant(e) => {
                    e.insert(vec![asset.index]);
                    let fetcher = Arc::clone(&self.fetcher);
                    let asset = asset.clone();
                    tasks.spawn_blocking(move || {
                        let res = fetcher.fetch(&asset);
                        (asset.url, res)
                    });
                }
            }
        }

        // Handle results as they finish
        while let Some(joined) = tasks.join_next().await {
            let (url, res) = match joined {
                Ok(done) => done,
                Err(err) => {
                    warn!("frame load task failed: {err}");
                    continue;
                }
            };
            let indices = waiting.remove(&url).unwrap_or_default();
            match res {
                Ok(image) => {
                    let image = Arc::new(image);
                    self.cache.insert(url.clone(), Arc::clone(&image));
                    for index in indices {
                        sink.settle(FrameSettled::Loaded {
                            index,
                            url: url.clone(),
                            image: Arc::clone(&image),
                            cached: false,
                        })
                        .await;
                    }
                }
                Err(err) => {
                    warn!(%url, "failed to load frame: {err:#}");
                    for index in indices {
                        sink.settle(FrameSettled::Failed {
                            index,
                            url: url.clone(),
                            reason: format!("{err:#}"),
                        })
                        .await;
                    }
                }
            }
        }

        // A task that died without reporting still settles its frames.
        for (url, indices) in waiting {
            for index in indices {
                sink.settle(FrameSettled::Failed {
                    index,
                    url: url.clone(),
                    reason: "load task aborted".into(),
                })
                .await;
            }
        }
    }
}

/// Where settled frames go: one progress tick each, loaded frames on to the
/// renderer.
struct Settle<'a> {
    to_renderer: &'a Sender<FrameLoaded>,
    progress: &'a watch::Sender<LoadProgress>,
    renderer_open: bool,
    report: LoadReport,
}

impl Settle<'_> {
    async fn settle(&mut self, outcome: FrameSettled) {
        self.progress.send_modify(|p| p.record());
        match outcome {
            FrameSettled::Loaded {
                index,
                image,
                cached,
                ..
            } => {
                self.report.loaded += 1;
                if cached {
                    self.report.cache_hits += 1;
                }
                if self.renderer_open
                    && self
                        .to_renderer
                        .send(FrameLoaded { index, image })
                        .await
                        .is_err()
                {
                    debug!("renderer channel closed; frames are only cached");
                    self.renderer_open = false;
                }
            }
            FrameSettled::Failed { index, .. } => {
                trace!(index, "frame settled as failed");
                self.report.failed += 1;
            }
        }
    }
}

/// Load every asset once, then drop the renderer and progress senders so the
/// consumers see the end of the stream.
pub async fn run<F: FrameFetcher>(
    assets: Vec<FrameAsset>,
    fetcher: Arc<F>,
    batch_size: usize,
    to_renderer: Sender<FrameLoaded>,
    progress: watch::Sender<LoadProgress>,
    cancel: CancellationToken,
) -> Result<LoadReport> {
    let mut loader = FrameLoader::new(fetcher, batch_size);
    loader.load(&assets, &to_renderer, &progress, &cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{Device, DeviceProfile, resolve};
    use crate::config::FrameNaming;
    use image::Rgba;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn assets(count: usize) -> Vec<FrameAsset> {
        let profile = DeviceProfile {
            device: Device::Mobile,
            canvas_width: 1,
            canvas_height: 1,
            total_frame_count: count,
            reducer: 1.0,
            base_frame_rate: 25.0,
        };
        (0..count)
            .map(|index| {
                let url = resolve(&profile, &FrameNaming::default(), index).unwrap();
                FrameAsset {
                    index,
                    path: PathBuf::from(url.as_str()),
                    url,
                }
            })
            .collect()
    }

    struct CountingFetcher {
        calls: AtomicUsize,
    }

    impl FrameFetcher for CountingFetcher {
        fn fetch(&self, _asset: &FrameAsset) -> Result<RgbaImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RgbaImage::from_pixel(1, 1, Rgba([1, 2, 3, 255])))
        }
    }

    #[tokio::test]
    async fn second_load_is_served_from_cache() {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
        });
        let mut loader = FrameLoader::new(Arc::clone(&fetcher), 4);
        let (tx, mut rx) = mpsc::channel(64);
        let (progress, _progress_rx) = watch::channel(LoadProgress::new(10));
        let cancel = CancellationToken::new();
        let frames = assets(10);

        let first = loader.load(&frames, &tx, &progress, &cancel).await.unwrap();
        assert_eq!(first.loaded, 10);
        assert_eq!(first.cache_hits, 0);
        assert_eq!(first.batches, 3);

        let second = loader.load(&frames, &tx, &progress, &cancel).await.unwrap();
        assert_eq!(second.cache_hits, 10);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 10);
        assert_eq!(loader.cached(), 10);
        assert_eq!(progress.borrow().loaded(), 20);

        drop(tx);
        let mut delivered = 0;
        while rx.recv().await.is_some() {
            delivered += 1;
        }
        assert_eq!(delivered, 20);
    }

    #[tokio::test]
    async fn duplicate_urls_in_a_batch_share_one_fetch() {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
        });
        let mut loader = FrameLoader::new(Arc::clone(&fetcher), 8);
        let mut frames = assets(2);
        let mut dup = frames[0].clone();
        dup.index = 2;
        frames.push(dup);

        let (tx, mut rx) = mpsc::channel(8);
        let (progress, _progress_rx) = watch::channel(LoadProgress::new(3));
        let report = loader
            .load(&frames, &tx, &progress, &CancellationToken::new())
            .await
            .unwrap();
        drop(tx);
        assert_eq!(report.loaded, 3);
        assert_eq!(report.cache_hits, 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        let mut indices = Vec::new();
        while let Some(frame) = rx.recv().await {
            indices.push(frame.index);
        }
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn cancelled_load_stops_between_batches() {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
        });
        let mut loader = FrameLoader::new(fetcher, 2);
        let (tx, _rx) = mpsc::channel(64);
        let (progress, _progress_rx) = watch::channel(LoadProgress::new(6));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = loader
            .load(&assets(6), &tx, &progress, &cancel)
            .await
            .unwrap();
        assert!(report.cancelled);
        assert_eq!(report.batches, 0);
        assert_eq!(progress.borrow().loaded(), 0);
    }

    #[test]
    fn decode_reads_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RgbaImage::from_pixel(3, 2, Rgba([9, 9, 9, 255]))
            .save(&path)
            .unwrap();
        let img = decode_rgba8(&path).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert!(decode_rgba8(&dir.path().join("missing.png")).is_err());
    }
}
