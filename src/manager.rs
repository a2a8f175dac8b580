//! The engine around the algorithm: exclusive mutations, asynchronous
//! recomputes, renderer delivery.
//!
//! Every mutation bumps a generation counter and mails a recompute job to a
//! dedicated worker thread. The worker always collapses a burst of pending
//! jobs into the newest one and drops any pass whose generation has been
//! superseded, both before computing and again before delivering. The
//! renderer therefore sees at most one delivery per settled engine state,
//! and delivered results follow strictly increasing generations.

use crate::algorithm::{DistanceBasedAlgorithm, Viewport};
use crate::cluster::Marker;
use crate::error::{MapclustError, Result};
use crate::render::ClusterRenderer;
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

/// Counters describing an engine's activity so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Markers currently stored.
    pub markers: usize,
    /// Recompute passes scheduled by mutations.
    pub scheduled_passes: u64,
    /// Passes that finished while still current and reached the renderer.
    pub delivered_passes: u64,
}

struct RecomputeJob {
    generation: u64,
    viewport: Viewport,
}

/// A clustering engine bound to one renderer.
///
/// All methods take `&self`; the manager is meant to be shared across
/// threads behind an [`Arc`]. Mutations apply under an exclusive lock and
/// then schedule an asynchronous clustering pass, so they return before the
/// renderer hears about the change.
///
/// # Examples
///
/// ```
/// use mapclust::{Cluster, ClusterManager, ClusterRenderer, LatLng, Marker};
/// use mapclust::{Viewport, VisibleRect};
///
/// struct LogRenderer;
///
/// impl ClusterRenderer for LogRenderer {
///     fn update_clusters(&self, clusters: Vec<Cluster>) {
///         println!("{} clusters ready", clusters.len());
///     }
/// }
///
/// let manager = ClusterManager::builder().renderer(LogRenderer).build()?;
/// manager.add_marker(Marker::new(LatLng::new(55.7539, 37.6208)))?;
/// manager.set_viewport(Viewport::new(
///     VisibleRect::new(LatLng::new(56.0, 37.0), LatLng::new(55.5, 38.0)),
///     10.0,
/// ))?;
/// manager.close();
/// # Ok::<(), mapclust::MapclustError>(())
/// ```
pub struct ClusterManager {
    algorithm: Arc<RwLock<DistanceBasedAlgorithm>>,
    viewport: Mutex<Viewport>,
    renderer: Arc<dyn ClusterRenderer>,
    generation: Arc<AtomicU64>,
    scheduled: AtomicU64,
    delivered: Arc<AtomicU64>,
    closed: AtomicBool,
    sender: Mutex<Option<Sender<RecomputeJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ClusterManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterManager")
            .field("markers", &self.algorithm.read().len())
            .field("generation", &self.generation.load(Ordering::Acquire))
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl ClusterManager {
    /// Start configuring an engine.
    pub fn builder() -> crate::builder::ClusterManagerBuilder {
        crate::builder::ClusterManagerBuilder::new()
    }

    pub(crate) fn from_parts(
        algorithm: DistanceBasedAlgorithm,
        renderer: Arc<dyn ClusterRenderer>,
        viewport: Viewport,
    ) -> Result<Self> {
        let algorithm = Arc::new(RwLock::new(algorithm));
        let generation = Arc::new(AtomicU64::new(0));
        let delivered = Arc::new(AtomicU64::new(0));
        let (sender, receiver) = mpsc::channel();

        let worker = {
            let algorithm = Arc::clone(&algorithm);
            let renderer = Arc::clone(&renderer);
            let generation = Arc::clone(&generation);
            let delivered = Arc::clone(&delivered);
            std::thread::Builder::new()
                .name("mapclust-recompute".into())
                .spawn(move || run_worker(receiver, algorithm, renderer, generation, delivered))?
        };

        renderer.on_add();
        debug!("cluster engine started");

        Ok(Self {
            algorithm,
            viewport: Mutex::new(viewport),
            renderer,
            generation,
            scheduled: AtomicU64::new(0),
            delivered,
            closed: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Replace the whole marker population.
    pub fn set_markers(&self, markers: impl IntoIterator<Item = Marker>) -> Result<()> {
        self.ensure_open()?;
        self.algorithm.write().replace_all(markers.into_iter().collect())?;
        self.schedule_recompute();
        Ok(())
    }

    /// Add one marker. Returns `Ok(false)` when its id is already present.
    pub fn add_marker(&self, marker: Marker) -> Result<bool> {
        self.ensure_open()?;
        let added = self.algorithm.write().insert(marker)?;
        self.schedule_recompute();
        Ok(added)
    }

    /// Add a batch of markers, returning how many were new.
    pub fn add_markers(&self, markers: impl IntoIterator<Item = Marker>) -> Result<usize> {
        self.ensure_open()?;
        let added = self.algorithm.write().insert_many(markers.into_iter().collect())?;
        self.schedule_recompute();
        Ok(added)
    }

    /// Remove one marker. Returns `Ok(false)` when it was not present.
    pub fn remove_marker(&self, marker: &Marker) -> Result<bool> {
        self.ensure_open()?;
        let removed = self.algorithm.write().remove(marker.id());
        self.schedule_recompute();
        Ok(removed)
    }

    /// Remove a batch of markers, returning how many were present.
    pub fn remove_markers(&self, markers: &[Marker]) -> Result<usize> {
        self.ensure_open()?;
        let removed = {
            let mut algorithm = self.algorithm.write();
            markers.iter().filter(|m| algorithm.remove(m.id())).count()
        };
        self.schedule_recompute();
        Ok(removed)
    }

    /// Remove every marker.
    pub fn clear_markers(&self) -> Result<()> {
        self.ensure_open()?;
        self.algorithm.write().clear();
        self.schedule_recompute();
        Ok(())
    }

    /// Move the camera: store the viewport and recluster for it.
    pub fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        self.ensure_open()?;
        *self.viewport.lock() = viewport;
        self.schedule_recompute();
        Ok(())
    }

    /// Change the clustering ratio. Takes effect on the next pass; no pass
    /// is scheduled by the change itself.
    pub fn set_clustering_ratio(&self, ratio: f64) -> Result<()> {
        self.ensure_open()?;
        self.algorithm.write().set_ratio(ratio)
    }

    /// The viewport passes are currently computed for.
    pub fn viewport(&self) -> Viewport {
        *self.viewport.lock()
    }

    /// Number of stored markers.
    pub fn marker_count(&self) -> usize {
        self.algorithm.read().len()
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// A snapshot of the engine's counters.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            markers: self.algorithm.read().len(),
            scheduled_passes: self.scheduled.load(Ordering::Relaxed),
            delivered_passes: self.delivered.load(Ordering::Relaxed),
        }
    }

    /// Shut the engine down: suppress any in-flight pass, stop the worker,
    /// and fire the renderer's `on_remove` hook exactly once.
    ///
    /// Idempotent; later mutations fail with
    /// [`MapclustError::EngineClosed`]. Must not be called from inside the
    /// renderer's delivery callback, which runs on the worker being joined.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        drop(self.sender.lock().take());
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                warn!("recompute worker panicked during shutdown");
            }
        }
        self.renderer.on_remove();
        debug!("cluster engine closed");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MapclustError::EngineClosed);
        }
        Ok(())
    }

    fn schedule_recompute(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.scheduled.fetch_add(1, Ordering::Relaxed);
        let viewport = *self.viewport.lock();
        match self.sender.lock().as_ref() {
            Some(sender) => {
                if sender.send(RecomputeJob { generation, viewport }).is_err() {
                    warn!("recompute worker is gone, dropping pass {generation}");
                }
            }
            None => warn!("recompute scheduled after close, dropping pass {generation}"),
        }
    }
}

impl Drop for ClusterManager {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker(
    receiver: Receiver<RecomputeJob>,
    algorithm: Arc<RwLock<DistanceBasedAlgorithm>>,
    renderer: Arc<dyn ClusterRenderer>,
    generation: Arc<AtomicU64>,
    delivered: Arc<AtomicU64>,
) {
    while let Ok(mut job) = receiver.recv() {
        // Collapse a burst of mutations into its newest job. Concurrent
        // mutators may enqueue out of generation order, so compare instead
        // of trusting channel order.
        while let Ok(other) = receiver.try_recv() {
            if other.generation > job.generation {
                job = other;
            }
        }
        if generation.load(Ordering::Acquire) != job.generation {
            continue;
        }

        debug!("recompute pass {} started", job.generation);
        let clusters = algorithm.read().calculate(&job.viewport);

        // A mutation may have landed while this pass was computing.
        if generation.load(Ordering::Acquire) != job.generation {
            debug!("recompute pass {} superseded, discarding", job.generation);
            continue;
        }

        debug!(
            "recompute pass {} delivering {} clusters",
            job.generation,
            clusters.len()
        );
        renderer.update_clusters(clusters);
        delivered.fetch_add(1, Ordering::AcqRel);
    }
    debug!("recompute worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Cluster;
    use mapclust_types::latlng::{LatLng, VisibleRect};
    use std::thread;
    use std::time::{Duration, Instant};

    struct RecordingRenderer {
        deliveries: Mutex<Vec<Vec<Cluster>>>,
        started: AtomicU64,
        add_calls: AtomicU64,
        remove_calls: AtomicU64,
        delay: Duration,
    }

    impl RecordingRenderer {
        fn new() -> Arc<Self> {
            Self::with_delay(Duration::ZERO)
        }

        fn with_delay(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                deliveries: Mutex::new(Vec::new()),
                started: AtomicU64::new(0),
                add_calls: AtomicU64::new(0),
                remove_calls: AtomicU64::new(0),
                delay,
            })
        }

        fn deliveries(&self) -> Vec<Vec<Cluster>> {
            self.deliveries.lock().clone()
        }
    }

    impl ClusterRenderer for RecordingRenderer {
        fn update_clusters(&self, clusters: Vec<Cluster>) {
            self.started.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            self.deliveries.lock().push(clusters);
        }

        fn on_add(&self) {
            self.add_calls.fetch_add(1, Ordering::SeqCst);
        }

        fn on_remove(&self) {
            self.remove_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// A flat viewport along the equator whose projected diagonal is
    /// `lon_extent` degrees of longitude.
    fn equator_viewport(lon_extent: f64) -> Viewport {
        Viewport::new(
            VisibleRect::new(
                LatLng::new(0.0, 10.0),
                LatLng::new(0.0, 10.0 + lon_extent),
            ),
            14.0,
        )
    }

    fn manager_with(renderer: Arc<RecordingRenderer>, viewport: Viewport) -> ClusterManager {
        ClusterManager::builder()
            .shared_renderer(renderer)
            .viewport(viewport)
            .build()
            .unwrap()
    }

    fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_lifecycle_hooks_fire_once() {
        let renderer = RecordingRenderer::new();
        let manager = manager_with(renderer.clone(), Viewport::world());
        assert_eq!(renderer.add_calls.load(Ordering::SeqCst), 1);

        manager.close();
        manager.close();
        assert!(manager.is_closed());
        assert_eq!(renderer.remove_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_shuts_the_engine_down() {
        let renderer = RecordingRenderer::new();
        {
            let _manager = manager_with(renderer.clone(), Viewport::world());
        }
        assert_eq!(renderer.remove_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mutation_delivers_current_state() {
        let renderer = RecordingRenderer::new();
        let manager = manager_with(renderer.clone(), equator_viewport(0.02));

        let marker = Marker::with_metadata(
            LatLng::new(0.0, 10.0),
            serde_json::json!({ "title": "depot" }),
        );
        assert!(manager.add_marker(marker).unwrap());
        wait_until("first delivery", || manager.stats().delivered_passes >= 1);

        let deliveries = renderer.deliveries();
        let last = deliveries.last().unwrap();
        assert_eq!(last.len(), 1);
        assert!(!last[0].is_group());
        // Metadata rides along untouched.
        assert_eq!(last[0].markers()[0].metadata()["title"], "depot");
    }

    #[test]
    fn test_burst_collapses_to_newest_state() {
        let renderer = RecordingRenderer::with_delay(Duration::from_millis(300));
        let manager = manager_with(renderer.clone(), equator_viewport(0.02));

        manager.add_marker(Marker::new(LatLng::new(0.0, 10.0))).unwrap();
        // The worker is now inside the first (slow) delivery.
        wait_until("first delivery to start", || {
            renderer.started.load(Ordering::SeqCst) >= 1
        });

        manager.add_marker(Marker::new(LatLng::new(0.0, 20.0))).unwrap();
        manager.add_marker(Marker::new(LatLng::new(0.0, 30.0))).unwrap();
        manager.add_marker(Marker::new(LatLng::new(0.0, 40.0))).unwrap();
        wait_until("settled delivery", || manager.stats().delivered_passes >= 2);

        // The three queued passes collapsed into one reflecting all markers.
        let deliveries = renderer.deliveries();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].iter().map(|c| c.size()).sum::<usize>(), 1);
        assert_eq!(deliveries[1].iter().map(|c| c.size()).sum::<usize>(), 4);

        let stats = manager.stats();
        assert_eq!(stats.scheduled_passes, 4);
        assert_eq!(stats.delivered_passes, 2);
    }

    #[test]
    fn test_set_viewport_regroups() {
        let renderer = RecordingRenderer::new();
        let manager = manager_with(renderer.clone(), equator_viewport(0.0004));

        let near = vec![
            Marker::new(LatLng::new(0.0, 10.000)),
            Marker::new(LatLng::new(0.0, 10.001)),
        ];
        assert_eq!(manager.add_markers(near).unwrap(), 2);
        wait_until("zoomed-in delivery", || manager.stats().delivered_passes >= 1);
        assert_eq!(renderer.deliveries().last().unwrap().len(), 2);

        manager.set_viewport(Viewport::world()).unwrap();
        wait_until("zoomed-out delivery", || manager.stats().delivered_passes >= 2);
        let deliveries = renderer.deliveries();
        let last = deliveries.last().unwrap();
        assert_eq!(last.len(), 1);
        assert!(last[0].is_group());
        assert_eq!(last[0].size(), 2);
    }

    #[test]
    fn test_ratio_change_waits_for_next_pass() {
        let renderer = RecordingRenderer::new();
        let manager = manager_with(renderer.clone(), equator_viewport(0.1));

        let pair = vec![
            Marker::new(LatLng::new(0.0, 10.000)),
            Marker::new(LatLng::new(0.0, 10.012)),
        ];
        manager.add_markers(pair).unwrap();
        wait_until("merged delivery", || manager.stats().delivered_passes >= 1);
        assert_eq!(renderer.deliveries().last().unwrap().len(), 1);

        // No pass is scheduled by the ratio change itself.
        manager.set_clustering_ratio(0.1).unwrap();
        assert_eq!(manager.stats().scheduled_passes, 1);
        assert!(manager.set_clustering_ratio(-1.0).is_err());

        manager.set_viewport(equator_viewport(0.1)).unwrap();
        wait_until("split delivery", || manager.stats().delivered_passes >= 2);
        let deliveries = renderer.deliveries();
        assert_eq!(deliveries.last().unwrap().len(), 2);
    }

    #[test]
    fn test_post_close_mutations_fail() {
        let renderer = RecordingRenderer::new();
        let manager = manager_with(renderer.clone(), Viewport::world());
        manager.add_marker(Marker::new(LatLng::new(0.0, 10.0))).unwrap();
        wait_until("delivery before close", || manager.stats().delivered_passes >= 1);

        manager.close();
        let err = manager.add_marker(Marker::new(LatLng::new(0.0, 11.0))).unwrap_err();
        assert!(matches!(err, MapclustError::EngineClosed));
        assert!(manager.set_viewport(Viewport::world()).is_err());
        assert!(manager.clear_markers().is_err());

        // Reads still work after close.
        assert_eq!(manager.marker_count(), 1);
        assert_eq!(manager.stats().markers, 1);
    }

    #[test]
    fn test_invalid_marker_schedules_nothing() {
        let renderer = RecordingRenderer::new();
        let manager = manager_with(renderer.clone(), Viewport::world());

        let err = manager.add_marker(Marker::new(LatLng::new(0.0, 300.0))).unwrap_err();
        assert!(matches!(err, MapclustError::InvalidInput(_)));
        assert_eq!(manager.stats().scheduled_passes, 0);
        assert_eq!(manager.marker_count(), 0);
    }

    #[test]
    fn test_remove_paths() {
        let renderer = RecordingRenderer::new();
        let manager = manager_with(renderer.clone(), equator_viewport(0.02));

        let keep = Marker::new(LatLng::new(0.0, 10.0));
        let gone = Marker::new(LatLng::new(0.0, 10.5));
        let stranger = Marker::new(LatLng::new(0.0, 11.0));
        manager.add_markers(vec![keep.clone(), gone.clone()]).unwrap();

        assert!(manager.remove_marker(&gone).unwrap());
        assert!(!manager.remove_marker(&stranger).unwrap());
        assert_eq!(manager.remove_markers(&[keep.clone(), stranger]).unwrap(), 1);
        assert_eq!(manager.marker_count(), 0);

        wait_until("empty delivery", || {
            renderer.deliveries().last().is_some_and(|d| d.is_empty())
        });
    }

    #[test]
    fn test_concurrent_mutators_settle_to_full_coverage() {
        let renderer = RecordingRenderer::new();
        let manager = Arc::new(manager_with(renderer.clone(), equator_viewport(0.02)));

        let mut handles = Vec::new();
        for t in 0..4u32 {
            let manager = Arc::clone(&manager);
            handles.push(thread::spawn(move || {
                for i in 0..25u32 {
                    let lon = 10.0 + (t * 25 + i) as f64 * 0.5;
                    manager.add_marker(Marker::new(LatLng::new(0.0, lon))).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(manager.marker_count(), 100);
        wait_until("full-coverage delivery", || {
            renderer
                .deliveries()
                .last()
                .is_some_and(|d| d.iter().map(|c| c.size()).sum::<usize>() == 100)
        });
    }

    #[test]
    fn test_set_markers_replaces_population() {
        let renderer = RecordingRenderer::new();
        let manager = manager_with(renderer.clone(), equator_viewport(0.02));

        manager.add_marker(Marker::new(LatLng::new(0.0, 10.0))).unwrap();
        manager
            .set_markers(vec![
                Marker::new(LatLng::new(0.0, 20.0)),
                Marker::new(LatLng::new(0.0, 21.0)),
            ])
            .unwrap();
        assert_eq!(manager.marker_count(), 2);

        wait_until("replacement delivery", || {
            renderer.deliveries().last().is_some_and(|d| d.len() == 2)
        });
    }

    #[test]
    fn test_debug_output_reports_engine_state() {
        let renderer = RecordingRenderer::new();
        let manager = manager_with(renderer.clone(), equator_viewport(0.02));
        manager.add_marker(Marker::new(LatLng::new(0.0, 10.0))).unwrap();

        let rendered = format!("{manager:?}");
        assert!(rendered.contains("ClusterManager"));
        assert!(rendered.contains("markers: 1"));
        assert!(rendered.contains("closed: false"));

        manager.close();
        assert!(format!("{manager:?}").contains("closed: true"));
    }
}
