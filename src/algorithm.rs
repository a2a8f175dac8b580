//! Viewport-driven, distance-based clustering.
//!
//! The algorithm keeps every marker projected onto the unit world and
//! indexed in a quadtree. Each [`calculate`](DistanceBasedAlgorithm::calculate)
//! pass derives a clustering span from the current viewport, then sweeps the
//! markers in insertion order: a marker with no neighbors inside its span
//! window becomes a standalone result, anything else seeds an aggregate that
//! claims the window's contents. A marker already claimed by an earlier
//! aggregate moves only when the new aggregate is strictly closer, so ties
//! always resolve in favor of the aggregate that formed first.

use crate::cluster::{Cluster, ClusterGroup, ClusterProvider, DefaultClusterProvider, Marker};
use crate::error::{MapclustError, Result};
use crate::projection::PROJECTION;
use crate::quadtree::{QuadTree, SpatialItem};
use log::trace;
use mapclust_types::geometry::{Bounds, Point};
use mapclust_types::latlng::{LatLng, VisibleRect};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Fraction of the projected viewport diagonal used as the clustering span.
pub const DEFAULT_CLUSTERING_RATIO: f64 = 0.5;

/// The map region a clustering pass is computed for.
///
/// The span scales with the projected diagonal of `visible_rect`, so zooming
/// in shrinks clusters apart and zooming out merges them. `zoom` is carried
/// for logging and for renderers that style by zoom level; it does not feed
/// the span math.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// The visible region, north-west to south-east.
    pub visible_rect: VisibleRect,
    /// Camera zoom level the region was captured at.
    pub zoom: f64,
}

impl Viewport {
    /// Create a viewport from a visible region and its zoom level.
    pub fn new(visible_rect: VisibleRect, zoom: f64) -> Self {
        Self { visible_rect, zoom }
    }

    /// A fully zoomed-out viewport covering the whole world.
    pub fn world() -> Self {
        Self::new(VisibleRect::world(), 0.0)
    }
}

/// A marker paired with its projected unit-world position.
#[derive(Debug, Clone)]
struct IndexedMarker {
    marker: Arc<Marker>,
    point: Point,
}

impl SpatialItem for IndexedMarker {
    fn point(&self) -> Point {
        self.point
    }
}

impl PartialEq for IndexedMarker {
    fn eq(&self, other: &Self) -> bool {
        self.marker.id() == other.marker.id()
    }
}

/// Non-hierarchical distance-based clustering over a quadtree index.
///
/// Mutations and [`calculate`](Self::calculate) are separate concerns:
/// mutations require `&mut self`, while `calculate` borrows immutably and
/// never changes stored state, so concurrent passes over a shared instance
/// are safe behind a read lock.
///
/// # Examples
///
/// ```
/// use mapclust::{DistanceBasedAlgorithm, LatLng, Marker, Viewport, VisibleRect};
///
/// let mut algorithm = DistanceBasedAlgorithm::new();
/// algorithm.insert(Marker::new(LatLng::new(55.7539, 37.6208)))?;
/// algorithm.insert(Marker::new(LatLng::new(55.7545, 37.6210)))?;
/// algorithm.insert(Marker::new(LatLng::new(55.7900, 37.5300)))?;
///
/// let viewport = Viewport::new(
///     VisibleRect::new(LatLng::new(55.80, 37.50), LatLng::new(55.70, 37.70)),
///     12.0,
/// );
/// let clusters = algorithm.calculate(&viewport);
///
/// // The two markers near Red Square merge, the third stands alone.
/// assert_eq!(clusters.len(), 2);
/// assert_eq!(clusters.iter().map(|c| c.size()).sum::<usize>(), 3);
/// # Ok::<(), mapclust::MapclustError>(())
/// ```
pub struct DistanceBasedAlgorithm {
    /// Markers in insertion order; candidate iteration follows this order.
    items: Vec<IndexedMarker>,
    ids: FxHashSet<Uuid>,
    tree: QuadTree<IndexedMarker>,
    provider: Box<dyn ClusterProvider>,
    ratio: f64,
}

impl DistanceBasedAlgorithm {
    /// Create an empty algorithm with the default provider and ratio.
    pub fn new() -> Self {
        Self::with_provider(Box::new(DefaultClusterProvider))
    }

    /// Create an empty algorithm with a custom aggregate provider.
    pub fn with_provider(provider: Box<dyn ClusterProvider>) -> Self {
        Self {
            items: Vec::new(),
            ids: FxHashSet::default(),
            tree: QuadTree::new(Bounds::unit()),
            provider,
            ratio: DEFAULT_CLUSTERING_RATIO,
        }
    }

    /// Add one marker.
    ///
    /// Returns `Ok(false)` without changes when a marker with the same id is
    /// already present. Fails if the position does not project into the unit
    /// world.
    pub fn insert(&mut self, marker: Marker) -> Result<bool> {
        let point = Self::project(&marker.position())?;
        if self.ids.contains(&marker.id()) {
            return Ok(false);
        }
        let entry = IndexedMarker {
            marker: Arc::new(marker),
            point,
        };
        self.ids.insert(entry.marker.id());
        self.tree.insert(entry.clone());
        self.items.push(entry);
        Ok(true)
    }

    /// Add a batch of markers, returning how many were new.
    ///
    /// The whole batch is validated before any marker is stored, so a bad
    /// position leaves the algorithm untouched.
    pub fn insert_many(&mut self, markers: Vec<Marker>) -> Result<usize> {
        let mut entries = Vec::with_capacity(markers.len());
        for marker in markers {
            let point = Self::project(&marker.position())?;
            entries.push(IndexedMarker {
                marker: Arc::new(marker),
                point,
            });
        }

        let mut added = 0;
        for entry in entries {
            if !self.ids.insert(entry.marker.id()) {
                continue;
            }
            self.tree.insert(entry.clone());
            self.items.push(entry);
            added += 1;
        }
        Ok(added)
    }

    /// Remove the marker with `id`. Returns whether it was present.
    pub fn remove(&mut self, id: Uuid) -> bool {
        if !self.ids.remove(&id) {
            return false;
        }
        if let Some(index) = self.items.iter().position(|e| e.marker.id() == id) {
            let entry = self.items.remove(index);
            self.tree.remove(&entry);
        }
        true
    }

    /// Remove a batch of markers, returning how many were present.
    pub fn remove_many(&mut self, ids: &[Uuid]) -> usize {
        ids.iter().filter(|id| self.remove(**id)).count()
    }

    /// Replace the whole population with `markers`, returning how many were
    /// stored. Validation happens before the old population is dropped.
    pub fn replace_all(&mut self, markers: Vec<Marker>) -> Result<usize> {
        let mut entries = Vec::with_capacity(markers.len());
        for marker in markers {
            let point = Self::project(&marker.position())?;
            entries.push(IndexedMarker {
                marker: Arc::new(marker),
                point,
            });
        }

        self.clear();
        let mut added = 0;
        for entry in entries {
            if !self.ids.insert(entry.marker.id()) {
                continue;
            }
            self.tree.insert(entry.clone());
            self.items.push(entry);
            added += 1;
        }
        Ok(added)
    }

    /// Remove every marker.
    pub fn clear(&mut self) {
        self.items.clear();
        self.ids.clear();
        self.tree.clear();
    }

    /// Number of stored markers.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no markers are stored.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The stored markers in insertion order.
    pub fn markers(&self) -> impl Iterator<Item = &Arc<Marker>> + '_ {
        self.items.iter().map(|entry| &entry.marker)
    }

    /// Current clustering ratio.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Change the clustering ratio. Must be finite and positive.
    pub fn set_ratio(&mut self, ratio: f64) -> Result<()> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(MapclustError::InvalidInput(format!(
                "clustering ratio must be finite and positive, got {ratio}"
            )));
        }
        self.ratio = ratio;
        Ok(())
    }

    /// Cluster the stored markers for `viewport`.
    ///
    /// The result partitions the population: every stored marker appears in
    /// exactly one returned cluster. Aggregates come first in formation
    /// order, standalone markers after in insertion order.
    pub fn calculate(&self, viewport: &Viewport) -> Vec<Cluster> {
        let span = self.zoom_specific_span(viewport);
        trace!(
            "clustering {} markers, span {:.6}, zoom {:.2}",
            self.items.len(),
            span,
            viewport.zoom
        );

        let mut visited: FxHashSet<Uuid> = FxHashSet::default();
        let mut closest: FxHashMap<Uuid, f64> = FxHashMap::default();
        let mut owner: FxHashMap<Uuid, usize> = FxHashMap::default();
        let mut groups: Vec<ClusterGroup> = Vec::new();
        let mut singles: Vec<Arc<Marker>> = Vec::new();

        for candidate in &self.items {
            let candidate_id = candidate.marker.id();
            if visited.contains(&candidate_id) {
                continue;
            }

            let window = Bounds::from_center_span(candidate.point, span);
            let neighbors = self.tree.search(&window);

            // Alone in its window: standalone result, pinned at distance
            // zero so no later aggregate can claim it.
            if neighbors.len() == 1 {
                singles.push(candidate.marker.clone());
                visited.insert(candidate_id);
                closest.insert(candidate_id, 0.0);
                continue;
            }

            let group_index = groups.len();
            groups.push(self.provider.aggregate(&candidate.marker));

            for neighbor in neighbors {
                let neighbor_id = neighbor.marker.id();
                visited.insert(neighbor_id);

                let distance = neighbor.point.distance_squared(&candidate.point);
                if let Some(&existing) = closest.get(&neighbor_id) {
                    // Equal distances keep the earlier assignment.
                    if existing <= distance {
                        continue;
                    }
                    if let Some(&previous) = owner.get(&neighbor_id) {
                        groups[previous].remove(neighbor_id);
                    }
                }
                closest.insert(neighbor_id, distance);
                groups[group_index].push(neighbor.marker.clone());
                owner.insert(neighbor_id, group_index);
            }
        }

        let mut clusters = Vec::with_capacity(groups.len() + singles.len());
        for group in groups {
            match group.len() {
                // Unreachable: the seed is pinned at distance zero and
                // cannot be reassigned away.
                0 => {}
                1 => {
                    let mut markers = group.into_markers();
                    if let Some(marker) = markers.pop() {
                        clusters.push(Cluster::Single(marker));
                    }
                }
                _ => clusters.push(Cluster::Group(group)),
            }
        }
        clusters.extend(singles.into_iter().map(Cluster::Single));
        clusters
    }

    /// The clustering span for `viewport`: the projected diagonal of its
    /// visible region scaled by the ratio. A viewport that yields no finite
    /// diagonal degrades to span zero, which merges exact duplicates only.
    fn zoom_specific_span(&self, viewport: &Viewport) -> f64 {
        let top_left = PROJECTION.to_point(&viewport.visible_rect.top_left);
        let bottom_right = PROJECTION.to_point(&viewport.visible_rect.bottom_right);
        let span = top_left.distance_squared(&bottom_right).sqrt() * self.ratio;
        if span.is_finite() { span } else { 0.0 }
    }

    fn project(position: &LatLng) -> Result<Point> {
        let point = PROJECTION.to_point(position);
        if !Bounds::unit().contains(&point) {
            return Err(MapclustError::InvalidInput(format!(
                "position ({}, {}) does not project into the unit world",
                position.latitude(),
                position.longitude()
            )));
        }
        Ok(point)
    }
}

impl Default for DistanceBasedAlgorithm {
    fn default() -> Self {
        Self::new()
    }
}
