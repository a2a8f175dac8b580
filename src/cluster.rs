//! Markers, aggregates, and the provider abstraction.
//!
//! A [`Marker`] is the persistent item users add to the engine. Each
//! clustering pass reduces the current markers to a set of [`Cluster`]s:
//! markers far from everything come out as [`Cluster::Single`], groups of
//! nearby markers come out as [`Cluster::Group`]. Groups are rebuilt from
//! scratch every pass and anchored at the position of the marker that seeded
//! them, never at a centroid, so an anchor does not drift as membership
//! changes.

use mapclust_types::latlng::LatLng;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use uuid::Uuid;

/// A single geo-located map item.
///
/// Markers carry a generated id; equality and hashing follow the id alone,
/// so two markers at the same coordinates stay distinct and a cloned marker
/// still refers to the same logical item. The metadata value is free-form
/// and travels untouched through clustering.
///
/// # Examples
///
/// ```
/// use mapclust::{LatLng, Marker};
///
/// let pin = Marker::new(LatLng::new(55.7539, 37.6208));
/// let same = pin.clone();
/// let other = Marker::new(LatLng::new(55.7539, 37.6208));
///
/// assert_eq!(pin, same);
/// assert_ne!(pin, other);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Marker {
    id: Uuid,
    position: LatLng,
    metadata: serde_json::Value,
}

impl Marker {
    /// Create a marker at `position` with a fresh id and no metadata.
    pub fn new(position: LatLng) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            metadata: serde_json::Value::Null,
        }
    }

    /// Create a marker carrying a free-form metadata payload.
    pub fn with_metadata(position: LatLng, metadata: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            metadata,
        }
    }

    /// The marker's identity.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Where the marker sits.
    pub fn position(&self) -> LatLng {
        self.position
    }

    /// The attached payload, `Null` unless one was provided.
    pub fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }
}

impl PartialEq for Marker {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Marker {}

impl Hash for Marker {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// An aggregate of markers represented at one anchor point.
///
/// The anchor is fixed at construction and never moves as members are added
/// or removed.
#[derive(Debug, Clone)]
pub struct ClusterGroup {
    anchor: LatLng,
    markers: Vec<Arc<Marker>>,
}

impl ClusterGroup {
    /// Create an empty aggregate anchored at `anchor`.
    pub fn seeded_at(anchor: LatLng) -> Self {
        Self {
            anchor,
            markers: Vec::new(),
        }
    }

    /// Add a member.
    pub fn push(&mut self, marker: Arc<Marker>) {
        self.markers.push(marker);
    }

    /// Remove the member with `id`, if present. Returns whether anything was
    /// removed.
    pub fn remove(&mut self, id: Uuid) -> bool {
        match self.markers.iter().position(|m| m.id() == id) {
            Some(index) => {
                self.markers.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// The fixed representative point.
    pub fn anchor(&self) -> LatLng {
        self.anchor
    }

    /// Current number of members.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Whether the aggregate has no members yet.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// The members.
    pub fn markers(&self) -> &[Arc<Marker>] {
        &self.markers
    }

    /// Consume the aggregate, yielding its members.
    pub fn into_markers(self) -> Vec<Arc<Marker>> {
        self.markers
    }
}

/// One unit of a clustering result.
#[derive(Debug, Clone)]
pub enum Cluster {
    /// A marker rendered on its own.
    Single(Arc<Marker>),
    /// Two or more markers represented at one anchor.
    Group(ClusterGroup),
}

impl Cluster {
    /// The point this cluster is rendered at: the marker's own position for
    /// a single, the fixed anchor for a group.
    pub fn position(&self) -> LatLng {
        match self {
            Cluster::Single(marker) => marker.position(),
            Cluster::Group(group) => group.anchor(),
        }
    }

    /// Whether this is an aggregate of several markers.
    pub fn is_group(&self) -> bool {
        matches!(self, Cluster::Group(_))
    }

    /// Number of markers represented.
    pub fn size(&self) -> usize {
        match self {
            Cluster::Single(_) => 1,
            Cluster::Group(group) => group.len(),
        }
    }

    /// The represented markers; a single yields itself as a one-element
    /// slice.
    pub fn markers(&self) -> &[Arc<Marker>] {
        match self {
            Cluster::Single(marker) => std::slice::from_ref(marker),
            Cluster::Group(group) => group.markers(),
        }
    }
}

/// Factory for aggregates; implementations choose the anchor policy.
///
/// The algorithm calls this once per freshly formed cluster, passing the
/// marker that seeded it, and fills the returned empty aggregate itself.
pub trait ClusterProvider: Send + Sync {
    /// A fresh, empty aggregate for a cluster seeded by `seed`.
    fn aggregate(&self, seed: &Marker) -> ClusterGroup;
}

/// Anchors every aggregate at its seeding marker's own position.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClusterProvider;

impl ClusterProvider for DefaultClusterProvider {
    fn aggregate(&self, seed: &Marker) -> ClusterGroup {
        ClusterGroup::seeded_at(seed.position())
    }
}
