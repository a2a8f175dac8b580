//! Embedded viewport-driven marker clustering engine for interactive maps.
//!
//! ```rust
//! use mapclust::{Cluster, ClusterManager, ClusterRenderer, LatLng, Marker};
//!
//! struct LogRenderer;
//!
//! impl ClusterRenderer for LogRenderer {
//!     fn update_clusters(&self, clusters: Vec<Cluster>) {
//!         println!("{} clusters ready", clusters.len());
//!     }
//! }
//!
//! let manager = ClusterManager::builder().renderer(LogRenderer).build()?;
//! manager.add_marker(Marker::new(LatLng::new(55.7539, 37.6208)))?;
//! manager.add_marker(Marker::new(LatLng::new(55.7545, 37.6210)))?;
//! manager.close();
//! # Ok::<(), mapclust::MapclustError>(())
//! ```

pub mod algorithm;
pub mod builder;
pub mod cluster;
pub mod error;
pub mod manager;
pub mod projection;
pub mod quadtree;
pub mod render;

pub use algorithm::{DEFAULT_CLUSTERING_RATIO, DistanceBasedAlgorithm, Viewport};
pub use builder::ClusterManagerBuilder;
pub use cluster::{Cluster, ClusterGroup, ClusterProvider, DefaultClusterProvider, Marker};
pub use error::{MapclustError, Result};
pub use manager::{ClusterManager, EngineStats};
pub use render::ClusterRenderer;

pub type Mapclust = ClusterManager;

pub use mapclust_types::geometry::{Bounds, Point};
pub use mapclust_types::latlng::{LatLng, VisibleRect};

pub use projection::SphericalMercatorProjection;

pub use quadtree::{QuadTree, SpatialItem};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Cluster, ClusterManager, ClusterManagerBuilder, Mapclust};

    pub use crate::{MapclustError, Result};

    pub use crate::{ClusterProvider, ClusterRenderer, DefaultClusterProvider, Marker};

    pub use crate::{LatLng, Viewport, VisibleRect};

    pub use crate::{DistanceBasedAlgorithm, EngineStats};
}
