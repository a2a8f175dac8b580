//! Engine builder for flexible configuration
//!
//! This module provides a builder pattern for creating cluster engines with
//! a custom renderer, aggregate provider, viewport, and clustering ratio.

use crate::algorithm::{DEFAULT_CLUSTERING_RATIO, DistanceBasedAlgorithm, Viewport};
use crate::cluster::ClusterProvider;
use crate::error::{MapclustError, Result};
use crate::manager::ClusterManager;
use crate::render::ClusterRenderer;
use std::sync::Arc;

/// Builder for [`ClusterManager`].
///
/// A renderer is required; everything else has defaults: the world viewport,
/// the default clustering ratio, and aggregates anchored at their seeding
/// marker.
///
/// # Examples
///
/// ```
/// use mapclust::{Cluster, ClusterManager, ClusterRenderer};
///
/// struct LogRenderer;
///
/// impl ClusterRenderer for LogRenderer {
///     fn update_clusters(&self, clusters: Vec<Cluster>) {
///         println!("{} clusters ready", clusters.len());
///     }
/// }
///
/// let manager = ClusterManager::builder()
///     .renderer(LogRenderer)
///     .ratio(0.4)
///     .build()?;
/// assert_eq!(manager.marker_count(), 0);
/// # Ok::<(), mapclust::MapclustError>(())
/// ```
pub struct ClusterManagerBuilder {
    renderer: Option<Arc<dyn ClusterRenderer>>,
    provider: Option<Box<dyn ClusterProvider>>,
    viewport: Viewport,
    ratio: f64,
}

impl ClusterManagerBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            renderer: None,
            provider: None,
            viewport: Viewport::world(),
            ratio: DEFAULT_CLUSTERING_RATIO,
        }
    }

    /// Set the renderer clustering results are delivered to.
    pub fn renderer(mut self, renderer: impl ClusterRenderer + 'static) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Like [`renderer`](Self::renderer), for a renderer the caller keeps a
    /// handle to.
    pub fn shared_renderer(mut self, renderer: Arc<dyn ClusterRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Set a custom aggregate provider.
    pub fn provider(mut self, provider: impl ClusterProvider + 'static) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    /// Set the initial viewport. Defaults to the whole world.
    pub fn viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Set the clustering ratio, validated at build time.
    pub fn ratio(mut self, ratio: f64) -> Self {
        self.ratio = ratio;
        self
    }

    /// Build the engine and start its recompute worker. Fires the
    /// renderer's `on_add` hook.
    pub fn build(self) -> Result<ClusterManager> {
        let renderer = self.renderer.ok_or_else(|| {
            MapclustError::InvalidInput("a renderer is required to build a cluster engine".into())
        })?;
        let mut algorithm = match self.provider {
            Some(provider) => DistanceBasedAlgorithm::with_provider(provider),
            None => DistanceBasedAlgorithm::new(),
        };
        algorithm.set_ratio(self.ratio)?;
        ClusterManager::from_parts(algorithm, renderer, self.viewport)
    }
}

impl Default for ClusterManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
