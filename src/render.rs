//! The rendering seam.

use crate::cluster::Cluster;

/// Receiver for settled clustering results.
///
/// The engine calls [`update_clusters`](Self::update_clusters) from its
/// recompute worker thread, once per clustering pass that is still current
/// when it finishes. Stale passes are discarded, never delivered, so a
/// renderer only ever sees results that reflect the engine state at the time
/// of delivery. Implementations must hand the result off to their own UI
/// context if one is required.
pub trait ClusterRenderer: Send + Sync {
    /// Deliver the clusters of a settled pass. Replaces, not amends, any
    /// previously delivered result.
    fn update_clusters(&self, clusters: Vec<Cluster>);

    /// Called once when the renderer is attached to an engine.
    fn on_add(&self) {}

    /// Called once when the engine shuts down.
    fn on_remove(&self) {}
}
