//! # mapclust-types
//!
//! Geographic and projected-plane primitives for the mapclust clustering
//! engine.
//!
//! This crate provides the value types the engine works with:
//!
//! - **Geographic types**: `LatLng`, `VisibleRect`
//! - **Projected-plane types**: `Point`, `Bounds`
//!
//! All types are serializable with Serde. The geographic types are built on
//! top of the `geo` crate's geometric primitives; the projected-plane types
//! live in the engine's normalized unit square.
//!
//! ## Examples
//!
//! ```rust
//! use mapclust_types::latlng::LatLng;
//!
//! let red_square = LatLng::new(55.7539, 37.6208);
//! assert_eq!(red_square.latitude(), 55.7539);
//! assert_eq!(red_square.longitude(), 37.6208);
//! ```

pub mod geometry;
pub mod latlng;
