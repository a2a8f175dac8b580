//! Spherical Mercator projection between geographic coordinates and the
//! normalized plane.
//!
//! The engine clusters in a flat coordinate space where Euclidean distance is
//! a usable stand-in for geographic proximity at map scale. A single shared
//! projection at world width 1.0 maps the globe onto the unit square the
//! spatial index covers.

use mapclust_types::geometry::Point;
use mapclust_types::latlng::LatLng;
use once_cell::sync::Lazy;
use std::f64::consts::PI;

/// Projection shared by the whole engine: the world mapped onto `[0,1]x[0,1]`.
pub(crate) static PROJECTION: Lazy<SphericalMercatorProjection> =
    Lazy::new(|| SphericalMercatorProjection::new(1.0));

/// A spherical Mercator projection at a fixed world width.
#[derive(Debug, Clone, Copy)]
pub struct SphericalMercatorProjection {
    world_width: f64,
}

impl SphericalMercatorProjection {
    /// Create a projection mapping the world onto a `world_width`-sided square.
    pub fn new(world_width: f64) -> Self {
        Self { world_width }
    }

    /// Project a geographic coordinate onto the plane.
    ///
    /// `x` is linear in longitude; `y` follows the Mercator stretch and is
    /// clamped into the square, so polar latitudes saturate at the edges
    /// instead of escaping the index. Longitudes beyond +-180 degrees project
    /// outside `[0, world_width]` and are left to the caller to reject.
    pub fn to_point(&self, coords: &LatLng) -> Point {
        let x = coords.longitude() / 360.0 + 0.5;
        let siny = coords.latitude().to_radians().sin();
        let y = 0.5 - 0.25 * ((1.0 + siny) / (1.0 - siny)).ln() / PI;
        Point::new(self.world_width * x, self.world_width * y.clamp(0.0, 1.0))
    }

    /// Map a projected point back to a geographic coordinate.
    ///
    /// Inverse of [`to_point`](Self::to_point) away from the clamped polar
    /// edges.
    pub fn to_lat_lng(&self, point: &Point) -> LatLng {
        let longitude = (point.x / self.world_width - 0.5) * 360.0;
        let n = PI * (1.0 - 2.0 * point.y / self.world_width);
        let latitude = (2.0 * n.exp().atan() - PI / 2.0).to_degrees();
        LatLng::new(latitude, longitude)
    }
}
