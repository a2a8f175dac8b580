use geo::Point;
use serde::{Deserialize, Serialize};

/// A geographic coordinate in degrees.
///
/// Latitude grows northward, longitude eastward. The coordinate is an
/// immutable value; equality compares the raw degrees.
///
/// # Examples
///
/// ```
/// use mapclust_types::latlng::LatLng;
///
/// let nyc = LatLng::new(40.7128, -74.0060);
/// assert_eq!(nyc.latitude(), 40.7128);
/// assert_eq!(nyc.longitude(), -74.0060);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// The underlying 2D point (x = longitude, y = latitude).
    pub point: Point<f64>,
}

impl LatLng {
    /// Create a coordinate from latitude and longitude in degrees.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            point: Point::new(longitude, latitude),
        }
    }

    /// Latitude in degrees.
    pub fn latitude(&self) -> f64 {
        self.point.y()
    }

    /// Longitude in degrees.
    pub fn longitude(&self) -> f64 {
        self.point.x()
    }

    /// A reference to the underlying 2D point.
    pub fn point(&self) -> &Point<f64> {
        &self.point
    }

    /// Great-circle distance to another coordinate, in meters.
    ///
    /// Uses the haversine formula on a spherical Earth. Accurate enough for
    /// map-scale distances; not intended for geodesy.
    ///
    /// # Examples
    ///
    /// ```
    /// use mapclust_types::latlng::LatLng;
    ///
    /// let a = LatLng::new(55.7500, 37.6100);
    /// let b = LatLng::new(55.7510, 37.6110);
    /// let d = a.haversine_distance(&b);
    /// assert!(d > 100.0 && d < 200.0);
    /// ```
    pub fn haversine_distance(&self, other: &LatLng) -> f64 {
        const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

        let lat1 = self.latitude().to_radians();
        let lat2 = other.latitude().to_radians();
        let delta_lat = (other.latitude() - self.latitude()).to_radians();
        let delta_lon = (other.longitude() - self.longitude()).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_METERS * c
    }
}

/// A geographic viewport expressed by its top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibleRect {
    /// North-west corner of the viewport.
    pub top_left: LatLng,
    /// South-east corner of the viewport.
    pub bottom_right: LatLng,
}

impl VisibleRect {
    /// Create a viewport from its two corners.
    pub fn new(top_left: LatLng, bottom_right: LatLng) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    /// The whole world, capped at Mercator-comfortable latitudes.
    pub fn world() -> Self {
        Self::new(LatLng::new(85.0, -180.0), LatLng::new(-85.0, 180.0))
    }
}
