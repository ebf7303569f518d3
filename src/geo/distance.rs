//! Great-circle distance and geohash encoding.
//!
//! Geofence matching needs meter-level accuracy over distances of a few
//! hundred meters at most, which the haversine formula on a spherical earth
//! model delivers comfortably.

use super::types::GeoPoint;

/// Mean earth radius in meters (spherical model).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Computes the great-circle distance between two points in meters.
///
/// Uses the haversine formula. At geofence scale (hundreds of meters) the
/// spherical-earth error is far below a meter, so the result can be compared
/// directly against zone radii.
///
/// # Examples
///
/// ```
/// use geovault_core::geo::{haversine_distance_m, GeoPoint};
///
/// let a = GeoPoint::new(0.0, 0.0).unwrap();
/// let b = GeoPoint::new(0.001, 0.0).unwrap();
/// let d = haversine_distance_m(a, b);
/// // One millidegree of latitude is roughly 111 meters.
/// assert!((d - 111.2).abs() < 0.5);
/// ```
#[must_use]
pub fn haversine_distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi_a = a.latitude.to_radians();
    let phi_b = b.latitude.to_radians();
    let delta_phi = (b.latitude - a.latitude).to_radians();
    let delta_lambda = (b.longitude - a.longitude).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi_a.cos() * phi_b.cos() * (delta_lambda / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Encodes a point as a geohash string of the given length.
///
/// Zones carry a precision-8 geohash (~19m cell) as an approximate-location
/// label for listing surfaces; matching itself always uses exact distance.
///
/// Returns an empty string if encoding fails, which cannot happen for a
/// validated [`GeoPoint`].
#[must_use]
pub fn point_to_geohash(point: GeoPoint, precision: u8) -> String {
    geohash::encode(
        geohash::Coord {
            x: point.longitude,
            y: point.latitude,
        },
        precision as usize,
    )
    .unwrap_or_else(|_| String::new())
}
