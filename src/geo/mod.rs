//! Geodesy for GeoVault.
//!
//! Provides the coordinate handling the access core relies on:
//! - Validated latitude/longitude pairs (malformed input is rejected, never
//!   clamped or silently corrected)
//! - Great-circle distance in meters, accurate at geofence scale
//! - Geohash encoding for approximate-location labels on listing surfaces
//!
//! Distance and encoding are pure functions; nothing here touches storage
//! or the clock.

pub mod distance;
pub mod types;

pub use distance::{haversine_distance_m, point_to_geohash, EARTH_RADIUS_M};
pub use types::{GeoError, GeoPoint};
