//! Coordinate types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for coordinate validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    /// Latitude was not finite or fell outside -90.0..=90.0.
    #[error("Invalid latitude: {0}")]
    InvalidLatitude(f64),

    /// Longitude was not finite or fell outside -180.0..=180.0.
    #[error("Invalid longitude: {0}")]
    InvalidLongitude(f64),
}

/// A validated geographic coordinate.
///
/// Construction rejects non-finite or out-of-range values instead of
/// clamping them, so a `GeoPoint` that exists is always a real location.
/// Zone centers and tap coordinates both flow through this type before
/// any matching is attempted.
///
/// # Example
///
/// ```
/// use geovault_core::geo::GeoPoint;
///
/// let point = GeoPoint::new(37.7749, -122.4194).unwrap();
/// assert_eq!(point.latitude, 37.7749);
///
/// assert!(GeoPoint::new(91.0, 0.0).is_err());
/// assert!(GeoPoint::new(0.0, f64::NAN).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in decimal degrees, -90.0..=90.0.
    pub latitude: f64,

    /// Longitude in decimal degrees, -180.0..=180.0.
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a validated coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidLatitude`] or [`GeoError::InvalidLongitude`]
    /// if the respective value is NaN, infinite, or out of range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::InvalidLatitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::InvalidLongitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}
