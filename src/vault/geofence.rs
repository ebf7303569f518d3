//! Geofence matching: which zone does a tapped coordinate refer to?
//!
//! A tap matches a zone when its great-circle distance to the zone center
//! is at most the zone's radius (inclusive). When several geofences overlap
//! the tap, the nearest center wins and exact distance ties are broken by
//! the smallest zone id, so the result is fully deterministic for a given
//! input set.
//!
//! The scan is linear over the full zone set, which is fine at the scale of
//! one user's zones. The contract is a pure function over a slice, so a
//! spatial index could replace the scan without changing behavior.

use std::cmp::Ordering;

use super::types::Zone;
use crate::geo::{haversine_distance_m, GeoPoint};

/// A zone matched by a tap, with the measured center distance.
#[derive(Debug, Clone, Copy)]
pub struct GeofenceHit<'a> {
    /// The matched zone.
    pub zone: &'a Zone,
    /// Distance from the tap to the zone center, in meters.
    pub distance_m: f64,
}

/// Resolves a tap against the known zones.
///
/// Returns the single deterministic match, or `None` when the tap lands in
/// empty space (a candidate location for a new zone - not an error).
#[must_use]
pub fn resolve<'a>(zones: &'a [Zone], tap: GeoPoint) -> Option<GeofenceHit<'a>> {
    let mut best: Option<GeofenceHit<'a>> = None;

    for zone in zones {
        let distance_m = haversine_distance_m(tap, zone.location);
        if distance_m > zone.radius_m {
            continue;
        }

        let wins = best.as_ref().is_none_or(|current| {
            match distance_m.partial_cmp(&current.distance_m) {
                Some(Ordering::Less) => true,
                Some(Ordering::Equal) => zone.id < current.zone.id,
                _ => false,
            }
        });

        if wins {
            best = Some(GeofenceHit { zone, distance_m });
        }
    }

    best
}
