//! Reusable test helpers for access-control integration tests.
//!
//! Controllers are built over a shared in-memory store with a manual clock,
//! so tests can simulate several devices hitting the same zone set and
//! cross lockout windows without sleeping.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use geovault_core::clock::ManualClock;
use geovault_core::geo::GeoPoint;
use geovault_core::identity::FixedIdentity;
use geovault_core::vault::{AccessController, MediaFile, SqliteZoneStore, ZoneDraft};

/// Controller type every integration test works with.
pub type TestController =
    AccessController<Arc<SqliteZoneStore>, Arc<ManualClock>, FixedIdentity>;

/// Meters per degree of latitude on the spherical earth model.
pub const METERS_PER_LAT_DEGREE: f64 = 111_194.926;

/// Fixed start instant for the manual clock.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Creates a fresh shared store and frozen clock.
pub fn shared_fixture() -> (Arc<SqliteZoneStore>, Arc<ManualClock>) {
    let store = Arc::new(SqliteZoneStore::in_memory().expect("in-memory store"));
    let clock = Arc::new(ManualClock::new(start_time()));
    (store, clock)
}

/// Builds a controller for a named device over the shared fixture.
pub fn controller_for(
    store: &Arc<SqliteZoneStore>,
    clock: &Arc<ManualClock>,
    device: &str,
) -> TestController {
    AccessController::new(
        Arc::clone(store),
        Arc::clone(clock),
        FixedIdentity::new(device),
    )
}

/// A small attached file.
pub fn sample_file(name: &str) -> MediaFile {
    MediaFile::from_bytes(name, "image/jpeg", b"jpeg bytes", start_time())
}

/// A draft at the given coordinate with one file attached.
pub fn draft_at(lat: f64, lon: f64, pin: &str) -> ZoneDraft {
    let location = GeoPoint::new(lat, lon).expect("valid test coordinate");
    ZoneDraft::new("Memory", location, pin).with_file(sample_file("photo.jpg"))
}

/// Latitude `meters` north of the given latitude.
pub fn north_of(lat: f64, meters: f64) -> f64 {
    lat + meters / METERS_PER_LAT_DEGREE
}
