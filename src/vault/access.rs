//! High-level access control API.
//!
//! [`AccessController`] combines geofence matching, PIN verification, the
//! per-zone lockout state machine, and ownership/visibility rules. It takes
//! its storage, clock, and identity collaborators as constructor parameters
//! and never reaches into ambient global state.
//!
//! The controller only produces decisions. Revealing content (listing and
//! rendering files) is the surrounding application's job once a decision
//! grants access.
//!
//! # Authentication routes
//!
//! There are two deliberately separate routes to a zone's contents:
//!
//! - **PIN** ([`unlock`]): throttled by the lockout state machine. Wrong
//!   PINs count toward a per-zone lock held in the shared store.
//! - **Share token** ([`unlock_shared`]): an opaque capability the owner
//!   hands out. It bypasses PIN verification entirely - convenience over
//!   secrecy - and is revocable at any time. It is modeled as its own grant
//!   kind, never folded into PIN verification.
//!
//! Owners additionally get a shortcut: appending content to their own zone
//! does not require re-presenting the PIN.
//!
//! [`unlock`]: AccessController::unlock
//! [`unlock_shared`]: AccessController::unlock_shared

use chrono::{DateTime, Utc};
use rand::RngCore;
use uuid::Uuid;

use super::error::{Result, VaultError};
use super::geofence;
use super::storage::ZoneStore;
use super::types::{
    AccessLogEntry, AccessVia, LockoutPolicy, MediaFile, RadiusBounds, Visibility, Zone,
    ZoneDraft, ZoneSummary, ZONE_GEOHASH_PRECISION,
};
use crate::clock::Clock;
use crate::credential::{hash_pin, verify_pin, PinPolicy};
use crate::geo::{point_to_geohash, GeoPoint};
use crate::identity::DeviceIdentity;

/// Outcome of resolving a tapped coordinate against the known zones.
#[derive(Debug, Clone)]
pub enum TapResolution {
    /// The tap falls inside an existing geofence.
    Matched {
        /// The matched zone, without credential material.
        zone: ZoneSummary,
        /// Distance from the tap to the zone center, in meters.
        distance_m: f64,
        /// Remaining lockout seconds, if the zone is cooling down.
        locked_for_secs: Option<i64>,
    },
    /// Empty space - a candidate location for a new zone.
    Empty {
        /// The validated tap coordinate.
        location: GeoPoint,
    },
}

/// How read access to a zone's contents was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessGrant {
    /// A correct PIN was presented.
    Pin,
    /// A valid share token was presented; the PIN was never consulted.
    ShareToken,
}

/// Result of a share-token access.
#[derive(Debug, Clone)]
pub struct SharedAccess {
    /// The zone the token unlocked, without credential material.
    pub zone: ZoneSummary,
    /// The grant kind (always [`AccessGrant::ShareToken`]).
    pub grant: AccessGrant,
}

/// Outcome of a PIN verification attempt.
///
/// All three variants are normal decisions. Only the short user-reportable
/// facts are carried; hash contents and internal state never leave the
/// controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The PIN matched; contents may be revealed.
    Granted {
        /// The grant kind (always [`AccessGrant::Pin`]).
        grant: AccessGrant,
    },
    /// The PIN did not match.
    InvalidPin {
        /// Failed attempts now counted toward the next lock.
        failed_attempts: u32,
        /// Attempts left before the zone locks.
        attempts_remaining: u32,
    },
    /// The zone is cooling down; no hash comparison was made.
    Locked {
        /// Whole seconds until attempts are accepted again.
        retry_after_secs: i64,
    },
}

/// Access controller for PIN-protected zones.
///
/// Generic over its collaborators so tests can drive a manual clock and
/// simulate multiple devices sharing one store.
///
/// # Example
///
/// ```ignore
/// use geovault_core::clock::SystemClock;
/// use geovault_core::identity::StoredDeviceIdentity;
/// use geovault_core::vault::{AccessController, SqliteZoneStore};
///
/// let store = SqliteZoneStore::new(Path::new("/data/geovault/zones.db"))?;
/// let identity = StoredDeviceIdentity::open(Path::new("/data/geovault"))?;
/// let controller = AccessController::new(store, SystemClock, identity);
/// let resolution = controller.resolve_tap(37.7749, -122.4194)?;
/// ```
pub struct AccessController<S, C, I> {
    store: S,
    clock: C,
    identity: I,
    pin_policy: PinPolicy,
    lockout_policy: LockoutPolicy,
    radius_bounds: RadiusBounds,
}

impl<S, C, I> AccessController<S, C, I>
where
    S: ZoneStore,
    C: Clock,
    I: DeviceIdentity,
{
    /// Creates a controller with default policies.
    pub fn new(store: S, clock: C, identity: I) -> Self {
        Self {
            store,
            clock,
            identity,
            pin_policy: PinPolicy::default(),
            lockout_policy: LockoutPolicy::default(),
            radius_bounds: RadiusBounds::default(),
        }
    }

    /// Overrides the PIN length policy.
    #[must_use]
    pub const fn with_pin_policy(mut self, pin_policy: PinPolicy) -> Self {
        self.pin_policy = pin_policy;
        self
    }

    /// Overrides the lockout policy.
    #[must_use]
    pub const fn with_lockout_policy(mut self, lockout_policy: LockoutPolicy) -> Self {
        self.lockout_policy = lockout_policy;
        self
    }

    /// Overrides the accepted radius bounds.
    #[must_use]
    pub const fn with_radius_bounds(mut self, radius_bounds: RadiusBounds) -> Self {
        self.radius_bounds = radius_bounds;
        self
    }

    /// Resolves a tapped coordinate against all known zones.
    ///
    /// Visibility does not affect matching: private zones are found exactly
    /// like public ones. Privacy only changes what [`list_visible`] shows.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidInput`] for a malformed coordinate, or
    /// a storage error.
    ///
    /// [`list_visible`]: Self::list_visible
    pub fn resolve_tap(&self, latitude: f64, longitude: f64) -> Result<TapResolution> {
        let tap = GeoPoint::new(latitude, longitude)?;
        let zones = self.store.find_all()?;

        Ok(match geofence::resolve(&zones, tap) {
            Some(hit) => TapResolution::Matched {
                locked_for_secs: hit.zone.lock_remaining_secs(self.clock.now()),
                zone: ZoneSummary::from(hit.zone),
                distance_m: hit.distance_m,
            },
            None => TapResolution::Empty { location: tap },
        })
    }

    /// Creates a new zone from a draft.
    ///
    /// The PIN is hashed and discarded; only the hash is stored. The zone
    /// is owned by the current device.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidInput`] for a bad PIN format, out-of-bounds
    ///   radius, or empty file list.
    /// - [`VaultError::AlreadyExists`] when the location is already inside
    ///   an existing geofence (the caller should resolve first and unlock
    ///   the match instead).
    pub fn create_zone(&self, draft: ZoneDraft) -> Result<Zone> {
        self.pin_policy.validate(&draft.pin)?;
        if !self.radius_bounds.contains(draft.radius_m) {
            return Err(VaultError::InvalidInput(format!(
                "Radius must be {:.0}-{:.0} m, got {}",
                self.radius_bounds.min_m, self.radius_bounds.max_m, draft.radius_m
            )));
        }
        if draft.files.is_empty() {
            return Err(VaultError::InvalidInput(
                "A zone needs at least one file".to_string(),
            ));
        }

        let zones = self.store.find_all()?;
        if let Some(hit) = geofence::resolve(&zones, draft.location) {
            return Err(VaultError::AlreadyExists(hit.zone.id.clone()));
        }

        let now = self.clock.now();
        let zone = Zone {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            location: draft.location,
            radius_m: draft.radius_m,
            geohash: point_to_geohash(draft.location, ZONE_GEOHASH_PRECISION),
            credential_hash: hash_pin(&draft.pin)?,
            owner_id: self.identity.current_owner_id(),
            visibility: draft.visibility,
            share_token: None,
            files: draft.files,
            failed_attempts: 0,
            locked_until: None,
            created_at: now,
            updated_at: now,
        };

        self.store.save(&zone)?;
        Ok(zone)
    }

    /// Attempts to unlock a zone with a PIN.
    ///
    /// Runs the lockout state machine: an active lock rejects the attempt
    /// before any hash comparison; a failure is counted atomically in the
    /// shared store and may trigger a lock; a success resets the counters
    /// and clears any future lock.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] for an unknown zone,
    /// [`VaultError::InvalidInput`] for a malformed PIN (rejected before
    /// hashing, not counted as an attempt), or a storage error.
    pub fn unlock(&self, zone_id: &str, pin: &str) -> Result<UnlockOutcome> {
        let zone = self.load_required(zone_id)?;
        let now = self.clock.now();

        if let Some(retry_after_secs) = zone.lock_remaining_secs(now) {
            return Ok(UnlockOutcome::Locked { retry_after_secs });
        }

        self.pin_policy.validate(pin)?;

        if verify_pin(pin, &zone.credential_hash) {
            self.store.clear_failed_attempts(zone_id, now)?;
            self.store.record_access(zone_id, AccessVia::Pin, now)?;
            return Ok(UnlockOutcome::Granted {
                grant: AccessGrant::Pin,
            });
        }

        let state = self
            .store
            .record_failed_attempt(zone_id, &self.lockout_policy, now)?;

        Ok(state.locked_until.map_or(
            UnlockOutcome::InvalidPin {
                failed_attempts: state.failed_attempts,
                attempts_remaining: self
                    .lockout_policy
                    .max_attempts
                    .saturating_sub(state.failed_attempts),
            },
            |until| UnlockOutcome::Locked {
                retry_after_secs: remaining_secs(until, now),
            },
        ))
    }

    /// Grants access via a share token, bypassing PIN verification.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] when no zone carries the token
    /// (including tokens that have been revoked), or a storage error.
    pub fn unlock_shared(&self, token: &str) -> Result<SharedAccess> {
        let zone = self
            .store
            .find_by_share_token(token)?
            .ok_or_else(|| VaultError::NotFound("share token".to_string()))?;

        self.store
            .record_access(&zone.id, AccessVia::Share, self.clock.now())?;

        Ok(SharedAccess {
            zone: ZoneSummary::from(&zone),
            grant: AccessGrant::ShareToken,
        })
    }

    /// Appends files to an owned zone without re-presenting the PIN.
    ///
    /// The existing credential hash is reused untouched; re-locking a zone
    /// never silently changes its PIN.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Unauthorized`] for non-owners,
    /// [`VaultError::InvalidInput`] for an empty file list,
    /// [`VaultError::NotFound`] for an unknown zone, or a storage error.
    pub fn append_files(&self, zone_id: &str, files: Vec<MediaFile>) -> Result<Zone> {
        if files.is_empty() {
            return Err(VaultError::InvalidInput(
                "Nothing to append".to_string(),
            ));
        }

        let mut zone = self.owned_zone(zone_id, "append content")?;
        zone.files.extend(files);
        zone.updated_at = self.clock.now();
        self.store.save(&zone)?;
        Ok(zone)
    }

    /// Replaces the PIN of an owned zone.
    ///
    /// This is the only way a zone's credential hash changes after
    /// creation. Lockout counters are cleared, since the old PIN's failed
    /// attempts say nothing about the new one.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Unauthorized`] for non-owners,
    /// [`VaultError::InvalidInput`] for a bad PIN format,
    /// [`VaultError::NotFound`] for an unknown zone, or a storage error.
    pub fn replace_pin(&self, zone_id: &str, new_pin: &str) -> Result<()> {
        self.pin_policy.validate(new_pin)?;

        let mut zone = self.owned_zone(zone_id, "replace the PIN")?;
        let now = self.clock.now();
        zone.credential_hash = hash_pin(new_pin)?;
        zone.updated_at = now;
        self.store.save(&zone)?;
        self.store.clear_failed_attempts(zone_id, now)?;
        Ok(())
    }

    /// Changes the listing visibility of an owned zone.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Unauthorized`] for non-owners,
    /// [`VaultError::NotFound`] for an unknown zone, or a storage error.
    pub fn set_visibility(&self, zone_id: &str, visibility: Visibility) -> Result<Zone> {
        let mut zone = self.owned_zone(zone_id, "change visibility")?;
        zone.visibility = visibility;
        zone.updated_at = self.clock.now();
        self.store.save(&zone)?;
        Ok(zone)
    }

    /// Issues a share token for an owned zone, or returns the active one.
    ///
    /// A zone has at most one active token; issuing is idempotent until
    /// the token is revoked.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Unauthorized`] for non-owners,
    /// [`VaultError::NotFound`] for an unknown zone, or a storage error.
    pub fn issue_share_token(&self, zone_id: &str) -> Result<String> {
        let mut zone = self.owned_zone(zone_id, "issue a share token")?;

        if let Some(token) = zone.share_token {
            return Ok(token);
        }

        let token = generate_share_token();
        zone.share_token = Some(token.clone());
        zone.updated_at = self.clock.now();
        self.store.save(&zone)?;
        Ok(token)
    }

    /// Revokes the active share token of an owned zone.
    ///
    /// Subsequent [`unlock_shared`] calls with the old token fail
    /// immediately. Revoking a zone without a token is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Unauthorized`] for non-owners,
    /// [`VaultError::NotFound`] for an unknown zone, or a storage error.
    ///
    /// [`unlock_shared`]: Self::unlock_shared
    pub fn revoke_share_token(&self, zone_id: &str) -> Result<()> {
        let mut zone = self.owned_zone(zone_id, "revoke a share token")?;
        zone.share_token = None;
        zone.updated_at = self.clock.now();
        self.store.save(&zone)?;
        Ok(())
    }

    /// Deletes an owned zone and everything attached to it.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Unauthorized`] for non-owners,
    /// [`VaultError::NotFound`] for an unknown zone, or a storage error.
    pub fn delete_zone(&self, zone_id: &str) -> Result<()> {
        let zone = self.owned_zone(zone_id, "delete the zone")?;
        self.store.delete(&zone.id)
    }

    /// Lists the zones visible to the current caller: their own zones plus
    /// every public zone.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the zone set cannot be loaded.
    pub fn list_visible(&self) -> Result<Vec<ZoneSummary>> {
        let caller = self.identity.current_owner_id();
        Ok(self
            .store
            .find_all()?
            .iter()
            .filter(|zone| zone.is_owned_by(&caller) || zone.visibility == Visibility::Public)
            .map(ZoneSummary::from)
            .collect())
    }

    /// Returns the access log of an owned zone, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Unauthorized`] for non-owners,
    /// [`VaultError::NotFound`] for an unknown zone, or a storage error.
    pub fn access_log(&self, zone_id: &str) -> Result<Vec<AccessLogEntry>> {
        let zone = self.owned_zone(zone_id, "read the access log")?;
        self.store.access_log(&zone.id)
    }

    fn load_required(&self, zone_id: &str) -> Result<Zone> {
        self.store
            .load(zone_id)?
            .ok_or_else(|| VaultError::NotFound(zone_id.to_string()))
    }

    fn owned_zone(&self, zone_id: &str, action: &str) -> Result<Zone> {
        let zone = self.load_required(zone_id)?;
        if !zone.is_owned_by(&self.identity.current_owner_id()) {
            return Err(VaultError::Unauthorized(format!(
                "Only the owner may {action}"
            )));
        }
        Ok(zone)
    }
}

/// Whole seconds from `now` until `until`, rounded up.
fn remaining_secs(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    ((until - now).num_milliseconds() + 999) / 1000
}

/// Generates an opaque 128-bit share token as lowercase hex.
fn generate_share_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::identity::FixedIdentity;
    use crate::vault::storage::SqliteZoneStore;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    type TestController = AccessController<Arc<SqliteZoneStore>, Arc<ManualClock>, FixedIdentity>;

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn setup() -> (TestController, Arc<SqliteZoneStore>, Arc<ManualClock>) {
        let store = Arc::new(SqliteZoneStore::in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(start_time()));
        let controller = AccessController::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            FixedIdentity::new("device-a"),
        );
        (controller, store, clock)
    }

    fn controller_for(
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

    fn draft_at(lat: f64, lon: f64) -> ZoneDraft {
        let location = GeoPoint::new(lat, lon).unwrap();
        let file = MediaFile::from_bytes("photo.jpg", "image/jpeg", b"bytes", start_time());
        ZoneDraft::new("Memory", location, "1234").with_file(file)
    }

    #[test]
    fn create_then_resolve_matches_inside_radius() {
        let (controller, _, _) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();

        // ~99m north: inside the default 100m radius.
        match controller.resolve_tap(0.000_89, 0.0).unwrap() {
            TapResolution::Matched {
                zone: summary,
                distance_m,
                locked_for_secs,
            } => {
                assert_eq!(summary.id, zone.id);
                assert!(distance_m < 100.0);
                assert_eq!(locked_for_secs, None);
            }
            TapResolution::Empty { .. } => panic!("expected a match"),
        }

        // ~102m north: outside.
        assert!(matches!(
            controller.resolve_tap(0.000_92, 0.0).unwrap(),
            TapResolution::Empty { .. }
        ));
    }

    #[test]
    fn resolve_rejects_malformed_coordinates() {
        let (controller, _, _) = setup();
        assert!(matches!(
            controller.resolve_tap(91.0, 0.0),
            Err(VaultError::InvalidInput(_))
        ));
        assert!(matches!(
            controller.resolve_tap(f64::NAN, 0.0),
            Err(VaultError::InvalidInput(_))
        ));
    }

    #[test]
    fn create_rejects_bad_pin_radius_and_empty_files() {
        let (controller, _, _) = setup();
        let location = GeoPoint::new(0.0, 0.0).unwrap();
        let file = MediaFile::from_bytes("a.png", "image/png", b"x", start_time());

        let short_pin = ZoneDraft::new("Z", location, "12").with_file(file.clone());
        assert!(matches!(
            controller.create_zone(short_pin),
            Err(VaultError::InvalidInput(_))
        ));

        let bad_radius = ZoneDraft::new("Z", location, "1234")
            .with_file(file.clone())
            .with_radius_m(50.0);
        assert!(matches!(
            controller.create_zone(bad_radius),
            Err(VaultError::InvalidInput(_))
        ));

        let no_files = ZoneDraft::new("Z", location, "1234");
        assert!(matches!(
            controller.create_zone(no_files),
            Err(VaultError::InvalidInput(_))
        ));
    }

    #[test]
    fn create_rejects_covered_location() {
        let (controller, _, _) = setup();
        controller.create_zone(draft_at(0.0, 0.0)).unwrap();

        // ~50m away, inside the first zone's geofence.
        let err = controller.create_zone(draft_at(0.000_45, 0.0));
        assert!(matches!(err, Err(VaultError::AlreadyExists(_))));

        // Far away is fine.
        assert!(controller.create_zone(draft_at(1.0, 1.0)).is_ok());
    }

    #[test]
    fn created_zone_stores_hash_not_pin() {
        let (controller, store, _) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();

        let stored = store.load(&zone.id).unwrap().unwrap();
        assert!(!stored.credential_hash.contains("1234"));
        assert!(stored.credential_hash.starts_with("$argon2"));
    }

    #[test]
    fn unlock_with_correct_pin_grants() {
        let (controller, _, _) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();

        assert_eq!(
            controller.unlock(&zone.id, "1234").unwrap(),
            UnlockOutcome::Granted {
                grant: AccessGrant::Pin
            }
        );
    }

    #[test]
    fn unlock_with_wrong_pin_counts_attempts() {
        let (controller, _, _) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();

        assert_eq!(
            controller.unlock(&zone.id, "9999").unwrap(),
            UnlockOutcome::InvalidPin {
                failed_attempts: 1,
                attempts_remaining: 4
            }
        );
        assert_eq!(
            controller.unlock(&zone.id, "9999").unwrap(),
            UnlockOutcome::InvalidPin {
                failed_attempts: 2,
                attempts_remaining: 3
            }
        );
    }

    #[test]
    fn unlock_rejects_malformed_pin_without_counting() {
        let (controller, _, _) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();

        assert!(matches!(
            controller.unlock(&zone.id, "12ab"),
            Err(VaultError::InvalidInput(_))
        ));

        // The malformed attempt did not touch the counter.
        assert_eq!(
            controller.unlock(&zone.id, "9999").unwrap(),
            UnlockOutcome::InvalidPin {
                failed_attempts: 1,
                attempts_remaining: 4
            }
        );
    }

    #[test]
    fn fifth_failure_locks_the_zone() {
        let (controller, _, _) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();

        for _ in 0..4 {
            assert!(matches!(
                controller.unlock(&zone.id, "9999").unwrap(),
                UnlockOutcome::InvalidPin { .. }
            ));
        }
        assert_eq!(
            controller.unlock(&zone.id, "9999").unwrap(),
            UnlockOutcome::Locked {
                retry_after_secs: 60
            }
        );
    }

    #[test]
    fn locked_zone_rejects_even_the_correct_pin() {
        let (controller, _, clock) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();

        for _ in 0..5 {
            controller.unlock(&zone.id, "9999").unwrap();
        }

        clock.advance(Duration::seconds(10));
        assert_eq!(
            controller.unlock(&zone.id, "1234").unwrap(),
            UnlockOutcome::Locked {
                retry_after_secs: 50
            }
        );
    }

    #[test]
    fn lock_expires_lazily() {
        let (controller, _, clock) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();

        for _ in 0..5 {
            controller.unlock(&zone.id, "9999").unwrap();
        }
        clock.advance(Duration::seconds(60));

        assert_eq!(
            controller.unlock(&zone.id, "1234").unwrap(),
            UnlockOutcome::Granted {
                grant: AccessGrant::Pin
            }
        );
    }

    #[test]
    fn success_resets_counter_and_clears_lock() {
        let (controller, store, _) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();

        for _ in 0..3 {
            controller.unlock(&zone.id, "9999").unwrap();
        }
        controller.unlock(&zone.id, "1234").unwrap();

        let stored = store.load(&zone.id).unwrap().unwrap();
        assert_eq!(stored.failed_attempts, 0);
        assert_eq!(stored.locked_until, None);

        // The slate is clean: five more failures are needed to lock again.
        for _ in 0..4 {
            assert!(matches!(
                controller.unlock(&zone.id, "9999").unwrap(),
                UnlockOutcome::InvalidPin { .. }
            ));
        }
        assert!(matches!(
            controller.unlock(&zone.id, "9999").unwrap(),
            UnlockOutcome::Locked { .. }
        ));
    }

    #[test]
    fn resolve_reports_cooldown() {
        let (controller, _, _) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();

        for _ in 0..5 {
            controller.unlock(&zone.id, "9999").unwrap();
        }

        match controller.resolve_tap(0.0, 0.0).unwrap() {
            TapResolution::Matched { locked_for_secs, .. } => {
                assert_eq!(locked_for_secs, Some(60));
            }
            TapResolution::Empty { .. } => panic!("expected a match"),
        }
    }

    #[test]
    fn lockout_is_scoped_per_zone() {
        let (controller, _, _) = setup();
        let zone_a = controller.create_zone(draft_at(0.0, 0.0)).unwrap();
        let zone_b = controller.create_zone(draft_at(1.0, 1.0)).unwrap();

        for _ in 0..5 {
            controller.unlock(&zone_a.id, "9999").unwrap();
        }

        // Zone B is unaffected.
        assert!(matches!(
            controller.unlock(&zone_b.id, "1234").unwrap(),
            UnlockOutcome::Granted { .. }
        ));
    }

    #[test]
    fn share_token_grants_without_pin() {
        let (controller, store, clock) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();
        let token = controller.issue_share_token(&zone.id).unwrap();

        // Another device holding the token gets in without any PIN.
        let visitor = controller_for(&store, &clock, "device-b");
        let access = visitor.unlock_shared(&token).unwrap();
        assert_eq!(access.grant, AccessGrant::ShareToken);
        assert_eq!(access.zone.id, zone.id);
    }

    #[test]
    fn share_token_is_idempotent_until_revoked() {
        let (controller, _, _) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();

        let first = controller.issue_share_token(&zone.id).unwrap();
        let second = controller.issue_share_token(&zone.id).unwrap();
        assert_eq!(first, second);

        controller.revoke_share_token(&zone.id).unwrap();
        let third = controller.issue_share_token(&zone.id).unwrap();
        assert_ne!(first, third);
    }

    #[test]
    fn revoked_token_stops_granting() {
        let (controller, _, _) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();
        let token = controller.issue_share_token(&zone.id).unwrap();

        controller.revoke_share_token(&zone.id).unwrap();
        assert!(matches!(
            controller.unlock_shared(&token),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn owner_only_actions_reject_non_owners() {
        let (controller, store, clock) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();

        let stranger = controller_for(&store, &clock, "device-b");
        let file = MediaFile::from_bytes("b.png", "image/png", b"y", start_time());

        assert!(matches!(
            stranger.set_visibility(&zone.id, Visibility::Public),
            Err(VaultError::Unauthorized(_))
        ));
        assert!(matches!(
            stranger.issue_share_token(&zone.id),
            Err(VaultError::Unauthorized(_))
        ));
        assert!(matches!(
            stranger.revoke_share_token(&zone.id),
            Err(VaultError::Unauthorized(_))
        ));
        assert!(matches!(
            stranger.append_files(&zone.id, vec![file]),
            Err(VaultError::Unauthorized(_))
        ));
        assert!(matches!(
            stranger.replace_pin(&zone.id, "5678"),
            Err(VaultError::Unauthorized(_))
        ));
        assert!(matches!(
            stranger.delete_zone(&zone.id),
            Err(VaultError::Unauthorized(_))
        ));
        assert!(matches!(
            stranger.access_log(&zone.id),
            Err(VaultError::Unauthorized(_))
        ));

        // Nothing was mutated.
        let stored = store.load(&zone.id).unwrap().unwrap();
        assert_eq!(stored.visibility, Visibility::Private);
        assert_eq!(stored.share_token, None);
        assert_eq!(stored.files.len(), 1);
    }

    #[test]
    fn owner_append_reuses_credential_hash() {
        let (controller, store, _) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();
        let original_hash = store.load(&zone.id).unwrap().unwrap().credential_hash;

        let file = MediaFile::from_bytes("b.png", "image/png", b"more", start_time());
        let updated = controller.append_files(&zone.id, vec![file]).unwrap();

        assert_eq!(updated.files.len(), 2);
        let stored = store.load(&zone.id).unwrap().unwrap();
        assert_eq!(stored.credential_hash, original_hash);
        assert!(matches!(
            controller.unlock(&zone.id, "1234").unwrap(),
            UnlockOutcome::Granted { .. }
        ));
    }

    #[test]
    fn replace_pin_swaps_credential_and_clears_lockout() {
        let (controller, _, _) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();

        for _ in 0..5 {
            controller.unlock(&zone.id, "9999").unwrap();
        }
        controller.replace_pin(&zone.id, "777777").unwrap();

        // Lock cleared, old PIN dead, new PIN works.
        assert!(matches!(
            controller.unlock(&zone.id, "777777").unwrap(),
            UnlockOutcome::Granted { .. }
        ));
        assert!(matches!(
            controller.unlock(&zone.id, "1234").unwrap(),
            UnlockOutcome::InvalidPin { .. }
        ));
    }

    #[test]
    fn visibility_affects_listing_not_matching() {
        let (controller, store, clock) = setup();
        let private_zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();
        let public_zone = controller
            .create_zone(draft_at(1.0, 1.0).with_visibility(Visibility::Public))
            .unwrap();

        let stranger = controller_for(&store, &clock, "device-b");

        // Listing: the stranger sees only the public zone.
        let visible = stranger.list_visible().unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, public_zone.id);

        // Matching: the stranger's tap still finds the private zone.
        match stranger.resolve_tap(0.0, 0.0).unwrap() {
            TapResolution::Matched { zone, .. } => assert_eq!(zone.id, private_zone.id),
            TapResolution::Empty { .. } => panic!("private zone must still match"),
        }

        // The owner sees both.
        assert_eq!(controller.list_visible().unwrap().len(), 2);
    }

    #[test]
    fn access_log_records_both_routes_in_order() {
        let (controller, store, clock) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();

        controller.unlock(&zone.id, "1234").unwrap();
        clock.advance(Duration::seconds(5));
        let token = controller.issue_share_token(&zone.id).unwrap();
        let visitor = controller_for(&store, &clock, "device-b");
        visitor.unlock_shared(&token).unwrap();

        let log = controller.access_log(&zone.id).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].via, AccessVia::Pin);
        assert_eq!(log[1].via, AccessVia::Share);
        assert!(log[0].accessed_at < log[1].accessed_at);
    }

    #[test]
    fn delete_zone_removes_it_from_matching() {
        let (controller, _, _) = setup();
        let zone = controller.create_zone(draft_at(0.0, 0.0)).unwrap();

        controller.delete_zone(&zone.id).unwrap();
        assert!(matches!(
            controller.resolve_tap(0.0, 0.0).unwrap(),
            TapResolution::Empty { .. }
        ));
        assert!(matches!(
            controller.unlock(&zone.id, "1234"),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn unknown_zone_is_not_found() {
        let (controller, _, _) = setup();
        assert!(matches!(
            controller.unlock("ghost", "1234"),
            Err(VaultError::NotFound(_))
        ));
        assert!(matches!(
            controller.unlock_shared("ghost-token"),
            Err(VaultError::NotFound(_))
        ));
    }
}
