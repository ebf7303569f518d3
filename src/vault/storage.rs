//! `SQLite` storage for zones.
//!
//! The zone store is the authoritative record shared across devices, which
//! is why the brute-force lockout counters live here rather than in any
//! per-device state: clearing local storage cannot bypass a lock. Lockout
//! transitions are applied inside an immediate transaction so two
//! concurrent failed attempts cannot under-count toward the threshold.

// SQLite operations need to hold the lock for the duration of the operation.
// Dropping the guard earlier would require restructuring all methods.
#![allow(clippy::significant_drop_tightening)]

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::error::{Result, VaultError};
use super::types::{
    AccessLogEntry, AccessVia, LockoutPolicy, LockoutState, MediaFile, MediaKind, Visibility, Zone,
};
use crate::geo::GeoPoint;

/// Narrow persistence contract for zones.
///
/// The access controller is written against this trait; any store with
/// atomic per-zone update semantics for the lockout fields can stand in
/// for the provided `SQLite` implementation.
///
/// `save` persists the full record except the lockout counters on update -
/// those change only through [`record_failed_attempt`] and
/// [`clear_failed_attempts`], so a stale in-memory `Zone` can never clobber
/// a lock another device just triggered.
///
/// [`record_failed_attempt`]: ZoneStore::record_failed_attempt
/// [`clear_failed_attempts`]: ZoneStore::clear_failed_attempts
pub trait ZoneStore: Send + Sync {
    /// Loads a zone by id.
    fn load(&self, zone_id: &str) -> Result<Option<Zone>>;

    /// Inserts or updates a zone record.
    fn save(&self, zone: &Zone) -> Result<()>;

    /// Deletes a zone and its attached data.
    fn delete(&self, zone_id: &str) -> Result<()>;

    /// Returns all known zones.
    fn find_all(&self) -> Result<Vec<Zone>>;

    /// Looks a zone up by its active share token.
    fn find_by_share_token(&self, token: &str) -> Result<Option<Zone>>;

    /// Atomically counts one failed verification attempt against a zone.
    ///
    /// When the new count reaches the policy threshold, the lock is set and
    /// the counter reset to zero in the same write. Returns the resulting
    /// counters, including any lock already active at `now`.
    fn record_failed_attempt(
        &self,
        zone_id: &str,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<LockoutState>;

    /// Resets the failed-attempt counter and clears any lock.
    fn clear_failed_attempts(&self, zone_id: &str, now: DateTime<Utc>) -> Result<()>;

    /// Appends a successful access to the zone's log.
    fn record_access(&self, zone_id: &str, via: AccessVia, at: DateTime<Utc>) -> Result<()>;

    /// Returns the zone's access log, oldest first.
    fn access_log(&self, zone_id: &str) -> Result<Vec<AccessLogEntry>>;
}

impl<S: ZoneStore + ?Sized> ZoneStore for std::sync::Arc<S> {
    fn load(&self, zone_id: &str) -> Result<Option<Zone>> {
        self.as_ref().load(zone_id)
    }

    fn save(&self, zone: &Zone) -> Result<()> {
        self.as_ref().save(zone)
    }

    fn delete(&self, zone_id: &str) -> Result<()> {
        self.as_ref().delete(zone_id)
    }

    fn find_all(&self) -> Result<Vec<Zone>> {
        self.as_ref().find_all()
    }

    fn find_by_share_token(&self, token: &str) -> Result<Option<Zone>> {
        self.as_ref().find_by_share_token(token)
    }

    fn record_failed_attempt(
        &self,
        zone_id: &str,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<LockoutState> {
        self.as_ref().record_failed_attempt(zone_id, policy, now)
    }

    fn clear_failed_attempts(&self, zone_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.as_ref().clear_failed_attempts(zone_id, now)
    }

    fn record_access(&self, zone_id: &str, via: AccessVia, at: DateTime<Utc>) -> Result<()> {
        self.as_ref().record_access(zone_id, via, at)
    }

    fn access_log(&self, zone_id: &str) -> Result<Vec<AccessLogEntry>> {
        self.as_ref().access_log(zone_id)
    }
}

/// `SQLite`-based zone store.
///
/// Thread-safe wrapper around a `SQLite` connection. Suitable as the shared
/// authoritative store for a single installation; a networked backend
/// implementing [`ZoneStore`] drops in without touching the controller.
pub struct SqliteZoneStore {
    conn: Mutex<Connection>,
}

/// Zone row before coordinate validation and file loading.
struct RawZone {
    id: String,
    name: String,
    lat: f64,
    lon: f64,
    radius_m: f64,
    geohash: String,
    credential_hash: String,
    owner_id: String,
    visibility: String,
    share_token: Option<String>,
    failed_attempts: u32,
    locked_until: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

const ZONE_COLUMNS: &str = "id, name, lat, lon, radius_m, geohash, credential_hash, owner_id, \
     visibility, share_token, failed_attempts, locked_until, created_at, updated_at";

impl SqliteZoneStore {
    /// Creates a store at the given path.
    ///
    /// Creates the database file and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or initialized.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Creates an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initializes the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        conn.execute_batch(
            r"
            PRAGMA foreign_keys = ON;

            -- Zone records. Lockout state lives here so the shared store,
            -- not any per-device cache, is authoritative for throttling.
            CREATE TABLE IF NOT EXISTS zones (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                radius_m REAL NOT NULL,
                geohash TEXT NOT NULL,
                credential_hash TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                visibility TEXT NOT NULL DEFAULT 'private',
                share_token TEXT UNIQUE,
                failed_attempts INTEGER NOT NULL DEFAULT 0,
                locked_until INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Media attached to a zone (payload is base64 text)
            CREATE TABLE IF NOT EXISTS media_files (
                id TEXT PRIMARY KEY,
                zone_id TEXT NOT NULL REFERENCES zones(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                kind TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_media_files_zone ON media_files(zone_id);

            -- Append-only log of successful reveals
            CREATE TABLE IF NOT EXISTS access_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                zone_id TEXT NOT NULL REFERENCES zones(id) ON DELETE CASCADE,
                via TEXT NOT NULL,
                accessed_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_access_log_zone ON access_log(zone_id);
            ",
        )?;

        Ok(())
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire database lock: {e}")))
    }

    fn raw_zone(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawZone> {
        Ok(RawZone {
            id: row.get(0)?,
            name: row.get(1)?,
            lat: row.get(2)?,
            lon: row.get(3)?,
            radius_m: row.get(4)?,
            geohash: row.get(5)?,
            credential_hash: row.get(6)?,
            owner_id: row.get(7)?,
            visibility: row.get(8)?,
            share_token: row.get(9)?,
            failed_attempts: row.get(10)?,
            locked_until: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn finish_zone(conn: &Connection, raw: RawZone) -> Result<Zone> {
        let location = GeoPoint::new(raw.lat, raw.lon)
            .map_err(|e| VaultError::Storage(format!("Corrupt zone row {}: {e}", raw.id)))?;
        let visibility = Visibility::parse(&raw.visibility).ok_or_else(|| {
            VaultError::Storage(format!(
                "Corrupt zone row {}: unknown visibility {:?}",
                raw.id, raw.visibility
            ))
        })?;
        let locked_until = raw.locked_until.map(from_millis).transpose()?;
        let files = Self::load_files(conn, &raw.id)?;

        Ok(Zone {
            location,
            visibility,
            locked_until,
            files,
            id: raw.id,
            name: raw.name,
            radius_m: raw.radius_m,
            geohash: raw.geohash,
            credential_hash: raw.credential_hash,
            owner_id: raw.owner_id,
            share_token: raw.share_token,
            failed_attempts: raw.failed_attempts,
            created_at: from_millis(raw.created_at)?,
            updated_at: from_millis(raw.updated_at)?,
        })
    }

    fn load_files(conn: &Connection, zone_id: &str) -> Result<Vec<MediaFile>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, mime_type, kind, data, created_at
             FROM media_files WHERE zone_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![zone_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut files = Vec::new();
        for row in rows {
            let (id, name, mime_type, kind, data, created_at) = row?;
            let kind = MediaKind::parse(&kind).ok_or_else(|| {
                VaultError::Storage(format!("Corrupt media row {id}: unknown kind {kind:?}"))
            })?;
            files.push(MediaFile {
                id,
                name,
                mime_type,
                kind,
                data,
                created_at: from_millis(created_at)?,
            });
        }
        Ok(files)
    }

    fn load_with(conn: &Connection, zone_id: &str) -> Result<Option<Zone>> {
        let raw = conn
            .query_row(
                &format!("SELECT {ZONE_COLUMNS} FROM zones WHERE id = ?1"),
                params![zone_id],
                Self::raw_zone,
            )
            .optional()?;

        raw.map(|raw| Self::finish_zone(conn, raw)).transpose()
    }
}

impl ZoneStore for SqliteZoneStore {
    fn load(&self, zone_id: &str) -> Result<Option<Zone>> {
        let conn = self.lock_conn()?;
        Self::load_with(&conn, zone_id)
    }

    fn save(&self, zone: &Zone) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        // Lockout counters are written on insert only; updates leave them to
        // the atomic record/clear operations.
        tx.execute(
            "INSERT INTO zones (id, name, lat, lon, radius_m, geohash, credential_hash,
                                owner_id, visibility, share_token, failed_attempts,
                                locked_until, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                credential_hash = excluded.credential_hash,
                visibility = excluded.visibility,
                share_token = excluded.share_token,
                updated_at = excluded.updated_at",
            params![
                zone.id,
                zone.name,
                zone.location.latitude,
                zone.location.longitude,
                zone.radius_m,
                zone.geohash,
                zone.credential_hash,
                zone.owner_id,
                zone.visibility.as_str(),
                zone.share_token,
                zone.failed_attempts,
                zone.locked_until.map(to_millis),
                to_millis(zone.created_at),
                to_millis(zone.updated_at),
            ],
        )?;

        tx.execute("DELETE FROM media_files WHERE zone_id = ?1", params![zone.id])?;
        for file in &zone.files {
            tx.execute(
                "INSERT INTO media_files (id, zone_id, name, mime_type, kind, data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    file.id,
                    zone.id,
                    file.name,
                    file.mime_type,
                    file.kind.as_str(),
                    file.data,
                    to_millis(file.created_at),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn delete(&self, zone_id: &str) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM media_files WHERE zone_id = ?1", params![zone_id])?;
        tx.execute("DELETE FROM access_log WHERE zone_id = ?1", params![zone_id])?;
        let changed = tx.execute("DELETE FROM zones WHERE id = ?1", params![zone_id])?;

        tx.commit()?;

        if changed == 0 {
            return Err(VaultError::NotFound(zone_id.to_string()));
        }
        Ok(())
    }

    fn find_all(&self) -> Result<Vec<Zone>> {
        let conn = self.lock_conn()?;

        let mut stmt =
            conn.prepare(&format!("SELECT {ZONE_COLUMNS} FROM zones ORDER BY id ASC"))?;
        let raws = stmt
            .query_map([], Self::raw_zone)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raws.into_iter()
            .map(|raw| Self::finish_zone(&conn, raw))
            .collect()
    }

    fn find_by_share_token(&self, token: &str) -> Result<Option<Zone>> {
        let conn = self.lock_conn()?;

        let raw = conn
            .query_row(
                &format!("SELECT {ZONE_COLUMNS} FROM zones WHERE share_token = ?1"),
                params![token],
                Self::raw_zone,
            )
            .optional()?;

        raw.map(|raw| Self::finish_zone(&conn, raw)).transpose()
    }

    fn record_failed_attempt(
        &self,
        zone_id: &str,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<LockoutState> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let row: Option<(u32, Option<i64>)> = tx
            .query_row(
                "SELECT failed_attempts, locked_until FROM zones WHERE id = ?1",
                params![zone_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (current, existing_lock) =
            row.ok_or_else(|| VaultError::NotFound(zone_id.to_string()))?;

        let attempts = current + 1;
        let state = if attempts >= policy.max_attempts {
            let until = now + policy.lock_window();
            tx.execute(
                "UPDATE zones SET failed_attempts = 0, locked_until = ?2, updated_at = ?3
                 WHERE id = ?1",
                params![zone_id, to_millis(until), to_millis(now)],
            )?;
            LockoutState {
                failed_attempts: 0,
                locked_until: Some(until),
            }
        } else {
            tx.execute(
                "UPDATE zones SET failed_attempts = ?2, updated_at = ?3 WHERE id = ?1",
                params![zone_id, attempts, to_millis(now)],
            )?;
            let still_active = existing_lock
                .filter(|&ms| ms > to_millis(now))
                .map(from_millis)
                .transpose()?;
            LockoutState {
                failed_attempts: attempts,
                locked_until: still_active,
            }
        };

        tx.commit()?;
        Ok(state)
    }

    fn clear_failed_attempts(&self, zone_id: &str, now: DateTime<Utc>) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE zones SET failed_attempts = 0, locked_until = NULL, updated_at = ?2
             WHERE id = ?1",
            params![zone_id, to_millis(now)],
        )?;

        if changed == 0 {
            return Err(VaultError::NotFound(zone_id.to_string()));
        }
        Ok(())
    }

    fn record_access(&self, zone_id: &str, via: AccessVia, at: DateTime<Utc>) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO access_log (zone_id, via, accessed_at) VALUES (?1, ?2, ?3)",
            params![zone_id, via.as_str(), to_millis(at)],
        )?;
        Ok(())
    }

    fn access_log(&self, zone_id: &str) -> Result<Vec<AccessLogEntry>> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare(
            "SELECT via, accessed_at FROM access_log
             WHERE zone_id = ?1 ORDER BY accessed_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![zone_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (via, accessed_at) = row?;
            let via = AccessVia::parse(&via).ok_or_else(|| {
                VaultError::Storage(format!("Corrupt access log entry: unknown route {via:?}"))
            })?;
            entries.push(AccessLogEntry {
                via,
                accessed_at: from_millis(accessed_at)?,
            });
        }
        Ok(entries)
    }
}

fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| VaultError::Storage(format!("Invalid timestamp: {ms}")))
}
