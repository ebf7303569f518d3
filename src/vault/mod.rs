//! Zone access control for GeoVault.
//!
//! This module is the security core of the application: it decides which
//! zone a tapped coordinate refers to, whether a presented PIN opens it,
//! and who may perform privileged actions.
//!
//! # Architecture
//!
//! ```text
//! AccessController (decisions: match / grant / deny / locked)
//!     ├── geofence    (deterministic coordinate-to-zone matching)
//!     ├── credential  (PIN hashing and dual-format verification)
//!     └── ZoneStore   (shared SQLite store, atomic lockout updates)
//! ```
//!
//! # Security Model
//!
//! - PINs are hashed with Argon2id; only hashes are stored
//! - Brute force is throttled per zone: 5 failures lock the zone for 60s,
//!   with the counters held in the shared store so clearing device state
//!   cannot bypass a lock
//! - Share tokens are a separate, revocable capability that bypasses the
//!   PIN by design
//! - Ownership authorizes privileged actions; it is never a secrecy
//!   mechanism
//!
//! # Types
//!
//! - [`Zone`]: a geo-anchored, PIN-protected record
//! - [`ZoneDraft`]: creation parameters, including the clear-text PIN
//! - [`ZoneSummary`]: outward projection without credential material
//! - [`UnlockOutcome`] / [`TapResolution`]: controller decisions

mod access;
mod error;
pub mod geofence;
mod storage;
pub mod types;

pub use access::{AccessController, AccessGrant, SharedAccess, TapResolution, UnlockOutcome};
pub use error::{Result, VaultError};
pub use storage::{SqliteZoneStore, ZoneStore};
pub use types::{
    AccessLogEntry, AccessVia, LockoutPolicy, LockoutState, MediaFile, MediaKind, RadiusBounds,
    Visibility, Zone, ZoneDraft, ZoneSummary, DEFAULT_RADIUS_M,
};
