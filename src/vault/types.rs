//! Core types for zones (geo-anchored, PIN-protected records).
//!
//! A zone anchors a protected bundle of media to a map coordinate. Its
//! credential hash is the only secret-derived field and is redacted from
//! every `Debug` surface; the share token is likewise redacted because
//! holding it grants access.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::{point_to_geohash, GeoPoint};

/// Default geofence radius in meters for newly created zones.
pub const DEFAULT_RADIUS_M: f64 = 100.0;

/// Geohash length used for zone location labels (~19m cell).
pub const ZONE_GEOHASH_PRECISION: u8 = 8;

/// Visibility of a zone.
///
/// Visibility affects listing surfaces only. Geofence matching treats
/// private and public zones identically - a private zone is still found by
/// a tap inside its radius, it just never appears in another caller's
/// zone list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Listed only for the owner.
    #[default]
    Private,
    /// Listed for any caller.
    Public,
}

impl Visibility {
    /// Converts to string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Self::Private),
            "public" => Some(Self::Public),
            _ => None,
        }
    }
}

/// Category of an attached media file.
///
/// A closed set of variants; rendering decisions elsewhere dispatch on this
/// instead of raw MIME strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image.
    Image,
    /// Video clip.
    Video,
    /// Audio recording.
    Audio,
    /// Anything else (PDF, text, ...).
    Document,
}

impl MediaKind {
    /// Converts to string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "document" => Some(Self::Document),
            _ => None,
        }
    }

    /// Derives the kind from a MIME type. Unknown types are documents.
    #[must_use]
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            Self::Image
        } else if mime_type.starts_with("video/") {
            Self::Video
        } else if mime_type.starts_with("audio/") {
            Self::Audio
        } else {
            Self::Document
        }
    }
}

/// A media record attached to a zone.
///
/// The payload is carried base64-encoded, matching how the surrounding
/// application hands files over. Compression and format handling happen
/// before the bytes reach this crate.
#[derive(Clone)]
pub struct MediaFile {
    /// Opaque unique identifier.
    pub id: String,
    /// Original file name.
    pub name: String,
    /// MIME type as reported by the uploader.
    pub mime_type: String,
    /// Closed media category derived from the MIME type.
    pub kind: MediaKind,
    /// Base64-encoded payload.
    pub data: String,
    /// When the file was attached.
    pub created_at: DateTime<Utc>,
}

impl MediaFile {
    /// Builds a media record from raw bytes, deriving the kind from the
    /// MIME type.
    #[must_use]
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: &[u8],
        created_at: DateTime<Utc>,
    ) -> Self {
        use base64::{engine::general_purpose::STANDARD, Engine as _};

        let mime_type = mime_type.into();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            kind: MediaKind::from_mime(&mime_type),
            mime_type,
            data: STANDARD.encode(bytes),
            created_at,
        }
    }

    /// Decodes the payload back to raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored payload is not valid base64.
    pub fn payload(&self) -> Result<Vec<u8>, base64::DecodeError> {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        STANDARD.decode(&self.data)
    }
}

impl std::fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("kind", &self.kind)
            .field("data", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// How a successful access was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessVia {
    /// Correct PIN presented.
    Pin,
    /// Valid share token presented.
    Share,
}

impl AccessVia {
    /// Converts to string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pin => "pin",
            Self::Share => "share",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pin" => Some(Self::Pin),
            "share" => Some(Self::Share),
            _ => None,
        }
    }
}

/// One successful reveal of a zone's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// Which authentication route granted the access.
    pub via: AccessVia,
    /// When the access happened.
    pub accessed_at: DateTime<Utc>,
}

/// Brute-force lockout policy applied per zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failed attempts that trigger a lock.
    pub max_attempts: u32,
    /// How long a triggered lock lasts, in seconds.
    pub lock_window_secs: i64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lock_window_secs: 60,
        }
    }
}

impl LockoutPolicy {
    /// Creates a policy with explicit parameters.
    #[must_use]
    pub const fn new(max_attempts: u32, lock_window_secs: i64) -> Self {
        Self {
            max_attempts,
            lock_window_secs,
        }
    }

    /// The lock window as a duration.
    #[must_use]
    pub fn lock_window(&self) -> Duration {
        Duration::seconds(self.lock_window_secs)
    }
}

/// Lockout counters for a zone after an attempt was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutState {
    /// Failed attempts counted toward the next lock.
    pub failed_attempts: u32,
    /// End of the active lock, if one was triggered.
    pub locked_until: Option<DateTime<Utc>>,
}

/// Bounds on accepted geofence radii, in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusBounds {
    /// Smallest accepted radius.
    pub min_m: f64,
    /// Largest accepted radius.
    pub max_m: f64,
}

impl Default for RadiusBounds {
    fn default() -> Self {
        Self {
            min_m: 100.0,
            max_m: 1000.0,
        }
    }
}

impl RadiusBounds {
    /// Whether a radius is positive and within bounds.
    #[must_use]
    pub fn contains(&self, radius_m: f64) -> bool {
        radius_m.is_finite() && radius_m > 0.0 && (self.min_m..=self.max_m).contains(&radius_m)
    }
}

/// A zone: a geo-anchored, PIN-protected record.
///
/// `id`, `location`, and `owner_id` are immutable once created (moving a
/// zone is not supported). Everything security-relevant about the record -
/// the credential hash, share token, and lockout counters - lives here so
/// the shared store is authoritative across devices.
#[derive(Clone)]
pub struct Zone {
    /// Opaque unique identifier, immutable.
    pub id: String,
    /// User-facing label.
    pub name: String,
    /// Anchor coordinate, immutable.
    pub location: GeoPoint,
    /// Geofence tolerance in meters.
    pub radius_m: f64,
    /// Approximate-location label (precision-8 geohash of `location`).
    pub geohash: String,
    /// One-way hash of the protecting PIN. Never exposed in clear.
    pub credential_hash: String,
    /// Identifier of the creating device. Authorizes privileged actions.
    pub owner_id: String,
    /// Listing visibility.
    pub visibility: Visibility,
    /// Active share token, at most one per zone.
    pub share_token: Option<String>,
    /// Attached media.
    pub files: Vec<MediaFile>,
    /// Failed verification attempts since the last success or lock.
    pub failed_attempts: u32,
    /// While now is before this, verification is rejected without hashing.
    pub locked_until: Option<DateTime<Utc>>,
    /// When the zone was created.
    pub created_at: DateTime<Utc>,
    /// When the zone was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Zone {
    /// Whether the given caller owns this zone.
    #[must_use]
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }

    /// Whether the zone is in its lockout window at the given instant.
    ///
    /// Expiry is lazy: once `now` reaches `locked_until` the zone behaves
    /// as unlocked without any state write.
    #[must_use]
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    /// Whole seconds remaining in the lockout window, rounded up.
    ///
    /// Returns `None` when no lock is active at `now`.
    #[must_use]
    pub fn lock_remaining_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.locked_until.and_then(|until| {
            if now < until {
                let millis = (until - now).num_milliseconds();
                Some((millis + 999) / 1000)
            } else {
                None
            }
        })
    }
}

impl std::fmt::Debug for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zone")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("location", &self.location)
            .field("radius_m", &self.radius_m)
            .field("geohash", &self.geohash)
            .field("credential_hash", &"<redacted>")
            .field("owner_id", &self.owner_id)
            .field("visibility", &self.visibility)
            .field("share_token", &self.share_token.as_ref().map(|_| "<redacted>"))
            .field("files", &self.files.len())
            .field("failed_attempts", &self.failed_attempts)
            .field("locked_until", &self.locked_until)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Outward-facing projection of a zone for listing surfaces.
///
/// Carries no credential material: the hash never appears, and the share
/// token is reduced to a presence flag.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneSummary {
    /// Zone identifier.
    pub id: String,
    /// User-facing label.
    pub name: String,
    /// Anchor coordinate.
    pub location: GeoPoint,
    /// Geofence tolerance in meters.
    pub radius_m: f64,
    /// Approximate-location label.
    pub geohash: String,
    /// Listing visibility.
    pub visibility: Visibility,
    /// Number of attached files.
    pub file_count: usize,
    /// Whether a share token is currently active.
    pub has_share_token: bool,
    /// When the zone was created.
    pub created_at: DateTime<Utc>,
}

impl From<&Zone> for ZoneSummary {
    fn from(zone: &Zone) -> Self {
        Self {
            id: zone.id.clone(),
            name: zone.name.clone(),
            location: zone.location,
            radius_m: zone.radius_m,
            geohash: zone.geohash.clone(),
            visibility: zone.visibility,
            file_count: zone.files.len(),
            has_share_token: zone.share_token.is_some(),
            created_at: zone.created_at,
        }
    }
}

/// Configuration for creating a new zone.
#[derive(Clone)]
pub struct ZoneDraft {
    /// User-facing label.
    pub name: String,
    /// Anchor coordinate.
    pub location: GeoPoint,
    /// Geofence tolerance in meters.
    pub radius_m: f64,
    /// The protecting PIN, in clear. Hashed at creation, never stored.
    pub pin: String,
    /// Listing visibility.
    pub visibility: Visibility,
    /// Initial media. At least one file is required at creation.
    pub files: Vec<MediaFile>,
}

impl ZoneDraft {
    /// Creates a draft with the default radius and visibility.
    #[must_use]
    pub fn new(name: impl Into<String>, location: GeoPoint, pin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location,
            radius_m: DEFAULT_RADIUS_M,
            pin: pin.into(),
            visibility: Visibility::default(),
            files: Vec::new(),
        }
    }

    /// Sets the geofence radius.
    #[must_use]
    pub const fn with_radius_m(mut self, radius_m: f64) -> Self {
        self.radius_m = radius_m;
        self
    }

    /// Sets the visibility.
    #[must_use]
    pub const fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Attaches a file.
    #[must_use]
    pub fn with_file(mut self, file: MediaFile) -> Self {
        self.files.push(file);
        self
    }

    /// Attaches multiple files.
    #[must_use]
    pub fn with_files(mut self, files: impl IntoIterator<Item = MediaFile>) -> Self {
        self.files.extend(files);
        self
    }

    /// Computes the geohash label for the draft location.
    #[must_use]
    pub fn geohash(&self) -> String {
        point_to_geohash(self.location, ZONE_GEOHASH_PRECISION)
    }
}

impl std::fmt::Debug for ZoneDraft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneDraft")
            .field("name", &self.name)
            .field("location", &self.location)
            .field("radius_m", &self.radius_m)
            .field("pin", &"<redacted>")
            .field("visibility", &self.visibility)
            .field("files", &self.files.len())
            .finish()
    }
}
