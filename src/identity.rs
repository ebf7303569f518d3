//! Injectable device-identity collaborator.
//!
//! A zone's owner is whichever device created it. The identifier is opaque
//! and used only to authorize privileged actions (visibility toggle, share
//! tokens, deletion, content append) - it is never a secrecy mechanism.
//! The access controller receives the identity as a constructor parameter;
//! nothing reaches into ambient global state.

use std::fs;
use std::path::Path;

use thiserror::Error;
use uuid::Uuid;

/// Error type for identity persistence.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Reading or writing the identity file failed.
    #[error("Identity storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of the caller's stable owner identifier.
pub trait DeviceIdentity: Send + Sync {
    /// Returns the opaque identifier of the current device/account.
    fn current_owner_id(&self) -> String;
}

impl<I: DeviceIdentity + ?Sized> DeviceIdentity for std::sync::Arc<I> {
    fn current_owner_id(&self) -> String {
        self.as_ref().current_owner_id()
    }
}

/// File-backed device identity.
///
/// Generates a random identifier on first use and persists it under the
/// given data directory, so the same device keeps the same identity across
/// sessions. The write is atomic (temp file + rename) so a crash cannot
/// leave a half-written identifier behind.
#[derive(Debug, Clone)]
pub struct StoredDeviceIdentity {
    owner_id: String,
}

impl StoredDeviceIdentity {
    const FILE_NAME: &'static str = "device_id";

    /// Loads the persisted identity, creating one if none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created or the
    /// identity file cannot be read or written.
    pub fn open(data_dir: &Path) -> Result<Self, IdentityError> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(Self::FILE_NAME);

        if let Ok(contents) = fs::read_to_string(&path) {
            let trimmed = contents.trim();
            if !trimmed.is_empty() {
                return Ok(Self {
                    owner_id: trimmed.to_string(),
                });
            }
        }

        let owner_id = Uuid::new_v4().to_string();
        Self::write_atomic(&path, &owner_id)?;
        Ok(Self { owner_id })
    }

    fn write_atomic(path: &Path, owner_id: &str) -> Result<(), IdentityError> {
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, owner_id)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Returns the persisted identifier.
    #[must_use]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

impl DeviceIdentity for StoredDeviceIdentity {
    fn current_owner_id(&self) -> String {
        self.owner_id.clone()
    }
}

/// An identity pinned to a caller-chosen value.
///
/// # Warning
///
/// Test utility for simulating different devices. Not for production use.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone)]
pub struct FixedIdentity {
    owner_id: String,
}

#[cfg(any(test, feature = "test-utils"))]
impl FixedIdentity {
    /// Creates an identity that always reports the given id.
    #[must_use]
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl DeviceIdentity for FixedIdentity {
    fn current_owner_id(&self) -> String {
        self.owner_id.clone()
    }
}
