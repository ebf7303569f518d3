//! PIN credential handling.
//!
//! Turns a short numeric secret into a durable, non-reversible hash and
//! later confirms whether a presented secret matches. Two stored formats
//! are supported transparently:
//!
//! - **Adaptive** (current): Argon2id with a random salt; the PHC string
//!   output embeds its own salt and cost parameters, so verification needs
//!   no side channel. Comparison is constant-time with respect to the
//!   secret's correctness.
//! - **Legacy** (migration shim): unsalted SHA-256, stored as 64 hex chars.
//!   Records written by older releases verify through this path. The digest
//!   is fast and unsalted, so the path carries a weaker brute-force
//!   guarantee; the byte comparison itself is still constant-time. New
//!   hashes are never written in this format.
//!
//! Everything here is purely functional: no storage, no clock, no side
//! effects. Lockout throttling lives in [`crate::vault`].

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

/// Error type for credential operations.
///
/// Verification never errors; only format validation and hashing do.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// PIN length fell outside the policy bounds.
    #[error("PIN must be {0}-{1} digits")]
    InvalidLength(usize, usize),

    /// PIN contained something other than ASCII digits.
    #[error("PIN must contain only digits")]
    InvalidFormat,

    /// The hashing primitive failed. Not user-facing.
    #[error("Hashing failed: {0}")]
    Hash(String),
}

/// Bounds on accepted PIN length, in digits.
///
/// The exact bounds are an application policy decision; the default accepts
/// 4 to 8 digits. A caller that wants the classic fixed 4-digit PIN uses
/// `PinPolicy::new(4, 4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinPolicy {
    /// Minimum accepted length.
    pub min_len: usize,
    /// Maximum accepted length.
    pub max_len: usize,
}

impl Default for PinPolicy {
    fn default() -> Self {
        Self {
            min_len: 4,
            max_len: 8,
        }
    }
}

impl PinPolicy {
    /// Creates a policy with explicit bounds.
    #[must_use]
    pub const fn new(min_len: usize, max_len: usize) -> Self {
        Self { min_len, max_len }
    }

    /// Validates a candidate PIN against this policy.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidLength`] or
    /// [`CredentialError::InvalidFormat`] when the candidate is rejected.
    pub fn validate(&self, pin: &str) -> Result<(), CredentialError> {
        if pin.len() < self.min_len || pin.len() > self.max_len {
            return Err(CredentialError::InvalidLength(self.min_len, self.max_len));
        }
        if !pin.chars().all(|c| c.is_ascii_digit()) {
            return Err(CredentialError::InvalidFormat);
        }
        Ok(())
    }
}

/// Hashes a PIN with Argon2id and a random salt.
///
/// Length policy is the caller's responsibility ([`PinPolicy::validate`]);
/// this function still defensively rejects empty or non-digit input rather
/// than hashing it.
///
/// # Errors
///
/// Returns [`CredentialError::InvalidFormat`] for non-digit input, or
/// [`CredentialError::Hash`] if the hashing primitive fails (fatal, not
/// user-facing).
pub fn hash_pin(pin: &str) -> Result<String, CredentialError> {
    if pin.is_empty() || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(CredentialError::InvalidFormat);
    }

    let salt = SaltString::generate(&mut OsRng);
    let pin_bytes = Zeroizing::new(pin.as_bytes().to_vec());

    Argon2::default()
        .hash_password(&pin_bytes, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hash(e.to_string()))
}

/// Verifies a PIN against a stored hash of either supported format.
///
/// The stored value's shape decides the comparison: exactly 64 hex chars is
/// the legacy SHA-256 digest, anything else is parsed as a PHC string. A
/// value matching neither format never verifies. This function never panics
/// and never returns an error.
#[must_use]
pub fn verify_pin(pin: &str, stored_hash: &str) -> bool {
    if is_legacy_digest(stored_hash) {
        verify_legacy(pin, stored_hash)
    } else {
        verify_adaptive(pin, stored_hash)
    }
}

/// Computes the legacy unsalted SHA-256 digest as lowercase hex.
///
/// Kept for verifying records written by older releases and for migration
/// tooling; [`hash_pin`] never produces this format.
#[must_use]
pub fn legacy_digest(pin: &str) -> String {
    hex::encode(Sha256::digest(pin.as_bytes()))
}

/// Whether a stored value has the legacy digest shape (64 hex chars,
/// either case).
fn is_legacy_digest(stored: &str) -> bool {
    stored.len() == 64 && stored.bytes().all(|b| b.is_ascii_hexdigit())
}

fn verify_legacy(pin: &str, stored: &str) -> bool {
    let Ok(stored_bytes) = hex::decode(stored) else {
        return false;
    };
    let digest = Sha256::digest(pin.as_bytes());
    digest.as_slice().ct_eq(&stored_bytes).into()
}

fn verify_adaptive(pin: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    let pin_bytes = Zeroizing::new(pin.as_bytes().to_vec());
    Argon2::default()
        .verify_password(&pin_bytes, &parsed)
        .is_ok()
}
