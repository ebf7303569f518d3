//! GeoVault Core Library
//!
//! Core functionality for GeoVault - PIN-protected, geo-anchored memory
//! lockers. A zone is a protected record dropped at a map coordinate; this
//! crate owns the decision logic for matching a tapped coordinate to a zone,
//! verifying the protecting PIN, enforcing brute-force lockout, and applying
//! ownership/visibility rules. Map rendering, file transport, and the backend
//! surface live outside this crate.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

pub mod clock;
pub mod credential;
pub mod geo;
pub mod identity;
pub mod vault;

pub use vault::AccessController;
