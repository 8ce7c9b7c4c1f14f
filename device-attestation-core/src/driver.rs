//! Attestation driver interface for multi-platform device support.
//!
//! This module defines the trait that all platform drivers must implement,
//! providing a unified API for device-integrity attestation across the two
//! native protocol variants.

use crate::error::AttestationError;
use crate::types::{AttestationResult, Challenge, KeyIdentifier};
use async_trait::async_trait;
use std::fmt;

/// Which of the two structurally different attestation protocols a driver
/// speaks.
///
/// The variant is fixed at build time by the target platform; it is never
/// negotiated per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// One opaque integrity token per request (Play Integrity style).
    TokenBased,
    /// A persistent hardware-held key with separate attestation and
    /// assertion phases (App Attest style).
    KeyBased,
}

impl DriverKind {
    /// Whether `generate_assertion` requires a key identifier on this
    /// variant.
    pub fn requires_key_identifier(self) -> bool {
        matches!(self, DriverKind::KeyBased)
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::TokenBased => write!(f, "token-based"),
            DriverKind::KeyBased => write!(f, "key-based"),
        }
    }
}

/// Options accepted by `initialize`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitializeOptions {
    /// Cloud project number for the token-based service, exactly as the
    /// caller supplied it (decimal string). Ignored by key-based drivers.
    pub project_number: Option<String>,
}

/// Trait for platform attestation drivers.
///
/// Each platform service (Play Integrity, App Attest) implements this trait
/// to produce attestations according to its specific protocol.
///
/// # Contract
/// * `attest` and `generate_assertion` are the only suspending operations;
///   everything else returns without blocking.
/// * Every call produces exactly one terminal outcome; drivers never retry.
/// * `is_supported` never fails: unknown or faulted probe states map to
///   `false`.
#[async_trait]
pub trait AttestationDriver: Send + Sync {
    /// Get the protocol variant this driver speaks.
    fn kind(&self) -> DriverKind;

    /// Get the platform name for logs (e.g., "play-integrity", "app-attest").
    fn platform(&self) -> &'static str;

    /// Validate configuration and report readiness of the native service.
    ///
    /// # Arguments
    /// * `options` - Caller-supplied configuration; fields a driver does not
    ///   consume are ignored.
    ///
    /// # Returns
    /// `true` once the driver is ready to attest, or an error naming what is
    /// missing or broken.
    fn initialize(&self, options: &InitializeOptions) -> Result<bool, AttestationError>;

    /// Produce a fresh attestation bound to `challenge`.
    ///
    /// # Arguments
    /// * `challenge` - Server-issued challenge, consumed read-only.
    /// * `key_id` - On key-based drivers, a supplied identifier switches to
    ///   the assertion path over that key; token-based drivers ignore it.
    ///
    /// # Returns
    /// A normalized [`AttestationResult`] envelope, or a terminal error.
    async fn attest(
        &self,
        challenge: &Challenge,
        key_id: Option<&KeyIdentifier>,
    ) -> Result<AttestationResult, AttestationError>;

    /// Produce a continuity assertion for an existing attested key.
    ///
    /// Token-based drivers have no distinct assertion phase and fall back
    /// to a fresh attestation.
    async fn generate_assertion(
        &self,
        challenge: &Challenge,
        key_id: Option<&KeyIdentifier>,
    ) -> Result<AttestationResult, AttestationError>;

    /// Whether the native attestation capability is available on this
    /// device. Never fails.
    fn is_supported(&self) -> bool;
}
