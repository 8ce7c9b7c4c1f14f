//! Core types used across the attestation system.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::error::AttestationError;

/// SHA-256 hash (32 bytes)
pub type Hash256 = [u8; 32];

/// Server-issued challenge bound into every attestation or assertion.
///
/// Opaque to this layer and consumed read-only; the only structural
/// requirement is that it is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Challenge(String);

impl Challenge {
    /// Wrap a caller-supplied challenge, rejecting the empty string.
    pub fn new(value: impl Into<String>) -> Result<Self, AttestationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(AttestationError::InvalidArgument(
                "Challenge must not be empty".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a hardware-held attestation key, as issued by the
/// key-based platform service.
///
/// Owned by the caller once returned; this layer never persists it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyIdentifier(pub String);

impl KeyIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalized result envelope, independent of which platform flow produced
/// it.
///
/// The `type` tag unambiguously identifies the producing flow. `token` is
/// always transport-safe: either the native token string or standard base64
/// of the raw native bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AttestationResult {
    /// One-shot integrity token from the token-based flow.
    #[serde(rename = "tokenAttestation")]
    TokenAttestation { token: String },

    /// Fresh key attestation from the key-based flow.
    #[serde(rename = "keyAttestation")]
    KeyAttestation {
        token: String,
        #[serde(rename = "keyId")]
        key_id: KeyIdentifier,
    },

    /// Continuity assertion over a previously attested key.
    #[serde(rename = "assertion")]
    Assertion {
        token: String,
        #[serde(rename = "keyId")]
        key_id: KeyIdentifier,
    },
}

impl AttestationResult {
    /// Transport-safe token carried by the envelope.
    pub fn token(&self) -> &str {
        match self {
            AttestationResult::TokenAttestation { token }
            | AttestationResult::KeyAttestation { token, .. }
            | AttestationResult::Assertion { token, .. } => token,
        }
    }

    /// Key identifier, for the flows that have one.
    pub fn key_id(&self) -> Option<&KeyIdentifier> {
        match self {
            AttestationResult::TokenAttestation { .. } => None,
            AttestationResult::KeyAttestation { key_id, .. }
            | AttestationResult::Assertion { key_id, .. } => Some(key_id),
        }
    }
}

/// Failure reported by a native platform service, carrying the native
/// message verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServiceFailure {
    pub message: String,
}

impl ServiceFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
