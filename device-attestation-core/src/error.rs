//! Error taxonomy for the attestation call surface.
//!
//! Every failure carries a stable machine-readable code ([`AttestationError::code`])
//! alongside a human-readable message, so a host bridge can surface both
//! without interpreting Rust types.

use thiserror::Error;

/// Errors surfaced by the drivers and the orchestrator.
///
/// All variants are terminal for the call that produced them; retry policy
/// belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttestationError {
    /// Missing or wrongly-typed caller argument, detected before any
    /// asynchronous work starts.
    #[error("{0}")]
    InvalidArgument(String),

    /// The project number was present but not parseable as an integer.
    #[error("Invalid project number format: {0}")]
    InvalidProjectNumber(String),

    /// The token-based flow was invoked without a configured cloud project
    /// number.
    #[error("{0}")]
    ConfigurationError(String),

    /// The native service could not be brought up during `initialize`.
    #[error("{0}")]
    InitializationFailed(String),

    /// An attestation was requested before the native service handle
    /// existed.
    #[error("{0}")]
    NotInitialized(String),

    /// The device hardware does not carry the attestation capability.
    #[error("{0}")]
    UnsupportedDevice(String),

    /// The platform release predates the attestation capability.
    #[error("{0}")]
    UnsupportedVersion(String),

    /// The key-based service failed to mint a hardware-held key.
    #[error("{0}")]
    KeyGenerationFailed(String),

    /// The client-data structure could not be serialized for hashing.
    #[error("{0}")]
    HashCreationFailed(String),

    /// The native service reported a terminal attestation failure.
    #[error("{0}")]
    AttestationFailed(String),

    /// The native service reported a terminal assertion failure.
    #[error("{0}")]
    AssertionFailed(String),

    /// The deadline fired before the native service completed.
    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },
}

impl AttestationError {
    /// Stable machine-readable code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            AttestationError::InvalidArgument(_) => "INVALID_ARGUMENT",
            AttestationError::InvalidProjectNumber(_) => "INVALID_PROJECT_NUMBER",
            AttestationError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            AttestationError::InitializationFailed(_) => "INITIALIZATION_FAILED",
            AttestationError::NotInitialized(_) => "NOT_INITIALIZED",
            AttestationError::UnsupportedDevice(_) => "UNSUPPORTED_DEVICE",
            AttestationError::UnsupportedVersion(_) => "UNSUPPORTED_VERSION",
            AttestationError::KeyGenerationFailed(_) => "KEY_GENERATION_FAILED",
            AttestationError::HashCreationFailed(_) => "HASH_CREATION_FAILED",
            AttestationError::AttestationFailed(_) => "ATTESTATION_FAILED",
            AttestationError::AssertionFailed(_) => "ASSERTION_FAILED",
            AttestationError::Timeout { .. } => "ATTESTATION_TIMEOUT",
        }
    }
}
