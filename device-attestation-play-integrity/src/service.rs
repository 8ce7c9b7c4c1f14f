//! Native seam for the platform integrity-token service.
//!
//! The real implementation lives in the embedding application, bound to the
//! platform SDK; this layer only fixes the request shape and the completion
//! contract. Completion may arrive on any platform-managed thread, exactly
//! once per request.

use device_attestation_core::ServiceFailure;

/// Request submitted to the integrity-token service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    /// Transport-encoded challenge (standard base64 of the raw bytes).
    pub nonce: String,
    /// Cloud project number the verdict is routed through.
    pub cloud_project_number: u64,
}

/// Successful native response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityToken {
    /// Opaque integrity verdict token, already transport-safe.
    pub token: String,
}

/// Completion callback, invoked exactly once per request by the native
/// service, on any thread.
pub type TokenCallback = Box<dyn FnOnce(Result<IntegrityToken, ServiceFailure>) + Send + 'static>;

/// Handle to the platform integrity-token service.
pub trait IntegrityService: Send + Sync {
    /// Submit an asynchronous token request.
    fn request_integrity_token(&self, request: TokenRequest, complete: TokenCallback);
}
