//! Native seam for the platform key-attestation service.
//!
//! Models the completion-handler API of the platform service: every
//! operation completes exactly once, on any thread, with either a payload,
//! an explicit absence (the native API is nullable), or a failure. The real
//! implementation lives in the embedding application, bound to the platform
//! SDK.

use device_attestation_core::{Hash256, ServiceFailure};

/// Completion callback for key generation, carrying the new key identifier.
pub type KeyCallback = Box<dyn FnOnce(Result<Option<String>, ServiceFailure>) + Send + 'static>;

/// Completion callback for attestation and assertion payloads, carrying raw
/// native bytes.
pub type PayloadCallback =
    Box<dyn FnOnce(Result<Option<Vec<u8>>, ServiceFailure>) + Send + 'static>;

/// Handle to the platform key-attestation service.
pub trait AppAttestService: Send + Sync {
    /// Native capability probe. Probe faults are downgraded to `false` by
    /// `is_supported` and surfaced as errors only by `initialize`.
    fn is_supported(&self) -> Result<bool, ServiceFailure>;

    /// Generate a fresh hardware-held key; completes with its identifier.
    fn generate_key(&self, complete: KeyCallback);

    /// Attest a generated key over the client-data hash; completes with the
    /// attestation object bytes.
    fn attest_key(&self, key_id: &str, client_data_hash: &Hash256, complete: PayloadCallback);

    /// Produce an assertion for an existing key over the client-data hash.
    fn generate_assertion(
        &self,
        key_id: &str,
        client_data_hash: &Hash256,
        complete: PayloadCallback,
    );
}
