//! Challenge encoding for the two platform attestation primitives.
//!
//! Both flows consume the same caller challenge, but in two canonical forms
//! that must never be conflated:
//!
//! - the key-based service signs over a fixed-size SHA-256 client-data hash;
//! - the token-based service expects the challenge transport-encoded into a
//!   nonce string, un-hashed.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::AttestationError;
use crate::types::{Challenge, Hash256};

/// Fixed type tag bound into the client-data structure.
pub const CLIENT_DATA_TYPE: &str = "webauthn.get";

/// Client-data structure hashed for the key-based service.
///
/// `serde_json` emits struct fields in declaration order, so the same
/// inputs always serialize to the same bytes. The field order here is the
/// canonical one and must not change.
#[derive(Debug, Serialize)]
struct ClientData<'a> {
    challenge: &'a str,
    origin: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

/// Compute the SHA-256 client-data hash binding `challenge` to the calling
/// application's `origin` identifier.
///
/// Only the key-based flow consumes this; the token-based flow takes the
/// nonce form from [`challenge_nonce`].
pub fn client_data_hash(challenge: &Challenge, origin: &str) -> Result<Hash256, AttestationError> {
    let client_data = ClientData {
        challenge: challenge.as_str(),
        origin,
        kind: CLIENT_DATA_TYPE,
    };

    let bytes = serde_json::to_vec(&client_data).map_err(|e| {
        AttestationError::HashCreationFailed(format!("Failed to create client data hash: {}", e))
    })?;

    Ok(Sha256::digest(&bytes).into())
}

/// Transport-encode the raw challenge bytes into the nonce string the
/// token-based service expects (standard base64, padded).
pub fn challenge_nonce(challenge: &Challenge) -> String {
    BASE64.encode(challenge.as_bytes())
}
