//! Token-based device attestation driver (Play Integrity protocol).
//!
//! This crate implements the token-based half of the attestation layer: one
//! opaque integrity verdict token per request, minted by the platform
//! service and verified server-side.
//!
//! ## Attestation Flow
//! 1. Fail fast unless a non-zero cloud project number is configured
//! 2. Short-circuit to a deterministic mock token on emulated devices
//! 3. Transport-encode the challenge into the nonce form
//! 4. Submit the token request and race it against a 30-second deadline
//! 5. Normalize the native payload into the shared result envelope
//!
//! The variant has no distinct assertion phase: a fresh token already
//! encodes freshness, so `generate_assertion` falls back to `attest`.

pub mod emulator;
pub mod service;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use device_attestation_core::{
    encode, race_with_deadline, AttestationDriver, AttestationError, AttestationResult, Challenge,
    DriverKind, InitializeOptions, KeyIdentifier, RaceOutcome,
};

pub use emulator::DeviceProfile;
pub use service::{IntegrityService, IntegrityToken, TokenCallback, TokenRequest};

/// Prefix of the deterministic token issued on emulated devices.
pub const MOCK_TOKEN_PREFIX: &str = "mock_integrity_token_";

/// Fixed bound on one outstanding token request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the token-based driver.
#[derive(Debug, Clone, Default)]
pub struct PlayIntegrityConfig {
    /// Build descriptors of the executing device, for the emulator gate.
    pub device_profile: DeviceProfile,
}

/// Token-based attestation driver.
///
/// The cloud project number is the only mutable state: zero means unset,
/// and concurrent `initialize` calls are last-write-wins.
pub struct PlayIntegrityDriver {
    config: PlayIntegrityConfig,
    service: Option<Arc<dyn IntegrityService>>,
    cloud_project_number: AtomicU64,
}

impl PlayIntegrityDriver {
    /// Create a driver over a live native service handle.
    pub fn new(config: PlayIntegrityConfig, service: Arc<dyn IntegrityService>) -> Self {
        Self {
            config,
            service: Some(service),
            cloud_project_number: AtomicU64::new(0),
        }
    }

    /// Create a driver whose native service failed to construct. Every
    /// attestation reports the missing handle and `is_supported` is false.
    pub fn without_service(config: PlayIntegrityConfig) -> Self {
        Self {
            config,
            service: None,
            cloud_project_number: AtomicU64::new(0),
        }
    }

    fn configured_project_number(&self) -> Option<u64> {
        match self.cloud_project_number.load(Ordering::Relaxed) {
            0 => None,
            n => Some(n),
        }
    }

    /// Run the token flow for one challenge.
    async fn request_token(
        &self,
        challenge: &Challenge,
    ) -> Result<AttestationResult, AttestationError> {
        let Some(project_number) = self.configured_project_number() else {
            tracing::error!("Cloud project number is not configured");
            return Err(AttestationError::ConfigurationError(
                "Cloud project number is not configured. Please call initialize() with your cloud project number first."
                    .to_string(),
            ));
        };

        // Emulators never reach the native service; the mock token keeps
        // development builds running end to end.
        if self.config.device_profile.is_emulator() {
            let token = format!("{}{}", MOCK_TOKEN_PREFIX, Utc::now().timestamp_millis());
            tracing::debug!("Emulated device detected, issuing mock integrity token");
            return Ok(AttestationResult::TokenAttestation { token });
        }

        let Some(service) = self.service.as_ref() else {
            return Err(AttestationError::NotInitialized(
                "Integrity service not available".to_string(),
            ));
        };

        let request = TokenRequest {
            nonce: encode::challenge_nonce(challenge),
            cloud_project_number: project_number,
        };

        tracing::debug!(project_number, "Requesting integrity token");
        let raced = race_with_deadline(REQUEST_TIMEOUT, |handle| {
            service.request_integrity_token(
                request,
                Box::new(move |outcome| {
                    if !handle.complete(outcome) {
                        tracing::warn!(
                            "Discarding integrity response that arrived after the request settled"
                        );
                    }
                }),
            );
        })
        .await;

        match raced {
            RaceOutcome::Completed(Ok(response)) => {
                tracing::debug!("Integrity token attestation successful");
                Ok(AttestationResult::TokenAttestation {
                    token: response.token,
                })
            }
            RaceOutcome::Completed(Err(failure)) => {
                tracing::error!("Integrity token attestation failed: {}", failure);
                Err(AttestationError::AttestationFailed(failure.message))
            }
            RaceOutcome::TimedOut => {
                tracing::error!("Integrity token request timed out");
                Err(AttestationError::Timeout {
                    seconds: REQUEST_TIMEOUT.as_secs(),
                })
            }
        }
    }
}

#[async_trait]
impl AttestationDriver for PlayIntegrityDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::TokenBased
    }

    fn platform(&self) -> &'static str {
        "play-integrity"
    }

    fn initialize(&self, options: &InitializeOptions) -> Result<bool, AttestationError> {
        if let Some(project_number) = options.project_number.as_deref() {
            let parsed: u64 = project_number.parse().map_err(|_| {
                AttestationError::InvalidProjectNumber(project_number.to_string())
            })?;
            self.cloud_project_number.store(parsed, Ordering::Relaxed);
            tracing::debug!(project_number = parsed, "Cloud project number configured");
        } else {
            tracing::warn!("No project number provided during initialization");
        }

        // The token service needs no handshake; readiness is the handle.
        if self.service.is_some() {
            Ok(true)
        } else {
            Err(AttestationError::InitializationFailed(
                "Failed to initialize Play Integrity".to_string(),
            ))
        }
    }

    async fn attest(
        &self,
        challenge: &Challenge,
        _key_id: Option<&KeyIdentifier>,
    ) -> Result<AttestationResult, AttestationError> {
        tracing::debug!("Starting token attestation");
        self.request_token(challenge).await
    }

    async fn generate_assertion(
        &self,
        challenge: &Challenge,
        key_id: Option<&KeyIdentifier>,
    ) -> Result<AttestationResult, AttestationError> {
        // No distinct assertion phase on this variant; the key identifier
        // cannot be honored.
        if let Some(key_id) = key_id {
            tracing::warn!(
                %key_id,
                "Token-based driver ignores keyId, producing a fresh attestation \
                 instead of a continuity assertion"
            );
        }
        self.request_token(challenge).await
    }

    fn is_supported(&self) -> bool {
        self.service.is_some()
    }
}
