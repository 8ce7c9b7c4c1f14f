//! Key-based device attestation driver (App Attest protocol).
//!
//! This crate implements the key-based half of the attestation layer: a
//! hardware-held key is minted once, attested against a challenge, and
//! later produces cheap continuity assertions over the same key.
//!
//! ## Attestation Flow
//! 1. Gate on platform release and hardware capability
//! 2. Generate a fresh hardware-held key
//! 3. Compute the SHA-256 client-data hash binding challenge and origin
//! 4. Attest the key over the hash
//! 5. Return the base64 attestation object together with the key identifier
//!
//! ## Assertion Flow
//! Same gate and hash, then a single assertion request over the existing
//! key. Every native stage is raced against a deadline, so a hung platform
//! call surfaces as a timeout instead of suspending the caller forever.

pub mod service;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use device_attestation_core::{
    encode, race_with_deadline, AttestationDriver, AttestationError, AttestationResult, Challenge,
    DriverKind, InitializeOptions, KeyIdentifier, RaceOutcome,
};
use serde::{Deserialize, Serialize};

pub use service::{AppAttestService, KeyCallback, PayloadCallback};

/// Oldest platform release carrying the key-attestation capability.
pub const MIN_PLATFORM_VERSION: PlatformVersion = PlatformVersion {
    major: 14,
    minor: 0,
};

/// Default bound on each native stage.
pub const STAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Host platform release, as reported by the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlatformVersion {
    pub major: u32,
    pub minor: u32,
}

impl PlatformVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Configuration for the key-based driver.
#[derive(Debug, Clone)]
pub struct AppAttestConfig {
    /// Application identifier bound into every client-data hash.
    pub origin: String,
    /// Host platform release, for the capability gate.
    pub platform_version: PlatformVersion,
    /// Bound on each native stage (key generation, attestation, assertion).
    pub stage_timeout: Duration,
}

impl AppAttestConfig {
    pub fn new(origin: impl Into<String>, platform_version: PlatformVersion) -> Self {
        Self {
            origin: origin.into(),
            platform_version,
            stage_timeout: STAGE_TIMEOUT,
        }
    }
}

/// Key-based attestation driver.
///
/// Holds no mutable state: key identifiers belong to the caller, and the
/// native service owns the keys themselves.
pub struct AppAttestDriver {
    config: AppAttestConfig,
    service: Arc<dyn AppAttestService>,
}

impl AppAttestDriver {
    pub fn new(config: AppAttestConfig, service: Arc<dyn AppAttestService>) -> Self {
        Self { config, service }
    }

    /// Version gate shared by every operation.
    fn check_platform_version(&self) -> Result<(), AttestationError> {
        if self.config.platform_version < MIN_PLATFORM_VERSION {
            return Err(AttestationError::UnsupportedVersion(
                "App Attest requires iOS 14.0 or later".to_string(),
            ));
        }
        Ok(())
    }

    fn stage_timeout_error(&self) -> AttestationError {
        AttestationError::Timeout {
            seconds: self.config.stage_timeout.as_secs(),
        }
    }

    /// Mint a fresh hardware-held key.
    async fn generate_key(&self) -> Result<KeyIdentifier, AttestationError> {
        let raced = race_with_deadline(self.config.stage_timeout, |handle| {
            self.service.generate_key(Box::new(move |outcome| {
                if !handle.complete(outcome) {
                    tracing::warn!(
                        "Discarding key generation result that arrived after the request settled"
                    );
                }
            }));
        })
        .await;

        match raced {
            RaceOutcome::Completed(Ok(Some(key_id))) => Ok(KeyIdentifier(key_id)),
            RaceOutcome::Completed(Ok(None)) => Err(AttestationError::KeyGenerationFailed(
                "Failed to generate key".to_string(),
            )),
            RaceOutcome::Completed(Err(failure)) => {
                tracing::error!("Key generation failed: {}", failure);
                Err(AttestationError::KeyGenerationFailed(failure.message))
            }
            RaceOutcome::TimedOut => Err(self.stage_timeout_error()),
        }
    }

    /// Run the full new-key attestation flow for one challenge.
    async fn attest_new_key(
        &self,
        challenge: &Challenge,
    ) -> Result<AttestationResult, AttestationError> {
        let key_id = self.generate_key().await?;
        tracing::debug!(%key_id, "Generated attestation key");

        let hash = encode::client_data_hash(challenge, &self.config.origin)?;

        let raced = race_with_deadline(self.config.stage_timeout, |handle| {
            self.service.attest_key(
                key_id.as_str(),
                &hash,
                Box::new(move |outcome| {
                    if !handle.complete(outcome) {
                        tracing::warn!(
                            "Discarding attestation object that arrived after the request settled"
                        );
                    }
                }),
            );
        })
        .await;

        match raced {
            RaceOutcome::Completed(Ok(Some(object))) => {
                tracing::debug!("Key attestation successful");
                Ok(AttestationResult::KeyAttestation {
                    token: BASE64.encode(object),
                    key_id,
                })
            }
            RaceOutcome::Completed(Ok(None)) => Err(AttestationError::AttestationFailed(
                "Attestation object is nil".to_string(),
            )),
            RaceOutcome::Completed(Err(failure)) => {
                tracing::error!("Key attestation failed: {}", failure);
                Err(AttestationError::AttestationFailed(failure.message))
            }
            RaceOutcome::TimedOut => Err(self.stage_timeout_error()),
        }
    }

    /// Produce an assertion over an already attested key.
    async fn assert_existing_key(
        &self,
        challenge: &Challenge,
        key_id: &KeyIdentifier,
    ) -> Result<AttestationResult, AttestationError> {
        let hash = encode::client_data_hash(challenge, &self.config.origin)?;

        let raced = race_with_deadline(self.config.stage_timeout, |handle| {
            self.service.generate_assertion(
                key_id.as_str(),
                &hash,
                Box::new(move |outcome| {
                    if !handle.complete(outcome) {
                        tracing::warn!(
                            "Discarding assertion that arrived after the request settled"
                        );
                    }
                }),
            );
        })
        .await;

        match raced {
            RaceOutcome::Completed(Ok(Some(assertion))) => {
                tracing::debug!(%key_id, "Assertion successful");
                Ok(AttestationResult::Assertion {
                    token: BASE64.encode(assertion),
                    key_id: key_id.clone(),
                })
            }
            RaceOutcome::Completed(Ok(None)) => Err(AttestationError::AssertionFailed(
                "Assertion is nil".to_string(),
            )),
            RaceOutcome::Completed(Err(failure)) => {
                tracing::error!("Assertion failed: {}", failure);
                Err(AttestationError::AssertionFailed(failure.message))
            }
            RaceOutcome::TimedOut => Err(self.stage_timeout_error()),
        }
    }
}

#[async_trait]
impl AttestationDriver for AppAttestDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::KeyBased
    }

    fn platform(&self) -> &'static str {
        "app-attest"
    }

    fn initialize(&self, _options: &InitializeOptions) -> Result<bool, AttestationError> {
        self.check_platform_version()?;
        match self.service.is_supported() {
            Ok(true) => Ok(true),
            Ok(false) => Err(AttestationError::UnsupportedDevice(
                "App Attest is not supported on this device".to_string(),
            )),
            Err(failure) => Err(AttestationError::InitializationFailed(failure.message)),
        }
    }

    async fn attest(
        &self,
        challenge: &Challenge,
        key_id: Option<&KeyIdentifier>,
    ) -> Result<AttestationResult, AttestationError> {
        self.check_platform_version()?;
        match key_id {
            // A supplied key means the caller wants continuity over it, not
            // a second attestation.
            Some(key_id) => self.assert_existing_key(challenge, key_id).await,
            None => {
                tracing::debug!("Starting key attestation");
                self.attest_new_key(challenge).await
            }
        }
    }

    async fn generate_assertion(
        &self,
        challenge: &Challenge,
        key_id: Option<&KeyIdentifier>,
    ) -> Result<AttestationResult, AttestationError> {
        self.check_platform_version()?;
        let Some(key_id) = key_id else {
            return Err(AttestationError::InvalidArgument(
                "Challenge and keyId are required".to_string(),
            ));
        };
        self.assert_existing_key(challenge, key_id).await
    }

    fn is_supported(&self) -> bool {
        if self.config.platform_version < MIN_PLATFORM_VERSION {
            return false;
        }
        // Probe faults downgrade to "unsupported" here; only initialize
        // surfaces them as errors.
        self.service.is_supported().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_attestation_core::{
        Hash256, OperationCall, OperationReply, Orchestrator, ServiceFailure,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // Scripted service: replies immediately with canned per-stage outcomes
    // and records every native call it sees.
    struct ScriptedService {
        supported: Result<bool, ServiceFailure>,
        key_reply: Mutex<Option<Result<Option<String>, ServiceFailure>>>,
        attest_reply: Mutex<Option<Result<Option<Vec<u8>>, ServiceFailure>>>,
        assertion_reply: Mutex<Option<Result<Option<Vec<u8>>, ServiceFailure>>>,
        key_calls: AtomicUsize,
        seen_attests: Mutex<Vec<(String, Hash256)>>,
        seen_assertions: Mutex<Vec<(String, Hash256)>>,
    }

    impl ScriptedService {
        fn happy() -> Self {
            Self {
                supported: Ok(true),
                key_reply: Mutex::new(Some(Ok(Some("key-1".to_string())))),
                attest_reply: Mutex::new(Some(Ok(Some(b"attestation-object".to_vec())))),
                assertion_reply: Mutex::new(Some(Ok(Some(b"assertion-bytes".to_vec())))),
                key_calls: AtomicUsize::new(0),
                seen_attests: Mutex::new(Vec::new()),
                seen_assertions: Mutex::new(Vec::new()),
            }
        }
    }

    impl AppAttestService for ScriptedService {
        fn is_supported(&self) -> Result<bool, ServiceFailure> {
            self.supported.clone()
        }

        fn generate_key(&self, complete: KeyCallback) {
            self.key_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(reply) = self.key_reply.lock().unwrap().take() {
                complete(reply);
            }
        }

        fn attest_key(&self, key_id: &str, client_data_hash: &Hash256, complete: PayloadCallback) {
            self.seen_attests
                .lock()
                .unwrap()
                .push((key_id.to_string(), *client_data_hash));
            if let Some(reply) = self.attest_reply.lock().unwrap().take() {
                complete(reply);
            }
        }

        fn generate_assertion(
            &self,
            key_id: &str,
            client_data_hash: &Hash256,
            complete: PayloadCallback,
        ) {
            self.seen_assertions
                .lock()
                .unwrap()
                .push((key_id.to_string(), *client_data_hash));
            if let Some(reply) = self.assertion_reply.lock().unwrap().take() {
                complete(reply);
            }
        }
    }

    // Service whose key generation hangs forever, stashing the callback the
    // way a stuck platform call would.
    #[derive(Default)]
    struct HungKeyService {
        pending: Mutex<Option<KeyCallback>>,
    }

    impl AppAttestService for HungKeyService {
        fn is_supported(&self) -> Result<bool, ServiceFailure> {
            Ok(true)
        }

        fn generate_key(&self, complete: KeyCallback) {
            *self.pending.lock().unwrap() = Some(complete);
        }

        fn attest_key(&self, _key_id: &str, _hash: &Hash256, _complete: PayloadCallback) {
            unreachable!("attestation stage must not start after a hung key generation");
        }

        fn generate_assertion(&self, _key_id: &str, _hash: &Hash256, _complete: PayloadCallback) {
            unreachable!("assertion stage must not start after a hung key generation");
        }
    }

    const ORIGIN: &str = "th.co.bank.mobile";

    fn config() -> AppAttestConfig {
        AppAttestConfig::new(ORIGIN, PlatformVersion::new(17, 4))
    }

    fn make_driver(service: ScriptedService) -> AppAttestDriver {
        AppAttestDriver::new(config(), Arc::new(service))
    }

    fn challenge(value: &str) -> Challenge {
        Challenge::new(value).unwrap()
    }

    #[test]
    fn test_platform_version_ordering() {
        assert!(PlatformVersion::new(13, 9) < MIN_PLATFORM_VERSION);
        assert!(PlatformVersion::new(14, 0) >= MIN_PLATFORM_VERSION);
        assert!(PlatformVersion::new(14, 1) > MIN_PLATFORM_VERSION);
        assert_eq!(PlatformVersion::new(14, 0).to_string(), "14.0");
    }

    #[tokio::test]
    async fn test_full_attestation_flow() {
        let service = Arc::new(ScriptedService::happy());
        let driver = AppAttestDriver::new(config(), service.clone());

        let challenge = challenge("test-challenge");
        let result = driver.attest(&challenge, None).await.unwrap();

        assert_eq!(
            result,
            AttestationResult::KeyAttestation {
                token: BASE64.encode(b"attestation-object"),
                key_id: KeyIdentifier("key-1".to_string()),
            }
        );

        // The native stage saw the fresh key and the canonical hash.
        let seen = service.seen_attests.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "key-1");
        assert_eq!(
            seen[0].1,
            encode::client_data_hash(&challenge, ORIGIN).unwrap()
        );
        assert_eq!(
            hex::encode(seen[0].1),
            "1c40786e1dd4d0423dc021f685e0960e1dfb28fe7883607b1e087b470685505f"
        );
    }

    #[tokio::test]
    async fn test_attest_with_key_takes_assertion_path() {
        let service = Arc::new(ScriptedService::happy());
        let driver = AppAttestDriver::new(config(), service.clone());

        let key_id = KeyIdentifier("key-1".to_string());
        let result = driver
            .attest(&challenge("test-challenge"), Some(&key_id))
            .await
            .unwrap();

        assert!(matches!(result, AttestationResult::Assertion { .. }));
        assert_eq!(service.key_calls.load(Ordering::SeqCst), 0);
        assert!(service.seen_attests.lock().unwrap().is_empty());
        assert_eq!(service.seen_assertions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_assertion_token_round_trips_to_raw_bytes() {
        let service = Arc::new(ScriptedService::happy());
        let driver = AppAttestDriver::new(config(), service);

        let key_id = KeyIdentifier("key-1".to_string());
        let result = driver
            .generate_assertion(&challenge("test-challenge"), Some(&key_id))
            .await
            .unwrap();

        match result {
            AttestationResult::Assertion { token, key_id } => {
                assert_eq!(BASE64.decode(token).unwrap(), b"assertion-bytes");
                assert_eq!(key_id.as_str(), "key-1");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_assertion_requires_key_id() {
        let driver = make_driver(ScriptedService::happy());

        let err = driver
            .generate_assertion(&challenge("test-challenge"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
        assert_eq!(err.to_string(), "Challenge and keyId are required");
    }

    #[tokio::test]
    async fn test_old_platform_version_gates_every_operation() {
        let service = Arc::new(ScriptedService::happy());
        let config = AppAttestConfig::new(ORIGIN, PlatformVersion::new(13, 7));
        let driver = AppAttestDriver::new(config, service.clone());

        let err = driver.initialize(&InitializeOptions::default()).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_VERSION");
        assert_eq!(err.to_string(), "App Attest requires iOS 14.0 or later");

        let err = driver
            .attest(&challenge("test-challenge"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_VERSION");

        assert!(!driver.is_supported());
        // Nothing may reach the native service through a failed gate.
        assert_eq!(service.key_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsupported_device_fails_initialize() {
        let mut service = ScriptedService::happy();
        service.supported = Ok(false);
        let driver = make_driver(service);

        let err = driver.initialize(&InitializeOptions::default()).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_DEVICE");
        assert_eq!(err.to_string(), "App Attest is not supported on this device");
        assert!(!driver.is_supported());
    }

    #[tokio::test]
    async fn test_probe_fault_downgrades_in_is_supported() {
        let mut service = ScriptedService::happy();
        service.supported = Err(ServiceFailure::new("entitlement missing"));
        let driver = make_driver(service);

        // initialize surfaces the fault...
        let err = driver.initialize(&InitializeOptions::default()).unwrap_err();
        assert_eq!(err.code(), "INITIALIZATION_FAILED");
        assert_eq!(err.to_string(), "entitlement missing");

        // ...is_supported never does.
        assert!(!driver.is_supported());
    }

    #[tokio::test]
    async fn test_key_generation_failure_surfaces_message() {
        let service = ScriptedService::happy();
        *service.key_reply.lock().unwrap() =
            Some(Err(ServiceFailure::new("keychain unavailable")));
        let driver = make_driver(service);

        let err = driver
            .attest(&challenge("test-challenge"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "KEY_GENERATION_FAILED");
        assert_eq!(err.to_string(), "keychain unavailable");
    }

    #[tokio::test]
    async fn test_nil_key_identifier_is_a_generation_failure() {
        let service = ScriptedService::happy();
        *service.key_reply.lock().unwrap() = Some(Ok(None));
        let driver = make_driver(service);

        let err = driver
            .attest(&challenge("test-challenge"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "KEY_GENERATION_FAILED");
        assert_eq!(err.to_string(), "Failed to generate key");
    }

    #[tokio::test]
    async fn test_nil_attestation_object() {
        let service = ScriptedService::happy();
        *service.attest_reply.lock().unwrap() = Some(Ok(None));
        let driver = make_driver(service);

        let err = driver
            .attest(&challenge("test-challenge"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ATTESTATION_FAILED");
        assert_eq!(err.to_string(), "Attestation object is nil");
    }

    #[tokio::test]
    async fn test_native_attestation_failure_surfaces_message() {
        let service = ScriptedService::happy();
        *service.attest_reply.lock().unwrap() = Some(Err(ServiceFailure::new("rate limited")));
        let driver = make_driver(service);

        let err = driver
            .attest(&challenge("test-challenge"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ATTESTATION_FAILED");
        assert_eq!(err.to_string(), "rate limited");
    }

    #[tokio::test]
    async fn test_assertion_failures_surface_per_stage() {
        let service = ScriptedService::happy();
        *service.assertion_reply.lock().unwrap() = Some(Ok(None));
        let driver = make_driver(service);
        let key_id = KeyIdentifier("key-1".to_string());

        let err = driver
            .generate_assertion(&challenge("test-challenge"), Some(&key_id))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ASSERTION_FAILED");
        assert_eq!(err.to_string(), "Assertion is nil");

        let service = ScriptedService::happy();
        *service.assertion_reply.lock().unwrap() =
            Some(Err(ServiceFailure::new("key not found")));
        let driver = make_driver(service);

        let err = driver
            .generate_assertion(&challenge("test-challenge"), Some(&key_id))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ASSERTION_FAILED");
        assert_eq!(err.to_string(), "key not found");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_key_generation_times_out() {
        let service = Arc::new(HungKeyService::default());
        let driver = AppAttestDriver::new(config(), service.clone());

        let err = driver
            .attest(&challenge("test-challenge"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ATTESTATION_TIMEOUT");
        assert_eq!(err.to_string(), "Request timed out after 30 seconds");

        // A late native completion is silently discarded.
        let callback = service.pending.lock().unwrap().take().unwrap();
        callback(Ok(Some("too-late".to_string())));
    }

    #[tokio::test]
    async fn test_orchestrated_key_flow() {
        let service = Arc::new(ScriptedService::happy());
        let driver = AppAttestDriver::new(config(), service.clone());
        let orchestrator = Orchestrator::new(driver);

        let reply = orchestrator.handle(&OperationCall::new("initialize")).await;
        assert_eq!(reply, OperationReply::Bool(true));

        let reply = orchestrator
            .handle(&OperationCall::new("attest").with_arg("challenge", "test-challenge"))
            .await;
        let key_id = match reply {
            OperationReply::Attestation(AttestationResult::KeyAttestation { key_id, .. }) => key_id,
            other => panic!("unexpected reply: {:?}", other),
        };

        let reply = orchestrator
            .handle(
                &OperationCall::new("generateAssertion")
                    .with_arg("challenge", "test-challenge")
                    .with_arg("keyId", key_id.as_str()),
            )
            .await;
        assert!(matches!(
            reply,
            OperationReply::Attestation(AttestationResult::Assertion { .. })
        ));

        // Key-based assertion without a key never reaches the driver.
        let assertions_before = service.seen_assertions.lock().unwrap().len();
        let reply = orchestrator
            .handle(&OperationCall::new("generateAssertion").with_arg("challenge", "x"))
            .await;
        assert_eq!(reply.error_code(), Some("INVALID_ARGUMENT"));
        assert_eq!(
            service.seen_assertions.lock().unwrap().len(),
            assertions_before
        );
    }
}
