//! Operation dispatch over the request/response call surface.
//!
//! A host bridge delivers `{operation, arguments}` pairs; the orchestrator
//! validates arguments synchronously, before any native work is submitted,
//! and routes the call to the configured platform driver. Exactly one reply
//! is produced per call.

use serde_json::{Map, Value};

use crate::driver::{AttestationDriver, InitializeOptions};
use crate::error::AttestationError;
use crate::types::{AttestationResult, Challenge, KeyIdentifier};

/// One incoming call from the host bridge.
#[derive(Debug, Clone, Default)]
pub struct OperationCall {
    /// Operation name (`initialize`, `attest`, `generateAssertion`,
    /// `isSupported`).
    pub operation: String,
    /// String-keyed dynamic arguments.
    pub arguments: Map<String, Value>,
}

impl OperationCall {
    pub fn new(operation: impl Into<String>) -> Self {
        OperationCall {
            operation: operation.into(),
            arguments: Map::new(),
        }
    }

    /// Attach an argument (builder style).
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Fetch an optional string argument. `null` counts as absent; any
    /// other non-string value is a caller error.
    fn optional_str(&self, key: &str) -> Result<Option<&str>, AttestationError> {
        match self.arguments.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(AttestationError::InvalidArgument(format!(
                "Argument '{}' must be a string",
                key
            ))),
        }
    }
}

/// Terminal reply for one orchestrated call.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationReply {
    /// Boolean result (`initialize`, `isSupported`).
    Bool(bool),
    /// Normalized attestation envelope (`attest`, `generateAssertion`).
    Attestation(AttestationResult),
    /// Terminal failure; [`AttestationError::code`] gives the stable
    /// machine-readable code.
    Error(AttestationError),
    /// The operation name is not part of the call surface.
    NotImplemented,
}

impl OperationReply {
    /// Machine-readable error code, when this reply is an error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            OperationReply::Error(err) => Some(err.code()),
            _ => None,
        }
    }
}

impl From<Result<AttestationResult, AttestationError>> for OperationReply {
    fn from(result: Result<AttestationResult, AttestationError>) -> Self {
        match result {
            Ok(result) => OperationReply::Attestation(result),
            Err(err) => OperationReply::Error(err),
        }
    }
}

impl From<Result<bool, AttestationError>> for OperationReply {
    fn from(result: Result<bool, AttestationError>) -> Self {
        match result {
            Ok(value) => OperationReply::Bool(value),
            Err(err) => OperationReply::Error(err),
        }
    }
}

/// Top-level dispatcher over one platform driver.
///
/// Validates each call, picks the flow implied by the operation name, and
/// sequences encoding, native submission, deadline supervision, and
/// normalization through the driver.
pub struct Orchestrator<D> {
    driver: D,
}

impl<D: AttestationDriver> Orchestrator<D> {
    pub fn new(driver: D) -> Self {
        Orchestrator { driver }
    }

    /// Borrow the underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Handle one call to completion.
    ///
    /// Unrecognized operation names report [`OperationReply::NotImplemented`]
    /// rather than an error; the set of operations is part of the surface,
    /// not a failure mode.
    pub async fn handle(&self, call: &OperationCall) -> OperationReply {
        tracing::debug!(
            operation = %call.operation,
            platform = self.driver.platform(),
            "dispatching operation"
        );

        match call.operation.as_str() {
            "initialize" => self.initialize(call),
            "attest" => self.attest(call).await,
            "generateAssertion" => self.generate_assertion(call).await,
            "isSupported" => OperationReply::Bool(self.driver.is_supported()),
            other => {
                tracing::warn!(operation = %other, "unrecognized operation");
                OperationReply::NotImplemented
            }
        }
    }

    fn initialize(&self, call: &OperationCall) -> OperationReply {
        let project_number = match call.optional_str("projectNumber") {
            Ok(value) => value.map(str::to_owned),
            Err(err) => return OperationReply::Error(err),
        };
        let options = InitializeOptions { project_number };
        self.driver.initialize(&options).into()
    }

    async fn attest(&self, call: &OperationCall) -> OperationReply {
        let (challenge, key_id) = match self.challenge_and_key(call, false) {
            Ok(parts) => parts,
            Err(err) => return OperationReply::Error(err),
        };
        self.driver.attest(&challenge, key_id.as_ref()).await.into()
    }

    async fn generate_assertion(&self, call: &OperationCall) -> OperationReply {
        let require_key = self.driver.kind().requires_key_identifier();
        let (challenge, key_id) = match self.challenge_and_key(call, require_key) {
            Ok(parts) => parts,
            Err(err) => return OperationReply::Error(err),
        };
        self.driver
            .generate_assertion(&challenge, key_id.as_ref())
            .await
            .into()
    }

    /// Extract and validate `challenge` (and `keyId`) before the driver is
    /// touched; an invalid call must never reach native code.
    fn challenge_and_key(
        &self,
        call: &OperationCall,
        require_key: bool,
    ) -> Result<(Challenge, Option<KeyIdentifier>), AttestationError> {
        let missing = if require_key {
            "Challenge and keyId are required"
        } else {
            "Challenge is required"
        };

        let challenge = call
            .optional_str("challenge")?
            .ok_or_else(|| AttestationError::InvalidArgument(missing.to_string()))?;
        let challenge = Challenge::new(challenge)?;

        let key_id = call
            .optional_str("keyId")?
            .map(|id| KeyIdentifier(id.to_owned()));
        if require_key && key_id.is_none() {
            return Err(AttestationError::InvalidArgument(missing.to_string()));
        }

        Ok((challenge, key_id))
    }
}
