//! # Device Attestation Core
//!
//! Provides the shared protocol layer for device-integrity attestation:
//! proving to a remote verifier that a request originates from a genuine,
//! untampered application on a real device.
//!
//! ## Key Features
//! - **Normalized envelope**: one result shape regardless of platform flow
//! - **Driver interface**: pluggable token-based and key-based platforms
//! - **Completion latch**: first-writer-wins outcome delivery with deadline
//!   racing for callback-style native services
//! - **Orchestrator**: argument validation and dispatch over the
//!   `{operation, arguments}` call surface

pub mod completion;
pub mod driver;
pub mod encode;
pub mod error;
pub mod orchestrator;
pub mod types;

pub use completion::{race_with_deadline, CompletionHandle, RaceOutcome};
pub use driver::{AttestationDriver, DriverKind, InitializeOptions};
pub use error::AttestationError;
pub use orchestrator::{OperationCall, OperationReply, Orchestrator};
pub use types::*;

// Re-export Hash256 from types
pub use types::Hash256;
