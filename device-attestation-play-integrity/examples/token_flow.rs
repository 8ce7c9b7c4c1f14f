//! Example: Token-based attestation end to end against a scripted service
//!
//! Run with: cargo run -p device-attestation-play-integrity --example token_flow

use anyhow::Result;
use device_attestation_core::{OperationCall, OperationReply, Orchestrator};
use device_attestation_play_integrity::{
    DeviceProfile, IntegrityService, IntegrityToken, PlayIntegrityConfig, PlayIntegrityDriver,
    TokenCallback, TokenRequest,
};
use std::sync::Arc;

/// Stand-in for the platform service. Like the real SDK it completes on its
/// own thread, not on the caller's.
struct ScriptedIntegrityService;

impl IntegrityService for ScriptedIntegrityService {
    fn request_integrity_token(&self, request: TokenRequest, complete: TokenCallback) {
        std::thread::spawn(move || {
            complete(Ok(IntegrityToken {
                token: format!("integrity-token::{}", request.nonce),
            }));
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    println!("📱 Device Attestation - Token Flow Example\n");
    println!("==============================================\n");

    // Step 1: Describe the device and wire up the native service handle
    println!("1️⃣  Building the token-based driver...");
    let config = PlayIntegrityConfig {
        device_profile: DeviceProfile {
            manufacturer: "Google".to_string(),
            model: "Pixel 7".to_string(),
            product: "panther".to_string(),
            brand: "google".to_string(),
            device: "panther".to_string(),
            fingerprint: "google/panther/panther:14/...:user/release-keys".to_string(),
        },
    };
    let driver = PlayIntegrityDriver::new(config, Arc::new(ScriptedIntegrityService));
    let orchestrator = Orchestrator::new(driver);
    println!("   ✓ Driver ready\n");

    // Step 2: Configure the cloud project number
    println!("2️⃣  Initializing with the cloud project number...");
    let reply = orchestrator
        .handle(&OperationCall::new("initialize").with_arg("projectNumber", "123456789"))
        .await;
    println!("   initialize -> {:?}\n", reply);

    // Step 3: Attest a server-issued challenge
    println!("3️⃣  Requesting an integrity token...");
    let reply = orchestrator
        .handle(&OperationCall::new("attest").with_arg("challenge", "server-challenge-1"))
        .await;
    match &reply {
        OperationReply::Attestation(result) => {
            println!("   ✓ Token: {}", result.token());
        }
        other => println!("   ✗ Unexpected reply: {:?}", other),
    }
    println!();

    // Step 4: Validation failures never reach the native service
    println!("4️⃣  Sending an invalid call (missing challenge)...");
    let reply = orchestrator.handle(&OperationCall::new("attest")).await;
    println!("   attest -> code {:?}\n", reply.error_code());

    // Step 5: Capability probe
    println!("5️⃣  Checking device support...");
    let reply = orchestrator.handle(&OperationCall::new("isSupported")).await;
    println!("   isSupported -> {:?}\n", reply);

    println!("==============================================");
    println!("✅ Token flow complete!");
    Ok(())
}
