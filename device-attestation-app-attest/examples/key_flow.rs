//! Example: Key-based attestation and assertion against a scripted service
//!
//! Run with: cargo run -p device-attestation-app-attest --example key_flow

use anyhow::Result;
use device_attestation_app_attest::{
    AppAttestConfig, AppAttestDriver, AppAttestService, KeyCallback, PayloadCallback,
    PlatformVersion,
};
use device_attestation_core::{
    Hash256, OperationCall, OperationReply, Orchestrator, ServiceFailure,
};
use rand::Rng;
use std::sync::Arc;

/// Stand-in for the platform key-attestation service. Keys are random
/// identifiers; payloads embed the inputs so the output is inspectable.
struct ScriptedAppAttestService;

impl AppAttestService for ScriptedAppAttestService {
    fn is_supported(&self) -> Result<bool, ServiceFailure> {
        Ok(true)
    }

    fn generate_key(&self, complete: KeyCallback) {
        let key_id: u64 = rand::thread_rng().gen();
        std::thread::spawn(move || {
            complete(Ok(Some(format!("key-{:016x}", key_id))));
        });
    }

    fn attest_key(&self, key_id: &str, client_data_hash: &Hash256, complete: PayloadCallback) {
        let payload = format!("attestation({}, {:02x?})", key_id, &client_data_hash[..4]);
        std::thread::spawn(move || {
            complete(Ok(Some(payload.into_bytes())));
        });
    }

    fn generate_assertion(
        &self,
        key_id: &str,
        client_data_hash: &Hash256,
        complete: PayloadCallback,
    ) {
        let payload = format!("assertion({}, {:02x?})", key_id, &client_data_hash[..4]);
        std::thread::spawn(move || {
            complete(Ok(Some(payload.into_bytes())));
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

    println!("🔑 Device Attestation - Key Flow Example\n");
    println!("==============================================\n");

    // Step 1: Build the key-based driver
    println!("1️⃣  Building the key-based driver...");
    let config = AppAttestConfig::new("com.example.app", PlatformVersion::new(17, 4));
    let driver = AppAttestDriver::new(config, Arc::new(ScriptedAppAttestService));
    let orchestrator = Orchestrator::new(driver);
    println!("   ✓ Driver ready\n");

    // Step 2: Probe the capability
    println!("2️⃣  Initializing...");
    let reply = orchestrator.handle(&OperationCall::new("initialize")).await;
    println!("   initialize -> {:?}\n", reply);

    // Step 3: Fresh attestation mints a key and attests it
    println!("3️⃣  Attesting a fresh key...");
    let reply = orchestrator
        .handle(&OperationCall::new("attest").with_arg("challenge", "server-challenge-1"))
        .await;
    let key_id = match &reply {
        OperationReply::Attestation(result) => {
            println!("   ✓ Token:  {}", result.token());
            println!("   ✓ Key ID: {}", result.key_id().map(|k| k.as_str()).unwrap_or("-"));
            result.key_id().cloned()
        }
        other => {
            println!("   ✗ Unexpected reply: {:?}", other);
            None
        }
    };
    println!();

    // Step 4: Later requests assert continuity over the same key
    if let Some(key_id) = key_id {
        println!("4️⃣  Generating an assertion over the attested key...");
        let reply = orchestrator
            .handle(
                &OperationCall::new("generateAssertion")
                    .with_arg("challenge", "server-challenge-2")
                    .with_arg("keyId", key_id.as_str()),
            )
            .await;
        match &reply {
            OperationReply::Attestation(result) => println!("   ✓ Assertion: {}", result.token()),
            other => println!("   ✗ Unexpected reply: {:?}", other),
        }
        println!();
    }

    // Step 5: The same call without a key is rejected before native work
    println!("5️⃣  Sending an assertion call without a keyId...");
    let reply = orchestrator
        .handle(&OperationCall::new("generateAssertion").with_arg("challenge", "x"))
        .await;
    println!("   generateAssertion -> code {:?}\n", reply.error_code());

    println!("==============================================");
    println!("✅ Key flow complete!");
    Ok(())
}
