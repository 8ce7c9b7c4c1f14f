//! Emulator detection from static device build descriptors.
//!
//! The token-based service cannot produce a real verdict inside an emulated
//! device, so the driver short-circuits to a deterministic mock token when
//! the profile matches a known emulator. Detection is pure string matching
//! over descriptors the embedder reads once at startup; it has no failure
//! mode.

use serde::{Deserialize, Serialize};

/// Static build descriptors of the device the process runs on.
///
/// The embedder fills this once from the platform build properties and
/// hands it to the driver configuration. All fields default to empty, which
/// classifies as a physical device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub manufacturer: String,
    pub model: String,
    pub product: String,
    pub brand: String,
    pub device: String,
    pub fingerprint: String,
}

impl DeviceProfile {
    /// True if any of the fixed emulator markers matches this profile.
    ///
    /// The marker list is closed; unrecognized descriptors classify as a
    /// physical device.
    pub fn is_emulator(&self) -> bool {
        self.fingerprint.starts_with("generic")
            || self.fingerprint.starts_with("unknown")
            || self.model.contains("google_sdk")
            || self.model.contains("Emulator")
            || self.model.contains("Android SDK built for x86")
            || self.manufacturer.contains("Genymotion")
            || (self.brand.starts_with("generic") && self.device.starts_with("generic"))
            || self.product == "google_sdk"
    }
}
