//! Hardware fingerprinting for license binding.
//!
//! Produces the stable identifier a client presents when activating or
//! validating a hardware-bound license: a SHA-256 hex digest over platform
//! identifiers that survive reboots.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use std::fmt;

/// Hex-digest length of a well-formed fingerprint.
const FINGERPRINT_LEN: usize = 64;

/// A stable identifier for one machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HardwareFingerprint(String);

impl HardwareFingerprint {
    /// Computes the fingerprint of the current machine.
    ///
    /// Combines the operating system, architecture, hostname, machine id
    /// (where the platform exposes one), and the login user, then hashes
    /// the combination.
    #[must_use]
    pub fn generate() -> Self {
        let combined = collect_platform_ids().join("|");
        Self(hex::encode(Sha256::digest(combined.as_bytes())))
    }

    /// Wraps an already-computed fingerprint string.
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the presented identifier matches this fingerprint.
    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        self.0 == presented
    }

    /// Returns true for a 64-character lowercase hex string.
    #[must_use]
    pub fn is_well_formed(id: &str) -> bool {
        id.len() == FINGERPRINT_LEN
            && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl fmt::Display for HardwareFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collects stable platform identifiers, most portable first.
fn collect_platform_ids() -> Vec<String> {
    let mut ids = vec![
        env::consts::OS.to_string(),
        env::consts::ARCH.to_string(),
        get_hostname(),
    ];
    if let Some(machine_id) = get_machine_id() {
        ids.push(machine_id);
    }
    if let Ok(user) = env::var("USER").or_else(|_| env::var("USERNAME")) {
        ids.push(user);
    }
    ids.retain(|id| !id.is_empty());
    ids
}

fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Reads the platform machine id where one exists.
fn get_machine_id() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|id| id.trim().to_string())
    }

    #[cfg(target_os = "macos")]
    {
        use std::process::Command;
        let output = Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()?;
        let text = String::from_utf8(output.stdout).ok()?;
        text.lines()
            .find(|line| line.contains("IOPlatformUUID"))
            .and_then(|line| line.split('"').nth(3))
            .map(str::to_string)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_within_a_machine() {
        assert_eq!(HardwareFingerprint::generate(), HardwareFingerprint::generate());
    }

    #[test]
    fn fingerprint_is_lowercase_hex() {
        let fp = HardwareFingerprint::generate();
        assert!(HardwareFingerprint::is_well_formed(fp.as_str()));
    }

    #[test]
    fn platform_ids_are_non_empty() {
        let ids = collect_platform_ids();
        assert!(ids.len() >= 3);
        assert!(ids.iter().all(|id| !id.is_empty()));
    }
}
