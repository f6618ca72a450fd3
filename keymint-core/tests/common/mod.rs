//! Shared fixtures for keymint-core integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use keymint_core::{KeyCodec, License, LicenseService, LicenseStore, LicenseType, MemoryStore};

/// Signing secret used across tests.
pub const TEST_SECRET: &str = "unit-test-signing-secret";

/// Codec with the fixed test secret.
pub fn test_codec() -> KeyCodec {
    KeyCodec::new(TEST_SECRET)
}

/// A 30-day "Pro" license type.
pub fn pro_type() -> LicenseType {
    let mut plan = LicenseType::new("Pro", 30);
    plan.description = "Thirty-day professional license".to_string();
    plan
}

/// A 14-day "Trial" license type.
pub fn trial_type() -> LicenseType {
    LicenseType::new("Trial", 14)
}

/// Service over a fresh in-memory store with the given types registered.
pub fn service_with(types: &[LicenseType]) -> LicenseService<MemoryStore> {
    let store = MemoryStore::new();
    for plan in types {
        store.insert_license_type(plan).unwrap();
    }
    LicenseService::new(store, test_codec())
}

/// A pending license built directly against the entity API.
pub fn pending_license(plan: &LicenseType, now: DateTime<Utc>) -> License {
    License::new("TESTKEY9-ABCDE-FGHIJ-KLMNO", plan, now)
}

/// A timestamp the given number of days in the past.
pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}
