//! Append-only audit trail of license events.
//!
//! Every activation, deactivation, revocation, and validation attempt
//! (successful or not) is recorded as a [`LicenseCheck`]. Entries are never
//! mutated or deleted on their own; they disappear only when their license
//! is deleted.

use crate::ids::{CheckId, LicenseId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// What an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// A validation run passed every check.
    CheckSuccess,
    /// A validation run failed; the message names the failing check.
    CheckFailed,
    /// The license was activated.
    Activated,
    /// The license was deactivated back to pending.
    Deactivated,
    /// The license was revoked.
    Revoked,
}

impl CheckStatus {
    /// Stable string form, used in persistence.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CheckSuccess => "check_success",
            Self::CheckFailed => "check_failed",
            Self::Activated => "activated",
            Self::Deactivated => "deactivated",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckStatus {
    type Err = ParseCheckStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "check_success" => Ok(Self::CheckSuccess),
            "check_failed" => Ok(Self::CheckFailed),
            "activated" => Ok(Self::Activated),
            "deactivated" => Ok(Self::Deactivated),
            "revoked" => Ok(Self::Revoked),
            other => Err(ParseCheckStatusError(other.to_string())),
        }
    }
}

/// Unrecognized check status string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown check status: {0:?}")]
pub struct ParseCheckStatusError(pub String);

/// One immutable audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseCheck {
    /// Unique id.
    pub id: CheckId,
    /// The license this entry belongs to.
    pub license_id: LicenseId,
    /// Set once at append time.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub status: CheckStatus,
    /// Transport metadata, filled in by outer layers when known.
    pub ip_address: Option<String>,
    /// Hardware id presented with the triggering call, if any.
    pub hardware_id: Option<String>,
    /// Transport metadata, filled in by outer layers when known.
    pub user_agent: Option<String>,
    /// Human-readable detail, e.g. the failing check.
    pub message: Option<String>,
}

impl LicenseCheck {
    /// Creates an entry for a license event at the given time.
    #[must_use]
    pub fn new(license_id: LicenseId, status: CheckStatus, now: DateTime<Utc>) -> Self {
        Self {
            id: CheckId::new(),
            license_id,
            timestamp: now,
            status,
            ip_address: None,
            hardware_id: None,
            user_agent: None,
            message: None,
        }
    }

    /// Attaches the presented hardware id.
    #[must_use]
    pub fn with_hardware_id(mut self, hardware_id: Option<&str>) -> Self {
        self.hardware_id = hardware_id.map(str::to_owned);
        self
    }

    /// Attaches a detail message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
