//! License entities and the license state machine.
//!
//! A [`License`] moves through `pending -> active -> expired / revoked`.
//! Revoked is terminal and absorbing: no transition leaves it. Expiry is
//! lazy. Nothing sweeps the store in the background; a past `expires_at` is
//! materialized as `expired` by [`License::normalize`], the explicit
//! pre-write step every mutating method runs last.

use crate::ids::{LicenseId, LicenseTypeId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A class of license that issued keys reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseType {
    /// Unique id.
    pub id: LicenseTypeId,
    /// Display name, unique among types.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Concurrent instances one license of this type allows.
    pub max_instances: u32,
    /// Validity window applied at issuance and on each activation.
    pub duration_days: i64,
    /// Disabled types cannot issue new licenses.
    pub is_active: bool,
}

impl LicenseType {
    /// Creates an active type with the given name and duration, allowing a
    /// single instance.
    #[must_use]
    pub fn new(name: impl Into<String>, duration_days: i64) -> Self {
        Self {
            id: LicenseTypeId::new(),
            name: name.into(),
            description: String::new(),
            max_instances: 1,
            duration_days,
            is_active: true,
        }
    }

    /// The validity window as a [`Duration`].
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::days(self.duration_days)
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Lifecycle states of a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    /// Issued but not activated. Also the post-deactivation state.
    Pending,
    /// Activated and inside its validity window.
    Active,
    /// Validity window elapsed.
    Expired,
    /// Administratively revoked. Terminal.
    Revoked,
}

impl LicenseStatus {
    /// Stable string form, used in persistence and messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }

    /// Returns true once the license can never become active again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Revoked)
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Unrecognized status string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown license status: {0:?}")]
pub struct ParseStatusError(pub String);

/// Why a validation run failed.
///
/// Check order is fixed: expiry, then status, then hardware binding. The
/// first failure wins and later checks do not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckFailure {
    /// `expires_at` is set and in the past.
    Expired,
    /// Status is anything other than active.
    NotActive(LicenseStatus),
    /// Bound hardware id differs from the presented one.
    HardwareMismatch,
}

impl CheckFailure {
    /// The message recorded in the audit trail and surfaced to callers.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Expired => "License expired".to_string(),
            Self::NotActive(status) => format!("License not active, status: {status}"),
            Self::HardwareMismatch => "Hardware ID mismatch".to_string(),
        }
    }
}

/// One issued license key and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    /// Unique id.
    pub id: LicenseId,
    /// The opaque key string. Globally unique, immutable after creation.
    pub key: String,
    /// Owning-user reference, when issued to a known user.
    pub owner: Option<String>,
    /// The type this license was issued against.
    pub license_type_id: LicenseTypeId,
    /// Current lifecycle state.
    pub status: LicenseStatus,
    /// Set once at creation.
    pub created_at: DateTime<Utc>,
    /// Refreshed by every mutating method.
    pub updated_at: DateTime<Utc>,
    /// End of the validity window. Recomputed on each activation; defaulted
    /// from the creation time before the first one.
    pub expires_at: Option<DateTime<Utc>>,
    /// Last time a validation run touched this license.
    pub last_checked: Option<DateTime<Utc>>,
    /// Set on each successful activation.
    pub activation_date: Option<DateTime<Utc>>,
    /// Hardware binding. Bound once; a mismatching non-empty presented id
    /// fails validation without rebinding.
    pub hardware_id: Option<String>,
    /// Activation budget for this key.
    pub max_activations: u32,
    /// Free-text notes. Revocation reasons are appended here.
    pub notes: String,
}

impl License {
    /// Creates a pending license around a freshly generated key.
    ///
    /// The validity window is defaulted immediately, so a never-activated
    /// license still expires `duration_days` after creation.
    #[must_use]
    pub fn new(key: impl Into<String>, license_type: &LicenseType, now: DateTime<Utc>) -> Self {
        let mut license = Self {
            id: LicenseId::new(),
            key: key.into(),
            owner: None,
            license_type_id: license_type.id,
            status: LicenseStatus::Pending,
            created_at: now,
            updated_at: now,
            expires_at: None,
            last_checked: None,
            activation_date: None,
            hardware_id: None,
            max_activations: 1,
            notes: String::new(),
        };
        license.normalize(license_type.duration(), now);
        license
    }

    /// Attempts the transition to active.
    ///
    /// Allowed from every state except revoked, which makes re-activating an
    /// expired license a deliberate renewal path. Each success stamps a new
    /// activation date, recomputes the validity window from it, and binds
    /// the presented hardware id when one is given and none is bound yet.
    pub fn activate(
        &mut self,
        hardware_id: Option<&str>,
        license_type: &LicenseType,
        now: DateTime<Utc>,
    ) -> bool {
        if self.status == LicenseStatus::Revoked {
            return false;
        }
        self.status = LicenseStatus::Active;
        self.activation_date = Some(now);
        self.expires_at = Some(now + license_type.duration());
        if let Some(id) = hardware_id {
            if !id.is_empty() && self.hardware_id.as_deref().is_none_or(str::is_empty) {
                self.hardware_id = Some(id.to_string());
            }
        }
        self.touch(now);
        self.normalize(license_type.duration(), now);
        true
    }

    /// The active-to-pending transition. Fails from any other state.
    pub fn deactivate(&mut self, license_type: &LicenseType, now: DateTime<Utc>) -> bool {
        if self.status != LicenseStatus::Active {
            return false;
        }
        self.status = LicenseStatus::Pending;
        self.touch(now);
        self.normalize(license_type.duration(), now);
        true
    }

    /// The terminal transition. Always reports success, even when already
    /// revoked; re-applying leaves the state revoked.
    pub fn revoke(&mut self, license_type: &LicenseType, now: DateTime<Utc>) -> bool {
        self.status = LicenseStatus::Revoked;
        self.touch(now);
        self.normalize(license_type.duration(), now);
        true
    }

    /// Runs the validation checks, recording the check time.
    ///
    /// The caller persists the license afterwards whether or not the checks
    /// pass; the lazy expiry downgrade rides on that write. Checks run in
    /// order and the first failure wins:
    ///
    /// 1. a past `expires_at` downgrades the status to expired
    /// 2. any status other than active fails
    /// 3. a bound hardware id rejects a differing non-empty presented id
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn run_checks(
        &mut self,
        hardware_id: Option<&str>,
        license_type: &LicenseType,
        now: DateTime<Utc>,
    ) -> Result<(), CheckFailure> {
        self.last_checked = Some(now);
        self.touch(now);

        let result = if self.status != LicenseStatus::Revoked
            && self.expires_at.is_some_and(|at| at < now)
        {
            self.status = LicenseStatus::Expired;
            Err(CheckFailure::Expired)
        } else if self.status != LicenseStatus::Active {
            Err(CheckFailure::NotActive(self.status))
        } else if let (Some(bound), Some(presented)) = (self.hardware_id.as_deref(), hardware_id) {
            if !bound.is_empty() && !presented.is_empty() && bound != presented {
                Err(CheckFailure::HardwareMismatch)
            } else {
                Ok(())
            }
        } else {
            Ok(())
        };

        self.normalize(license_type.duration(), now);
        result
    }

    /// Appends a line to the notes, e.g. a revocation reason.
    pub fn append_note(&mut self, note: &str, license_type: &LicenseType, now: DateTime<Utc>) {
        if self.notes.is_empty() {
            self.notes = note.to_string();
        } else {
            self.notes = format!("{}\n{note}", self.notes);
        }
        self.touch(now);
        self.normalize(license_type.duration(), now);
    }

    /// Pre-write normalization, run last by every mutating method.
    ///
    /// Defaults `expires_at` to `activation_date + duration` (falling back
    /// to `created_at`) when unset, then materializes lazy expiry: a past
    /// `expires_at` on a non-revoked license downgrades the status to
    /// expired.
    pub fn normalize(&mut self, duration: Duration, now: DateTime<Utc>) {
        if self.expires_at.is_none() {
            let start = self.activation_date.unwrap_or(self.created_at);
            self.expires_at = Some(start + duration);
        }
        if self.status != LicenseStatus::Revoked && self.expires_at.is_some_and(|at| at < now) {
            self.status = LicenseStatus::Expired;
        }
    }

    /// First eight characters of the key, for display and logs.
    #[must_use]
    pub fn key_fragment(&self) -> &str {
        self.key.get(..8).unwrap_or(&self.key)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl fmt::Display for License {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}... ({})", self.key_fragment(), self.status)
    }
}
