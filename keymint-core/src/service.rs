//! Business-rule orchestration over the entities and the store.
//!
//! [`LicenseService`] owns the guard checks, the audit writes, and the
//! shaping of caller-facing results. Rejections that a caller is expected
//! to branch on (unknown key, already active, revoked) come back inside
//! [`Outcome`] and [`Validation`] values with display-ready messages;
//! `Err` is reserved for create-time input validation and store faults.

use crate::audit::{CheckStatus, LicenseCheck};
use crate::error::{Error, Result};
use crate::ids::LicenseTypeId;
use crate::key::KeyCodec;
use crate::license::{License, LicenseStatus, LicenseType};
use crate::store::{LicenseStore, SearchFilter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Inputs for issuing a new license.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLicense {
    /// Type to issue against.
    pub license_type: LicenseTypeId,
    /// Owning user, when known.
    pub owner: Option<String>,
    /// Optional key prefix, 1 to 5 characters from A-Z0-9.
    pub prefix: Option<String>,
    /// Activation budget, at least 1.
    pub max_activations: u32,
    /// Initial notes.
    pub notes: String,
}

impl CreateLicense {
    /// A plain request for the given type: no owner, no prefix, a single
    /// activation.
    #[must_use]
    pub fn new(license_type: LicenseTypeId) -> Self {
        Self {
            license_type,
            owner: None,
            prefix: None,
            max_activations: 1,
            notes: String::new(),
        }
    }
}

/// License projection carried inside successful outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseData {
    pub key: String,
    pub status: LicenseStatus,
    pub license_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub activation_date: Option<DateTime<Utc>>,
    pub hardware_id: Option<String>,
}

/// Result of a mutating operation.
///
/// `success` is the branch flag; `message` is display-ready either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
    /// Populated on success.
    pub license: Option<LicenseData>,
}

impl Outcome {
    fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            license: None,
        }
    }

    fn succeeded(message: impl Into<String>, license: LicenseData) -> Self {
        Self {
            success: true,
            message: message.into(),
            license: Some(license),
        }
    }
}

/// Result of a validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    /// "License is valid", or the specific failing check.
    pub message: String,
    /// Current status, when the key resolved to a license.
    pub status: Option<LicenseStatus>,
    /// Type name, populated when the checks pass.
    pub license_type: Option<String>,
    /// Validity window end, populated when the checks pass.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Validation {
    fn rejected(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
            status: None,
            license_type: None,
            expires_at: None,
        }
    }
}

/// Display-friendly projection of every license field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseInfo {
    pub key: String,
    pub owner: Option<String>,
    pub license_type: String,
    pub status: LicenseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_checked: Option<DateTime<Utc>>,
    pub activation_date: Option<DateTime<Utc>>,
    pub hardware_id: Option<String>,
    pub max_activations: u32,
    pub notes: String,
}

/// Orchestrates license operations over a [`LicenseStore`].
#[derive(Debug)]
pub struct LicenseService<S> {
    store: S,
    codec: KeyCodec,
}

impl<S: LicenseStore> LicenseService<S> {
    /// Creates a service over the given store and key codec.
    pub fn new(store: S, codec: KeyCodec) -> Self {
        Self { store, codec }
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Issues a new license in pending status.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownLicenseType`] when the type id does not resolve,
    /// [`Error::InactiveLicenseType`] when the type is disabled,
    /// [`Error::InvalidPrefix`] and [`Error::InvalidMaxActivations`] on bad
    /// inputs, plus store faults.
    pub fn create(&self, request: CreateLicense) -> Result<License> {
        let license_type = self
            .store
            .license_type(request.license_type)?
            .ok_or(Error::UnknownLicenseType(request.license_type))?;
        if !license_type.is_active {
            return Err(Error::InactiveLicenseType(license_type.name.clone()));
        }
        if let Some(prefix) = request.prefix.as_deref() {
            if !KeyCodec::validate_prefix(prefix) {
                return Err(Error::InvalidPrefix(prefix.to_string()));
            }
        }
        if request.max_activations == 0 {
            return Err(Error::InvalidMaxActivations);
        }

        let key = self.codec.generate(
            request.prefix.as_deref(),
            request.owner.as_deref(),
            Some(license_type.id),
        );
        let mut license = License::new(key, &license_type, Utc::now());
        license.owner = request.owner;
        license.max_activations = request.max_activations;
        license.notes = request.notes;

        self.store.insert_license(&license)?;
        info!(
            key = license.key_fragment(),
            license_type = %license_type.name,
            "issued license"
        );
        Ok(license)
    }

    /// Runs the validation checks for a key.
    ///
    /// Malformed keys are rejected before any storage lookup. A resolved
    /// license is written back together with its audit entry whether or not
    /// the checks pass, which is what stamps `last_checked` and materializes
    /// lazy expiry.
    ///
    /// # Errors
    ///
    /// Store faults only; failed checks come back with `valid == false`.
    pub fn validate(&self, key: &str, hardware_id: Option<&str>) -> Result<Validation> {
        if !KeyCodec::validate_format(key) {
            return Ok(Validation::rejected("Invalid license key format"));
        }
        let Some(mut license) = self.store.license_by_key(key)? else {
            return Ok(Validation::rejected("License key does not exist"));
        };
        let license_type = self.license_type_of(&license)?;

        let now = Utc::now();
        let (check, validation) = match license.run_checks(hardware_id, &license_type, now) {
            Ok(()) => {
                debug!(key = license.key_fragment(), "license check passed");
                (
                    LicenseCheck::new(license.id, CheckStatus::CheckSuccess, now)
                        .with_hardware_id(hardware_id),
                    Validation {
                        valid: true,
                        message: "License is valid".to_string(),
                        status: Some(license.status),
                        license_type: Some(license_type.name.clone()),
                        expires_at: license.expires_at,
                    },
                )
            }
            Err(failure) => {
                let message = failure.message();
                warn!(key = license.key_fragment(), %message, "license check failed");
                (
                    LicenseCheck::new(license.id, CheckStatus::CheckFailed, now)
                        .with_hardware_id(hardware_id)
                        .with_message(message.as_str()),
                    Validation {
                        valid: false,
                        message,
                        status: Some(license.status),
                        license_type: None,
                        expires_at: None,
                    },
                )
            }
        };
        self.store.commit_transition(&license, &check)?;
        Ok(validation)
    }

    /// Activates a license key.
    ///
    /// Guards run against the stored status: unknown keys, already-active,
    /// revoked, and expired licenses are rejected without touching the row.
    ///
    /// # Errors
    ///
    /// Store faults only; guard rejections come back with
    /// `success == false`.
    pub fn activate(&self, key: &str, hardware_id: Option<&str>) -> Result<Outcome> {
        let Some(mut license) = self.store.license_by_key(key)? else {
            return Ok(Outcome::rejected("License key does not exist"));
        };
        match license.status {
            LicenseStatus::Active => {
                return Ok(Outcome::rejected("License is already active"));
            }
            LicenseStatus::Revoked => {
                return Ok(Outcome::rejected(
                    "License has been revoked and cannot be activated",
                ));
            }
            LicenseStatus::Expired => {
                return Ok(Outcome::rejected(
                    "License has expired and cannot be activated",
                ));
            }
            LicenseStatus::Pending => {}
        }
        let license_type = self.license_type_of(&license)?;
        let now = Utc::now();
        if !license.activate(hardware_id, &license_type, now) {
            return Ok(Outcome::rejected(
                "License has been revoked and cannot be activated",
            ));
        }
        let check = LicenseCheck::new(license.id, CheckStatus::Activated, now)
            .with_hardware_id(hardware_id);
        self.store.commit_transition(&license, &check)?;
        info!(key = license.key_fragment(), "license activated");
        Ok(Outcome::succeeded(
            "License activated successfully",
            license_data(&license, &license_type),
        ))
    }

    /// Moves an active license back to pending.
    ///
    /// # Errors
    ///
    /// Store faults only.
    pub fn deactivate(&self, key: &str) -> Result<Outcome> {
        let Some(mut license) = self.store.license_by_key(key)? else {
            return Ok(Outcome::rejected("License key does not exist"));
        };
        if license.status != LicenseStatus::Active {
            return Ok(Outcome::rejected(format!(
                "License is not active (current status: {})",
                license.status
            )));
        }
        let license_type = self.license_type_of(&license)?;
        let now = Utc::now();
        if !license.deactivate(&license_type, now) {
            return Ok(Outcome::rejected(format!(
                "License is not active (current status: {})",
                license.status
            )));
        }
        let check = LicenseCheck::new(license.id, CheckStatus::Deactivated, now);
        self.store.commit_transition(&license, &check)?;
        debug!(key = license.key_fragment(), "license deactivated");
        Ok(Outcome::succeeded(
            "License deactivated successfully",
            license_data(&license, &license_type),
        ))
    }

    /// Revokes a license key, optionally recording a reason in the notes.
    ///
    /// Re-revoking is rejected here even though the entity transition
    /// re-applies cleanly; the stored state cannot leave revoked either way.
    ///
    /// # Errors
    ///
    /// Store faults only.
    pub fn revoke(&self, key: &str, reason: Option<&str>) -> Result<Outcome> {
        let Some(mut license) = self.store.license_by_key(key)? else {
            return Ok(Outcome::rejected("License key does not exist"));
        };
        if license.status == LicenseStatus::Revoked {
            return Ok(Outcome::rejected("License is already revoked"));
        }
        let license_type = self.license_type_of(&license)?;
        let now = Utc::now();
        license.revoke(&license_type, now);
        let check = LicenseCheck::new(license.id, CheckStatus::Revoked, now);
        self.store.commit_transition(&license, &check)?;
        if let Some(reason) = reason {
            license.append_note(&format!("Revoked: {reason}"), &license_type, now);
            self.store.update_license(&license)?;
        }
        info!(key = license.key_fragment(), "license revoked");
        Ok(Outcome::succeeded(
            "License revoked successfully",
            license_data(&license, &license_type),
        ))
    }

    /// Display-friendly projection of a license and its type name.
    ///
    /// Read-only: a stale status is reported as stored, since lazy expiry
    /// runs only on writes.
    ///
    /// # Errors
    ///
    /// Store faults only; an unknown key is `Ok(None)`.
    pub fn info(&self, key: &str) -> Result<Option<LicenseInfo>> {
        let Some(license) = self.store.license_by_key(key)? else {
            return Ok(None);
        };
        let license_type = self.license_type_of(&license)?;
        Ok(Some(LicenseInfo {
            key: license.key,
            owner: license.owner,
            license_type: license_type.name,
            status: license.status,
            created_at: license.created_at,
            updated_at: license.updated_at,
            expires_at: license.expires_at,
            last_checked: license.last_checked,
            activation_date: license.activation_date,
            hardware_id: license.hardware_id,
            max_activations: license.max_activations,
            notes: license.notes,
        }))
    }

    /// Licenses matching the filter. Read-only.
    ///
    /// # Errors
    ///
    /// Store faults only.
    pub fn search(&self, filter: &SearchFilter) -> Result<Vec<License>> {
        let hits = self.store.search(filter)?;
        debug!(count = hits.len(), "license search");
        Ok(hits)
    }

    /// A license's audit trail, newest first, capped at `limit` entries.
    ///
    /// # Errors
    ///
    /// Store faults only; an unknown key is `Ok(None)`.
    pub fn checks(&self, key: &str, limit: usize) -> Result<Option<Vec<LicenseCheck>>> {
        let Some(license) = self.store.license_by_key(key)? else {
            return Ok(None);
        };
        Ok(Some(self.store.checks_for(license.id, limit)?))
    }

    fn license_type_of(&self, license: &License) -> Result<LicenseType> {
        self.store
            .license_type(license.license_type_id)?
            .ok_or(Error::UnknownLicenseType(license.license_type_id))
    }
}

fn license_data(license: &License, license_type: &LicenseType) -> LicenseData {
    LicenseData {
        key: license.key.clone(),
        status: license.status,
        license_type: license_type.name.clone(),
        expires_at: license.expires_at,
        activation_date: license.activation_date,
        hardware_id: license.hardware_id.clone(),
    }
}
