//! Error types for the keymint core.

use crate::ids::LicenseTypeId;
use crate::store::StoreError;
use thiserror::Error;

/// Result type for keymint operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`crate::service::LicenseService`].
///
/// Business-rule rejections (unknown keys, guard failures, failed checks)
/// are not errors; they ride inside `Outcome` and `Validation` values and
/// callers branch on the flag. `Error` covers create-time input validation
/// and faults from the storage collaborator.
#[derive(Debug, Error)]
pub enum Error {
    /// The referenced license type does not exist.
    #[error("unknown license type: {0}")]
    UnknownLicenseType(LicenseTypeId),

    /// The license type exists but is administratively disabled.
    #[error("license type {0:?} is not active")]
    InactiveLicenseType(String),

    /// Key prefixes are 1 to 5 characters from A-Z0-9.
    #[error("invalid license key prefix: {0:?}")]
    InvalidPrefix(String),

    /// Activation budgets start at one.
    #[error("max_activations must be at least 1")]
    InvalidMaxActivations,

    /// Fault from the storage backend.
    #[error(transparent)]
    Store(#[from] StoreError),
}
