//! Persistence abstraction for licenses, types, and audit entries.
//!
//! The core never talks to a database directly; it drives a [`LicenseStore`]
//! implementation. [`crate::MemoryStore`] ships in this crate as the
//! reference implementation; a SQLite-backed one lives in `keymint-store`.

use crate::audit::LicenseCheck;
use crate::ids::{LicenseId, LicenseTypeId};
use crate::license::{License, LicenseStatus, LicenseType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Faults from a persistence backend.
///
/// Missing rows are not faults: lookups return `Option` and mutations
/// report `bool`, so absence stays a normal outcome.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend-specific failure: connectivity, I/O, constraint violations
    /// other than key uniqueness.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Unique-key violation on license insert.
    #[error("duplicate license key: {0}")]
    DuplicateKey(String),

    /// A stored row could not be decoded into its entity.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}

/// Predicate set for [`LicenseStore::search`].
///
/// Populated fields are conjunctive, except `query`, which matches when any
/// of key, notes, or owner contains it case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Disjunctive substring match over key, notes, and owner.
    pub query: Option<String>,
    /// Exact status match.
    pub status: Option<LicenseStatus>,
    /// Exact license-type name match.
    pub license_type: Option<String>,
    /// Shorthand for `status == active`.
    pub active_only: bool,
    /// Active licenses whose validity window ends within this many days of
    /// the query time.
    pub expiring_within_days: Option<i64>,
    /// Result ordering.
    pub order: LicenseOrder,
}

/// Orderings for search results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseOrder {
    /// Newest created first.
    #[default]
    CreatedDesc,
    /// Oldest created first.
    CreatedAsc,
    /// Soonest-expiring first.
    ExpiresAsc,
    /// Latest-expiring first.
    ExpiresDesc,
}

/// Storage collaborator for the license system.
///
/// Implementations must make each call atomic with respect to concurrent
/// calls on the same store; the service's guard-then-mutate sequences rely
/// on that.
pub trait LicenseStore: Send + Sync {
    /// Inserts a new license type.
    fn insert_license_type(&self, record: &LicenseType) -> StoreResult<()>;

    /// Looks up a license type by id.
    fn license_type(&self, id: LicenseTypeId) -> StoreResult<Option<LicenseType>>;

    /// Applies administrative edits to a license type. Returns false when
    /// the id is unknown.
    fn update_license_type(&self, record: &LicenseType) -> StoreResult<bool>;

    /// Inserts a freshly issued license.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::DuplicateKey`] when the key is taken.
    fn insert_license(&self, record: &License) -> StoreResult<()>;

    /// Looks up a license by its unique key.
    fn license_by_key(&self, key: &str) -> StoreResult<Option<License>>;

    /// Writes back a mutated license. Returns false when the id is unknown.
    fn update_license(&self, record: &License) -> StoreResult<bool>;

    /// Writes back a mutated license and appends its audit entry in one
    /// atomic step. Neither write lands if either fails.
    fn commit_transition(&self, record: &License, check: &LicenseCheck) -> StoreResult<()>;

    /// Appends a bare audit entry.
    fn append_check(&self, check: &LicenseCheck) -> StoreResult<()>;

    /// A license's audit trail, newest first, capped at `limit` entries.
    fn checks_for(&self, license_id: LicenseId, limit: usize) -> StoreResult<Vec<LicenseCheck>>;

    /// Licenses matching the filter, ordered per the filter.
    fn search(&self, filter: &SearchFilter) -> StoreResult<Vec<License>>;

    /// Administrative delete. The license's audit trail goes with it.
    /// Returns false when the id is unknown.
    fn delete_license(&self, id: LicenseId) -> StoreResult<bool>;
}
