//! In-memory reference store.
//!
//! Everything lives in `Mutex`-guarded collections, so a store shared
//! across threads serializes its calls the way the trait requires. Handy
//! for tests and short-lived embedding; durable deployments use the
//! SQLite-backed store from `keymint-store`.

use crate::audit::LicenseCheck;
use crate::ids::{LicenseId, LicenseTypeId};
use crate::license::{License, LicenseStatus, LicenseType};
use crate::store::{LicenseOrder, LicenseStore, SearchFilter, StoreError, StoreResult};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Reference [`LicenseStore`] backed by in-process collections.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    types: HashMap<LicenseTypeId, LicenseType>,
    /// Insertion order preserved; search re-sorts per filter.
    licenses: Vec<License>,
    /// Append order preserved.
    checks: Vec<LicenseCheck>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))
    }
}

impl LicenseStore for MemoryStore {
    fn insert_license_type(&self, record: &LicenseType) -> StoreResult<()> {
        let mut inner = self.lock()?;
        if inner.types.contains_key(&record.id) {
            return Err(StoreError::Backend(format!(
                "duplicate license type id: {}",
                record.id
            )));
        }
        inner.types.insert(record.id, record.clone());
        Ok(())
    }

    fn license_type(&self, id: LicenseTypeId) -> StoreResult<Option<LicenseType>> {
        Ok(self.lock()?.types.get(&id).cloned())
    }

    fn update_license_type(&self, record: &LicenseType) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        match inner.types.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn insert_license(&self, record: &License) -> StoreResult<()> {
        let mut inner = self.lock()?;
        if inner.licenses.iter().any(|l| l.key == record.key) {
            return Err(StoreError::DuplicateKey(record.key.clone()));
        }
        inner.licenses.push(record.clone());
        Ok(())
    }

    fn license_by_key(&self, key: &str) -> StoreResult<Option<License>> {
        Ok(self.lock()?.licenses.iter().find(|l| l.key == key).cloned())
    }

    fn update_license(&self, record: &License) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        match inner.licenses.iter_mut().find(|l| l.id == record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn commit_transition(&self, record: &License, check: &LicenseCheck) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let Some(existing) = inner.licenses.iter_mut().find(|l| l.id == record.id) else {
            return Err(StoreError::Backend(format!(
                "unknown license id: {}",
                record.id
            )));
        };
        *existing = record.clone();
        inner.checks.push(check.clone());
        Ok(())
    }

    fn append_check(&self, check: &LicenseCheck) -> StoreResult<()> {
        let mut inner = self.lock()?;
        if !inner.licenses.iter().any(|l| l.id == check.license_id) {
            return Err(StoreError::Backend(format!(
                "unknown license id: {}",
                check.license_id
            )));
        }
        inner.checks.push(check.clone());
        Ok(())
    }

    fn checks_for(&self, license_id: LicenseId, limit: usize) -> StoreResult<Vec<LicenseCheck>> {
        let inner = self.lock()?;
        let mut hits: Vec<LicenseCheck> = inner
            .checks
            .iter()
            .filter(|c| c.license_id == license_id)
            .cloned()
            .collect();
        // latest-appended first on equal timestamps
        hits.reverse();
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        hits.truncate(limit);
        Ok(hits)
    }

    fn search(&self, filter: &SearchFilter) -> StoreResult<Vec<License>> {
        let inner = self.lock()?;
        let now = Utc::now();
        let mut hits: Vec<License> = inner
            .licenses
            .iter()
            .filter(|l| filter_matches(l, &inner.types, filter, now))
            .cloned()
            .collect();
        sort_licenses(&mut hits, filter.order);
        Ok(hits)
    }

    fn delete_license(&self, id: LicenseId) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        let before = inner.licenses.len();
        inner.licenses.retain(|l| l.id != id);
        if inner.licenses.len() == before {
            return Ok(false);
        }
        inner.checks.retain(|c| c.license_id != id);
        Ok(true)
    }
}

fn filter_matches(
    license: &License,
    types: &HashMap<LicenseTypeId, LicenseType>,
    filter: &SearchFilter,
    now: DateTime<Utc>,
) -> bool {
    if let Some(query) = filter.query.as_deref() {
        let query = query.to_lowercase();
        let hit = license.key.to_lowercase().contains(&query)
            || license.notes.to_lowercase().contains(&query)
            || license
                .owner
                .as_deref()
                .is_some_and(|o| o.to_lowercase().contains(&query));
        if !hit {
            return false;
        }
    }
    if let Some(status) = filter.status {
        if license.status != status {
            return false;
        }
    }
    if let Some(name) = filter.license_type.as_deref() {
        let matched = types
            .get(&license.license_type_id)
            .is_some_and(|t| t.name == name);
        if !matched {
            return false;
        }
    }
    if filter.active_only && license.status != LicenseStatus::Active {
        return false;
    }
    if let Some(days) = filter.expiring_within_days {
        let cutoff = now + Duration::days(days);
        let expiring = license.status == LicenseStatus::Active
            && license.expires_at.is_some_and(|at| at <= cutoff);
        if !expiring {
            return false;
        }
    }
    true
}

fn sort_licenses(items: &mut [License], order: LicenseOrder) {
    match order {
        LicenseOrder::CreatedDesc => items.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        LicenseOrder::CreatedAsc => items.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        LicenseOrder::ExpiresAsc => items.sort_by(|a, b| a.expires_at.cmp(&b.expires_at)),
        LicenseOrder::ExpiresDesc => items.sort_by(|a, b| b.expires_at.cmp(&a.expires_at)),
    }
}
