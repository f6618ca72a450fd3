mod common;

use chrono::{Duration, Utc};
use common::{pending_license, pro_type};
use keymint_core::{
    CheckStatus, LicenseCheck, LicenseId, LicenseStore, LicenseType, MemoryStore, SearchFilter,
    StoreError,
};

fn store_with(plan: &LicenseType) -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_license_type(plan).unwrap();
    store
}

// ── License types ───────────────────────────────────────────────────────

#[test]
fn license_type_round_trip_and_update() {
    let mut plan = pro_type();
    let store = store_with(&plan);
    assert_eq!(store.license_type(plan.id).unwrap().unwrap(), plan);

    plan.is_active = false;
    plan.duration_days = 60;
    assert!(store.update_license_type(&plan).unwrap());
    let loaded = store.license_type(plan.id).unwrap().unwrap();
    assert!(!loaded.is_active);
    assert_eq!(loaded.duration_days, 60);

    assert!(!store.update_license_type(&LicenseType::new("Ghost", 7)).unwrap());
    assert!(store.license_type(LicenseType::new("X", 1).id).unwrap().is_none());
}

#[test]
fn duplicate_type_id_is_rejected() {
    let plan = pro_type();
    let store = store_with(&plan);
    assert!(matches!(
        store.insert_license_type(&plan).unwrap_err(),
        StoreError::Backend(_)
    ));
}

// ── Licenses ────────────────────────────────────────────────────────────

#[test]
fn duplicate_key_is_distinguishable() {
    let plan = pro_type();
    let store = store_with(&plan);
    let license = pending_license(&plan, Utc::now());
    store.insert_license(&license).unwrap();

    let mut clone = pending_license(&plan, Utc::now());
    clone.key.clone_from(&license.key);
    match store.insert_license(&clone).unwrap_err() {
        StoreError::DuplicateKey(key) => assert_eq!(key, license.key),
        other => panic!("expected DuplicateKey, got {other}"),
    }
}

#[test]
fn update_license_writes_back_mutable_fields() {
    let plan = pro_type();
    let store = store_with(&plan);
    let mut license = pending_license(&plan, Utc::now());
    store.insert_license(&license).unwrap();

    license.activate(Some("abc123"), &plan, Utc::now());
    license.notes = "activated by support".to_string();
    assert!(store.update_license(&license).unwrap());

    let loaded = store.license_by_key(&license.key).unwrap().unwrap();
    assert_eq!(loaded, license);

    let stranger = pending_license(&plan, Utc::now());
    assert!(!store.update_license(&stranger).unwrap());
}

#[test]
fn commit_transition_updates_and_appends_atomically() {
    let plan = pro_type();
    let store = store_with(&plan);
    let mut license = pending_license(&plan, Utc::now());
    store.insert_license(&license).unwrap();

    let now = Utc::now();
    license.activate(None, &plan, now);
    let check = LicenseCheck::new(license.id, CheckStatus::Activated, now);
    store.commit_transition(&license, &check).unwrap();

    assert_eq!(store.license_by_key(&license.key).unwrap().unwrap(), license);
    assert_eq!(store.checks_for(license.id, 10).unwrap().len(), 1);

    // unknown license: nothing lands
    let ghost = pending_license(&plan, Utc::now());
    let orphan = LicenseCheck::new(ghost.id, CheckStatus::Activated, now);
    assert!(store.commit_transition(&ghost, &orphan).is_err());
    assert_eq!(store.checks_for(license.id, 10).unwrap().len(), 1);
    assert!(store.checks_for(ghost.id, 10).unwrap().is_empty());
}

#[test]
fn append_check_requires_the_license() {
    let plan = pro_type();
    let store = store_with(&plan);
    let orphan = LicenseCheck::new(LicenseId::new(), CheckStatus::Revoked, Utc::now());
    assert!(store.append_check(&orphan).is_err());
}

#[test]
fn checks_for_orders_newest_first_and_caps() {
    let plan = pro_type();
    let store = store_with(&plan);
    let license = pending_license(&plan, Utc::now());
    store.insert_license(&license).unwrap();

    let base = Utc::now();
    for (offset, status) in [
        (0, CheckStatus::Activated),
        (1, CheckStatus::CheckSuccess),
        (2, CheckStatus::CheckFailed),
    ] {
        let entry = LicenseCheck::new(license.id, status, base + Duration::seconds(offset));
        store.append_check(&entry).unwrap();
    }

    let all = store.checks_for(license.id, 10).unwrap();
    let statuses: Vec<CheckStatus> = all.iter().map(|c| c.status).collect();
    assert_eq!(
        statuses,
        vec![
            CheckStatus::CheckFailed,
            CheckStatus::CheckSuccess,
            CheckStatus::Activated,
        ]
    );

    let capped = store.checks_for(license.id, 2).unwrap();
    assert_eq!(capped.len(), 2);
    assert_eq!(capped[0].status, CheckStatus::CheckFailed);
}

#[test]
fn delete_license_takes_the_audit_trail_along() {
    let plan = pro_type();
    let store = store_with(&plan);
    let license = pending_license(&plan, Utc::now());
    store.insert_license(&license).unwrap();
    store
        .append_check(&LicenseCheck::new(
            license.id,
            CheckStatus::Activated,
            Utc::now(),
        ))
        .unwrap();

    assert!(store.delete_license(license.id).unwrap());
    assert!(store.license_by_key(&license.key).unwrap().is_none());
    assert!(store.checks_for(license.id, 10).unwrap().is_empty());
    assert!(!store.delete_license(license.id).unwrap());
}

// ── Search ──────────────────────────────────────────────────────────────

#[test]
fn search_without_filters_returns_everything() {
    let plan = pro_type();
    let store = store_with(&plan);
    for key in ["AAAAA-BBBBB-CCCCC-DDDDD", "EEEEE-FFFFF-GGGGG-HHHHH"] {
        let mut license = pending_license(&plan, Utc::now());
        license.key = key.to_string();
        store.insert_license(&license).unwrap();
    }
    assert_eq!(store.search(&SearchFilter::default()).unwrap().len(), 2);
}

#[test]
fn search_matches_owner_case_insensitively() {
    let plan = pro_type();
    let store = store_with(&plan);
    let mut license = pending_license(&plan, Utc::now());
    license.owner = Some("Carol@Example.COM".to_string());
    store.insert_license(&license).unwrap();

    let filter = SearchFilter {
        query: Some("carol@example".to_string()),
        ..SearchFilter::default()
    };
    assert_eq!(store.search(&filter).unwrap().len(), 1);
}
