mod common;

use chrono::{Duration, Utc};
use common::record;
use latchkey_license::{lifecycle, LicenseStatus, LicenseType};
use latchkey_store::{LicenseFilter, LicenseStore, StoreError};
use pretty_assertions::assert_eq;

// ── Insert / find ────────────────────────────────────────────────

#[test]
fn insert_and_find_roundtrip() {
    let store = LicenseStore::open_in_memory().unwrap();
    let original = record("AAAA-0000-BBBB-1111", "a@example.com", LicenseType::Pro);
    store.insert(&original).unwrap();

    let loaded = store.find_by_key("AAAA-0000-BBBB-1111").unwrap().unwrap();
    assert_eq!(loaded, original);
}

#[test]
fn find_by_email_and_key_requires_both() {
    let store = LicenseStore::open_in_memory().unwrap();
    store
        .insert(&record("AAAA-0000-BBBB-1111", "a@example.com", LicenseType::Basic))
        .unwrap();

    assert!(store
        .find_by_email_and_key("a@example.com", "AAAA-0000-BBBB-1111")
        .unwrap()
        .is_some());
    assert!(store
        .find_by_email_and_key("b@example.com", "AAAA-0000-BBBB-1111")
        .unwrap()
        .is_none());
    assert!(store
        .find_by_email_and_key("a@example.com", "XXXX-XXXX-XXXX-XXXX")
        .unwrap()
        .is_none());
}

#[test]
fn find_missing_returns_none() {
    let store = LicenseStore::open_in_memory().unwrap();
    assert!(store.find_by_key("ZZZZ-ZZZZ-ZZZZ-ZZZZ").unwrap().is_none());
}

#[test]
fn roundtrip_preserves_revocation_fields() {
    let store = LicenseStore::open_in_memory().unwrap();
    let mut original = record("AAAA-0000-BBBB-1111", "a@example.com", LicenseType::Basic);
    lifecycle::revoke(&mut original, "fraud", Utc::now());
    store.insert(&original).unwrap();

    let loaded = store.find_by_key(&original.key).unwrap().unwrap();
    assert!(loaded.revoked.status);
    assert_eq!(loaded.revoked.reason.as_deref(), Some("fraud"));
    assert_eq!(loaded.revoked.date, original.revoked.date);
}

// ── Uniqueness constraints ───────────────────────────────────────

#[test]
fn duplicate_key_is_collision() {
    let store = LicenseStore::open_in_memory().unwrap();
    store
        .insert(&record("AAAA-0000-BBBB-1111", "a@example.com", LicenseType::Basic))
        .unwrap();

    let result = store.insert(&record("AAAA-0000-BBBB-1111", "b@example.com", LicenseType::Basic));
    assert!(matches!(result, Err(StoreError::KeyCollision)));
}

#[test]
fn second_live_license_per_email_rejected() {
    let store = LicenseStore::open_in_memory().unwrap();
    store
        .insert(&record("AAAA-0000-BBBB-1111", "a@example.com", LicenseType::Basic))
        .unwrap();

    let result = store.insert(&record("CCCC-2222-DDDD-3333", "a@example.com", LicenseType::Pro));
    assert!(matches!(result, Err(StoreError::DuplicateActiveLicense)));
}

#[test]
fn trial_counts_as_live_for_uniqueness() {
    let store = LicenseStore::open_in_memory().unwrap();
    store
        .insert(&record("AAAA-0000-BBBB-1111", "a@example.com", LicenseType::Trial))
        .unwrap();

    let result = store.insert(&record("CCCC-2222-DDDD-3333", "a@example.com", LicenseType::Basic));
    assert!(matches!(result, Err(StoreError::DuplicateActiveLicense)));
}

#[test]
fn new_license_allowed_after_terminal_state() {
    let store = LicenseStore::open_in_memory().unwrap();

    let mut revoked = record("AAAA-0000-BBBB-1111", "a@example.com", LicenseType::Basic);
    lifecycle::revoke(&mut revoked, "fraud", Utc::now());
    store.insert(&revoked).unwrap();

    let mut expired = record("CCCC-2222-DDDD-3333", "b@example.com", LicenseType::Basic);
    expired.status = LicenseStatus::Expired;
    store.insert(&expired).unwrap();

    // both emails may now get a fresh live license
    store
        .insert(&record("EEEE-4444-FFFF-5555", "a@example.com", LicenseType::Pro))
        .unwrap();
    store
        .insert(&record("0000-1111-2222-3333", "b@example.com", LicenseType::Pro))
        .unwrap();
}

#[test]
fn reactivation_into_occupied_email_rejected() {
    let store = LicenseStore::open_in_memory().unwrap();

    let mut old = record("AAAA-0000-BBBB-1111", "a@example.com", LicenseType::Basic);
    lifecycle::revoke(&mut old, "lost card", Utc::now());
    store.insert(&old).unwrap();
    store
        .insert(&record("CCCC-2222-DDDD-3333", "a@example.com", LicenseType::Pro))
        .unwrap();

    // flipping the old record back to live would give the email two
    let mut reloaded = store.find_by_key("AAAA-0000-BBBB-1111").unwrap().unwrap();
    lifecycle::reactivate(&mut reloaded).unwrap();
    let result = store.update(&reloaded);
    assert!(matches!(result, Err(StoreError::DuplicateActiveLicense)));
}

// ── find_live_by_email ───────────────────────────────────────────

#[test]
fn live_lookup_ignores_terminal_records() {
    let store = LicenseStore::open_in_memory().unwrap();

    let mut revoked = record("AAAA-0000-BBBB-1111", "a@example.com", LicenseType::Basic);
    lifecycle::revoke(&mut revoked, "fraud", Utc::now());
    store.insert(&revoked).unwrap();

    assert!(store.find_live_by_email("a@example.com").unwrap().is_none());

    store
        .insert(&record("CCCC-2222-DDDD-3333", "a@example.com", LicenseType::Pro))
        .unwrap();
    let live = store.find_live_by_email("a@example.com").unwrap().unwrap();
    assert_eq!(live.key, "CCCC-2222-DDDD-3333");
}

// ── Optimistic concurrency ───────────────────────────────────────

#[test]
fn update_bumps_stored_version() {
    let store = LicenseStore::open_in_memory().unwrap();
    let mut rec = record("AAAA-0000-BBBB-1111", "a@example.com", LicenseType::Basic);
    store.insert(&rec).unwrap();

    rec.check_count = 7;
    store.update(&rec).unwrap();

    let reloaded = store.find_by_key(&rec.key).unwrap().unwrap();
    assert_eq!(reloaded.check_count, 7);
    assert_eq!(reloaded.version, rec.version + 1);
}

#[test]
fn stale_version_conflicts() {
    let store = LicenseStore::open_in_memory().unwrap();
    let rec = record("AAAA-0000-BBBB-1111", "a@example.com", LicenseType::Basic);
    store.insert(&rec).unwrap();

    let mut copy_a = store.find_by_key(&rec.key).unwrap().unwrap();
    let mut copy_b = store.find_by_key(&rec.key).unwrap().unwrap();

    copy_a.check_count = 1;
    store.update(&copy_a).unwrap();

    copy_b.check_count = 1;
    let result = store.update(&copy_b);
    assert!(matches!(result, Err(StoreError::VersionConflict(_))));
}

#[test]
fn update_missing_is_not_found() {
    let store = LicenseStore::open_in_memory().unwrap();
    let rec = record("AAAA-0000-BBBB-1111", "a@example.com", LicenseType::Basic);
    let result = store.update(&rec);
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

// Two writers doing load-modify-write concurrently: with a reload-on-conflict
// loop, no increment may be lost.
#[test]
fn concurrent_increments_are_not_lost() {
    let store = LicenseStore::open_in_memory().unwrap();
    let rec = record("AAAA-0000-BBBB-1111", "a@example.com", LicenseType::Basic);
    store.insert(&rec).unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        let key = rec.key.clone();
        handles.push(std::thread::spawn(move || loop {
            let mut loaded = store.find_by_key(&key).unwrap().unwrap();
            loaded.check_count += 1;
            match store.update(&loaded) {
                Ok(()) => break,
                Err(StoreError::VersionConflict(_)) => continue,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let final_record = store.find_by_key(&rec.key).unwrap().unwrap();
    assert_eq!(final_record.check_count, 4);
}

// ── Listing ──────────────────────────────────────────────────────

fn seed_mixed(store: &LicenseStore) {
    store
        .insert(&record("AAAA-0000-BBBB-0001", "u1@example.com", LicenseType::Basic))
        .unwrap();
    store
        .insert(&record("AAAA-0000-BBBB-0002", "u2@example.com", LicenseType::Pro))
        .unwrap();
    store
        .insert(&record("AAAA-0000-BBBB-0003", "u3@example.com", LicenseType::Trial))
        .unwrap();
    let mut revoked = record("AAAA-0000-BBBB-0004", "u4@example.com", LicenseType::Pro);
    lifecycle::revoke(&mut revoked, "fraud", Utc::now());
    store.insert(&revoked).unwrap();
}

#[test]
fn list_unfiltered_counts_everything() {
    let store = LicenseStore::open_in_memory().unwrap();
    seed_mixed(&store);

    let page = store.list(LicenseFilter::default(), 1, 20).unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.licenses.len(), 4);
    assert_eq!(page.pages, 1);
}

#[test]
fn list_filters_by_status_and_type() {
    let store = LicenseStore::open_in_memory().unwrap();
    seed_mixed(&store);

    let revoked = store
        .list(
            LicenseFilter {
                status: Some(LicenseStatus::Revoked),
                license_type: None,
            },
            1,
            20,
        )
        .unwrap();
    assert_eq!(revoked.total, 1);
    assert_eq!(revoked.licenses[0].key, "AAAA-0000-BBBB-0004");

    let pro = store
        .list(
            LicenseFilter {
                status: None,
                license_type: Some(LicenseType::Pro),
            },
            1,
            20,
        )
        .unwrap();
    assert_eq!(pro.total, 2);

    let active_pro = store
        .list(
            LicenseFilter {
                status: Some(LicenseStatus::Active),
                license_type: Some(LicenseType::Pro),
            },
            1,
            20,
        )
        .unwrap();
    assert_eq!(active_pro.total, 1);
    assert_eq!(active_pro.licenses[0].key, "AAAA-0000-BBBB-0002");
}

#[test]
fn list_paginates() {
    let store = LicenseStore::open_in_memory().unwrap();
    seed_mixed(&store);

    let first = store.list(LicenseFilter::default(), 1, 3).unwrap();
    assert_eq!(first.licenses.len(), 3);
    assert_eq!(first.total, 4);
    assert_eq!(first.pages, 2);

    let second = store.list(LicenseFilter::default(), 2, 3).unwrap();
    assert_eq!(second.licenses.len(), 1);

    let all: Vec<_> = first
        .licenses
        .iter()
        .chain(second.licenses.iter())
        .map(|l| l.key.clone())
        .collect();
    let unique: std::collections::HashSet<_> = all.iter().collect();
    assert_eq!(unique.len(), 4);
}

#[test]
fn list_live_orders_by_expiry() {
    let store = LicenseStore::open_in_memory().unwrap();
    let mut soon = record("AAAA-0000-BBBB-0001", "u1@example.com", LicenseType::Basic);
    soon.expires_at = Utc::now() + Duration::days(2);
    store.insert(&soon).unwrap();
    let later = record("AAAA-0000-BBBB-0002", "u2@example.com", LicenseType::Pro);
    store.insert(&later).unwrap();
    let mut revoked = record("AAAA-0000-BBBB-0003", "u3@example.com", LicenseType::Basic);
    lifecycle::revoke(&mut revoked, "fraud", Utc::now());
    store.insert(&revoked).unwrap();

    let live = store.list_live().unwrap();
    assert_eq!(live.len(), 2);
    assert_eq!(live[0].key, "AAAA-0000-BBBB-0001");
    assert_eq!(live[1].key, "AAAA-0000-BBBB-0002");
}

#[test]
fn count_by_status_groups() {
    let store = LicenseStore::open_in_memory().unwrap();
    seed_mixed(&store);

    let counts = store.count_by_status().unwrap();
    let get = |status: &str| {
        counts
            .iter()
            .find(|c| c.status == status)
            .map(|c| c.count)
            .unwrap_or(0)
    };
    assert_eq!(get("active"), 2);
    assert_eq!(get("trial"), 1);
    assert_eq!(get("revoked"), 1);
    assert_eq!(get("expired"), 0);
}

// ── File-backed store ────────────────────────────────────────────

#[test]
fn reopen_preserves_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("licenses.db");

    {
        let store = LicenseStore::open(&path).unwrap();
        store
            .insert(&record("AAAA-0000-BBBB-1111", "a@example.com", LicenseType::Pro))
            .unwrap();
    }

    let store = LicenseStore::open(&path).unwrap();
    let loaded = store.find_by_key("AAAA-0000-BBBB-1111").unwrap().unwrap();
    assert_eq!(loaded.email, "a@example.com");
    assert_eq!(loaded.license_type, LicenseType::Pro);
}
