mod common;

use chrono::{Duration, Utc};
use common::{basic, expired_basic, issued, TEST_EMAIL, TEST_KEY};
use latchkey_license::{
    lifecycle, CheckOutcome, ExtendPolicy, Features, LicenseError, LicenseMetadata, LicenseStatus,
    LicenseType, Priority,
};

// ── Issue ────────────────────────────────────────────────────────

#[test]
fn issue_trial_starts_in_trial_status() {
    let now = Utc::now();
    let record = issued(LicenseType::Trial, now);

    assert_eq!(record.status, LicenseStatus::Trial);
    assert_eq!(record.features.max_threads, 20);
    let expected = now + Duration::days(7);
    assert!((record.expires_at - expected).num_seconds().abs() <= 1);
}

#[test]
fn issue_paid_starts_active() {
    let now = Utc::now();
    for license_type in [
        LicenseType::Basic,
        LicenseType::Pro,
        LicenseType::Enterprise,
        LicenseType::Custom,
    ] {
        let record = issued(license_type, now);
        assert_eq!(record.status, LicenseStatus::Active, "{license_type}");
        assert_eq!(
            record.expires_at,
            now + Duration::days(license_type.duration_days())
        );
        assert_eq!(record.features, license_type.default_features());
    }
}

#[test]
fn issue_normalizes_email() {
    let record = lifecycle::issue(
        TEST_KEY.to_string(),
        "  User@Example.COM ",
        LicenseType::Basic,
        None,
        None,
        LicenseMetadata::default(),
        Utc::now(),
    )
    .unwrap();
    assert_eq!(record.email, "user@example.com");
}

#[test]
fn issue_with_day_override() {
    let now = Utc::now();
    let record = lifecycle::issue(
        TEST_KEY.to_string(),
        TEST_EMAIL,
        LicenseType::Pro,
        Some(10),
        None,
        LicenseMetadata::default(),
        now,
    )
    .unwrap();
    assert_eq!(record.expires_at, now + Duration::days(10));
}

#[test]
fn issue_with_feature_override() {
    let features = Features {
        max_threads: 42,
        custom_delays: false,
        advanced_mode: true,
        priority: Priority::High,
    };
    let record = lifecycle::issue(
        TEST_KEY.to_string(),
        TEST_EMAIL,
        LicenseType::Custom,
        None,
        Some(features.clone()),
        LicenseMetadata::default(),
        Utc::now(),
    )
    .unwrap();
    assert_eq!(record.features, features);
}

#[test]
fn issue_rejects_non_positive_days() {
    for days in [0, -5] {
        let result = lifecycle::issue(
            TEST_KEY.to_string(),
            TEST_EMAIL,
            LicenseType::Basic,
            Some(days),
            None,
            LicenseMetadata::default(),
            Utc::now(),
        );
        assert!(matches!(result, Err(LicenseError::InvalidTransition(_))));
    }
}

// ── check_validity ───────────────────────────────────────────────

#[test]
fn check_valid_license() {
    let now = Utc::now();
    let mut record = issued(LicenseType::Pro, now);

    let outcome = lifecycle::check_validity(&mut record, now);
    match outcome {
        CheckOutcome::Valid {
            expires_at,
            features,
            license_type,
        } => {
            assert_eq!(expires_at, record.expires_at);
            assert_eq!(features.max_threads, 500);
            assert_eq!(license_type, LicenseType::Pro);
        }
        CheckOutcome::Invalid { reason } => panic!("expected valid, got {reason}"),
    }
    assert_eq!(record.check_count, 1);
    assert_eq!(record.last_checked, now);
}

#[test]
fn check_counters_bump_on_every_outcome() {
    let now = Utc::now();
    let mut record = expired_basic(now, 1);

    for expected in 1..=3 {
        lifecycle::check_validity(&mut record, now);
        assert_eq!(record.check_count, expected);
    }
}

#[test]
fn check_expired_transitions_status() {
    let now = Utc::now();
    let mut record = expired_basic(now, 1);
    assert_eq!(record.status, LicenseStatus::Active);

    let outcome = lifecycle::check_validity(&mut record, now);
    assert_eq!(outcome.reason(), Some("License expired"));
    assert_eq!(record.status, LicenseStatus::Expired);
}

#[test]
fn check_expired_is_idempotent() {
    let now = Utc::now();
    let mut record = expired_basic(now, 1);

    lifecycle::check_validity(&mut record, now);
    let outcome = lifecycle::check_validity(&mut record, now);

    // stays expired, never resurrects, only counters move
    assert_eq!(record.status, LicenseStatus::Expired);
    assert_eq!(outcome.reason(), Some("License expired"));
    assert_eq!(record.check_count, 2);
}

#[test]
fn check_revoked_reports_reason() {
    let now = Utc::now();
    let mut record = basic(now);
    lifecycle::revoke(&mut record, "fraud", now);

    let outcome = lifecycle::check_validity(&mut record, now);
    assert_eq!(outcome.reason(), Some("License revoked: fraud"));
    assert_eq!(record.status, LicenseStatus::Revoked);
}

// Documented precedence: the expiry check runs first, so a license that is
// both past expiry and revoked reports "License expired", never "License
// revoked".
#[test]
fn expired_wins_over_revoked() {
    let now = Utc::now();
    let mut record = expired_basic(now, 3);
    lifecycle::revoke(&mut record, "fraud", now);

    let outcome = lifecycle::check_validity(&mut record, now);
    assert_eq!(outcome.reason(), Some("License expired"));
    assert_eq!(record.status, LicenseStatus::Expired);
}

#[test]
fn check_at_exact_expiry_is_valid() {
    let now = Utc::now();
    let mut record = basic(now);
    record.expires_at = now;

    assert!(lifecycle::check_validity(&mut record, now).is_valid());
}

// ── Revoke / reactivate ──────────────────────────────────────────

#[test]
fn revoke_records_reason_and_date() {
    let now = Utc::now();
    let mut record = basic(now);
    let original_expiry = record.expires_at;

    lifecycle::revoke(&mut record, "chargeback", now);

    assert_eq!(record.status, LicenseStatus::Revoked);
    assert!(record.revoked.status);
    assert_eq!(record.revoked.reason.as_deref(), Some("chargeback"));
    assert_eq!(record.revoked.date, Some(now));
    // revocation never touches the expiry window
    assert_eq!(record.expires_at, original_expiry);
}

#[test]
fn revoke_then_reactivate_roundtrip() {
    let now = Utc::now();
    let mut record = basic(now);
    let original_expiry = record.expires_at;

    lifecycle::revoke(&mut record, "fraud", now);
    lifecycle::reactivate(&mut record).unwrap();

    assert_eq!(record.status, LicenseStatus::Active);
    assert!(!record.revoked.status);
    assert_eq!(record.revoked.reason, None);
    assert_eq!(record.revoked.date, None);
    assert_eq!(record.expires_at, original_expiry);
    assert!(record.is_valid(now));
}

#[test]
fn reactivate_requires_revoked_status() {
    let now = Utc::now();
    for status in [
        LicenseStatus::Active,
        LicenseStatus::Trial,
        LicenseStatus::Expired,
    ] {
        let mut record = basic(now);
        record.status = status;
        let result = lifecycle::reactivate(&mut record);
        assert!(
            matches!(result, Err(LicenseError::InvalidTransition(_))),
            "{status}"
        );
    }
}

#[test]
fn reactivate_does_not_restore_lapsed_window() {
    let now = Utc::now();
    let mut record = expired_basic(now, 10);
    lifecycle::revoke(&mut record, "payment failed", now);

    lifecycle::reactivate(&mut record).unwrap();

    // status says active, but the window already lapsed: still not valid
    assert_eq!(record.status, LicenseStatus::Active);
    assert!(!record.is_valid(now));
}

// ── Extend ───────────────────────────────────────────────────────

#[test]
fn extend_future_expiry_adds_to_it() {
    let now = Utc::now();
    let mut record = basic(now);
    let old_expiry = record.expires_at;

    let new_expiry = lifecycle::extend(&mut record, 5, ExtendPolicy::Always, now).unwrap();

    assert_eq!(new_expiry, old_expiry + Duration::days(5));
    assert_eq!(record.expires_at, new_expiry);
    assert_eq!(record.status, LicenseStatus::Active);
}

#[test]
fn extend_expired_license_bases_on_now() {
    let now = Utc::now();
    let mut record = expired_basic(now, 10);
    lifecycle::check_validity(&mut record, now);
    assert_eq!(record.status, LicenseStatus::Expired);

    let new_expiry = lifecycle::extend(&mut record, 5, ExtendPolicy::Always, now).unwrap();

    // base is now, not the stale expiry ten days back
    assert_eq!(new_expiry, now + Duration::days(5));
    assert_eq!(record.status, LicenseStatus::Active);
    assert!(record.is_valid(now));
}

#[test]
fn extend_leaves_revoked_status_alone() {
    let now = Utc::now();
    let mut record = basic(now);
    lifecycle::revoke(&mut record, "fraud", now);

    lifecycle::extend(&mut record, 30, ExtendPolicy::Always, now).unwrap();

    // window moved, but a revoked license stays revoked
    assert_eq!(record.status, LicenseStatus::Revoked);
    assert!(!record.is_valid(now));
}

#[test]
fn extend_rejects_non_positive_days() {
    let now = Utc::now();
    let mut record = basic(now);
    for days in [0, -1] {
        let result = lifecycle::extend(&mut record, days, ExtendPolicy::Always, now);
        assert!(matches!(result, Err(LicenseError::InvalidTransition(_))));
    }
}

#[test]
fn near_expiry_policy_rejects_far_from_expiry() {
    let now = Utc::now();
    let mut record = basic(now); // 30 days remaining
    let policy = ExtendPolicy::NearExpiryOnly { within_days: 7 };

    let result = lifecycle::extend(&mut record, 30, policy, now);
    assert!(matches!(result, Err(LicenseError::InvalidTransition(_))));
}

#[test]
fn near_expiry_policy_allows_close_to_expiry() {
    let now = Utc::now();
    let mut record = basic(now);
    record.expires_at = now + Duration::days(3);
    let policy = ExtendPolicy::NearExpiryOnly { within_days: 7 };

    let new_expiry = lifecycle::extend(&mut record, 30, policy, now).unwrap();
    assert_eq!(new_expiry, now + Duration::days(33));
}

#[test]
fn near_expiry_policy_allows_already_expired() {
    let now = Utc::now();
    let mut record = expired_basic(now, 2);
    let policy = ExtendPolicy::NearExpiryOnly { within_days: 7 };

    let new_expiry = lifecycle::extend(&mut record, 14, policy, now).unwrap();
    assert_eq!(new_expiry, now + Duration::days(14));
}
