//! Shared test helpers for license core tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use latchkey_license::{lifecycle, LicenseMetadata, LicenseRecord, LicenseType};

pub const TEST_KEY: &str = "AB12-CD34-EF56-GH78";
pub const TEST_EMAIL: &str = "user@example.com";

/// Issues a record of the given type at `now` with defaults.
pub fn issued(license_type: LicenseType, now: DateTime<Utc>) -> LicenseRecord {
    lifecycle::issue(
        TEST_KEY.to_string(),
        TEST_EMAIL,
        license_type,
        None,
        None,
        LicenseMetadata::default(),
        now,
    )
    .unwrap()
}

/// A basic license issued at `now`.
pub fn basic(now: DateTime<Utc>) -> LicenseRecord {
    issued(LicenseType::Basic, now)
}

/// A basic license whose expiry lies `days` in the past relative to `now`.
pub fn expired_basic(now: DateTime<Utc>, days: i64) -> LicenseRecord {
    let mut record = basic(now - Duration::days(days + 30));
    record.expires_at = now - Duration::days(days);
    record
}
