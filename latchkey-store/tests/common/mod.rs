//! Shared test helpers for store tests.

#![allow(dead_code)]

use chrono::Utc;
use latchkey_license::{lifecycle, ActivityAction, ActivityEvent, ClientMeta, LicenseMetadata, LicenseRecord, LicenseType};
use serde_json::json;

/// Issues a record now with the given key/email/type.
pub fn record(key: &str, email: &str, license_type: LicenseType) -> LicenseRecord {
    lifecycle::issue(
        key.to_string(),
        email,
        license_type,
        None,
        None,
        LicenseMetadata::default(),
        Utc::now(),
    )
    .unwrap()
}

/// A successful event for the given email and action, with an empty payload.
pub fn event(key: &str, email: &str, action: ActivityAction) -> ActivityEvent {
    ActivityEvent::new(key, email, action, json!({}), ClientMeta::default())
}

/// A `posting_completed` event carrying posted/failed counts.
pub fn posting_event(key: &str, email: &str, posted: i64, failed: i64) -> ActivityEvent {
    ActivityEvent::new(
        key,
        email,
        ActivityAction::PostingCompleted,
        json!({ "posted": posted, "failed": failed }),
        ClientMeta::default(),
    )
}
