//! SQLite storage layer for Latchkey.
//!
//! Two stores over separate database files, mirroring the two persisted
//! collections: `LicenseStore` is the system of record for license records,
//! `ActivityStore` is the append-only activity log. Keeping them in separate
//! files isolates analytics churn from the license system of record.
//!
//! # Concurrency
//!
//! License rows carry a `version` counter. `LicenseStore::update` only
//! writes when the stored version matches the one the caller read, so two
//! concurrent read-modify-write sequences cannot silently drop each other's
//! changes: the loser gets `StoreError::VersionConflict` and retries.

mod activity_store;
mod error;
mod license_store;

pub use activity_store::{
    ActionCount, ActivityStore, DailyActiveUsers, DailySummary, PostingStats, UserStats,
};
pub use error::{StoreError, StoreResult};
pub use license_store::{LicenseFilter, LicensePage, LicenseStore, StatusCount};

use chrono::{DateTime, SecondsFormat, Utc};

/// Encodes a timestamp as fixed-width RFC 3339 UTC (nine fractional
/// digits), so that string comparison in SQL agrees with time ordering and
/// the round trip is loss-free.
pub(crate) fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Decodes a timestamp stored by [`encode_ts`].
pub(crate) fn decode_ts(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("bad timestamp {s:?}: {e}")))
}
