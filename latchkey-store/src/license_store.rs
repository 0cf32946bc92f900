//! Persistent store for license records.
//!
//! Licenses are keyed by the license key string; a partial unique index on
//! `email` over the live statuses closes the issue-time race where two
//! concurrent creations could otherwise both pass the advisory
//! "no live license for this email" pre-check.

use crate::error::{StoreError, StoreResult};
use crate::{decode_ts, encode_ts};
use latchkey_license::{
    Features, LicenseMetadata, LicenseRecord, LicenseStatus, LicenseType, RevokedInfo,
};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

const LICENSE_COLUMNS: &str = "key, email, status, license_type, features, activated_at, \
     expires_at, last_checked, check_count, metadata, revoked_status, revoked_reason, \
     revoked_date, version";

/// Persistent store for license records backed by SQLite.
#[derive(Clone)]
pub struct LicenseStore {
    conn: Arc<Mutex<Connection>>,
}

/// Optional filters for listing licenses.
#[derive(Debug, Clone, Copy, Default)]
pub struct LicenseFilter {
    pub status: Option<LicenseStatus>,
    pub license_type: Option<LicenseType>,
}

/// One page of a filtered license listing.
#[derive(Debug, Clone, Serialize)]
pub struct LicensePage {
    pub licenses: Vec<LicenseRecord>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

/// License count for one status, for dashboard rollups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: u64,
}

impl LicenseStore {
    /// Opens (or creates) a license store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory license store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS licenses (
                key TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                status TEXT NOT NULL,
                license_type TEXT NOT NULL,
                features TEXT NOT NULL,
                activated_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                last_checked TEXT NOT NULL,
                check_count INTEGER NOT NULL DEFAULT 0,
                metadata TEXT NOT NULL,
                revoked_status INTEGER NOT NULL DEFAULT 0,
                revoked_reason TEXT,
                revoked_date TEXT,
                version INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_licenses_email_status
                ON licenses(email, status);

            CREATE INDEX IF NOT EXISTS idx_licenses_expires_at
                ON licenses(expires_at);

            CREATE UNIQUE INDEX IF NOT EXISTS idx_licenses_live_email
                ON licenses(email) WHERE status IN ('active', 'trial');
            ",
        )?;
        Ok(())
    }

    /// Inserts a freshly issued record.
    ///
    /// # Errors
    ///
    /// `KeyCollision` if the key already exists (regenerate and retry);
    /// `DuplicateActiveLicense` if the email already has a live license.
    pub fn insert(&self, record: &LicenseRecord) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO licenses (key, email, status, license_type, features, activated_at, \
             expires_at, last_checked, check_count, metadata, revoked_status, revoked_reason, \
             revoked_date, version) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                record.key,
                record.email,
                record.status.to_string(),
                record.license_type.to_string(),
                serde_json::to_string(&record.features)?,
                encode_ts(record.activated_at),
                encode_ts(record.expires_at),
                encode_ts(record.last_checked),
                record.check_count as i64,
                serde_json::to_string(&record.metadata)?,
                record.revoked.status as i64,
                record.revoked.reason,
                record.revoked.date.map(encode_ts),
                record.version,
            ],
        )
        .map_err(map_constraint_error)?;
        Ok(())
    }

    /// Finds a license by its (email, key) credential pair.
    pub fn find_by_email_and_key(
        &self,
        email: &str,
        key: &str,
    ) -> StoreResult<Option<LicenseRecord>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE email = ?1 AND key = ?2"),
                params![email, key],
                LicenseRow::from_row,
            )
            .optional()?;
        row.map(LicenseRow::into_record).transpose()
    }

    /// Finds a license by key alone (admin operations).
    pub fn find_by_key(&self, key: &str) -> StoreResult<Option<LicenseRecord>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE key = ?1"),
                params![key],
                LicenseRow::from_row,
            )
            .optional()?;
        row.map(LicenseRow::into_record).transpose()
    }

    /// Finds the live (active/trial) license for an email, if any.
    pub fn find_live_by_email(&self, email: &str) -> StoreResult<Option<LicenseRecord>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {LICENSE_COLUMNS} FROM licenses \
                     WHERE email = ?1 AND status IN ('active', 'trial')"
                ),
                params![email],
                LicenseRow::from_row,
            )
            .optional()?;
        row.map(LicenseRow::into_record).transpose()
    }

    /// Writes `record` if the stored version still matches the version the
    /// caller read; bumps the stored version on success.
    ///
    /// # Errors
    ///
    /// `VersionConflict` if another writer got there first (reload and
    /// retry); `NotFound` if the key no longer exists;
    /// `DuplicateActiveLicense` if the write would give the email a second
    /// live license (e.g. reactivating after a replacement was issued).
    pub fn update(&self, record: &LicenseRecord) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let rows = conn
            .execute(
                "UPDATE licenses SET email = ?1, status = ?2, license_type = ?3, features = ?4, \
                 activated_at = ?5, expires_at = ?6, last_checked = ?7, check_count = ?8, \
                 metadata = ?9, revoked_status = ?10, revoked_reason = ?11, revoked_date = ?12, \
                 version = version + 1 \
                 WHERE key = ?13 AND version = ?14",
                params![
                    record.email,
                    record.status.to_string(),
                    record.license_type.to_string(),
                    serde_json::to_string(&record.features)?,
                    encode_ts(record.activated_at),
                    encode_ts(record.expires_at),
                    encode_ts(record.last_checked),
                    record.check_count as i64,
                    serde_json::to_string(&record.metadata)?,
                    record.revoked.status as i64,
                    record.revoked.reason,
                    record.revoked.date.map(encode_ts),
                    record.key,
                    record.version,
                ],
            )
            .map_err(map_constraint_error)?;

        if rows == 0 {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM licenses WHERE key = ?1)",
                params![record.key],
                |r| r.get(0),
            )?;
            if exists {
                return Err(StoreError::VersionConflict(record.key.clone()));
            }
            return Err(StoreError::NotFound(record.key.clone()));
        }
        Ok(())
    }

    /// Lists licenses matching `filter`, newest first, with pagination.
    /// `page` is 1-based; `limit` is clamped to 1..=100.
    pub fn list(&self, filter: LicenseFilter, page: u64, limit: u64) -> StoreResult<LicensePage> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);

        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<String> = Vec::new();
        if let Some(status) = filter.status {
            args.push(status.to_string());
            clauses.push(format!("status = ?{}", args.len()));
        }
        if let Some(license_type) = filter.license_type {
            args.push(license_type.to_string());
            clauses.push(format!("license_type = ?{}", args.len()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let conn = self.conn.lock().unwrap();
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM licenses{where_sql}"),
            params_from_iter(args.iter()),
            |r| r.get(0),
        )?;
        let total = total as u64;

        let offset = (page - 1) * limit;
        let mut stmt = conn.prepare(&format!(
            "SELECT {LICENSE_COLUMNS} FROM licenses{where_sql} \
             ORDER BY activated_at DESC LIMIT {limit} OFFSET {offset}"
        ))?;
        let rows = stmt.query_map(params_from_iter(args.iter()), LicenseRow::from_row)?;

        let mut licenses = Vec::new();
        for row in rows {
            licenses.push(row?.into_record()?);
        }

        Ok(LicensePage {
            licenses,
            page,
            limit,
            total,
            pages: total.div_ceil(limit),
        })
    }

    /// Lists all live licenses, soonest expiry first.
    pub fn list_live(&self) -> StoreResult<Vec<LicenseRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {LICENSE_COLUMNS} FROM licenses \
             WHERE status IN ('active', 'trial') ORDER BY expires_at ASC"
        ))?;
        let rows = stmt.query_map([], LicenseRow::from_row)?;

        let mut licenses = Vec::new();
        for row in rows {
            licenses.push(row?.into_record()?);
        }
        Ok(licenses)
    }

    /// License counts grouped by status, for the dashboard.
    pub fn count_by_status(&self) -> StoreResult<Vec<StatusCount>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM licenses GROUP BY status ORDER BY status")?;
        let rows = stmt.query_map([], |r| {
            Ok(StatusCount {
                status: r.get(0)?,
                count: r.get::<_, i64>(1)? as u64,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

/// Raw column values for one license row; decoded into a record separately
/// so JSON/timestamp parse failures surface as `StoreError`, not as SQLite
/// conversion errors.
struct LicenseRow {
    key: String,
    email: String,
    status: String,
    license_type: String,
    features: String,
    activated_at: String,
    expires_at: String,
    last_checked: String,
    check_count: i64,
    metadata: String,
    revoked_status: i64,
    revoked_reason: Option<String>,
    revoked_date: Option<String>,
    version: i64,
}

impl LicenseRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            email: row.get(1)?,
            status: row.get(2)?,
            license_type: row.get(3)?,
            features: row.get(4)?,
            activated_at: row.get(5)?,
            expires_at: row.get(6)?,
            last_checked: row.get(7)?,
            check_count: row.get(8)?,
            metadata: row.get(9)?,
            revoked_status: row.get(10)?,
            revoked_reason: row.get(11)?,
            revoked_date: row.get(12)?,
            version: row.get(13)?,
        })
    }

    fn into_record(self) -> StoreResult<LicenseRecord> {
        let status = LicenseStatus::from_str(&self.status).map_err(StoreError::InvalidData)?;
        let license_type =
            LicenseType::from_str(&self.license_type).map_err(StoreError::InvalidData)?;
        let features: Features = serde_json::from_str(&self.features)?;
        let metadata: LicenseMetadata = serde_json::from_str(&self.metadata)?;

        Ok(LicenseRecord {
            key: self.key,
            email: self.email,
            status,
            license_type,
            features,
            activated_at: decode_ts(&self.activated_at)?,
            expires_at: decode_ts(&self.expires_at)?,
            last_checked: decode_ts(&self.last_checked)?,
            check_count: self.check_count as u64,
            metadata,
            revoked: RevokedInfo {
                status: self.revoked_status != 0,
                reason: self.revoked_reason,
                date: self.revoked_date.as_deref().map(decode_ts).transpose()?,
            },
            version: self.version,
        })
    }
}

/// Maps SQLite constraint violations onto the store's domain errors.
fn map_constraint_error(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(err, Some(ref msg)) = e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation {
            if msg.contains("licenses.key") {
                return StoreError::KeyCollision;
            }
            if msg.contains("licenses.email") {
                return StoreError::DuplicateActiveLicense;
            }
        }
    }
    StoreError::Database(e)
}
