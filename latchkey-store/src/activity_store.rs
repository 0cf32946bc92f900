//! Append-only store for activity events, with the aggregation queries
//! behind user stats, per-day summaries, and the admin dashboard.
//!
//! Events are only ever inserted. Posting rollups read the `posted` and
//! `failed` fields out of the opaque JSON payload of `posting_completed`
//! events via SQLite's JSON functions.

use crate::error::{StoreError, StoreResult};
use crate::{decode_ts, encode_ts};
use chrono::{DateTime, Utc};
use latchkey_license::{ActivityAction, ActivityEvent, ClientMeta};
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

const EVENT_COLUMNS: &str =
    "license_key, email, action, data, ip, user_agent, client_version, success, \
     error_message, timestamp";

/// Append-only store for activity events backed by SQLite.
#[derive(Clone)]
pub struct ActivityStore {
    conn: Arc<Mutex<Connection>>,
}

/// Event count for one action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCount {
    pub action: String,
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_occurrence: Option<DateTime<Utc>>,
}

/// Rollup of `posting_completed` payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingStats {
    pub total_sessions: u64,
    pub total_threads_posted: i64,
    pub total_threads_failed: i64,
    pub avg_threads_per_session: f64,
}

/// Aggregate statistics for one user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_activities: u64,
    pub activities: Vec<ActionCount>,
    pub posting: PostingStats,
}

/// Per-day activity breakdown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    /// Day in `YYYY-MM-DD`.
    pub date: String,
    pub total_activities: u64,
    pub activities: Vec<ActionCount>,
}

/// Distinct active users for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActiveUsers {
    pub date: String,
    pub active_users: u64,
}

impl ActivityStore {
    /// Opens (or creates) an activity store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory activity store (for testing).
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
            CREATE TABLE IF NOT EXISTS activity (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                license_key TEXT NOT NULL,
                email TEXT NOT NULL,
                action TEXT NOT NULL,
                data TEXT NOT NULL,
                ip TEXT,
                user_agent TEXT,
                client_version TEXT,
                success INTEGER NOT NULL DEFAULT 1,
                error_message TEXT,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_activity_email_ts
                ON activity(email, timestamp);

            CREATE INDEX IF NOT EXISTS idx_activity_action_ts
                ON activity(action, timestamp);

            CREATE INDEX IF NOT EXISTS idx_activity_key
                ON activity(license_key);
            ",
        )?;
        Ok(())
    }

    /// Appends one event.
    pub fn insert(&self, event: &ActivityEvent) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!("INSERT INTO activity ({EVENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            params![
                event.license_key,
                event.email,
                event.action.to_string(),
                serde_json::to_string(&event.data)?,
                event.meta.ip,
                event.meta.user_agent,
                event.meta.client_version,
                event.success as i64,
                event.error_message,
                encode_ts(event.timestamp),
            ],
        )?;
        Ok(())
    }

    /// The most recent events for an email, newest first.
    pub fn recent_by_email(&self, email: &str, limit: u64) -> StoreResult<Vec<ActivityEvent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM activity WHERE email = ?1 \
             ORDER BY timestamp DESC LIMIT {}",
            limit.clamp(1, 100)
        ))?;
        let rows = stmt.query_map(params![email], EventRow::from_row)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?.into_event()?);
        }
        Ok(events)
    }

    /// Event counts grouped by action for an email, optionally bounded to a
    /// time range.
    pub fn action_counts(
        &self,
        email: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<ActionCount>> {
        let mut clauses = vec!["email = ?1".to_string()];
        let mut args = vec![email.to_string()];
        if let Some(start) = start {
            args.push(encode_ts(start));
            clauses.push(format!("timestamp >= ?{}", args.len()));
        }
        if let Some(end) = end {
            args.push(encode_ts(end));
            clauses.push(format!("timestamp <= ?{}", args.len()));
        }

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT action, COUNT(*), MAX(timestamp) FROM activity \
             WHERE {} GROUP BY action ORDER BY action",
            clauses.join(" AND ")
        ))?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, i64>(1)?,
                r.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (action, count, last) = row?;
            counts.push(ActionCount {
                action,
                count: count as u64,
                last_occurrence: last.as_deref().map(decode_ts).transpose()?,
            });
        }
        Ok(counts)
    }

    /// Rollup of `posting_completed` payload fields for an email.
    pub fn posting_stats(&self, email: &str) -> StoreResult<PostingStats> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*), \
                    COALESCE(SUM(json_extract(data, '$.posted')), 0), \
                    COALESCE(SUM(json_extract(data, '$.failed')), 0), \
                    COALESCE(AVG(json_extract(data, '$.posted')), 0.0) \
             FROM activity WHERE email = ?1 AND action = 'posting_completed'",
            params![email],
            |r| {
                Ok(PostingStats {
                    total_sessions: r.get::<_, i64>(0)? as u64,
                    total_threads_posted: r.get(1)?,
                    total_threads_failed: r.get(2)?,
                    avg_threads_per_session: r.get(3)?,
                })
            },
        )
        .map_err(Into::into)
    }

    /// Combined per-action counts and posting rollup for an email.
    pub fn user_stats(
        &self,
        email: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> StoreResult<UserStats> {
        let activities = self.action_counts(email, start, end)?;
        let total_activities = activities.iter().map(|a| a.count).sum();
        Ok(UserStats {
            total_activities,
            activities,
            posting: self.posting_stats(email)?,
        })
    }

    /// Per-day, per-action breakdown for an email within a time range,
    /// oldest day first.
    pub fn daily_summary(
        &self,
        email: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<DailySummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT date(timestamp), action, COUNT(*) FROM activity \
             WHERE email = ?1 AND timestamp >= ?2 AND timestamp <= ?3 \
             GROUP BY date(timestamp), action ORDER BY date(timestamp) ASC, action",
        )?;
        let rows = stmt.query_map(
            params![email, encode_ts(start), encode_ts(end)],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, i64>(2)?,
                ))
            },
        )?;

        let mut days: Vec<DailySummary> = Vec::new();
        for row in rows {
            let (date, action, count) = row?;
            let entry = ActionCount {
                action,
                count: count as u64,
                last_occurrence: None,
            };
            match days.last_mut() {
                Some(day) if day.date == date => {
                    day.total_activities += entry.count;
                    day.activities.push(entry);
                }
                _ => days.push(DailySummary {
                    date,
                    total_activities: entry.count,
                    activities: vec![entry],
                }),
            }
        }
        Ok(days)
    }

    /// Event counts grouped by action across all users since `since`,
    /// for the dashboard.
    pub fn counts_by_action_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<ActionCount>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT action, COUNT(*) FROM activity WHERE timestamp >= ?1 \
             GROUP BY action ORDER BY action",
        )?;
        let rows = stmt.query_map(params![encode_ts(since)], |r| {
            Ok(ActionCount {
                action: r.get(0)?,
                count: r.get::<_, i64>(1)? as u64,
                last_occurrence: None,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Distinct users seen per day since `since`, oldest day first.
    pub fn daily_active_users(&self, since: DateTime<Utc>) -> StoreResult<Vec<DailyActiveUsers>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT date(timestamp), COUNT(DISTINCT email) FROM activity \
             WHERE timestamp >= ?1 GROUP BY date(timestamp) ORDER BY date(timestamp) ASC",
        )?;
        let rows = stmt.query_map(params![encode_ts(since)], |r| {
            Ok(DailyActiveUsers {
                date: r.get(0)?,
                active_users: r.get::<_, i64>(1)? as u64,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

/// Raw column values for one event row.
struct EventRow {
    license_key: String,
    email: String,
    action: String,
    data: String,
    ip: Option<String>,
    user_agent: Option<String>,
    client_version: Option<String>,
    success: i64,
    error_message: Option<String>,
    timestamp: String,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            license_key: row.get(0)?,
            email: row.get(1)?,
            action: row.get(2)?,
            data: row.get(3)?,
            ip: row.get(4)?,
            user_agent: row.get(5)?,
            client_version: row.get(6)?,
            success: row.get(7)?,
            error_message: row.get(8)?,
            timestamp: row.get(9)?,
        })
    }

    fn into_event(self) -> StoreResult<ActivityEvent> {
        let action = ActivityAction::from_str(&self.action).map_err(StoreError::InvalidData)?;
        Ok(ActivityEvent {
            license_key: self.license_key,
            email: self.email,
            action,
            data: serde_json::from_str(&self.data)?,
            meta: ClientMeta {
                ip: self.ip,
                user_agent: self.user_agent,
                client_version: self.client_version,
            },
            timestamp: decode_ts(&self.timestamp)?,
            success: self.success != 0,
            error_message: self.error_message,
        })
    }
}
