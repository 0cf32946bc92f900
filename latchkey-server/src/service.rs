//! Orchestration layer between the HTTP handlers and the stores.
//!
//! Each operation follows the same shape: load the record, run a pure
//! lifecycle transition on it, persist with an optimistic-concurrency
//! retry, then log activity best-effort. Activity writes never fail a
//! lifecycle operation; a failed persist means the transition did not
//! happen.

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use latchkey_license::{
    key, lifecycle, ActivityAction, ActivityEvent, CheckOutcome, ClientMeta, ExtendPolicy,
    Features, LicenseMetadata, LicenseRecord, LicenseType,
};
use latchkey_store::{
    ActionCount, ActivityStore, DailyActiveUsers, DailySummary, LicenseFilter, LicensePage,
    LicenseStore, StatusCount, StoreError, StoreResult, UserStats,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

/// Reloads-and-retries per operation before giving up on a version conflict.
const CAS_RETRIES: usize = 5;

/// Key regenerations per issuance before giving up on collisions.
const KEY_ATTEMPTS: usize = 5;

/// A successful validity grant.
#[derive(Debug, Clone)]
pub struct LicenseGrant {
    pub expires_at: DateTime<Utc>,
    pub features: Features,
    pub license_type: LicenseType,
    pub days_left: i64,
}

/// Admin dashboard rollup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub licenses: Vec<StatusCount>,
    pub activities: Vec<ActionCount>,
    pub daily_active_users: Vec<DailyActiveUsers>,
}

/// The license service: stores plus lifecycle policy.
pub struct LicenseService {
    licenses: LicenseStore,
    activity: ActivityStore,
    extend_policy: ExtendPolicy,
}

impl LicenseService {
    pub fn new(licenses: LicenseStore, activity: ActivityStore, extend_policy: ExtendPolicy) -> Self {
        Self {
            licenses,
            activity,
            extend_policy,
        }
    }

    // ── Issuance ─────────────────────────────────────────────────

    /// Issues a new license, generating keys until one sticks.
    ///
    /// The live-license pre-check gives a clean conflict error on the
    /// common path; the store's partial unique index closes the remaining
    /// race window.
    pub fn issue(
        &self,
        email: &str,
        license_type: LicenseType,
        days: Option<i64>,
        features: Option<Features>,
        notes: Option<String>,
    ) -> Result<LicenseRecord, ApiError> {
        let email = email.trim().to_lowercase();
        if self.licenses.find_live_by_email(&email)?.is_some() {
            return Err(ApiError::DuplicateActiveLicense);
        }

        let metadata = LicenseMetadata {
            notes,
            ..Default::default()
        };

        for _ in 0..KEY_ATTEMPTS {
            let record = lifecycle::issue(
                key::generate(),
                &email,
                license_type,
                days,
                features.clone(),
                metadata.clone(),
                Utc::now(),
            )?;
            match self.licenses.insert(&record) {
                Ok(()) => {
                    info!(
                        "license issued for {} - type: {}, expires: {}",
                        record.email, record.license_type, record.expires_at
                    );
                    return Ok(record);
                }
                Err(StoreError::KeyCollision) => continue,
                Err(StoreError::DuplicateActiveLicense) => {
                    return Err(ApiError::DuplicateActiveLicense);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ApiError::Internal(
            "could not generate an unused license key".to_string(),
        ))
    }

    // ── Validation ───────────────────────────────────────────────

    /// Validates credentials, runs the validity check, records last-seen
    /// client details, and logs an activation event.
    pub fn validate_and_activate(
        &self,
        email: &str,
        license_key: &str,
        meta: &ClientMeta,
    ) -> Result<LicenseGrant, ApiError> {
        let email = email.trim().to_lowercase();
        let result = self.persist_with_retry(
            |s| s.find_by_email_and_key(&email, license_key),
            |record| {
                let outcome = lifecycle::check_validity(record, Utc::now());
                if outcome.is_valid() {
                    record.touch_metadata(meta);
                }
                Ok(outcome)
            },
        )?;

        let Some((record, outcome)) = result else {
            self.log_best_effort(
                ActivityEvent::new(
                    "unknown",
                    &email,
                    ActivityAction::LicenseActivated,
                    json!({ "reason": "Invalid license" }),
                    meta.clone(),
                )
                .failed("Invalid license"),
            );
            return Err(ApiError::InvalidCredentials);
        };

        match outcome {
            CheckOutcome::Valid {
                expires_at,
                features,
                license_type,
            } => {
                self.log_best_effort(ActivityEvent::new(
                    &record.key,
                    &email,
                    ActivityAction::LicenseActivated,
                    json!({ "type": license_type }),
                    meta.clone(),
                ));
                Ok(LicenseGrant {
                    expires_at,
                    features,
                    license_type,
                    days_left: record.days_left(Utc::now()),
                })
            }
            CheckOutcome::Invalid { reason } => Err(ApiError::InvalidLicense { reason }),
        }
    }

    /// Periodic validity check. Logs the check either way.
    pub fn check(
        &self,
        email: &str,
        license_key: &str,
        meta: &ClientMeta,
    ) -> Result<LicenseGrant, ApiError> {
        let email = email.trim().to_lowercase();
        let result = self.persist_with_retry(
            |s| s.find_by_email_and_key(&email, license_key),
            |record| Ok(lifecycle::check_validity(record, Utc::now())),
        )?;

        let Some((record, outcome)) = result else {
            return Err(ApiError::InvalidCredentials);
        };

        match outcome {
            CheckOutcome::Valid {
                expires_at,
                features,
                license_type,
            } => {
                self.log_best_effort(ActivityEvent::new(
                    &record.key,
                    &email,
                    ActivityAction::LicenseChecked,
                    json!({}),
                    meta.clone(),
                ));
                Ok(LicenseGrant {
                    expires_at,
                    features,
                    license_type,
                    days_left: record.days_left(Utc::now()),
                })
            }
            CheckOutcome::Invalid { reason } => {
                self.log_best_effort(
                    ActivityEvent::new(
                        &record.key,
                        &email,
                        ActivityAction::LicenseChecked,
                        json!({ "reason": reason.clone() }),
                        meta.clone(),
                    )
                    .failed(reason.clone()),
                );
                Err(ApiError::InvalidLicense { reason })
            }
        }
    }

    /// Read-only lookup for the public info projection. Does not touch
    /// counters.
    pub fn info(&self, email: &str, license_key: &str) -> Result<LicenseRecord, ApiError> {
        let email = email.trim().to_lowercase();
        self.licenses
            .find_by_email_and_key(&email, license_key)?
            .ok_or(ApiError::NotFound)
    }

    // ── Admin lifecycle operations ───────────────────────────────

    pub fn revoke(&self, license_key: &str, reason: &str) -> Result<(), ApiError> {
        let result = self.persist_with_retry(
            |s| s.find_by_key(license_key),
            |record| {
                lifecycle::revoke(record, reason, Utc::now());
                Ok(())
            },
        )?;
        if result.is_none() {
            return Err(ApiError::NotFound);
        }
        info!("license revoked: {license_key} - reason: {reason}");
        Ok(())
    }

    pub fn reactivate(&self, license_key: &str) -> Result<(), ApiError> {
        let result = self.persist_with_retry(
            |s| s.find_by_key(license_key),
            |record| lifecycle::reactivate(record).map_err(ApiError::from),
        )?;
        if result.is_none() {
            return Err(ApiError::NotFound);
        }
        info!("license reactivated: {license_key}");
        Ok(())
    }

    /// Extends a license, returning the new expiry date.
    pub fn extend(&self, license_key: &str, days: i64) -> Result<DateTime<Utc>, ApiError> {
        let policy = self.extend_policy;
        let result = self.persist_with_retry(
            |s| s.find_by_key(license_key),
            |record| lifecycle::extend(record, days, policy, Utc::now()).map_err(ApiError::from),
        )?;
        match result {
            Some((_, new_expiry)) => {
                info!("license extended: {license_key} - days: {days}");
                Ok(new_expiry)
            }
            None => Err(ApiError::NotFound),
        }
    }

    pub fn list(
        &self,
        filter: LicenseFilter,
        page: u64,
        limit: u64,
    ) -> Result<LicensePage, ApiError> {
        Ok(self.licenses.list(filter, page, limit)?)
    }

    pub fn active_licenses(&self) -> Result<Vec<LicenseRecord>, ApiError> {
        Ok(self.licenses.list_live()?)
    }

    // ── Activity ─────────────────────────────────────────────────

    /// Records a client-reported event. Requires a live license for the
    /// email; the event insert is the primary write here, so its failure
    /// is a real error. The last-checked touch is advisory.
    pub fn log_activity(
        &self,
        email: &str,
        action: ActivityAction,
        data: serde_json::Value,
        meta: &ClientMeta,
    ) -> Result<(), ApiError> {
        let email = email.trim().to_lowercase();
        let Some(record) = self.licenses.find_live_by_email(&email)? else {
            return Err(ApiError::NoLiveLicense);
        };

        self.activity
            .insert(&ActivityEvent::new(&record.key, &email, action, data, meta.clone()))?;

        let touch = self.persist_with_retry(
            |s| s.find_live_by_email(&email),
            |record| {
                record.last_checked = Utc::now();
                Ok(())
            },
        );
        if let Err(e) = touch {
            warn!("last-checked touch failed for {email}: {e}");
        }
        Ok(())
    }

    /// Aggregate stats plus the 20 most recent events, gated on a
    /// currently valid license.
    pub fn user_stats(
        &self,
        email: &str,
        license_key: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<(UserStats, Vec<ActivityEvent>), ApiError> {
        let email = self.require_valid(email, license_key)?;
        let stats = self.activity.user_stats(&email, start, end)?;
        let recent = self.activity.recent_by_email(&email, 20)?;
        Ok((stats, recent))
    }

    /// Per-day breakdown over a time range, gated on a currently valid
    /// license.
    pub fn activity_summary(
        &self,
        email: &str,
        license_key: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DailySummary>, ApiError> {
        let email = self.require_valid(email, license_key)?;
        Ok(self.activity.daily_summary(&email, start, end)?)
    }

    pub fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        let now = Utc::now();
        Ok(DashboardStats {
            licenses: self.licenses.count_by_status()?,
            activities: self
                .activity
                .counts_by_action_since(now - chrono::Duration::days(30))?,
            daily_active_users: self
                .activity
                .daily_active_users(now - chrono::Duration::days(7))?,
        })
    }

    // ── Internals ────────────────────────────────────────────────

    /// Looks up the credential pair and demands a currently valid license.
    fn require_valid(&self, email: &str, license_key: &str) -> Result<String, ApiError> {
        let email = email.trim().to_lowercase();
        let valid = self
            .licenses
            .find_by_email_and_key(&email, license_key)?
            .is_some_and(|record| record.is_valid(Utc::now()));
        if !valid {
            return Err(ApiError::InvalidLicense {
                reason: "Invalid or expired license".to_string(),
            });
        }
        Ok(email)
    }

    /// Load, apply, persist, retrying the whole sequence when another
    /// writer won the version race. Returns `None` when the load found
    /// nothing; an `Err` from `apply` aborts without persisting.
    fn persist_with_retry<T>(
        &self,
        load: impl Fn(&LicenseStore) -> StoreResult<Option<LicenseRecord>>,
        mut apply: impl FnMut(&mut LicenseRecord) -> Result<T, ApiError>,
    ) -> Result<Option<(LicenseRecord, T)>, ApiError> {
        for _ in 0..CAS_RETRIES {
            let Some(mut record) = load(&self.licenses)? else {
                return Ok(None);
            };
            let value = apply(&mut record)?;
            match self.licenses.update(&record) {
                Ok(()) => return Ok(Some((record, value))),
                Err(StoreError::VersionConflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ApiError::Internal(
            "gave up after repeated version conflicts".to_string(),
        ))
    }

    fn log_best_effort(&self, event: ActivityEvent) {
        if let Err(e) = self.activity.insert(&event) {
            warn!("activity log write failed: {e}");
        }
    }
}
