//! Pure lifecycle transitions for license records.
//!
//! Every function here is a synchronous transformation of a record: the
//! caller loads, calls, and persists. Nothing in this module performs I/O,
//! and a failed persist must not be treated as an applied transition.

use crate::error::{LicenseError, LicenseResult};
use crate::record::{
    Features, LicenseMetadata, LicenseRecord, LicenseStatus, LicenseType, RevokedInfo,
};
use chrono::{DateTime, Duration, Utc};

/// Outcome of a validity check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Valid {
        expires_at: DateTime<Utc>,
        features: Features,
        license_type: LicenseType,
    },
    Invalid {
        reason: String,
    },
}

impl CheckOutcome {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// The failure reason, if the check failed.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Valid { .. } => None,
            Self::Invalid { reason } => Some(reason),
        }
    }
}

/// Governs whether a license may be extended while far from expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendPolicy {
    /// Any license may be extended at any time.
    Always,
    /// Only licenses within `within_days` of expiry (or already past it)
    /// may be extended.
    NearExpiryOnly { within_days: i64 },
}

impl Default for ExtendPolicy {
    fn default() -> Self {
        Self::Always
    }
}

/// Issues a new license record.
///
/// `days` overrides the tier's default duration and `features` overrides
/// the policy table. Trial licenses start in `trial` status, everything
/// else in `active`. The one-live-license-per-email invariant is the
/// caller's responsibility (enforced at insert time by the store).
///
/// # Errors
///
/// Returns `InvalidTransition` if an explicit `days` override is not
/// positive.
pub fn issue(
    key: String,
    email: &str,
    license_type: LicenseType,
    days: Option<i64>,
    features: Option<Features>,
    metadata: LicenseMetadata,
    now: DateTime<Utc>,
) -> LicenseResult<LicenseRecord> {
    if let Some(d) = days {
        if d <= 0 {
            return Err(LicenseError::InvalidTransition(
                "license duration must be positive".to_string(),
            ));
        }
    }
    let days = days.unwrap_or_else(|| license_type.duration_days());
    let status = if license_type == LicenseType::Trial {
        LicenseStatus::Trial
    } else {
        LicenseStatus::Active
    };

    Ok(LicenseRecord {
        key,
        email: email.trim().to_lowercase(),
        status,
        license_type,
        features: features.unwrap_or_else(|| license_type.default_features()),
        activated_at: now,
        expires_at: now + Duration::days(days),
        last_checked: now,
        check_count: 0,
        metadata,
        revoked: RevokedInfo::default(),
        version: 0,
    })
}

/// Evaluates validity, updating the observability counters in place.
///
/// Counters are bumped regardless of outcome. The expiry check runs before
/// the revocation check, so a license that is both past expiry and revoked
/// reports "License expired", never "License revoked". Mutations are not
/// persisted here; the caller owns the write.
pub fn check_validity(record: &mut LicenseRecord, now: DateTime<Utc>) -> CheckOutcome {
    record.check_count += 1;
    record.last_checked = now;

    if now > record.expires_at {
        record.status = LicenseStatus::Expired;
        return CheckOutcome::Invalid {
            reason: "License expired".to_string(),
        };
    }

    if record.revoked.status {
        let reason = record.revoked.reason.as_deref().unwrap_or("unspecified");
        return CheckOutcome::Invalid {
            reason: format!("License revoked: {reason}"),
        };
    }

    if !record.status.is_live() {
        return CheckOutcome::Invalid {
            reason: format!("License status: {}", record.status),
        };
    }

    CheckOutcome::Valid {
        expires_at: record.expires_at,
        features: record.features.clone(),
        license_type: record.license_type,
    }
}

/// Revokes a license, recording the reason and timestamp.
///
/// Does not alter `expires_at`. Revoking an already-revoked license
/// overwrites the recorded reason.
pub fn revoke(record: &mut LicenseRecord, reason: &str, now: DateTime<Utc>) {
    record.status = LicenseStatus::Revoked;
    record.revoked = RevokedInfo {
        status: true,
        reason: Some(reason.to_string()),
        date: Some(now),
    };
}

/// Reactivates a revoked license.
///
/// Restores `active` status and clears the revocation marker. Does not
/// touch `expires_at`: if the validity window lapsed while revoked, the
/// license must be separately extended.
///
/// # Errors
///
/// Returns `InvalidTransition` unless the record is currently `revoked`.
pub fn reactivate(record: &mut LicenseRecord) -> LicenseResult<()> {
    if record.status != LicenseStatus::Revoked {
        return Err(LicenseError::InvalidTransition(format!(
            "cannot reactivate a {} license",
            record.status
        )));
    }
    record.status = LicenseStatus::Active;
    record.revoked = RevokedInfo::default();
    Ok(())
}

/// Extends a license by `days`, measured from whichever is later of the
/// current expiry and `now`, so an already-expired license gains the full
/// `days` from now rather than from its stale expiry date. An `expired`
/// license becomes `active`; other statuses are unchanged.
///
/// # Errors
///
/// Returns `InvalidTransition` if `days` is not positive, or if the policy
/// disallows extending this far from expiry.
pub fn extend(
    record: &mut LicenseRecord,
    days: i64,
    policy: ExtendPolicy,
    now: DateTime<Utc>,
) -> LicenseResult<DateTime<Utc>> {
    if days <= 0 {
        return Err(LicenseError::InvalidTransition(
            "extension days must be positive".to_string(),
        ));
    }

    if let ExtendPolicy::NearExpiryOnly { within_days } = policy {
        if record.expires_at - now > Duration::days(within_days) {
            return Err(LicenseError::InvalidTransition(format!(
                "license has more than {within_days} days remaining"
            )));
        }
    }

    let base = if record.expires_at > now {
        record.expires_at
    } else {
        now
    };
    record.expires_at = base + Duration::days(days);

    if record.status == LicenseStatus::Expired {
        record.status = LicenseStatus::Active;
    }

    Ok(record.expires_at)
}
