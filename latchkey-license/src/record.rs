//! The license record data model and validity predicate.

use crate::activity::ClientMeta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a license.
///
/// `Active` and `Trial` are the live states; `Expired` and `Revoked` fail
/// the validity predicate but the record is retained for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    /// License is valid and in its paid window.
    Active,
    /// License is valid and in its trial window.
    Trial,
    /// License passed its expiry and was transitioned by a validity check.
    Expired,
    /// License was explicitly revoked by an operator.
    Revoked,
}

impl LicenseStatus {
    /// Returns true for the live states (`active` and `trial`).
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Active | Self::Trial)
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Trial => "trial",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        };
        write!(f, "{s}")
    }
}

impl FromStr for LicenseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "trial" => Ok(Self::Trial),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            other => Err(format!("unknown license status: {other}")),
        }
    }
}

/// Commercial tier of a license. Immutable after issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    Trial,
    Basic,
    Pro,
    Enterprise,
    /// Operator-defined tier; expects explicit duration/feature overrides.
    Custom,
}

impl LicenseType {
    /// Default validity window in days for this tier.
    #[must_use]
    pub fn duration_days(&self) -> i64 {
        match self {
            Self::Trial => 7,
            Self::Basic => 30,
            Self::Pro => 365,
            Self::Enterprise => 365,
            Self::Custom => 30,
        }
    }

    /// Entitlements unlocked by this tier when no override is supplied.
    #[must_use]
    pub fn default_features(&self) -> Features {
        match self {
            Self::Trial => Features {
                max_threads: 20,
                custom_delays: true,
                advanced_mode: false,
                priority: Priority::Normal,
            },
            Self::Basic | Self::Custom => Features {
                max_threads: 100,
                custom_delays: true,
                advanced_mode: true,
                priority: Priority::Normal,
            },
            Self::Pro => Features {
                max_threads: 500,
                custom_delays: true,
                advanced_mode: true,
                priority: Priority::High,
            },
            Self::Enterprise => Features {
                max_threads: 1000,
                custom_delays: true,
                advanced_mode: true,
                priority: Priority::High,
            },
        }
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Trial => "trial",
            Self::Basic => "basic",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
            Self::Custom => "custom",
        };
        write!(f, "{s}")
    }
}

impl FromStr for LicenseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(Self::Trial),
            "basic" => Ok(Self::Basic),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown license type: {other}")),
        }
    }
}

/// Support priority attached to a feature set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Normal,
    High,
}

/// Entitlements unlocked by a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    pub max_threads: u32,
    pub custom_delays: bool,
    pub advanced_mode: bool,
    pub priority: Priority,
}

/// Revocation marker. `status == false` means never revoked (or reactivated).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedInfo {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

/// Advisory client details attached to a record. Never affects validity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A license record: the unit of consistency for all lifecycle operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRecord {
    /// Opaque identifier, `XXXX-XXXX-XXXX-XXXX`. Immutable after creation.
    pub key: String,
    /// Owner identity, normalized to lowercase.
    pub email: String,
    pub status: LicenseStatus,
    #[serde(rename = "type")]
    pub license_type: LicenseType,
    pub features: Features,
    pub activated_at: DateTime<Utc>,
    /// The sole time-based validity boundary.
    pub expires_at: DateTime<Utc>,
    pub last_checked: DateTime<Utc>,
    pub check_count: u64,
    pub metadata: LicenseMetadata,
    pub revoked: RevokedInfo,
    /// Persistence version for optimistic concurrency. Not part of the wire
    /// representation.
    #[serde(skip)]
    pub version: i64,
}

impl LicenseRecord {
    /// Evaluates the validity predicate against `now`.
    ///
    /// Derived fresh from current field values; never cached.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.revoked.status && self.status.is_live() && now <= self.expires_at
    }

    /// Whole days remaining until expiry, rounded up and floored at zero.
    #[must_use]
    pub fn days_left(&self, now: DateTime<Utc>) -> i64 {
        let remaining = self.expires_at - now;
        if remaining <= chrono::Duration::zero() {
            return 0;
        }
        let secs = remaining.num_seconds();
        // `secs >= 0` here (guarded above), so the unsigned `div_ceil` (stable)
        // yields the same result as the unstable signed one.
        (secs as u64).div_ceil(86_400) as i64
    }

    /// Overwrites last-seen client details, preserving operator notes.
    pub fn touch_metadata(&mut self, meta: &ClientMeta) {
        self.metadata.ip = meta.ip.clone();
        self.metadata.user_agent = meta.user_agent.clone();
        self.metadata.client_version = meta.client_version.clone();
    }
}
