//! Activity events: append-only usage records tied to a license.
//!
//! Events are observational. They never gate lifecycle decisions, and a
//! failed event write must never fail the operation that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Client-reported action types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    LicenseActivated,
    LicenseChecked,
    LicenseDeactivated,
    ThreadsExtracted,
    PostingStarted,
    PostingCompleted,
    PostingStopped,
    SettingsUpdated,
    ErrorOccurred,
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LicenseActivated => "license_activated",
            Self::LicenseChecked => "license_checked",
            Self::LicenseDeactivated => "license_deactivated",
            Self::ThreadsExtracted => "threads_extracted",
            Self::PostingStarted => "posting_started",
            Self::PostingCompleted => "posting_completed",
            Self::PostingStopped => "posting_stopped",
            Self::SettingsUpdated => "settings_updated",
            Self::ErrorOccurred => "error_occurred",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ActivityAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "license_activated" => Ok(Self::LicenseActivated),
            "license_checked" => Ok(Self::LicenseChecked),
            "license_deactivated" => Ok(Self::LicenseDeactivated),
            "threads_extracted" => Ok(Self::ThreadsExtracted),
            "posting_started" => Ok(Self::PostingStarted),
            "posting_completed" => Ok(Self::PostingCompleted),
            "posting_stopped" => Ok(Self::PostingStopped),
            "settings_updated" => Ok(Self::SettingsUpdated),
            "error_occurred" => Ok(Self::ErrorOccurred),
            other => Err(format!("unknown activity action: {other}")),
        }
    }
}

/// Request-scoped client details attached to events and license metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_version: Option<String>,
}

/// An immutable usage event. Owned by the activity log; never mutated or
/// deleted once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub license_key: String,
    pub email: String,
    pub action: ActivityAction,
    /// Opaque client payload.
    pub data: serde_json::Value,
    pub meta: ClientMeta,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ActivityEvent {
    /// Creates a successful event stamped with the current time.
    #[must_use]
    pub fn new(
        license_key: impl Into<String>,
        email: impl Into<String>,
        action: ActivityAction,
        data: serde_json::Value,
        meta: ClientMeta,
    ) -> Self {
        let email: String = email.into();
        Self {
            license_key: license_key.into(),
            email: email.trim().to_lowercase(),
            action,
            data,
            meta,
            timestamp: Utc::now(),
            success: true,
            error_message: None,
        }
    }

    /// Marks the event as failed with the given message.
    #[must_use]
    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(message.into());
        self
    }
}
