//! HTTP handlers, grouped the way the route table groups them, plus the
//! boundary validation shared between them. Shape errors are rejected here
//! and never reach the lifecycle core.

pub mod activity;
pub mod admin;
pub mod license;

use crate::error::ApiError;
use axum::http::{header, HeaderMap};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use latchkey_license::ClientMeta;

/// Builds client metadata from request headers and the client-reported
/// version field. The IP comes from `X-Forwarded-For` since the service
/// runs behind a proxy.
pub(crate) fn client_meta(headers: &HeaderMap, version: Option<String>) -> ClientMeta {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    ClientMeta {
        ip,
        user_agent,
        client_version: version,
    }
}

/// Normalizes and shape-checks an email. Full RFC validation is the mail
/// system's problem; this rejects obvious garbage before the store sees it.
pub(crate) fn require_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let ok = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
    });
    if !ok {
        return Err(ApiError::Validation(
            "A valid email is required".to_string(),
        ));
    }
    Ok(email)
}

/// Rejects keys that do not match `XXXX-XXXX-XXXX-XXXX`.
pub(crate) fn require_key_format(key: &str) -> Result<(), ApiError> {
    if !latchkey_license::key::is_valid_format(key) {
        return Err(ApiError::Validation(
            "Invalid license key format".to_string(),
        ));
    }
    Ok(())
}

/// Parses a date query parameter: RFC 3339, or a bare `YYYY-MM-DD` taken
/// as midnight UTC.
pub(crate) fn parse_date_param(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    Err(ApiError::Validation(format!("Invalid date: {raw}")))
}
