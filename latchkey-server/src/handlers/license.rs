//! Client-facing license endpoints: validate, check, info.

use super::{client_meta, require_email, require_key_format};
use crate::error::ApiError;
use crate::routes::AppState;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use latchkey_license::{Features, LicenseStatus, LicenseType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct ValidateRequest {
    email: String,
    key: String,
    version: Option<String>,
}

/// Validate/check success payload. `expiresAt` crosses the wire as epoch
/// milliseconds on these two endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ValidateResponse {
    success: bool,
    expires_at: i64,
    features: Features,
    #[serde(rename = "type")]
    license_type: LicenseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    days_left: Option<i64>,
}

/// `POST /api/license/validate`: activation. A validity check plus a
/// metadata touch and an activation event.
pub(crate) async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let email = require_email(&req.email)?;
    require_key_format(&req.key)?;
    let meta = client_meta(&headers, req.version);

    let grant = state.service.validate_and_activate(&email, &req.key, &meta)?;
    Ok(Json(ValidateResponse {
        success: true,
        expires_at: grant.expires_at.timestamp_millis(),
        features: grant.features,
        license_type: grant.license_type,
        message: Some("License activated successfully".to_string()),
        days_left: None,
    }))
}

/// `POST /api/license/check`: periodic validity poll.
pub(crate) async fn check(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let email = require_email(&req.email)?;
    require_key_format(&req.key)?;
    let meta = client_meta(&headers, req.version);

    let grant = state.service.check(&email, &req.key, &meta)?;
    Ok(Json(ValidateResponse {
        success: true,
        expires_at: grant.expires_at.timestamp_millis(),
        features: grant.features,
        license_type: grant.license_type,
        message: None,
        days_left: Some(grant.days_left),
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct InfoQuery {
    email: String,
    key: String,
}

/// Public-safe projection of a license record: no counters, no metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LicenseInfo {
    email: String,
    #[serde(rename = "type")]
    license_type: LicenseType,
    status: LicenseStatus,
    features: Features,
    activated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    days_left: i64,
    is_valid: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct InfoResponse {
    success: bool,
    license: LicenseInfo,
}

/// `GET /api/license/info`: read-only; does not bump counters.
pub(crate) async fn info(
    State(state): State<AppState>,
    Query(query): Query<InfoQuery>,
) -> Result<Json<InfoResponse>, ApiError> {
    let email = require_email(&query.email)?;
    require_key_format(&query.key)?;

    let record = state.service.info(&email, &query.key)?;
    let now = Utc::now();
    Ok(Json(InfoResponse {
        success: true,
        license: LicenseInfo {
            email: record.email.clone(),
            license_type: record.license_type,
            status: record.status,
            features: record.features.clone(),
            activated_at: record.activated_at,
            expires_at: record.expires_at,
            days_left: (record.expires_at - now).num_days().max(0),
            is_valid: record.is_valid(now),
        },
    }))
}
