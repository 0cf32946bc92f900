//! Admin endpoints: issuance, listing, lifecycle operations, dashboard.
//! All routes here sit behind the API-key middleware.

use super::require_email;
use crate::error::ApiError;
use crate::routes::AppState;
use crate::service::DashboardStats;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use latchkey_license::{Features, LicenseRecord, LicenseStatus, LicenseType};
use latchkey_store::LicenseFilter;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Duration bounds accepted for explicit `days` values.
const MAX_DAYS: i64 = 3650;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateRequest {
    email: String,
    #[serde(rename = "type")]
    license_type: Option<LicenseType>,
    days: Option<i64>,
    features: Option<Features>,
    notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IssuedLicense {
    key: String,
    email: String,
    #[serde(rename = "type")]
    license_type: LicenseType,
    expires_at: DateTime<Utc>,
    features: Features,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateResponse {
    success: bool,
    license: IssuedLicense,
}

/// `POST /api/admin/licenses`
pub(crate) async fn create_license(
    State(state): State<AppState>,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<CreateResponse>), ApiError> {
    let email = require_email(&req.email)?;
    require_days_in_range(req.days)?;

    let record = state.service.issue(
        &email,
        req.license_type.unwrap_or(LicenseType::Basic),
        req.days,
        req.features,
        req.notes,
    )?;
    Ok((
        StatusCode::CREATED,
        Json(CreateResponse {
            success: true,
            license: IssuedLicense {
                key: record.key,
                email: record.email,
                license_type: record.license_type,
                expires_at: record.expires_at,
                features: record.features,
            },
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    status: Option<String>,
    #[serde(rename = "type")]
    license_type: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Pagination {
    page: u64,
    limit: u64,
    total: u64,
    pages: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ListResponse {
    success: bool,
    licenses: Vec<LicenseRecord>,
    pagination: Pagination,
}

/// `GET /api/admin/licenses`
pub(crate) async fn list_licenses(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let filter = LicenseFilter {
        status: query
            .status
            .as_deref()
            .map(LicenseStatus::from_str)
            .transpose()
            .map_err(ApiError::Validation)?,
        license_type: query
            .license_type
            .as_deref()
            .map(LicenseType::from_str)
            .transpose()
            .map_err(ApiError::Validation)?,
    };

    let page = state
        .service
        .list(filter, query.page.unwrap_or(1), query.limit.unwrap_or(20))?;
    Ok(Json(ListResponse {
        success: true,
        licenses: page.licenses,
        pagination: Pagination {
            page: page.page,
            limit: page.limit,
            total: page.total,
            pages: page.pages,
        },
    }))
}

#[derive(Debug, Serialize)]
pub(crate) struct ActiveResponse {
    success: bool,
    count: usize,
    licenses: Vec<LicenseRecord>,
}

/// `GET /api/admin/licenses/active`
pub(crate) async fn active_licenses(
    State(state): State<AppState>,
) -> Result<Json<ActiveResponse>, ApiError> {
    let licenses = state.service.active_licenses()?;
    Ok(Json(ActiveResponse {
        success: true,
        count: licenses.len(),
        licenses,
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct RevokeRequest {
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageResponse {
    success: bool,
    message: String,
}

/// `POST /api/admin/licenses/{key}/revoke`
pub(crate) async fn revoke_license(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<RevokeRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let reason = req.reason.unwrap_or_else(|| "Revoked by admin".to_string());
    state.service.revoke(&key, &reason)?;
    Ok(Json(MessageResponse {
        success: true,
        message: "License revoked successfully".to_string(),
    }))
}

/// `POST /api/admin/licenses/{key}/reactivate`
pub(crate) async fn reactivate_license(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.service.reactivate(&key)?;
    Ok(Json(MessageResponse {
        success: true,
        message: "License reactivated successfully".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtendRequest {
    days: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExtendResponse {
    success: bool,
    message: String,
    new_expiry_date: DateTime<Utc>,
}

/// `POST /api/admin/licenses/{key}/extend`
pub(crate) async fn extend_license(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<ExtendRequest>,
) -> Result<Json<ExtendResponse>, ApiError> {
    require_days_in_range(Some(req.days))?;
    let new_expiry_date = state.service.extend(&key, req.days)?;
    Ok(Json(ExtendResponse {
        success: true,
        message: "License extended successfully".to_string(),
        new_expiry_date,
    }))
}

#[derive(Debug, Serialize)]
pub(crate) struct DashboardResponse {
    success: bool,
    stats: DashboardStats,
}

/// `GET /api/admin/dashboard/stats`
pub(crate) async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let stats = state.service.dashboard_stats()?;
    Ok(Json(DashboardResponse {
        success: true,
        stats,
    }))
}

fn require_days_in_range(days: Option<i64>) -> Result<(), ApiError> {
    if let Some(d) = days {
        if !(1..=MAX_DAYS).contains(&d) {
            return Err(ApiError::Validation(format!(
                "days must be between 1 and {MAX_DAYS}"
            )));
        }
    }
    Ok(())
}
