//! Activity endpoints: event logging and per-user analytics.

use super::{client_meta, parse_date_param, require_email, require_key_format};
use crate::error::ApiError;
use crate::routes::AppState;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use latchkey_license::{ActivityAction, ActivityEvent};
use latchkey_store::{DailySummary, UserStats};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct LogRequest {
    email: String,
    action: ActivityAction,
    #[serde(default)]
    data: serde_json::Value,
    version: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LogResponse {
    success: bool,
    message: String,
}

/// `POST /api/activity/log`: records a client-reported event. Requires a
/// live license for the email.
pub(crate) async fn log_activity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LogRequest>,
) -> Result<Json<LogResponse>, ApiError> {
    let email = require_email(&req.email)?;
    let meta = client_meta(&headers, req.version);

    state.service.log_activity(&email, req.action, req.data, &meta)?;
    Ok(Json(LogResponse {
        success: true,
        message: "Activity logged successfully".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatsQuery {
    email: String,
    key: String,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatsResponse {
    success: bool,
    stats: UserStats,
    recent_activities: Vec<ActivityEvent>,
}

/// `GET /api/activity/stats`: aggregate counts, posting rollup, and the
/// most recent events.
pub(crate) async fn user_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, ApiError> {
    let email = require_email(&query.email)?;
    require_key_format(&query.key)?;
    let start = query.start_date.as_deref().map(parse_date_param).transpose()?;
    let end = query.end_date.as_deref().map(parse_date_param).transpose()?;

    let (stats, recent_activities) = state.service.user_stats(&email, &query.key, start, end)?;
    Ok(Json(StatsResponse {
        success: true,
        stats,
        recent_activities,
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SummaryQuery {
    email: String,
    key: String,
    period: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SummaryResponse {
    success: bool,
    period: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    summary: Vec<DailySummary>,
}

/// `GET /api/activity/summary`: per-day breakdown over a trailing window.
/// Unknown periods fall back to 7 days.
pub(crate) async fn activity_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let email = require_email(&query.email)?;
    require_key_format(&query.key)?;

    let period = query.period.unwrap_or_else(|| "7d".to_string());
    let window = match period.as_str() {
        "24h" => Duration::hours(24),
        "30d" => Duration::days(30),
        _ => Duration::days(7),
    };
    let end = Utc::now();
    let start = end - window;

    let summary = state
        .service
        .activity_summary(&email, &query.key, start, end)?;
    Ok(Json(SummaryResponse {
        success: true,
        period,
        start_date: start,
        end_date: end,
        summary,
    }))
}
