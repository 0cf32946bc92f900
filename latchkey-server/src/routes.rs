//! Router assembly, shared state, and the cross-cutting middleware.

use crate::error::ApiError;
use crate::handlers::{activity, admin, license};
use crate::service::LicenseService;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LicenseService>,
    admin_key: Arc<str>,
}

impl AppState {
    pub fn new(service: LicenseService, admin_key: impl Into<String>) -> Self {
        Self {
            service: Arc::new(service),
            admin_key: admin_key.into().into(),
        }
    }
}

/// Builds the HTTP API router with the given state.
pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/licenses",
            post(admin::create_license).get(admin::list_licenses),
        )
        .route("/licenses/active", get(admin::active_licenses))
        .route("/licenses/{key}/revoke", post(admin::revoke_license))
        .route(
            "/licenses/{key}/reactivate",
            post(admin::reactivate_license),
        )
        .route("/licenses/{key}/extend", post(admin::extend_license))
        .route("/dashboard/stats", get(admin::dashboard_stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth));

    Router::new()
        .route("/health", get(health))
        .route("/api/license/validate", post(license::validate))
        .route("/api/license/check", post(license::check))
        .route("/api/license/info", get(license::info))
        .route("/api/activity/log", post(activity::log_activity))
        .route("/api/activity/stats", get(activity::user_stats))
        .route("/api/activity/summary", get(activity::activity_summary))
        .nest("/api/admin", admin_routes)
        .fallback(not_found)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Rejects admin requests without the expected `x-api-key` header.
async fn admin_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let presented = req.headers().get("x-api-key").and_then(|v| v.to_str().ok());
    if presented != Some(state.admin_key.as_ref()) {
        warn!("unauthorized admin request to {}", req.uri().path());
        return ApiError::InvalidApiKey.into_response();
    }
    next.run(req).await
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;
    info!("{} {} - {}", method, path, response.status().as_u16());
    response
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn not_found() -> Response {
    let body = serde_json::json!({
        "error": "Not Found",
        "message": "The requested resource does not exist",
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}
