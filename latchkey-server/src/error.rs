//! API error type and its HTTP mapping.
//!
//! Every handler returns `Result<_, ApiError>`; the `IntoResponse` impl
//! turns failures into the `{"success": false, "message": ...}` envelope.
//! Invalid credentials are deliberately indistinguishable from absent
//! records, and internal failures stay opaque to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use latchkey_license::LicenseError;
use latchkey_store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to API clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input, rejected before touching the store.
    #[error("{0}")]
    Validation(String),

    /// No record for the email+key pair, or record absent entirely; the
    /// same message either way.
    #[error("Invalid email or license key")]
    InvalidCredentials,

    /// Record found but currently failing the validity predicate.
    #[error("{reason}")]
    InvalidLicense { reason: String },

    /// Activity logging requires a live license for the email.
    #[error("No active license found")]
    NoLiveLicense,

    /// Missing or wrong admin API key.
    #[error("Unauthorized - Invalid API key")]
    InvalidApiKey,

    /// Admin lookup by key found nothing.
    #[error("License not found")]
    NotFound,

    /// A live license already exists for the email.
    #[error("Active license already exists for this email")]
    DuplicateActiveLicense,

    /// The requested lifecycle transition is not allowed.
    #[error("{0}")]
    InvalidTransition(String),

    /// Opaque internal failure; the detail is logged, never returned.
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials
            | Self::InvalidLicense { .. }
            | Self::NoLiveLicense
            | Self::InvalidApiKey => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::DuplicateActiveLicense => StatusCode::CONFLICT,
            Self::InvalidTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            tracing::error!("internal error: {detail}");
        }
        let body = ErrorBody {
            success: false,
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => Self::NotFound,
            StoreError::DuplicateActiveLicense => Self::DuplicateActiveLicense,
            StoreError::KeyCollision => Self::Internal("unretried key collision".to_string()),
            StoreError::VersionConflict(key) => {
                Self::Internal(format!("unresolved version conflict for {key}"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<LicenseError> for ApiError {
    fn from(e: LicenseError) -> Self {
        match e {
            LicenseError::NotFound => Self::NotFound,
            LicenseError::DuplicateActiveLicense => Self::DuplicateActiveLicense,
            LicenseError::InvalidTransition(msg) => Self::InvalidTransition(msg),
            LicenseError::InvalidKeyFormat(msg) => Self::Validation(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}
