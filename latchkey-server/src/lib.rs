//! HTTP API for the Latchkey license service.
//!
//! The server is thin plumbing around two layers it composes:
//! [`LicenseService`] sequences load → pure lifecycle transition → persist
//! → best-effort activity log, and the handlers translate that into the
//! JSON-over-HTTP surface. Request shape validation happens at the
//! boundary; the lifecycle core never sees malformed input.

mod error;
mod handlers;
mod routes;
mod service;

pub use error::ApiError;
pub use routes::{build_router, AppState};
pub use service::{DashboardStats, LicenseGrant, LicenseService};
