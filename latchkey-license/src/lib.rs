//! License lifecycle core for Latchkey.
//!
//! This crate holds the decision logic of the license service:
//! - License key generation and format validation
//! - The `LicenseRecord` data model and its validity predicate
//! - The lifecycle state machine: issue, check, revoke, reactivate, extend
//! - Activity event types for usage logging
//!
//! # Design Principles
//!
//! - **Pure transitions**: every lifecycle function is a synchronous
//!   transformation of a record. Loading and persisting are the caller's
//!   job, which keeps the state machine testable without a store.
//! - **Validity is never cached**: `is_valid` is derived from current field
//!   values on every evaluation.
//! - **Activity is observational**: events never gate lifecycle decisions.
//!
//! # License Key Format
//!
//! Keys are formatted as `XXXX-XXXX-XXXX-XXXX`: four dash-separated groups
//! of four uppercase alphanumeric characters. Uniqueness is enforced by the
//! store, not the generator.

mod activity;
mod error;
pub mod key;
pub mod lifecycle;
mod record;

pub use activity::{ActivityAction, ActivityEvent, ClientMeta};
pub use error::{LicenseError, LicenseResult};
pub use lifecycle::{CheckOutcome, ExtendPolicy};
pub use record::{
    Features, LicenseMetadata, LicenseRecord, LicenseStatus, LicenseType, Priority, RevokedInfo,
};
