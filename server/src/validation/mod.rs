//! Input validation modules
//!
//! Boundary checks for request payloads before any protocol work starts.

pub mod input;

pub use input::{require_id, validate_admin_delta, MAX_ADMIN_CREDIT_DELTA, MAX_ID_LENGTH};
