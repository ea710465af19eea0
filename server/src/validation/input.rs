//! Identifier and admin-delta validation
//!
//! Identifiers (job ids, uids) arrive as opaque strings from the identity
//! provider and clients; they must be non-empty after trimming and bounded
//! in length. Admin grant deltas are bounded so a typo cannot mint an
//! unbounded number of credits in one call.

use crate::error::ApiError;

/// Upper bound on any id accepted at the boundary.
pub const MAX_ID_LENGTH: usize = 128;

/// Largest credit delta a single admin grant may carry, in either direction.
pub const MAX_ADMIN_CREDIT_DELTA: i32 = 1000;

/// Trim and validate an opaque identifier. Returns the trimmed value.
pub fn require_id(raw: &str, field: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidArgument(format!("{field} required")));
    }
    if trimmed.len() > MAX_ID_LENGTH {
        return Err(ApiError::InvalidArgument(format!("{field} too long")));
    }
    Ok(trimmed.to_string())
}

/// Validate an admin credit grant delta: non-zero and within bounds.
pub fn validate_admin_delta(delta: i32) -> Result<(), ApiError> {
    if delta == 0 {
        return Err(ApiError::InvalidArgument(
            "delta must be a non-zero integer".to_string(),
        ));
    }
    // Range check instead of abs(): abs() overflows on i32::MIN.
    if !(-MAX_ADMIN_CREDIT_DELTA..=MAX_ADMIN_CREDIT_DELTA).contains(&delta) {
        return Err(ApiError::InvalidArgument(format!(
            "delta must be between -{MAX_ADMIN_CREDIT_DELTA} and {MAX_ADMIN_CREDIT_DELTA}"
        )));
    }
    Ok(())
}
