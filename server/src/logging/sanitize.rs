//! Log sanitization
//!
//! User ids and payment session ids are stable identifiers; logging them in
//! full allows correlation across log streams. Truncated forms keep enough
//! entropy to debug with.

/// Sanitize a user/contractor id for logs.
///
/// Format: "abc123...f9" (first 6 + last 2 chars)
pub fn sanitize_uid(uid: &str) -> String {
    truncate(uid, 10, 6, 2).unwrap_or_else(|| "<short-id>".to_string())
}

/// Sanitize a payment session id for logs.
///
/// Session ids carry a provider prefix ("cs_..."); keep it plus a short tail.
pub fn sanitize_session_id(session_id: &str) -> String {
    truncate(session_id, 12, 8, 4).unwrap_or_else(|| "<short-session>".to_string())
}

/// Keep `head` leading and `tail` trailing characters of an id at least
/// `min` characters long. Counts characters, not bytes: identity providers
/// hand out ids we do not control, and a byte slice through a multi-byte
/// character would panic.
fn truncate(id: &str, min: usize, head: usize, tail: usize) -> Option<String> {
    let count = id.chars().count();
    if count < min {
        return None;
    }
    let lead: String = id.chars().take(head).collect();
    let trail: String = id.chars().skip(count - tail).collect();
    Some(format!("{lead}...{trail}"))
}
