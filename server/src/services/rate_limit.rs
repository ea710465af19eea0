//! Per-user sliding-window rate limiting
//!
//! Each `(uid, operation)` pair keeps a JSON array of recent call
//! timestamps. A call inside the window beyond the budget is refused with
//! the time the window frees up. Store failures fail open: losing the
//! limiter must never take the protocols down with it.

use diesel::prelude::*;

use crate::db::{self, DbPool};
use crate::error::ApiError;
use crate::schema::rate_limits;

/// Budget for one operation: at most `max_calls` in any `window_ms` span.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub op: &'static str,
    pub max_calls: usize,
    pub window_ms: i64,
}

const HOUR_MS: i64 = 60 * 60 * 1000;

pub const UNLOCK_LEAD: RateLimitPolicy = RateLimitPolicy {
    op: "unlockLead",
    max_calls: 120,
    window_ms: HOUR_MS,
};

pub const CLAIM_JOB: RateLimitPolicy = RateLimitPolicy {
    op: "claimJob",
    max_calls: 120,
    window_ms: HOUR_MS,
};

pub const GRANT_LEAD_CREDITS: RateLimitPolicy = RateLimitPolicy {
    op: "grantLeadCredits",
    max_calls: 200,
    window_ms: HOUR_MS,
};

pub async fn enforce(pool: &DbPool, uid: &str, policy: RateLimitPolicy) -> Result<(), ApiError> {
    let pool = pool.clone();
    let uid = uid.to_string();
    tokio::task::spawn_blocking(move || enforce_blocking(&pool, &uid, policy))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("blocking task failed: {e}")))?
}

pub fn enforce_blocking(
    pool: &DbPool,
    uid: &str,
    policy: RateLimitPolicy,
) -> Result<(), ApiError> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    match check_and_record(pool, uid, policy, now_ms) {
        Ok(()) => Ok(()),
        Err(err @ ApiError::ResourceExhausted(_)) => Err(err),
        Err(other) => {
            // Fail open on limiter store trouble.
            tracing::warn!(
                uid = %log_uid!(uid),
                op = policy.op,
                error = %other,
                "rate limiter unavailable, allowing call"
            );
            Ok(())
        }
    }
}

fn check_and_record(
    pool: &DbPool,
    uid: &str,
    policy: RateLimitPolicy,
    now_ms: i64,
) -> Result<(), ApiError> {
    let row_id = format!("{uid}:{}", policy.op);
    db::run_in_transaction(pool, move |conn| {
        let stored: Option<String> = rate_limits::table
            .find(&row_id)
            .select(rate_limits::call_times)
            .first(conn)
            .optional()?;

        // An unparseable array is discarded rather than wedging the caller.
        let mut calls: Vec<i64> = stored
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();
        let window_start = now_ms - policy.window_ms;
        calls.retain(|&t| t > window_start);

        if calls.len() >= policy.max_calls {
            let oldest = calls.iter().copied().min().unwrap_or(now_ms);
            let reset_at = chrono::DateTime::from_timestamp_millis(oldest + policy.window_ms)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "later".to_string());
            return Err(ApiError::ResourceExhausted(format!(
                "Rate limit exceeded. Try again after {reset_at}."
            )));
        }

        calls.push(now_ms);
        let serialized = serde_json::to_string(&calls)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("serialize call times: {e}")))?;
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();

        diesel::insert_into(rate_limits::table)
            .values((
                rate_limits::id.eq(&row_id),
                rate_limits::call_times.eq(&serialized),
                rate_limits::last_call.eq(now_ms),
                rate_limits::updated_at.eq(&now),
            ))
            .on_conflict(rate_limits::id)
            .do_update()
            .set((
                rate_limits::call_times.eq(&serialized),
                rate_limits::last_call.eq(now_ms),
                rate_limits::updated_at.eq(&now),
            ))
            .execute(conn)?;

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;

    const TINY: RateLimitPolicy = RateLimitPolicy {
        op: "testOp",
        max_calls: 3,
        window_ms: HOUR_MS,
    };

    #[test]
    fn test_budget_is_enforced() {
        let pool = test_pool();

        for _ in 0..3 {
            enforce_blocking(&pool, "con-1", TINY).unwrap();
        }
        let err = enforce_blocking(&pool, "con-1", TINY).unwrap_err();
        match err {
            ApiError::ResourceExhausted(msg) => {
                assert!(msg.contains("Rate limit exceeded"));
            }
            other => panic!("expected ResourceExhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_budgets_are_per_user_and_per_operation() {
        let pool = test_pool();

        for _ in 0..3 {
            enforce_blocking(&pool, "con-1", TINY).unwrap();
        }
        // Different user, same op: independent budget.
        enforce_blocking(&pool, "con-2", TINY).unwrap();
        // Same user, different op: independent budget.
        enforce_blocking(&pool, "con-1", UNLOCK_LEAD).unwrap();
    }

    #[test]
    fn test_old_calls_fall_out_of_the_window() {
        let pool = test_pool();
        let now = chrono::Utc::now().timestamp_millis();

        // Two stale calls and one recent call on record.
        let stale = vec![now - TINY.window_ms - 1000, now - TINY.window_ms - 500, now];
        {
            let mut conn = pool.get().unwrap();
            diesel::insert_into(rate_limits::table)
                .values((
                    rate_limits::id.eq("con-3:testOp"),
                    rate_limits::call_times.eq(serde_json::to_string(&stale).unwrap()),
                    rate_limits::last_call.eq(now),
                    rate_limits::updated_at.eq("2026-01-01 00:00:00"),
                ))
                .execute(&mut conn)
                .unwrap();
        }

        // Only one call counts, so two more fit in the budget of three.
        enforce_blocking(&pool, "con-3", TINY).unwrap();
        enforce_blocking(&pool, "con-3", TINY).unwrap();
        assert!(enforce_blocking(&pool, "con-3", TINY).is_err());
    }

    #[test]
    fn test_corrupt_call_times_fail_open() {
        let pool = test_pool();
        {
            let mut conn = pool.get().unwrap();
            diesel::insert_into(rate_limits::table)
                .values((
                    rate_limits::id.eq("con-4:testOp"),
                    rate_limits::call_times.eq("not json"),
                    rate_limits::last_call.eq(0i64),
                    rate_limits::updated_at.eq("2026-01-01 00:00:00"),
                ))
                .execute(&mut conn)
                .unwrap();
        }

        enforce_blocking(&pool, "con-4", TINY).unwrap();
    }
}
