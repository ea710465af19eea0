//! Lead unlock protocol
//!
//! Exchanges one credit of the requested mode for visibility into a job's
//! contact details. The whole read-check-write sequence runs inside one
//! immediate transaction: under concurrent exclusive attempts on the same
//! job, SQLite serializes the writers, so the loser re-reads the lead on its
//! turn and observes the just-written owner.
//!
//! Failure results are terminal; the protocol never retries them. Caller
//! retries are safe because a fulfilled unlock leaves a ledger entry that
//! short-circuits the replay before any mutation.

use serde::Serialize;

use crate::db::{self, DbPool};
use crate::error::ApiError;
use crate::models::lead::{JobLead, LeadState};
use crate::models::unlock::{IdempotencyKey, UnlockLedgerEntry, UnlockMode};
use crate::models::user::User;
use crate::services::ledger;

#[derive(Debug, Clone, Serialize)]
pub struct UnlockOutcome {
    pub ok: bool,
    /// Remaining balance of the debited pool.
    pub credits: i32,
    #[serde(skip)]
    pub replayed: bool,
}

pub async fn unlock_lead(
    pool: &DbPool,
    contractor_id: &str,
    job_id: &str,
    mode: UnlockMode,
) -> Result<UnlockOutcome, ApiError> {
    let pool = pool.clone();
    let contractor_id = contractor_id.to_string();
    let job_id = job_id.to_string();
    tokio::task::spawn_blocking(move || unlock_lead_blocking(&pool, &contractor_id, &job_id, mode))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("blocking task failed: {e}")))?
}

pub fn unlock_lead_blocking(
    pool: &DbPool,
    contractor_id: &str,
    job_id: &str,
    mode: UnlockMode,
) -> Result<UnlockOutcome, ApiError> {
    let job_id = job_id.trim();
    if job_id.is_empty() {
        return Err(ApiError::InvalidArgument("jobId required".to_string()));
    }

    // Role check against a separate low-contention table, outside the
    // transaction. The balance itself is re-read inside the transaction.
    {
        let mut conn = pool
            .get()
            .map_err(|e| ApiError::Unavailable(format!("connection pool exhausted: {e}")))?;
        User::require_contractor(&mut conn, contractor_id)?;
    }

    let key = IdempotencyKey::lead_unlock(job_id, contractor_id, mode);

    let outcome = db::run_in_transaction(pool, |conn| {
        let lead = JobLead::find_by_id(conn, job_id)?
            .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;

        // Idempotent replay: the unlock already happened, return the current
        // balance without touching anything.
        if UnlockLedgerEntry::exists(conn, &key)? {
            let credits = ledger::balance(conn, contractor_id, mode.pool())?;
            return Ok(UnlockOutcome {
                ok: true,
                credits,
                replayed: true,
            });
        }

        let credits_available = ledger::balance(conn, contractor_id, mode.pool())?;
        if credits_available < 1 {
            return Err(ApiError::FailedPrecondition(
                "Not enough credits".to_string(),
            ));
        }

        match lead.state() {
            LeadState::Claimed => {
                return Err(ApiError::FailedPrecondition(
                    "Job already claimed".to_string(),
                ));
            }
            LeadState::ExclusivelyLocked { owner } if owner != contractor_id => {
                // An exclusive lock forecloses unlocks by everyone else,
                // whichever mode they ask for.
                return Err(ApiError::FailedPrecondition(
                    "This lead has already been purchased as exclusive by another contractor."
                        .to_string(),
                ));
            }
            _ => {}
        }

        if mode.is_exclusive() {
            // Exclusive requires being the first buyer (or the sole existing
            // buyer upgrading; the earlier non-exclusive credit is not
            // refunded on upgrade).
            let buyers = JobLead::buyers(conn, job_id)?;
            if !buyers.is_empty() && !buyers.iter().any(|b| b == contractor_id) {
                return Err(ApiError::FailedPrecondition(
                    "This lead has already been purchased by another contractor.".to_string(),
                ));
            }
        }

        ledger::apply_delta(conn, contractor_id, mode.pool(), -1)?;
        JobLead::add_buyer(conn, job_id, contractor_id)?;
        match mode {
            UnlockMode::Exclusive => {
                JobLead::set_exclusive_owner(conn, job_id, contractor_id)?;
            }
            UnlockMode::NonExclusive => {
                JobLead::stamp_non_exclusive_unlock(conn, job_id)?;
            }
        }
        UnlockLedgerEntry::create(conn, &key, job_id, contractor_id, mode)?;

        let credits = ledger::balance(conn, contractor_id, mode.pool())?;
        Ok(UnlockOutcome {
            ok: true,
            credits,
            replayed: false,
        })
    })?;

    if outcome.replayed {
        tracing::info!(
            contractor = %log_uid!(contractor_id),
            job_id,
            exclusive = mode.is_exclusive(),
            "unlock replayed idempotently"
        );
    } else {
        tracing::info!(
            contractor = %log_uid!(contractor_id),
            job_id,
            exclusive = mode.is_exclusive(),
            credits_left = outcome.credits,
            "lead unlocked"
        );
    }

    Ok(outcome)
}
