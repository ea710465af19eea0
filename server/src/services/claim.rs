//! Job claim protocol
//!
//! A contractor with an accepted quote or bid claims the job, which flips
//! the `claimed` flag and permanently locks the lead out of the unlock
//! protocol. Claiming is first-come-first-served and runs in one
//! transaction.

use diesel::prelude::*;
use serde::Serialize;

use crate::db::{self, DbPool};
use crate::error::ApiError;
use crate::models::lead::JobLead;
use crate::models::user::User;
use crate::schema::job_leads;
use crate::validation::require_id;

#[derive(Debug, Clone, Serialize)]
pub struct ClaimOutcome {
    pub ok: bool,
}

pub async fn claim_job(
    pool: &DbPool,
    contractor_id: &str,
    job_id: &str,
) -> Result<ClaimOutcome, ApiError> {
    let pool = pool.clone();
    let contractor_id = contractor_id.to_string();
    let job_id = job_id.to_string();
    tokio::task::spawn_blocking(move || claim_job_blocking(&pool, &contractor_id, &job_id))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("blocking task failed: {e}")))?
}

pub fn claim_job_blocking(
    pool: &DbPool,
    contractor_id: &str,
    job_id: &str,
) -> Result<ClaimOutcome, ApiError> {
    let job_id = require_id(job_id, "jobId")?;

    let uid = contractor_id.to_string();
    let job = job_id.clone();
    db::run_in_transaction(pool, move |conn| {
        let user = User::require_contractor(conn, &uid)?;

        let lead = JobLead::find_by_id(conn, &job)?
            .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;
        if lead.claimed {
            return Err(ApiError::FailedPrecondition(
                "Job already claimed".to_string(),
            ));
        }

        let has_acceptance = lead
            .accepted_quote_id
            .as_deref()
            .map(str::trim)
            .is_some_and(|s| !s.is_empty())
            || lead
                .accepted_bid_id
                .as_deref()
                .map(str::trim)
                .is_some_and(|s| !s.is_empty());
        if !has_acceptance {
            return Err(ApiError::FailedPrecondition(
                "Job has no accepted quote or bid".to_string(),
            ));
        }

        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        diesel::update(job_leads::table.find(&job))
            .set((
                job_leads::claimed.eq(true),
                job_leads::claimed_by.eq(&uid),
                job_leads::claimed_by_name.eq(user.display_name()),
                job_leads::claimed_at.eq(&now),
                job_leads::status.eq("accepted"),
            ))
            .execute(conn)?;

        Ok(())
    })?;

    tracing::info!(
        contractor = %log_uid!(contractor_id),
        job = %job_id,
        "job claimed"
    );

    Ok(ClaimOutcome { ok: true })
}
