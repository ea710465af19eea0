//! Lead unlock and job claim endpoints
//!
//! Endpoints:
//! - POST /api/leads/unlock            - Unlock a lead (exclusive flag in body)
//! - POST /api/leads/unlock-exclusive  - Legacy exclusive unlock route
//! - POST /api/jobs/{job_id}/claim     - Claim a job with an accepted quote/bid

use actix_web::{post, web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::db::DbPool;
use crate::error::ApiError;
use crate::middleware::authenticated_user;
use crate::models::unlock::UnlockMode;
use crate::services::{claim, lead_unlock, rate_limit};

#[derive(Debug, Deserialize)]
pub struct UnlockLeadRequest {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(default)]
    pub exclusive: bool,
}

#[derive(Debug, Deserialize)]
pub struct UnlockExclusiveRequest {
    #[serde(rename = "jobId")]
    pub job_id: String,
}

#[post("/api/leads/unlock")]
pub async fn unlock_lead(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    body: web::Json<UnlockLeadRequest>,
) -> Result<HttpResponse, ApiError> {
    let uid = authenticated_user(&req)?;
    rate_limit::enforce(&pool, &uid, rate_limit::UNLOCK_LEAD).await?;

    let mode = UnlockMode::from_exclusive_flag(body.exclusive);
    let outcome = lead_unlock::unlock_lead(&pool, &uid, &body.job_id, mode).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Legacy route kept for older clients; always exclusive.
#[post("/api/leads/unlock-exclusive")]
pub async fn unlock_exclusive_lead(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    body: web::Json<UnlockExclusiveRequest>,
) -> Result<HttpResponse, ApiError> {
    let uid = authenticated_user(&req)?;
    rate_limit::enforce(&pool, &uid, rate_limit::UNLOCK_LEAD).await?;

    let outcome =
        lead_unlock::unlock_lead(&pool, &uid, &body.job_id, UnlockMode::Exclusive).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[post("/api/jobs/{job_id}/claim")]
pub async fn claim_job(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let uid = authenticated_user(&req)?;
    rate_limit::enforce(&pool, &uid, rate_limit::CLAIM_JOB).await?;

    let outcome = claim::claim_job(&pool, &uid, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}
