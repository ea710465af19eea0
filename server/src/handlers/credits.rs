//! Admin credit adjustment endpoint
//!
//! POST /api/admin/credits/grant - grant or deduct non-exclusive credits

use actix_web::{post, web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::db::DbPool;
use crate::error::ApiError;
use crate::middleware::authenticated_user;
use crate::services::{admin_credits, rate_limit};

#[derive(Debug, Deserialize)]
pub struct GrantCreditsRequest {
    #[serde(rename = "targetUid")]
    pub target_uid: String,
    pub delta: i32,
}

#[post("/api/admin/credits/grant")]
pub async fn grant_credits(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    body: web::Json<GrantCreditsRequest>,
) -> Result<HttpResponse, ApiError> {
    let uid = authenticated_user(&req)?;
    rate_limit::enforce(&pool, &uid, rate_limit::GRANT_LEAD_CREDITS).await?;

    let outcome =
        admin_credits::grant_lead_credits(&pool, &uid, &body.target_uid, body.delta).await?;
    Ok(HttpResponse::Ok().json(outcome))
}
