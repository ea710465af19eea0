//! Admin credit adjustment protocol
//!
//! Manual grants and deductions against the non-exclusive pool, restricted
//! to admins. The balance mutation and its audit row commit in one
//! transaction; a deduction that would push the balance negative is refused
//! before any write.

use serde::Serialize;

use crate::db::{self, DbPool};
use crate::error::ApiError;
use crate::models::admin_action::{AdminAction, ACTION_GRANT_LEAD_CREDITS};
use crate::models::user::{self, CreditPool, User};
use crate::services::ledger;
use crate::validation::{require_id, validate_admin_delta};

#[derive(Debug, Clone, Serialize)]
pub struct GrantOutcome {
    pub ok: bool,
    /// New balance of the legacy alias (mirrors the non-exclusive pool).
    pub credits: i32,
}

pub async fn grant_lead_credits(
    pool: &DbPool,
    admin_id: &str,
    target_uid: &str,
    delta: i32,
) -> Result<GrantOutcome, ApiError> {
    let pool = pool.clone();
    let admin_id = admin_id.to_string();
    let target_uid = target_uid.to_string();
    tokio::task::spawn_blocking(move || {
        grant_lead_credits_blocking(&pool, &admin_id, &target_uid, delta)
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("blocking task failed: {e}")))?
}

pub fn grant_lead_credits_blocking(
    pool: &DbPool,
    admin_id: &str,
    target_uid: &str,
    delta: i32,
) -> Result<GrantOutcome, ApiError> {
    let target_uid = require_id(target_uid, "targetUid")?;
    validate_admin_delta(delta)?;

    {
        let mut conn = pool
            .get()
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("pool checkout failed: {e}")))?;
        if !user::is_admin(&mut conn, admin_id)? {
            return Err(ApiError::PermissionDenied(
                "Admin privileges required".to_string(),
            ));
        }
    }

    let admin = admin_id.to_string();
    let target = target_uid.clone();
    let credits = db::run_in_transaction(pool, move |conn| {
        let user = User::find_by_id(conn, &target)?
            .ok_or_else(|| ApiError::NotFound("Target user not found".to_string()))?;
        if !user.is_contractor() {
            return Err(ApiError::PermissionDenied(
                "Target must be a contractor".to_string(),
            ));
        }

        // Re-read under the transaction so the non-negativity check and the
        // write see the same balance.
        if user.lead_credits + delta < 0 {
            return Err(ApiError::FailedPrecondition(
                "Deduction exceeds current balance".to_string(),
            ));
        }

        ledger::apply_delta(conn, &target, CreditPool::NonExclusive, delta)?;
        AdminAction::record(conn, ACTION_GRANT_LEAD_CREDITS, &admin, &target, delta)?;

        ledger::alias_balance(conn, &target)
    })?;

    tracing::info!(
        admin = %log_uid!(admin_id),
        target = %log_uid!(&target_uid),
        delta,
        credits,
        "admin credit adjustment applied"
    );

    Ok(GrantOutcome { ok: true, credits })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;
    use crate::models::user::{grant_admin, NewUser};

    fn seed(pool: &DbPool) {
        let mut conn = pool.get().unwrap();
        grant_admin(&mut conn, "admin-1").unwrap();
        let mut target = NewUser::contractor("con-1");
        target.lead_credits = 5;
        target.credits = 5;
        User::create(&mut conn, target).unwrap();
    }

    #[test]
    fn test_grant_moves_pool_and_alias_and_audits() {
        let pool = test_pool();
        seed(&pool);

        let outcome = grant_lead_credits_blocking(&pool, "admin-1", "con-1", 10).unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.credits, 15);

        let mut conn = pool.get().unwrap();
        let user = User::find_by_id(&mut conn, "con-1").unwrap().unwrap();
        assert_eq!(user.lead_credits, 15);
        assert_eq!(user.credits, 15);

        let audit = AdminAction::find_by_target(&mut conn, "con-1").unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].admin_id, "admin-1");
        assert_eq!(audit[0].delta, 10);
        assert_eq!(audit[0].action_type, ACTION_GRANT_LEAD_CREDITS);
    }

    #[test]
    fn test_deduction_cannot_go_negative() {
        let pool = test_pool();
        seed(&pool);

        let err = grant_lead_credits_blocking(&pool, "admin-1", "con-1", -6).unwrap_err();
        assert!(matches!(err, ApiError::FailedPrecondition(_)));

        let mut conn = pool.get().unwrap();
        let user = User::find_by_id(&mut conn, "con-1").unwrap().unwrap();
        assert_eq!(user.lead_credits, 5);
        // Failed adjustments leave no audit row behind.
        assert!(AdminAction::find_by_target(&mut conn, "con-1")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_deduction_to_exactly_zero_is_allowed() {
        let pool = test_pool();
        seed(&pool);

        let outcome = grant_lead_credits_blocking(&pool, "admin-1", "con-1", -5).unwrap();
        assert_eq!(outcome.credits, 0);
    }

    #[test]
    fn test_non_admin_is_denied() {
        let pool = test_pool();
        seed(&pool);

        let err = grant_lead_credits_blocking(&pool, "con-1", "con-1", 5).unwrap_err();
        assert!(matches!(err, ApiError::PermissionDenied(_)));
    }

    #[test]
    fn test_delta_bounds_and_target_validation() {
        let pool = test_pool();
        seed(&pool);

        assert!(matches!(
            grant_lead_credits_blocking(&pool, "admin-1", "con-1", 0).unwrap_err(),
            ApiError::InvalidArgument(_)
        ));
        assert!(matches!(
            grant_lead_credits_blocking(&pool, "admin-1", "con-1", 1001).unwrap_err(),
            ApiError::InvalidArgument(_)
        ));
        assert!(matches!(
            grant_lead_credits_blocking(&pool, "admin-1", "  ", 5).unwrap_err(),
            ApiError::InvalidArgument(_)
        ));
        assert!(matches!(
            grant_lead_credits_blocking(&pool, "admin-1", "ghost", 5).unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[test]
    fn test_customer_target_is_denied() {
        let pool = test_pool();
        seed(&pool);
        {
            let mut conn = pool.get().unwrap();
            let mut customer = NewUser::contractor("cust-1");
            customer.role = crate::models::user::ROLE_CUSTOMER.to_string();
            User::create(&mut conn, customer).unwrap();
        }

        let err = grant_lead_credits_blocking(&pool, "admin-1", "cust-1", 5).unwrap_err();
        assert!(matches!(err, ApiError::PermissionDenied(_)));
    }
}
