//! Account ledger: the single mutation point for credit balances.
//!
//! Every protocol debits or credits an account through [`apply_delta`].
//! Centralizing the write keeps the legacy `credits` alias in lockstep with
//! the non-exclusive pool; no other code touches the credit columns.
//!
//! All functions here operate on an open transaction's connection; they never
//! begin or commit transactions themselves.

use diesel::prelude::*;

use crate::error::ApiError;
use crate::models::user::{CreditPool, NewUser, User};
use crate::schema::users;

/// Atomically add `delta` to one of an account's credit pools.
///
/// Non-exclusive deltas also move the legacy `credits` alias. Accounts are
/// created implicitly on a first positive grant (webhook fulfillment can
/// land before the contractor profile write completes); a debit against a
/// missing account is an error.
pub fn apply_delta(
    conn: &mut SqliteConnection,
    user_id: &str,
    pool: CreditPool,
    delta: i32,
) -> Result<(), ApiError> {
    let updated = match pool {
        CreditPool::NonExclusive => diesel::update(users::table.find(user_id))
            .set((
                users::lead_credits.eq(users::lead_credits + delta),
                users::credits.eq(users::credits + delta),
            ))
            .execute(conn)?,
        CreditPool::Exclusive => diesel::update(users::table.find(user_id))
            .set(users::exclusive_lead_credits.eq(users::exclusive_lead_credits + delta))
            .execute(conn)?,
    };

    if updated == 0 {
        if delta < 0 {
            return Err(ApiError::NotFound(format!(
                "Account {user_id} not found"
            )));
        }
        let mut new_user = NewUser::contractor(user_id);
        match pool {
            CreditPool::NonExclusive => {
                new_user.lead_credits = delta;
                new_user.credits = delta;
            }
            CreditPool::Exclusive => new_user.exclusive_lead_credits = delta,
        }
        diesel::insert_into(users::table)
            .values(&new_user)
            .execute(conn)?;
    }

    Ok(())
}

/// Current balance of one pool. The account must exist.
pub fn balance(
    conn: &mut SqliteConnection,
    user_id: &str,
    pool: CreditPool,
) -> Result<i32, ApiError> {
    let user = User::find_by_id(conn, user_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Account {user_id} not found")))?;
    Ok(user.pool_balance(pool))
}

/// Balance of the legacy alias field (mirrors the non-exclusive pool).
pub fn alias_balance(conn: &mut SqliteConnection, user_id: &str) -> Result<i32, ApiError> {
    let user = User::find_by_id(conn, user_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Account {user_id} not found")))?;
    Ok(user.credits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;

    #[test]
    fn test_alias_tracks_non_exclusive_pool() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();

        apply_delta(&mut conn, "con-1", CreditPool::NonExclusive, 5).unwrap();
        apply_delta(&mut conn, "con-1", CreditPool::NonExclusive, -2).unwrap();

        let user = User::find_by_id(&mut conn, "con-1").unwrap().unwrap();
        assert_eq!(user.lead_credits, 3);
        assert_eq!(user.credits, 3);
        assert_eq!(user.exclusive_lead_credits, 0);
    }

    #[test]
    fn test_exclusive_pool_leaves_alias_alone() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();

        apply_delta(&mut conn, "con-2", CreditPool::Exclusive, 10).unwrap();
        apply_delta(&mut conn, "con-2", CreditPool::Exclusive, -1).unwrap();

        let user = User::find_by_id(&mut conn, "con-2").unwrap().unwrap();
        assert_eq!(user.exclusive_lead_credits, 9);
        assert_eq!(user.lead_credits, 0);
        assert_eq!(user.credits, 0);
    }

    #[test]
    fn test_implicit_account_creation_on_grant() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();

        assert!(User::find_by_id(&mut conn, "con-3").unwrap().is_none());
        apply_delta(&mut conn, "con-3", CreditPool::Exclusive, 4).unwrap();

        let user = User::find_by_id(&mut conn, "con-3").unwrap().unwrap();
        assert!(user.is_contractor());
        assert_eq!(user.exclusive_lead_credits, 4);
    }

    #[test]
    fn test_debit_against_missing_account_fails() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();

        let err = apply_delta(&mut conn, "ghost", CreditPool::NonExclusive, -1).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
