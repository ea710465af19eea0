//! Credit account model
//!
//! A user row carries the per-contractor credit balances: `lead_credits`
//! (non-exclusive pool), `exclusive_lead_credits` (exclusive pool) and
//! `credits`, a backwards-compatible alias that must always mirror
//! `lead_credits`. Balance mutations go through `services::ledger` only.

use anyhow::{Context, Result};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{admins, users};

pub const ROLE_CONTRACTOR: &str = "contractor";
pub const ROLE_CUSTOMER: &str = "customer";

/// The two independent credit pools on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditPool {
    NonExclusive,
    Exclusive,
}

impl CreditPool {
    /// Wire name used in payment metadata and fulfillment markers.
    pub fn credit_type(self) -> &'static str {
        match self {
            CreditPool::NonExclusive => "non_exclusive",
            CreditPool::Exclusive => "exclusive",
        }
    }

    /// Normalize a raw credit-type string; anything unrecognized falls back
    /// to non-exclusive (the legacy default).
    pub fn from_credit_type(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "exclusive" | "ex" => CreditPool::Exclusive,
            _ => CreditPool::NonExclusive,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub role: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub lead_credits: i32,
    pub exclusive_lead_credits: i32,
    pub credits: i32,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: String,
    pub role: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub lead_credits: i32,
    pub exclusive_lead_credits: i32,
    pub credits: i32,
    pub created_at: String,
}

impl NewUser {
    pub fn contractor(id: &str) -> Self {
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        Self {
            id: id.to_string(),
            role: ROLE_CONTRACTOR.to_string(),
            name: None,
            company: None,
            lead_credits: 0,
            exclusive_lead_credits: 0,
            credits: 0,
            created_at: now,
        }
    }
}

impl User {
    pub fn create(conn: &mut SqliteConnection, new_user: NewUser) -> Result<Self> {
        let user_id = new_user.id.clone();
        diesel::insert_into(users::table)
            .values(&new_user)
            .execute(conn)
            .context("Failed to insert user")?;
        users::table
            .find(user_id)
            .first(conn)
            .context("Failed to retrieve created user")
    }

    pub fn find_by_id(conn: &mut SqliteConnection, user_id: &str) -> QueryResult<Option<Self>> {
        users::table.find(user_id).first(conn).optional()
    }

    pub fn is_contractor(&self) -> bool {
        self.role.trim().eq_ignore_ascii_case(ROLE_CONTRACTOR)
    }

    /// Display name for claim records: company, else name, else the uid.
    pub fn display_name(&self) -> String {
        let company = self.company.as_deref().unwrap_or("").trim();
        if !company.is_empty() {
            return company.to_string();
        }
        let name = self.name.as_deref().unwrap_or("").trim();
        if !name.is_empty() {
            return name.to_string();
        }
        self.id.clone()
    }

    /// Load a profile and require the contractor role.
    ///
    /// A missing profile is a precondition failure (the account exists in
    /// the identity provider but was never provisioned here); a wrong role
    /// is a permission failure.
    pub fn require_contractor(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> Result<Self, crate::error::ApiError> {
        use crate::error::ApiError;

        let user = Self::find_by_id(conn, user_id)?
            .ok_or_else(|| ApiError::FailedPrecondition("User profile missing".to_string()))?;
        if !user.is_contractor() {
            return Err(ApiError::PermissionDenied(
                "Contractor account required".to_string(),
            ));
        }
        Ok(user)
    }

    pub fn pool_balance(&self, pool: CreditPool) -> i32 {
        match pool {
            CreditPool::NonExclusive => self.lead_credits,
            CreditPool::Exclusive => self.exclusive_lead_credits,
        }
    }
}

/// Admin privilege check: presence of a row in `admins` grants privilege.
pub fn is_admin(conn: &mut SqliteConnection, user_id: &str) -> QueryResult<bool> {
    let found: Option<String> = admins::table
        .find(user_id)
        .select(admins::id)
        .first(conn)
        .optional()?;
    Ok(found.is_some())
}

/// Grant admin privilege (seeding/tooling only; no API endpoint exists).
pub fn grant_admin(conn: &mut SqliteConnection, user_id: &str) -> Result<()> {
    let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    diesel::insert_or_ignore_into(admins::table)
        .values((admins::id.eq(user_id), admins::created_at.eq(now)))
        .execute(conn)
        .context("Failed to insert admin")?;
    Ok(())
}
