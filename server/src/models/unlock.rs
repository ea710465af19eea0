//! Unlock ledger model
//!
//! One immutable row per (job, contractor, mode); its presence alone marks
//! the unlock as already fulfilled. The row id is an [`IdempotencyKey`], a
//! hash with a fixed construction rule rather than an ad hoc concatenated
//! string, so the key format is independent of the id contents.

use anyhow::{Context, Result};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::user::CreditPool;
use crate::schema::lead_unlocks;

/// Requested unlock mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockMode {
    NonExclusive,
    Exclusive,
}

impl UnlockMode {
    pub fn from_exclusive_flag(exclusive: bool) -> Self {
        if exclusive {
            UnlockMode::Exclusive
        } else {
            UnlockMode::NonExclusive
        }
    }

    pub fn is_exclusive(self) -> bool {
        matches!(self, UnlockMode::Exclusive)
    }

    /// Short tag used in the idempotency key construction.
    pub fn tag(self) -> &'static str {
        match self {
            UnlockMode::NonExclusive => "ne",
            UnlockMode::Exclusive => "ex",
        }
    }

    /// Which credit pool this mode debits.
    pub fn pool(self) -> CreditPool {
        match self {
            UnlockMode::NonExclusive => CreditPool::NonExclusive,
            UnlockMode::Exclusive => CreditPool::Exclusive,
        }
    }

    /// Ledger-entry source label (kept from the original data for audit
    /// continuity).
    pub fn source(self) -> &'static str {
        match self {
            UnlockMode::NonExclusive => "credits",
            UnlockMode::Exclusive => "exclusive_credits",
        }
    }
}

/// Deterministic idempotency key for a ledger entry.
///
/// Construction rule: `sha256(job_id | contractor_id | mode_tag)` with `|`
/// separators, hex-encoded. The same (job, contractor, mode) tuple always
/// maps to the same key; distinct tuples cannot collide on a separator
/// ambiguity because the separator is hashed, not concatenated into the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn lead_unlock(job_id: &str, contractor_id: &str, mode: UnlockMode) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(job_id.as_bytes());
        hasher.update(b"|");
        hasher.update(contractor_id.as_bytes());
        hasher.update(b"|");
        hasher.update(mode.tag().as_bytes());
        IdempotencyKey(format!("unlock:{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = lead_unlocks)]
pub struct UnlockLedgerEntry {
    pub id: String,
    pub job_id: String,
    pub contractor_id: String,
    pub exclusive: bool,
    pub source: String,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = lead_unlocks)]
pub struct NewUnlockLedgerEntry {
    pub id: String,
    pub job_id: String,
    pub contractor_id: String,
    pub exclusive: bool,
    pub source: String,
    pub created_at: String,
}

impl UnlockLedgerEntry {
    pub fn exists(conn: &mut SqliteConnection, key: &IdempotencyKey) -> QueryResult<bool> {
        let found: Option<String> = lead_unlocks::table
            .find(key.as_str())
            .select(lead_unlocks::id)
            .first(conn)
            .optional()?;
        Ok(found.is_some())
    }

    /// Write the ledger entry. Written exactly once per key by a successful
    /// unlock transaction; never updated or deleted afterwards.
    pub fn create(
        conn: &mut SqliteConnection,
        key: &IdempotencyKey,
        job_id: &str,
        contractor_id: &str,
        mode: UnlockMode,
    ) -> QueryResult<()> {
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let entry = NewUnlockLedgerEntry {
            id: key.as_str().to_string(),
            job_id: job_id.to_string(),
            contractor_id: contractor_id.to_string(),
            exclusive: mode.is_exclusive(),
            source: mode.source().to_string(),
            created_at: now,
        };
        diesel::insert_into(lead_unlocks::table)
            .values(&entry)
            .execute(conn)?;
        Ok(())
    }

    pub fn find_by_job(conn: &mut SqliteConnection, job_id: &str) -> Result<Vec<Self>> {
        lead_unlocks::table
            .filter(lead_unlocks::job_id.eq(job_id))
            .order(lead_unlocks::created_at.asc())
            .load(conn)
            .context("Failed to query unlock ledger by job")
    }
}
