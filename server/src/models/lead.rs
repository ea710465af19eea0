//! Lead record model
//!
//! One row per job. Exclusivity state is derived through [`LeadState`] in a
//! single place; protocol code checks the state, never the raw columns.
//! `lead_unlocked_by` is set by at most one successful exclusive unlock and
//! is permanent once set. The non-exclusive buyer set lives in `lead_buyers`
//! (append-only, unique per contractor).

use anyhow::{Context, Result};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{job_leads, lead_buyers};

/// Explicit lifecycle state of a lead.
///
/// Transitions: `Open -> ExclusivelyLocked` (exclusive unlock),
/// `Open | ExclusivelyLocked -> Claimed` (claim workflow). `Claimed` is
/// terminal for unlock purposes and supersedes the exclusive lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadState {
    Open,
    ExclusivelyLocked { owner: String },
    Claimed,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = job_leads)]
pub struct JobLead {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub claimed: bool,
    pub claimed_by: Option<String>,
    pub claimed_by_name: Option<String>,
    pub claimed_at: Option<String>,
    pub accepted_quote_id: Option<String>,
    pub accepted_bid_id: Option<String>,
    pub lead_unlocked_by: Option<String>,
    pub lead_unlocked_at: Option<String>,
    pub non_exclusive_unlocked_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = job_leads)]
pub struct NewJobLead {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub created_at: String,
}

impl NewJobLead {
    pub fn open(id: &str, customer_id: &str) -> Self {
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        Self {
            id: id.to_string(),
            customer_id: customer_id.to_string(),
            status: "open".to_string(),
            created_at: now,
        }
    }
}

impl JobLead {
    pub fn create(conn: &mut SqliteConnection, new_lead: NewJobLead) -> Result<Self> {
        let lead_id = new_lead.id.clone();
        diesel::insert_into(job_leads::table)
            .values(&new_lead)
            .execute(conn)
            .context("Failed to insert job lead")?;
        job_leads::table
            .find(lead_id)
            .first(conn)
            .context("Failed to retrieve created job lead")
    }

    pub fn find_by_id(conn: &mut SqliteConnection, job_id: &str) -> QueryResult<Option<Self>> {
        job_leads::table.find(job_id).first(conn).optional()
    }

    /// Derive the lifecycle state. Claimed wins over the exclusive lock.
    pub fn state(&self) -> LeadState {
        if self.claimed {
            return LeadState::Claimed;
        }
        match self.lead_unlocked_by.as_deref().map(str::trim) {
            Some(owner) if !owner.is_empty() => LeadState::ExclusivelyLocked {
                owner: owner.to_string(),
            },
            _ => LeadState::Open,
        }
    }

    /// Contractors who have paid for access to this lead, any mode.
    pub fn buyers(conn: &mut SqliteConnection, job_id: &str) -> QueryResult<Vec<String>> {
        lead_buyers::table
            .filter(lead_buyers::job_id.eq(job_id))
            .select(lead_buyers::contractor_id)
            .load(conn)
    }

    /// Append a contractor to the buyer set. Duplicate inserts are no-ops,
    /// which gives the append-only-set semantics the unlock ledger relies on.
    pub fn add_buyer(
        conn: &mut SqliteConnection,
        job_id: &str,
        contractor_id: &str,
    ) -> QueryResult<()> {
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        diesel::insert_or_ignore_into(lead_buyers::table)
            .values((
                lead_buyers::job_id.eq(job_id),
                lead_buyers::contractor_id.eq(contractor_id),
                lead_buyers::created_at.eq(now),
            ))
            .execute(conn)?;
        Ok(())
    }

    /// Record a successful exclusive unlock: set the permanent owner.
    pub fn set_exclusive_owner(
        conn: &mut SqliteConnection,
        job_id: &str,
        contractor_id: &str,
    ) -> QueryResult<()> {
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        diesel::update(job_leads::table.find(job_id))
            .set((
                job_leads::lead_unlocked_by.eq(contractor_id),
                job_leads::lead_unlocked_at.eq(now),
            ))
            .execute(conn)?;
        Ok(())
    }

    /// Record a successful non-exclusive unlock. Never touches the owner.
    pub fn stamp_non_exclusive_unlock(
        conn: &mut SqliteConnection,
        job_id: &str,
    ) -> QueryResult<()> {
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        diesel::update(job_leads::table.find(job_id))
            .set(job_leads::non_exclusive_unlocked_at.eq(now))
            .execute(conn)?;
        Ok(())
    }
}
