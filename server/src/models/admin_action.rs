//! Admin action audit log
//!
//! Append-only. An audit row is written in the same transaction as the
//! balance mutation it records; neither can exist without the other.

use anyhow::{Context, Result};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::admin_actions;

pub const ACTION_GRANT_LEAD_CREDITS: &str = "grantLeadCredits";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = admin_actions)]
pub struct AdminAction {
    pub id: String,
    pub action_type: String,
    pub admin_id: String,
    pub target_id: String,
    pub delta: i32,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = admin_actions)]
pub struct NewAdminAction {
    pub id: String,
    pub action_type: String,
    pub admin_id: String,
    pub target_id: String,
    pub delta: i32,
    pub created_at: String,
}

impl AdminAction {
    pub fn record(
        conn: &mut SqliteConnection,
        action_type: &str,
        admin_id: &str,
        target_id: &str,
        delta: i32,
    ) -> QueryResult<()> {
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let action = NewAdminAction {
            id: Uuid::new_v4().to_string(),
            action_type: action_type.to_string(),
            admin_id: admin_id.to_string(),
            target_id: target_id.to_string(),
            delta,
            created_at: now,
        };
        diesel::insert_into(admin_actions::table)
            .values(&action)
            .execute(conn)?;
        Ok(())
    }

    pub fn find_by_target(conn: &mut SqliteConnection, target_id: &str) -> Result<Vec<Self>> {
        admin_actions::table
            .filter(admin_actions::target_id.eq(target_id))
            .order(admin_actions::created_at.desc())
            .load(conn)
            .context("Failed to query admin actions by target")
    }
}
