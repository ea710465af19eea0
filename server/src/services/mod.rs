//! Protocol services: the transactional core of the system.

pub mod admin_credits;
pub mod claim;
pub mod fulfillment;
pub mod lead_unlock;
pub mod ledger;
pub mod rate_limit;
