//! Row types and row-level operations for the ledger store.

pub mod admin_action;
pub mod lead;
pub mod payment;
pub mod unlock;
pub mod user;
