//! HTTP handlers: thin adapters from requests to the protocol services.

pub mod credits;
pub mod health;
pub mod leads;
pub mod webhooks;
