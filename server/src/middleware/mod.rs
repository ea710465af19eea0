//! HTTP middleware

pub mod auth;

pub use auth::{authenticated_user, AuthenticatedUser, RequireAuth};
