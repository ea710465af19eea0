// Log sanitization macros must be exported before the modules that use them.
#[macro_export]
macro_rules! log_uid {
    ($uid:expr) => {
        $crate::logging::sanitize::sanitize_uid($uid)
    };
}

#[macro_export]
macro_rules! log_session {
    ($sid:expr) => {
        $crate::logging::sanitize::sanitize_session_id($sid)
    };
}

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod schema;
pub mod services;
pub mod validation;
