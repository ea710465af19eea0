//! Database pool and the transaction runner.
//!
//! Every protocol executes its whole read-check-write sequence inside one
//! `IMMEDIATE` transaction submitted through [`run_in_transaction`]. SQLite
//! serializes writers; a loser in a write race sees `database is locked`,
//! which the runner retries a bounded number of times before surfacing
//! `Unavailable`. Splitting a protocol's reads and writes across separate
//! transactions would reintroduce the unlock race and is forbidden.

use std::time::Duration;

use anyhow::{Context, Result};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::ApiError;

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Attempts per transaction before giving up on writer contention.
const MAX_TXN_ATTEMPTS: u32 = 3;

/// Applies connection pragmas on every pooled connection.
#[derive(Debug, Clone)]
struct SqlitePragmaCustomizer;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmaCustomizer {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        // Wait for writer locks instead of failing immediately; the
        // transaction runner still bounds total retries.
        sql_query("PRAGMA busy_timeout = 5000;")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;

        sql_query("PRAGMA journal_mode = WAL;")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;

        sql_query("PRAGMA synchronous = NORMAL;")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;

        sql_query("PRAGMA foreign_keys = ON;")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;

        Ok(())
    }
}

/// Create the connection pool used by every handler and service.
pub fn create_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);

    let pool = r2d2::Pool::builder()
        .max_size(10)
        .connection_timeout(Duration::from_secs(30))
        .connection_customizer(Box::new(SqlitePragmaCustomizer))
        .build(manager)
        .context("Failed to create database connection pool")?;

    Ok(pool)
}

/// Run pending embedded migrations. Called once at startup (and by tests).
pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get().context("Failed to get DB connection")?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;
    Ok(())
}

/// Execute `f` inside one immediate (write) transaction, retrying on writer
/// contention with a short backoff.
///
/// The closure re-executes from scratch on every attempt, so all reads it
/// performs observe a fresh snapshot; it must not have side effects outside
/// the connection.
pub fn run_in_transaction<T, F>(pool: &DbPool, f: F) -> Result<T, ApiError>
where
    F: Fn(&mut SqliteConnection) -> Result<T, ApiError>,
{
    let mut conn = pool
        .get()
        .map_err(|e| ApiError::Unavailable(format!("connection pool exhausted: {e}")))?;

    let mut attempt = 0;
    loop {
        attempt += 1;
        match conn.immediate_transaction(|conn| f(conn)) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < MAX_TXN_ATTEMPTS => {
                tracing::warn!(attempt, error = %err, "transaction conflict, retrying");
                std::thread::sleep(Duration::from_millis(50 * u64::from(attempt)));
            }
            Err(err) if err.is_transient() => {
                tracing::warn!(attempt, error = %err, "transaction retry budget exhausted");
                return Err(ApiError::Unavailable(
                    "Store is busy, please retry".to_string(),
                ));
            }
            Err(err) => return Err(err),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_apply() {
        let pool = test_support::test_pool();
        let mut conn = pool.get().unwrap();

        use crate::schema::users::dsl::*;
        let count: i64 = users.count().get_result(&mut conn).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_run_in_transaction_propagates_business_errors() {
        let pool = test_support::test_pool();
        let result: Result<(), ApiError> = run_in_transaction(&pool, |_conn| {
            Err(ApiError::FailedPrecondition("Not enough credits".into()))
        });
        assert!(matches!(result, Err(ApiError::FailedPrecondition(_))));
    }

    #[test]
    fn test_run_in_transaction_commits() {
        let pool = test_support::test_pool();
        use crate::schema::admins;

        run_in_transaction(&pool, |conn| {
            diesel::insert_into(admins::table)
                .values((
                    admins::id.eq("admin-1"),
                    admins::created_at.eq("2026-08-12 00:00:00"),
                ))
                .execute(conn)?;
            Ok(())
        })
        .unwrap();

        let mut conn = pool.get().unwrap();
        let count: i64 = admins::table.count().get_result(&mut conn).unwrap();
        assert_eq!(count, 1);
    }
}
