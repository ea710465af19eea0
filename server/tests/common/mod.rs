//! Shared fixtures for integration tests: a file-backed SQLite database so
//! multiple pooled connections can race each other for real.
#![allow(dead_code)]

use diesel::prelude::*;
use tempfile::TempDir;

use server::db::{create_pool, run_migrations, DbPool};
use server::models::lead::{JobLead, NewJobLead};
use server::models::user::{NewUser, User};
use server::schema::job_leads;

pub fn file_pool() -> (TempDir, DbPool) {
    let dir = TempDir::new().expect("temp dir");
    let db_path = dir.path().join("leads.db");
    let pool = create_pool(db_path.to_str().expect("utf8 path")).expect("pool");
    run_migrations(&pool).expect("migrations");
    (dir, pool)
}

pub fn seed_contractor(pool: &DbPool, uid: &str, lead_credits: i32, exclusive: i32) {
    let mut conn = pool.get().unwrap();
    let mut user = NewUser::contractor(uid);
    user.lead_credits = lead_credits;
    user.credits = lead_credits;
    user.exclusive_lead_credits = exclusive;
    User::create(&mut conn, user).unwrap();
}

pub fn seed_open_lead(pool: &DbPool, job_id: &str) {
    let mut conn = pool.get().unwrap();
    JobLead::create(&mut conn, NewJobLead::open(job_id, "cust-1")).unwrap();
}

pub fn seed_claimable_lead(pool: &DbPool, job_id: &str) {
    seed_open_lead(pool, job_id);
    let mut conn = pool.get().unwrap();
    diesel::update(job_leads::table.find(job_id))
        .set(job_leads::accepted_quote_id.eq("quote-1"))
        .execute(&mut conn)
        .unwrap();
}

pub fn balances(pool: &DbPool, uid: &str) -> (i32, i32, i32) {
    let mut conn = pool.get().unwrap();
    let user = User::find_by_id(&mut conn, uid).unwrap().unwrap();
    (user.lead_credits, user.exclusive_lead_credits, user.credits)
}
