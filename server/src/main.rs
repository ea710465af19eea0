use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use server::config::AppConfig;
use server::db::{create_pool, run_migrations};
use server::handlers::{credits, health, leads, webhooks};
use server::middleware::RequireAuth;

#[actix_web::main]
async fn main() -> Result<()> {
    // 1. Load environment variables
    dotenvy::dotenv().ok();

    // 2. Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting lead ledger server");

    // 3. Load configuration
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    // 4. Database connection pool + embedded migrations
    let pool = create_pool(&config.database_url)
        .context("Failed to create database connection pool")?;
    run_migrations(&pool).context("Failed to run database migrations")?;
    info!("Database ready at {}", config.database_url);

    let bind_addr = config.bind_addr.clone();
    let auth_secret = config.auth_token_secret.clone();

    info!("Listening on {bind_addr}");

    HttpServer::new(move || {
        // CORS must be outermost for preflight handling.
        let cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .allowed_header("X-Webhook-Signature")
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(
                web::JsonConfig::default()
                    .limit(64 * 1024)
                    .error_handler(|err, req| {
                        let err_msg = format!("{err}");
                        tracing::warn!(path = %req.path(), error = %err_msg, "JSON parse error");
                        actix_web::error::InternalError::from_response(
                            err,
                            actix_web::HttpResponse::BadRequest().json(serde_json::json!({
                                "error": format!("Invalid request body: {err_msg}"),
                                "code": "invalid-argument"
                            })),
                        )
                        .into()
                    }),
            )
            .service(health::health_check)
            .service(webhooks::payment_webhook)
            .service(
                web::scope("")
                    .wrap(RequireAuth::new(auth_secret.clone()))
                    .service(leads::unlock_lead)
                    .service(leads::unlock_exclusive_lead)
                    .service(leads::claim_job)
                    .service(credits::grant_credits),
            )
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {bind_addr}"))?
    .run()
    .await
    .context("Server terminated with error")
}
