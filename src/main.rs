//! Rango - a link directory of categories and pages

use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rango::{api, config::Config, db};

/// How often expired login and visitor sessions are purged
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rango=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Rango...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!(applied, "Database migrations completed");

    let state = api::build_state(pool, &config)?;
    tracing::info!("Services initialized");

    // Purge expired sessions in the background
    {
        let user_service = state.user_service.clone();
        let visitor_service = state.visitor_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                match user_service.cleanup_expired_sessions().await {
                    Ok(n) if n > 0 => tracing::info!(removed = n, "Expired login sessions purged"),
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Login session cleanup failed"),
                }
                match visitor_service.cleanup_expired().await {
                    Ok(n) if n > 0 => tracing::info!(removed = n, "Expired visitor sessions purged"),
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Visitor session cleanup failed"),
                }
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin, &config.media.path);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
