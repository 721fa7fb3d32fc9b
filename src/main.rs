//! Yatube - a small blogging platform

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yatube::{
    config::Config,
    db,
    services::UserService,
    web::{self, AppState},
};

/// How often expired sessions are purged
const SESSION_CLEANUP_INTERVAL: u64 = 600;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yatube=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Yatube...");

    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    tokio::fs::create_dir_all(&config.media.path).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let seeds = config.seed.groups.clone();
    let state = AppState::new(pool, config)?;
    tracing::info!("Loaded {} templates", state.templates.template_names().len());

    let created = state.groups.ensure_seeded(&seeds).await?;
    if created > 0 {
        tracing::info!("Created {} groups", created);
    }

    spawn_session_cleanup(state.users.clone());

    let app = web::build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn spawn_session_cleanup(users: Arc<UserService>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(SESSION_CLEANUP_INTERVAL));
        loop {
            interval.tick().await;
            match users.cleanup_expired_sessions().await {
                Ok(0) => {}
                Ok(count) => tracing::info!("Removed {} expired sessions", count),
                Err(e) => tracing::warn!("Session cleanup failed: {}", e),
            }
        }
    });
}
