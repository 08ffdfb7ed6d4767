mod config;
mod db;
mod routes;
mod services;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::services::session::{MemorySessionStore, PgSessionStore, SessionStore};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::ServerConfig::from_env().expect("invalid configuration");

    // Postgres when configured; otherwise sessions live only as long as the process.
    let store: Arc<dyn SessionStore> = match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(url).await.expect("database init failed");
            tracing::info!("session store: postgres");
            Arc::new(PgSessionStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; sessions are kept in memory and lost on restart");
            Arc::new(MemorySessionStore::new())
        }
    };

    let _pruner = services::session::spawn_prune_task(store.clone(), Duration::from_secs(config.prune_interval_secs.max(1)));

    let state = state::AppState::new(config.auth.clone(), store);
    let app = routes::app(state, &config.site_dir);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, site_dir = %config.site_dir.display(), "server listening");
    axum::serve(listener, app).await.expect("server failed");
}
