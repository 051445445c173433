mod api;
mod auth;
mod config;
mod dto;
mod error;
mod middleware;
mod seed;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use kblog_core::{MemoryCredentialStore, MemoryStore, SystemClock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kblog_web=debug,kblog_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load()?;
    let bind_addr = config.bind_addr;
    let purge_interval = config.auth.store.purge_interval();

    let credentials = Arc::new(MemoryCredentialStore::new());
    let seeded = seed::seed(&credentials, &config.admin).await?;
    tracing::info!(
        admin_role = seeded.admin_role.id,
        user_role = seeded.user_role.id,
        "Credential store seeded"
    );

    let store = Arc::new(MemoryStore::new());
    let state = AppState::build(config, store.clone(), credentials, Arc::new(SystemClock))?;

    // Expired-key sweep
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_interval);
        loop {
            interval.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "Purged expired store entries");
            }
        }
    });

    let app = api::build_app(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("kblog-web listening on http://{}", bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
