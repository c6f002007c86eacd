//! # TeamTasks API Server
//!
//! HTTP server for the TeamTasks role-based task manager.
//!
//! ## Architecture
//!
//! The API server is built with Axum and provides:
//! - Session authentication (email/password, JWT access and refresh tokens)
//! - Admin, Manager, and User dashboard endpoints
//! - SSE streams for live task boards and directories
//! - Best-effort push notifications on task assignment
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=$(openssl rand -hex 32) cargo run -p teamtasks-api
//! ```

use anyhow::Context;
use std::sync::Arc;
use teamtasks_api::app::{build_router, AppState};
use teamtasks_api::config::Config;
use teamtasks_shared::auth::identity::memory::MemoryIdentityProvider;
use teamtasks_shared::auth::identity::postgres::PgIdentityProvider;
use teamtasks_shared::db::{migrations, pool};
use teamtasks_shared::notify::{ExpoPushSender, NoopPushSender, PushSender};
use teamtasks_shared::services::{bootstrap_admin, BootstrapOutcome};
use teamtasks_shared::store::memory::MemoryStore;
use teamtasks_shared::store::postgres::PgDocumentStore;
use teamtasks_shared::Backend;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "teamtasks_api=debug,teamtasks_shared=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "TeamTasks API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env().context("Failed to load configuration")?;

    let push: Arc<dyn PushSender> = if config.push.enabled {
        Arc::new(ExpoPushSender::new(config.push.endpoint.clone())?)
    } else {
        tracing::info!("Push notifications disabled");
        Arc::new(NoopPushSender)
    };

    let backend = match &config.database {
        Some(database) => {
            let pool_config = pool::PoolConfig::new(database.url.clone())
                .with_max_connections(database.max_connections);
            let db = pool::connect(&pool_config)
                .await
                .context("Failed to connect to database")?;

            migrations::run_migrations(&db)
                .await
                .context("Failed to run migrations")?;

            let store = PgDocumentStore::connect(db.clone())
                .await
                .context("Failed to start the document change listener")?;
            let identities = PgIdentityProvider::new(db, config.jwt.secret.clone());

            Backend::new(Arc::new(store), Arc::new(identities), push)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory backend; data is lost on exit");
            Backend::new(
                Arc::new(MemoryStore::new()),
                Arc::new(MemoryIdentityProvider::new(config.jwt.secret.clone())),
                push,
            )
        }
    };

    if let Some(admin) = &config.bootstrap_admin {
        match bootstrap_admin(&backend, &admin.email, &admin.password, &admin.name).await? {
            BootstrapOutcome::Created(profile) => {
                tracing::info!(user_id = %profile.id, email = %profile.email, "Bootstrap admin ready")
            }
            BootstrapOutcome::Existing(profile) => {
                tracing::debug!(user_id = %profile.id, "Bootstrap admin already exists")
            }
        }
    }

    let bind_address = config.bind_address();
    let app = build_router(AppState::new(backend, config));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, exiting...");
}
