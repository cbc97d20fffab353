//! # TeamDesk API Server
//!
//! Multi-user task, team and meeting tracker served over HTML forms with
//! cookie sessions.
//!
//! ## Architecture
//!
//! The API server is built with Axum and provides:
//! - Registration, login and cookie sessions
//! - Tasks with grades and chat, teams, meetings and a monthly calendar
//! - A JSON admin panel for record management
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/teamdesk JWT_SECRET=... cargo run -p teamdesk-api
//! ```

use anyhow::Context;
use teamdesk_api::{
    app::{build_router, AppState},
    config::Config,
};
use teamdesk_shared::db::{
    migrations::{ensure_database_exists, run_migrations},
    pool::{close_pool, create_pool},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!(
        "TeamDesk API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env().context("Failed to load configuration")?;

    if !config.is_production() {
        ensure_database_exists(&config.database.url)
            .await
            .context("Failed to create database")?;
    }

    let pool = create_pool(config.pool_config())
        .await
        .context("Failed to connect to database")?;

    if !config.is_production() {
        run_migrations(&pool)
            .await
            .context("Failed to run migrations")?;
    }

    let address = config.bind_address();
    let state = AppState::new(pool.clone(), config).context("Invalid token settings")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    close_pool(pool).await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// `RUST_LOG` filter with a JSON formatter when `LOG_FORMAT=json`
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "teamdesk_api=debug,teamdesk_shared=info,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}
