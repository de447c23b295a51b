use anyhow::Context;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use portfolio_tracker_api::config::{self, BackendKind};
use portfolio_tracker_api::database::{migrations, DatabaseManager};
use portfolio_tracker_api::jobs::Scheduler;
use portfolio_tracker_api::{app, is_development, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up SUPABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("portfolio_tracker_api=info,tower_http=info")),
        )
        .init();

    let config = config::config();
    tracing::info!(
        environment = ?config.environment,
        backend = ?config.backend.kind,
        "Starting portfolio tracker API"
    );
    if config.security.jwt_secret.is_empty() && config.backend.kind != BackendKind::Supabase {
        anyhow::bail!("JWT_SECRET must be set for the {:?} backend", config.backend.kind);
    }

    let state = AppState::from_config(config.clone())
        .await
        .context("Failed to initialise backend")?;

    if let Some(pool) = &state.db_pool {
        if config.backend.run_migrations || is_development!() {
            tracing::info!("Running database migrations...");
            migrations::run(pool).await.context("Migrations failed")?;
        }
    }

    let shutdown = CancellationToken::new();

    let scheduler = if config.jobs.enabled {
        let scheduler = Scheduler::new(&config.jobs, state.job_context())?;
        Some(tokio::spawn(scheduler.run(shutdown.clone())))
    } else {
        tracing::info!("Scheduled jobs disabled");
        None
    };

    let bind_addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!(address = %bind_addr, "Server listening");

    let db_pool = state.db_pool.clone();
    let router = app(state).into_make_service_with_connect_info::<SocketAddr>();
    let server_shutdown = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_shutdown.cancel();
        })
        .await
        .context("server error")?;

    if let Some(handle) = scheduler {
        let _ = handle.await;
    }
    if let Some(pool) = db_pool {
        DatabaseManager::close(&pool).await;
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
