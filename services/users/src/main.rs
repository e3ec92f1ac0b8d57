use anyhow::Result;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod activity;
mod config;
mod error;
mod extractors;
mod jwt;
mod middleware;
mod models;
mod policy;
mod rate_limiter;
mod repositories;
mod response;
mod routes;
mod state;
mod validation;

use common::{database, schema};

use crate::{activity::start_prune_schedule, config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting user service");

    let config = AppConfig::from_env()?;
    if config.jwt_secret.is_none() {
        warn!("JWT_SECRET is not set; authenticated routes will fail");
    }

    // Initialize database connection pool
    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    schema::initialize_schema(&pool).await?;

    let port = config.port;
    let environment = config.environment;
    let app_state = AppState::new(pool.clone(), config);

    let limits = app_state.rate_limiter.config();
    info!(
        "Rate limiting: {} requests per {}s",
        limits.max_requests,
        limits.window.as_secs()
    );

    let _scheduler = match app_state.config.activity_prune_schedule.as_deref() {
        Some(schedule) => Some(
            start_prune_schedule(
                app_state.activity_log.clone(),
                schedule,
                app_state.config.activity_retention_days,
            )
            .await?,
        ),
        None => None,
    };

    let app = routes::create_router(app_state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("User service listening on {} ({:?})", addr, environment);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    database::close_pool(pool).await;
    info!("User service stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
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

    info!("Shutdown signal received");
}
