use fedgate_server::{
    auth::{
        AppState, HttpTransport,
        db::{DbSessionSigner, PgUserStore, SessionRepository},
    },
    config::ServerConfig,
    error::StartupError,
};
use rootcause::Report;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn cleanup_expired_sessions(repo: &SessionRepository) {
    match repo.delete_expired().await {
        Ok(count) if count > 0 => {
            tracing::debug!(deleted_sessions = count, "Periodic session cleanup");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to cleanup expired sessions");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Report<StartupError>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().map_err(|e| StartupError::Configuration {
        details: e.to_string(),
    })?;
    tracing::info!(
        sso_enabled = config.sso.login_enabled(),
        compatibility_mode = config.sso.callback_mode() == fedgate_sso::CallbackMode::Compatibility,
        "Loaded configuration"
    );

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|e| StartupError::Database {
            details: format!("failed to connect to database: {e}"),
        })?;

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .map_err(|e| StartupError::Database {
            details: format!("failed to run migrations: {e}"),
        })?;

    // Cleanup expired sessions on startup, then periodically
    let session_repo = SessionRepository::new(db_pool.clone());
    cleanup_expired_sessions(&session_repo).await;

    let cleanup_repo = session_repo.clone();
    let cleanup_interval = std::time::Duration::from_secs(config.session.cleanup_interval_seconds);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        // The first tick completes immediately; startup already cleaned up.
        interval.tick().await;
        loop {
            interval.tick().await;
            cleanup_expired_sessions(&cleanup_repo).await;
        }
    });

    let http = HttpTransport::new(&config.http).map_err(|e| StartupError::Configuration {
        details: e.to_string(),
    })?;

    let flow_timeout = config.flow_timeout();
    let session_duration = chrono::Duration::minutes(config.session.duration_minutes);
    let app_state = AppState::new(
        config.sso,
        http,
        Arc::new(PgUserStore::new(db_pool)),
        Arc::new(DbSessionSigner::new(session_repo, session_duration)),
    )
    .with_api_url(config.api_url)
    .with_trust_forwarded_headers(config.trust_forwarded_headers)
    .with_flow_timeout(flow_timeout);

    let app = fedgate_server::router(Arc::new(app_state));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| StartupError::Serve {
            details: format!("failed to bind to {}: {e}", config.listen_addr),
        })?;

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| StartupError::Serve {
        details: e.to_string(),
    })?;

    Ok(())
}
