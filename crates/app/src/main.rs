use std::time::Duration;

use engine::{RetryPolicy, SplitRatio};
use migration::{Migrator, MigratorTrait};
use sea_orm::ConnectOptions;
use server::ServerState;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "settlement={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let split = SplitRatio::new(settings.settlement.receiver_share_bps)?;
    let retry = RetryPolicy {
        max_attempts: settings.settlement.max_attempts,
        backoff: Duration::from_millis(settings.settlement.retry_backoff_ms),
    };

    let db = open_database(&settings.database).await?;

    let engine = engine::Engine::builder()
        .database(db.clone())
        .split_ratio(split)
        .retry_policy(retry)
        .build()
        .await?;
    tracing::info!(
        receiver_share_bps = split.receiver_bps(),
        max_attempts = retry.max_attempts,
        "settlement engine ready"
    );

    let addr = format!("{}:{}", settings.server.bind, settings.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let state = ServerState::new(engine, settings.server.admin_token);

    let served = server::run_with_listener(state, listener, shutdown_signal()).await;
    if let Err(err) = &served {
        tracing::error!("server failed: {err}");
    }

    db.close().await?;
    tracing::info!("database closed");
    served?;

    Ok(())
}

async fn open_database(
    settings: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let mut options = ConnectOptions::new(settings.url.as_str());
    options.max_connections(settings.max_connections.max(1));
    let database = sea_orm::Database::connect(options).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
