use std::path::PathBuf;

use anyhow::Context;
use counsel_engine::config::EngineConfig;
use counsel_engine::error::Error;
use counsel_engine::store::{LibSqlBackend, migrations};

/// Opens the configured database and brings its schema up to date.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    eprintln!("Counsel Engine v{}", env!("CARGO_PKG_VERSION"));

    let path = migrate().await.context("migration run failed")?;

    tracing::info!(
        path = %path.display(),
        version = migrations::latest_version(),
        "Schema up to date"
    );
    Ok(())
}

async fn migrate() -> Result<PathBuf, Error> {
    let config = EngineConfig::from_env()?;
    eprintln!("   Database: {}", config.db_path.display());

    // Opening the backend applies any pending migrations.
    LibSqlBackend::new_local(&config.db_path).await?;
    Ok(config.db_path)
}
