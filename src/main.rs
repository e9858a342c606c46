//! taskbreaker - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes the task API.

use taskbreaker::{
    api,
    config::{Config, ConfigSource},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskbreaker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Pick the config source before anything reads the environment
    let source = ConfigSource::detect();
    info!("Configuration source: {:?}", source);
    source.apply();

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, database={:?}",
        config.completion.model_uri(),
        config.database
    );

    api::serve(config).await?;

    Ok(())
}
