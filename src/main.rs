use anyhow::{Context, Result};
use resume_builder::{core::ConfigManager, start_web_server};
use std::fs::OpenOptions;
use tracing::info;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "resume_builder=info,rocket=warn";

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConfigManager::load()?;

    if let Some(parent) = config.environment.log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true) // Clear file on startup
        .open(&config.environment.log_path)
        .with_context(|| {
            format!(
                "Failed to open log file: {}",
                config.environment.log_path.display()
            )
        })?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_writer(file)
                .with_current_span(true)
                .with_span_list(false),
        )
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .init();

    // Loading ran before the subscriber existed
    info!(
        "Loaded configuration for environment: {}",
        config.environment.name
    );
    info!("Logging to {}", config.environment.log_path.display());

    start_web_server(config).await
}
