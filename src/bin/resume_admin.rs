use anyhow::Result;
use clap::Parser;
use resume_builder::admin_cli::{handle_admin_command, AdminCli};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("resume_builder=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    handle_admin_command(AdminCli::parse()).await
}
