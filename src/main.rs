//! CorBas MCP server - Entry point

use corbas::{run_server_with_config, Companion, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; stdout is the MCP transport
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "corbas=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting CorBas MCP server");

    let config = Config::from_env();

    // Held for the lifetime of the server; dropping it stops the companion
    let _companion = match config.backend_command.as_deref() {
        Some([command, args @ ..]) => {
            Some(Companion::spawn(command, args, &config.readiness()).await?)
        }
        _ => None,
    };

    run_server_with_config(config).await
}
