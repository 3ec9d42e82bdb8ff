// Standalone MCP server binary (stdio transport)

use anyhow::{Context, Result};
use apollo_config_core::ApolloSettings;
use apollo_config_mcp::server::McpServer;
use apollo_config_mcp::tools::default_registry;

#[tokio::main]
async fn main() -> Result<()> {
    // Values from a local .env file fill in anything the environment lacks
    let dotenv = apollo_config_core::config::load_dotenv();

    // Initialize tracing; stdout carries protocol frames, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::info!("Apollo config MCP server starting...");
    if let Some(path) = dotenv {
        tracing::info!("Loaded environment from {}", path.display());
    }

    let settings = ApolloSettings::from_env();
    settings.warn_if_unconfigured();

    let registry = default_registry(&settings).context("Failed to build tool registry")?;
    tracing::info!("Registered {} tools", registry.len());

    let server = McpServer::new(registry);
    let termination = server.start().await?;

    std::process::exit(termination.exit_code());
}
