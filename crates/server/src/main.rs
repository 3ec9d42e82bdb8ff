use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod api;
mod config;

use config::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "apollo-config-server")]
#[command(about = "HTTP transport for the Apollo config lookup tool", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "apollo-config.toml")]
    config: PathBuf,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3333")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Apollo Config Service base URL (overrides the configuration file)
    #[arg(long, env = "APOLLO_BASE_URL")]
    apollo_base_url: Option<String>,

    /// Upstream request timeout in seconds (overrides the configuration file)
    #[arg(long, env = "APOLLO_TIMEOUT_SECS")]
    apollo_timeout_secs: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Values from a local .env file fill in anything the environment lacks
    let dotenv = apollo_config_core::config::load_dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "apollo_config=info,tower_http=debug".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    if let Some(path) = dotenv {
        tracing::info!("Loaded environment from {}", path.display());
    }

    let args = Args::parse();

    tracing::info!("Starting Apollo config server");

    // Load configuration; CLI and environment take precedence over the file
    let mut config = ServerConfig::load(&args.config)?;
    config.apply_overrides(args.apollo_base_url, args.apollo_timeout_secs.as_deref());

    let addr = format!("{}:{}", args.host, args.port);
    api::serve(&addr, config).await?;

    Ok(())
}
