use anyhow::{Context, Result};
use apollo_config_core::config::{timeout_override, DEFAULT_TIMEOUT};
use apollo_config_core::ApolloSettings;
use apollo_config_mcp::tools::{default_registry, ToolRegistry};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub apollo: ApolloConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApolloConfig {
    /// Base URL of the Apollo Config Service
    #[serde(default)]
    pub base_url: Option<String>,

    /// Upstream request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl Default for ApolloConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        // Load config file if it exists, otherwise use defaults
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .context("Failed to read configuration file")?;
            toml::from_str(&content).context("Failed to parse configuration file")
        } else {
            tracing::info!("Configuration file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Apply command-line or environment values on top of the file.
    ///
    /// An unusable timeout is logged and ignored, as it is for the stdio server.
    pub fn apply_overrides(&mut self, base_url: Option<String>, timeout_secs: Option<&str>) {
        if let Some(base_url) = base_url {
            self.apollo.base_url = Some(base_url);
        }
        if let Some(timeout) = timeout_secs.and_then(timeout_override) {
            self.apollo.timeout_secs = timeout.as_secs();
        }
    }

    /// Settings for the upstream config service client
    pub fn apollo_settings(&self) -> ApolloSettings {
        ApolloSettings::new(self.apollo.base_url.clone())
            .with_timeout(Duration::from_secs(self.apollo.timeout_secs.max(1)))
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let settings = config.apollo_settings();
        settings.warn_if_unconfigured();

        let registry = default_registry(&settings).context("Failed to build tool registry")?;
        Ok(Self::with_registry(registry))
    }

    pub fn with_registry(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}
