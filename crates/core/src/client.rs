//! HTTP client for the Apollo Config Service.

use crate::config::ApolloSettings;
use crate::error::{ToolError, ToolResult};
use crate::types::ConfigCoordinates;
use reqwest::{header, Client, Response};
use url::Url;

const NOT_CONFIGURED: &str = "APOLLO_BASE_URL is not configured.";

/// Fetches raw configuration documents from `/configs/{appId}/{cluster}/{namespace}`.
#[derive(Debug, Clone)]
pub struct ApolloClient {
    http: Client,
    base_url: Option<String>,
}

impl ApolloClient {
    /// Create a client from the given settings.
    ///
    /// A missing base URL is not an error here; it is reported on each fetch.
    pub fn new(settings: &ApolloSettings) -> ToolResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("apollo-config-mcp/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
        })
    }

    /// Build the request URL for the given coordinates.
    ///
    /// Each coordinate is encoded as a single path segment, and the path
    /// replaces whatever path the base URL carries.
    pub fn endpoint(&self, coords: &ConfigCoordinates) -> ToolResult<Url> {
        let base = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ToolError::Configuration(NOT_CONFIGURED.to_string()))?;

        let mut url = Url::parse(base)
            .map_err(|e| ToolError::Configuration(format!("Invalid APOLLO_BASE_URL: {}", e)))?;
        url.set_query(None);
        url.set_fragment(None);

        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ToolError::Configuration(format!("APOLLO_BASE_URL cannot be a base: {}", base))
            })?;
            segments.clear().extend([
                "configs",
                coords.app_id.as_str(),
                coords.cluster.as_str(),
                coords.namespace.as_str(),
            ]);
        }

        Ok(url)
    }

    /// Fetch one configuration document.
    pub async fn fetch(&self, coords: &ConfigCoordinates) -> ToolResult<serde_json::Value> {
        let url = self.endpoint(coords)?;
        tracing::debug!(%url, "Fetching configuration from Apollo");

        let response = self
            .http
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                config = %coords,
                "Apollo Config Service returned an error"
            );
            return Err(ToolError::Upstream {
                status: status.as_u16(),
                details: error_details(response).await,
            });
        }

        Ok(response.json::<serde_json::Value>().await?)
    }
}

/// Error body as JSON when it parses, raw text otherwise.
async fn error_details(response: Response) -> Option<serde_json::Value> {
    match response.text().await {
        Ok(body) => Some(
            serde_json::from_str::<serde_json::Value>(&body)
                .unwrap_or_else(|_| serde_json::Value::String(body)),
        ),
        Err(e) => {
            tracing::debug!("Failed to read error body: {}", e);
            None
        }
    }
}
