// Apollo Config Service lookup tool

use crate::protocol::ToolSchema;
use crate::tools::{json_schema_object, json_schema_string, Tool};
use apollo_config_core::{
    ApolloClient, ApolloSettings, ConfigCache, ConfigCoordinates, ConfigLookup, ToolError,
    ToolResult,
};
use serde::Deserialize;
use std::sync::Arc;

pub const TOOL_NAME: &str = "getApolloConfig";

const MISSING_ARGUMENTS: &str =
    "Missing required arguments: appId, cluster, namespace are required.";

/// Fetches a namespace's configuration, serving repeats from a TTL cache
pub struct ApolloConfigTool {
    client: ApolloClient,
    cache: Arc<ConfigCache>,
}

impl ApolloConfigTool {
    pub fn new(client: ApolloClient, cache: Arc<ConfigCache>) -> Self {
        Self { client, cache }
    }

    pub fn from_settings(settings: &ApolloSettings) -> ToolResult<Self> {
        Ok(Self::new(
            ApolloClient::new(settings)?,
            Arc::new(ConfigCache::new()),
        ))
    }

    /// Look up one configuration document, from cache when it is still live
    pub async fn lookup(&self, coords: &ConfigCoordinates) -> ToolResult<ConfigLookup> {
        let key = coords.cache_key();

        if let Some(data) = self.cache.get(&key) {
            tracing::debug!(config = %coords, "Serving configuration from cache");
            return Ok(ConfigLookup::cached(data));
        }

        let data = self.client.fetch(coords).await?;
        self.cache.put(key, data.clone());
        tracing::info!(config = %coords, "Fetched configuration from Apollo");

        Ok(ConfigLookup::fetched(data))
    }
}

#[derive(Debug, Default, Deserialize)]
struct GetApolloConfigArgs {
    #[serde(rename = "appId", default)]
    app_id: Option<serde_json::Value>,
    #[serde(default)]
    cluster: Option<serde_json::Value>,
    #[serde(default)]
    namespace: Option<serde_json::Value>,
}

impl GetApolloConfigArgs {
    fn into_coordinates(self) -> ToolResult<ConfigCoordinates> {
        match (
            coordinate(self.app_id),
            coordinate(self.cluster),
            coordinate(self.namespace),
        ) {
            (Some(app_id), Some(cluster), Some(namespace)) => {
                Ok(ConfigCoordinates::new(app_id, cluster, namespace))
            }
            _ => Err(ToolError::Validation(MISSING_ARGUMENTS.to_string())),
        }
    }
}

/// Text form of a coordinate; `null`, `false`, `0` and `""` count as missing.
///
/// Apollo app ids are often numeric, so non-string values are accepted and
/// rendered as their JSON text.
fn coordinate(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Null | serde_json::Value::Bool(false) => None,
        serde_json::Value::Number(n) if n.as_f64() == Some(0.0) => None,
        serde_json::Value::String(s) => (!s.is_empty()).then_some(s),
        other => Some(other.to_string()),
    }
}

#[async_trait::async_trait]
impl Tool for ApolloConfigTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: TOOL_NAME.to_string(),
            description: "Fetch configuration data from Apollo Config Service for the given appId, cluster, and namespace.".to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "appId": json_schema_string("Apollo application ID."),
                    "cluster": json_schema_string("Apollo cluster name (often \"default\")."),
                    "namespace": json_schema_string("Apollo namespace name (e.g., \"application\").")
                }),
                vec!["appId", "cluster", "namespace"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> ToolResult<serde_json::Value> {
        // Arguments that are not an object count as missing
        let args: GetApolloConfigArgs = serde_json::from_value(arguments).unwrap_or_default();
        let coords = args.into_coordinates()?;

        let lookup = self.lookup(&coords).await?;
        Ok(serde_json::to_value(lookup)?)
    }
}
