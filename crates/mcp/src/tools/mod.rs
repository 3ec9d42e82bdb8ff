pub mod apollo;
mod registry;

pub use apollo::ApolloConfigTool;
pub use registry::{json_schema_object, json_schema_string, Tool, ToolRegistry};

use apollo_config_core::{ApolloSettings, ToolResult};
use std::sync::Arc;

/// Registry holding every tool this server exposes
pub fn default_registry(settings: &ApolloSettings) -> ToolResult<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ApolloConfigTool::from_settings(settings)?));
    Ok(registry)
}
