use super::{ApiError, ApiResult};
use crate::config::AppState;
use apollo_config_mcp::protocol::ToolSchema;
use apollo_config_mcp::server::{SERVER_NAME, SERVER_VERSION};
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Describe the server and every tool it exposes
pub async fn get_schema(State(state): State<Arc<AppState>>) -> Json<SchemaDocument> {
    Json(SchemaDocument {
        name: SERVER_NAME.to_string(),
        version: SERVER_VERSION.to_string(),
        description: "Query Apollo Config Service configuration through MCP-style tools."
            .to_string(),
        tools: state.registry.list_schemas(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub name: String,
    pub version: String,
    pub description: String,
    pub tools: Vec<ToolSchema>,
}

/// List available tools
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<ListToolsResponse> {
    Json(ListToolsResponse {
        tools: state.registry.list_schemas(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListToolsResponse {
    pub tools: Vec<ToolSchema>,
}

/// Invoke a tool by name
pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<CallToolResponse>> {
    // An unreadable body is treated like one without a tool name
    let req: CallToolRequest = serde_json::from_slice(&body).unwrap_or_default();

    let Some(name) = req.name.filter(|name| !name.is_empty()) else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Missing tool name in request body.",
        ));
    };

    let tool = state.registry.get(&name).ok_or_else(|| {
        ApiError::new(StatusCode::NOT_FOUND, format!("Unknown tool: {}", name))
    })?;

    let arguments = req.arguments.unwrap_or_else(|| serde_json::json!({}));
    match tool.execute(arguments).await {
        Ok(result) => Ok(Json(CallToolResponse { result })),
        Err(e) => {
            tracing::error!(tool = %name, code = e.code(), "Tool {} failed: {}", name, e);
            Err(e.into())
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CallToolRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallToolResponse {
    pub result: serde_json::Value,
}
