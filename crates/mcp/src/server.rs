//! MCP stdio server
//!
//! Decodes `Content-Length` framed JSON-RPC messages from a byte stream,
//! dispatches them by method and writes framed responses back. Tool calls run
//! as background tasks so a slow upstream fetch never stalls intake.

use crate::framing::ContentLengthCodec;
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, ListToolsResult, ServerCapabilities,
    ServerInfo,
};
use crate::tools::ToolRegistry;
use anyhow::Result;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinSet;
use tokio_util::codec::{FramedRead, FramedWrite};

pub const SERVER_NAME: &str = "apollo-config-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Why the serve loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The input stream closed
    EndOfInput,
    /// The client sent `exit`
    Exit { shutdown_requested: bool },
}

impl Termination {
    /// Process exit code for this termination
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::EndOfInput => 0,
            Self::Exit { shutdown_requested } => {
                if *shutdown_requested {
                    0
                } else {
                    1
                }
            }
        }
    }
}

/// Outcome of handling one inbound message
enum Dispatch {
    Reply(JsonRpcResponse),
    Continue,
    Exit,
}

#[derive(Debug, Default)]
struct Session {
    shutdown_requested: bool,
}

#[derive(Clone)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Serve on the process's stdin/stdout
    pub async fn start(&self) -> Result<Termination> {
        tracing::info!("MCP server listening on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve until `exit` or end of input
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<Termination>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut frames = FramedRead::new(reader, ContentLengthCodec::new());
        let mut sink = FramedWrite::new(writer, ContentLengthCodec::new());
        let mut in_flight: JoinSet<JsonRpcResponse> = JoinSet::new();
        let mut session = Session::default();

        loop {
            tokio::select! {
                Some(finished) = in_flight.join_next(), if !in_flight.is_empty() => {
                    match finished {
                        Ok(response) => sink.send(response).await?,
                        Err(e) => tracing::error!("Tool task did not complete: {}", e),
                    }
                }
                frame = frames.next() => {
                    let frame = match frame {
                        Some(frame) => frame?,
                        None => {
                            tracing::info!("Input closed, shutting down");
                            return Ok(Termination::EndOfInput);
                        }
                    };

                    match self.handle_frame(&frame, &mut session, &mut in_flight) {
                        Dispatch::Reply(response) => sink.send(response).await?,
                        Dispatch::Continue => {}
                        Dispatch::Exit => {
                            tracing::info!(
                                shutdown_requested = session.shutdown_requested,
                                "Exit requested"
                            );
                            return Ok(Termination::Exit {
                                shutdown_requested: session.shutdown_requested,
                            });
                        }
                    }
                }
            }
        }
    }

    fn handle_frame(
        &self,
        frame: &[u8],
        session: &mut Session,
        in_flight: &mut JoinSet<JsonRpcResponse>,
    ) -> Dispatch {
        let message: JsonRpcMessage = match serde_json::from_slice(frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Discarding malformed message: {}", e);
                return Dispatch::Continue;
            }
        };

        match message {
            JsonRpcMessage::Request(request) => self.dispatch(request, session, in_flight),
            JsonRpcMessage::Response(response) => {
                tracing::debug!(id = %response.id, "Ignoring response from client");
                Dispatch::Continue
            }
        }
    }

    fn dispatch(
        &self,
        request: JsonRpcRequest,
        session: &mut Session,
        in_flight: &mut JoinSet<JsonRpcResponse>,
    ) -> Dispatch {
        tracing::debug!(method = %request.method, "Received request");

        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        match method.as_str() {
            "initialize" => reply(id, |id| {
                log_client(params);
                JsonRpcResponse::serialized(id, &initialize_result())
            }),
            "tools/list" => reply(id, |id| {
                JsonRpcResponse::serialized(
                    id,
                    &ListToolsResult {
                        tools: self.registry.list_schemas(),
                    },
                )
            }),
            "tools/call" => match id {
                Some(id) => self.call_tool(id, params, in_flight),
                None => {
                    tracing::debug!("Ignoring tools/call sent as a notification");
                    Dispatch::Continue
                }
            },
            "ping" => reply(id, |id| JsonRpcResponse::success(id, serde_json::json!({}))),
            "shutdown" => {
                session.shutdown_requested = true;
                reply(id, |id| JsonRpcResponse::success(id, serde_json::json!({})))
            }
            "exit" => Dispatch::Exit,
            other => reply(id, |id| {
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(other))
            }),
        }
    }

    fn call_tool(
        &self,
        id: serde_json::Value,
        params: Option<serde_json::Value>,
        in_flight: &mut JoinSet<JsonRpcResponse>,
    ) -> Dispatch {
        let params: CallToolParams = params
            .and_then(|p| serde_json::from_value(p).ok())
            .unwrap_or_default();

        let Some(name) = params.name.filter(|name| !name.is_empty()) else {
            return Dispatch::Reply(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params("Missing tool name"),
            ));
        };

        let Some(tool) = self.registry.get(&name) else {
            return Dispatch::Reply(JsonRpcResponse::error(id, JsonRpcError::unknown_tool(&name)));
        };

        let arguments = params.arguments;
        in_flight.spawn(async move {
            match tool.execute(arguments).await {
                Ok(result) => JsonRpcResponse::serialized(id, &CallToolResult::json(result)),
                Err(e) => {
                    tracing::error!(tool = %name, code = e.code(), "Tool call failed: {}", e);
                    JsonRpcResponse::error(
                        id,
                        JsonRpcError::tool_failed(e.to_string(), e.details().cloned()),
                    )
                }
            }
        });

        Dispatch::Continue
    }
}

/// Reply only when the request carries an id
fn reply(
    id: Option<serde_json::Value>,
    respond: impl FnOnce(serde_json::Value) -> JsonRpcResponse,
) -> Dispatch {
    match id {
        Some(id) => Dispatch::Reply(respond(id)),
        None => Dispatch::Continue,
    }
}

fn initialize_result() -> InitializeResult {
    InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities::default(),
        server_info: ServerInfo {
            name: SERVER_NAME.to_string(),
            version: SERVER_VERSION.to_string(),
        },
    }
}

fn log_client(params: Option<serde_json::Value>) {
    let params: InitializeParams = params
        .and_then(|p| serde_json::from_value(p).ok())
        .unwrap_or_default();
    if let Some(client) = params.client_info {
        tracing::info!(
            client = %client.name,
            version = client.version.as_deref().unwrap_or("unknown"),
            protocol = params.protocol_version.as_deref().unwrap_or("unknown"),
            "Client initialized"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ToolSchema;
    use crate::tools::{json_schema_object, Tool};
    use apollo_config_core::{ToolError, ToolResult};
    use bytes::Bytes;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncWriteExt, DuplexStream};
    use tokio::sync::Notify;
    use tokio::task::JoinHandle;

    /// Counts invocations and fails when asked to
    struct CountingTool {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Tool for CountingTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "count".to_string(),
                description: "Count calls".to_string(),
                input_schema: json_schema_object(json!({}), vec![]),
            }
        }

        async fn execute(&self, arguments: Value) -> ToolResult<Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if arguments.get("fail").is_some() {
                return Err(ToolError::Upstream {
                    status: 404,
                    details: Some(json!({"message": "missing"})),
                });
            }
            Ok(json!({"calls": n}))
        }
    }

    /// Blocks until released
    struct GatedTool {
        gate: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl Tool for GatedTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "gated".to_string(),
                description: "Wait for release".to_string(),
                input_schema: json_schema_object(json!({}), vec![]),
            }
        }

        async fn execute(&self, _arguments: Value) -> ToolResult<Value> {
            self.gate.notified().await;
            Ok(json!("released"))
        }
    }

    struct Harness {
        input: DuplexStream,
        output: FramedRead<DuplexStream, ContentLengthCodec>,
        server: JoinHandle<Result<Termination>>,
        calls: Arc<AtomicUsize>,
    }

    impl Harness {
        fn start() -> Self {
            Self::with_tools(|_| {})
        }

        fn with_tools(extra: impl FnOnce(&mut ToolRegistry)) -> Self {
            let calls = Arc::new(AtomicUsize::new(0));
            let mut registry = ToolRegistry::new();
            registry.register(Arc::new(CountingTool {
                calls: calls.clone(),
            }));
            extra(&mut registry);
            let server = McpServer::new(registry);

            let (input, server_in) = tokio::io::duplex(64 * 1024);
            let (server_out, output) = tokio::io::duplex(64 * 1024);
            let server = tokio::spawn(async move { server.serve(server_in, server_out).await });

            Self {
                input,
                output: FramedRead::new(output, ContentLengthCodec::new()),
                server,
                calls,
            }
        }

        async fn send_raw(&mut self, bytes: &[u8]) {
            self.input.write_all(bytes).await.unwrap();
        }

        async fn send(&mut self, message: Value) {
            let body = serde_json::to_vec(&message).unwrap();
            let header = format!("Content-Length: {}\r\n\r\n", body.len());
            self.send_raw(header.as_bytes()).await;
            self.send_raw(&body).await;
        }

        async fn recv(&mut self) -> Value {
            let frame: Bytes = self.output.next().await.unwrap().unwrap();
            serde_json::from_slice(&frame).unwrap()
        }

        async fn finish(self) -> Termination {
            drop(self.input);
            self.server.await.unwrap().unwrap()
        }
    }

    fn request(id: i64, method: &str, params: Value) -> Value {
        serde_json::to_value(JsonRpcRequest::new(id, method, params)).unwrap()
    }

    fn notification(method: &str) -> Value {
        serde_json::to_value(JsonRpcRequest::notification(method)).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let mut h = Harness::start();
        h.send(request(
            1,
            "initialize",
            json!({"protocolVersion": PROTOCOL_VERSION, "clientInfo": {"name": "test"}}),
        ))
        .await;

        let resp = h.recv().await;
        assert_eq!(resp["id"], 1);
        assert_eq!(resp["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(resp["result"]["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(resp["result"]["capabilities"], json!({"tools": {}}));

        assert_eq!(h.finish().await, Termination::EndOfInput);
    }

    #[tokio::test]
    async fn test_tools_list() {
        let mut h = Harness::start();
        h.send(request(2, "tools/list", json!({}))).await;

        let resp = h.recv().await;
        let tools = resp["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "count");
        assert!(tools[0].get("inputSchema").is_some());
    }

    #[tokio::test]
    async fn test_tools_call_wraps_result_as_json_content() {
        let mut h = Harness::start();
        h.send(request(3, "tools/call", json!({"name": "count", "arguments": {}})))
            .await;

        let resp = h.recv().await;
        assert_eq!(resp["id"], 3);
        assert_eq!(
            resp["result"],
            json!({"content": [{"type": "json", "json": {"calls": 1}}]})
        );
    }

    #[tokio::test]
    async fn test_tools_call_failure_maps_to_tool_error_code() {
        let mut h = Harness::start();
        h.send(request(4, "tools/call", json!({"name": "count", "arguments": {"fail": true}})))
            .await;

        let resp = h.recv().await;
        assert_eq!(resp["error"]["code"], -32001);
        assert_eq!(
            resp["error"]["message"],
            "Apollo Config Service responded with status 404"
        );
        assert_eq!(resp["error"]["data"], json!({"message": "missing"}));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_invoked() {
        let mut h = Harness::start();
        h.send(request(5, "tools/call", json!({"name": "foo"}))).await;

        let resp = h.recv().await;
        assert_eq!(resp["error"]["code"], -32601);
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_tool_name() {
        let mut h = Harness::start();
        h.send(request(6, "tools/call", json!({"arguments": {}}))).await;

        let resp = h.recv().await;
        assert_eq!(resp["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_empty_tool_name_is_missing() {
        let mut h = Harness::start();
        h.send(request(14, "tools/call", json!({"name": ""}))).await;

        let resp = h.recv().await;
        assert_eq!(resp["id"], 14);
        assert_eq!(resp["error"]["code"], -32602);
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_running_tool_call_does_not_block_intake() {
        let gate = Arc::new(Notify::new());
        let tool_gate = gate.clone();
        let mut h = Harness::with_tools(move |registry| {
            registry.register(Arc::new(GatedTool { gate: tool_gate }));
        });

        h.send(request(15, "tools/call", json!({"name": "gated"}))).await;
        h.send(request(16, "ping", json!({}))).await;

        // The ping is answered while the tool is still waiting
        let first = h.recv().await;
        assert_eq!(first["id"], 16);
        assert_eq!(first["result"], json!({}));

        // notify_one stores a permit if the tool has not started waiting yet
        gate.notify_one();
        let second = h.recv().await;
        assert_eq!(second["id"], 15);
        assert_eq!(second["result"]["content"][0]["json"], "released");
    }

    #[tokio::test]
    async fn test_ping_and_unknown_method() {
        let mut h = Harness::start();
        h.send(request(7, "ping", Value::Null)).await;
        assert_eq!(h.recv().await["result"], json!({}));

        h.send(request(8, "resources/list", json!({}))).await;
        let resp = h.recv().await;
        assert_eq!(resp["id"], 8);
        assert_eq!(resp["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_notifications_get_no_reply() {
        let mut h = Harness::start();
        h.send(notification("notifications/initialized")).await;
        h.send(notification("something/else")).await;
        h.send(request(9, "ping", json!({}))).await;

        // The first reply is for the ping
        assert_eq!(h.recv().await["id"], 9);
    }

    #[tokio::test]
    async fn test_malformed_input_does_not_stop_the_loop() {
        let mut h = Harness::start();
        h.send_raw(b"X-Junk: 1\r\n\r\n").await;
        h.send_raw(b"Content-Length: 5\r\n\r\n{oops").await;
        h.send(request(10, "ping", json!({}))).await;

        assert_eq!(h.recv().await["id"], 10);
    }

    #[tokio::test]
    async fn test_two_messages_in_one_chunk() {
        let mut h = Harness::start();
        let mut chunk = Vec::new();
        for id in [11, 12] {
            let body = serde_json::to_vec(&request(id, "ping", json!({}))).unwrap();
            chunk.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
            chunk.extend_from_slice(&body);
        }
        h.send_raw(&chunk).await;

        assert_eq!(h.recv().await["id"], 11);
        assert_eq!(h.recv().await["id"], 12);
    }

    #[tokio::test]
    async fn test_exit_after_shutdown() {
        let mut h = Harness::start();
        h.send(request(13, "shutdown", json!({}))).await;
        assert_eq!(h.recv().await["result"], json!({}));

        h.send(notification("exit")).await;
        let termination = h.finish().await;
        assert_eq!(termination, Termination::Exit { shutdown_requested: true });
        assert_eq!(termination.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_exit_without_shutdown() {
        let mut h = Harness::start();
        h.send(notification("exit")).await;

        let termination = h.finish().await;
        assert_eq!(termination, Termination::Exit { shutdown_requested: false });
        assert_eq!(termination.exit_code(), 1);
    }

    #[test]
    fn test_end_of_input_exit_code() {
        assert_eq!(Termination::EndOfInput.exit_code(), 0);
    }
}
