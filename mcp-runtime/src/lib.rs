use std::collections::HashSet;
use std::sync::Arc;

use clap::{Args, Subcommand};
use serde_json::{Map, Value, json};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use zia_mcp_core::{CallContext, ToolError, codes};

pub mod client;
pub mod http_client;
pub mod tools;
pub mod util;

use http_client::HttpClientResolver;
use tools::{
    ToolContext, ToolDefinition, error_envelope, execute_tool, find_tool, tool_definitions,
    write_tools_disabled,
};

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "zia-mcp";
/// Largest Content-Length body the server will buffer.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;
const DEFAULT_LOG_FILTER: &str = "zia=info,zia_mcp=info,zia_mcp_runtime=info,zia_mcp_core=info";

#[derive(Subcommand)]
pub enum McpCommands {
    /// Run the ZIA MCP server over stdio
    Serve(McpServeArgs),
}

impl McpCommands {
    pub fn log_json(&self) -> bool {
        match self {
            Self::Serve(args) => args.log_json,
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct McpServeArgs {
    /// Expose create/update/delete tools (read-only by default)
    #[arg(long, env = "ZIA_MCP_ENABLE_WRITE_TOOLS")]
    pub enable_write_tools: bool,
    /// Comma-separated allow-list of tool names to expose
    #[arg(long, env = "ZIA_MCP_TOOLS", value_delimiter = ',')]
    pub tools: Vec<String>,
    /// Emit logs as JSON lines on stderr
    #[arg(long, env = "ZIA_MCP_LOG_JSON")]
    pub log_json: bool,
}

/// Installs the global subscriber. Logs go to stderr; stdout carries the protocol.
pub fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    let result = if log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(err) = result {
        eprintln!("tracing already initialized: {err}");
    }
}

pub async fn run(command: McpCommands) -> i32 {
    match command {
        McpCommands::Serve(args) => {
            let resolver = Arc::new(HttpClientResolver::from_env());
            let server = McpServer::new(
                ToolContext::from_env(resolver),
                McpRuntimeConfig::from_args(&args),
            );
            match server.serve_stdio().await {
                Ok(()) => 0,
                Err(err) => {
                    let payload = json!({
                        "error": "mcp_server_error",
                        "message": err,
                    });
                    eprintln!("{}", to_pretty_json(&payload));
                    1
                }
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct McpRuntimeConfig {
    pub enable_write_tools: bool,
    /// `None` exposes every tool.
    pub allowed_tools: Option<HashSet<String>>,
}

impl McpRuntimeConfig {
    pub fn from_args(args: &McpServeArgs) -> Self {
        let allowed: HashSet<String> = args
            .tools
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        Self {
            enable_write_tools: args.enable_write_tools,
            allowed_tools: if allowed.is_empty() { None } else { Some(allowed) },
        }
    }

    fn is_allowed(&self, name: &str) -> bool {
        self.allowed_tools
            .as_ref()
            .is_none_or(|allowed| allowed.contains(name))
    }

    fn exposes(&self, tool: &ToolDefinition) -> bool {
        self.is_allowed(tool.name) && (self.enable_write_tools || !tool.is_write())
    }
}

pub struct McpServer {
    tools: ToolContext,
    config: McpRuntimeConfig,
    session_id: String,
}

impl McpServer {
    pub fn new(tools: ToolContext, config: McpRuntimeConfig) -> Self {
        Self {
            tools,
            config,
            session_id: format!("stdio-{}", Uuid::now_v7()),
        }
    }

    pub async fn serve_stdio(&self) -> Result<(), String> {
        self.serve(BufReader::new(io::stdin()), io::stdout()).await
    }

    /// Answers each message in the framing it arrived in, until the reader hits EOF.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<(), String>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(
            session_id = %self.session_id,
            write_tools = self.config.enable_write_tools,
            "mcp server listening on stdio"
        );

        loop {
            let frame = read_frame(&mut reader)
                .await
                .map_err(|e| format!("Failed to read MCP message: {e}"))?;
            let Some(frame) = frame else {
                break;
            };

            let reply = match frame.body {
                Ok(incoming) => self.handle_incoming_message(incoming).await,
                Err(message) => Some(error_response(Value::Null, RpcError::parse_error(message))),
            };
            if let Some(reply) = reply {
                write_frame(&mut writer, &reply, frame.framing)
                    .await
                    .map_err(|e| format!("Failed to write MCP response: {e}"))?;
            }
        }

        tracing::info!(session_id = %self.session_id, "input closed, shutting down");
        Ok(())
    }

    async fn handle_incoming_message(&self, incoming: Value) -> Option<Value> {
        let Some(batch) = incoming.as_array() else {
            return self.handle_single_message(incoming).await;
        };

        if batch.is_empty() {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Batch request must not be empty"),
            ));
        }
        let mut responses = Vec::new();
        for item in batch {
            if let Some(response) = self.handle_single_message(item.clone()).await {
                responses.push(response);
            }
        }
        if responses.is_empty() {
            None
        } else {
            Some(Value::Array(responses))
        }
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // A client response; this server never issues requests.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        let Some(id) = obj.get("id").cloned() else {
            tracing::debug!(method, "notification ignored");
            return None;
        };
        Some(match self.handle_request(method, params).await {
            Ok(payload) => success_response(id, payload),
            Err(err) => error_response(id, err),
        })
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        let mut instructions = String::from(
            "Tools manage Zscaler Internet Access configuration. List parameters accept native arrays, JSON-encoded strings or comma-separated text. Destructive tools return status=confirmation_required first; repeat the same call with kwargs='{\"confirmed\": true}' only after the user agrees.",
        );
        if !self.config.enable_write_tools {
            instructions.push_str(" This server is read-only: write tools are disabled.");
        }
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                },
                "resources": {
                    "listChanged": false
                },
                "prompts": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": instructions
        })
    }

    fn tools_list_payload(&self) -> Value {
        let tools: Vec<Value> = tool_definitions()
            .iter()
            .filter(|tool| self.config.exposes(tool))
            .map(ToolDefinition::to_value)
            .collect();
        json!({ "tools": tools })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let mut args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };
        let call = CallContext::split_from(&mut args);
        tracing::info!(session_id = %self.session_id, tool = name, "tools/call");

        if let Err(err) = self.check_exposed(name) {
            return Ok(build_tool_call_response(name, error_envelope(name, &err), true));
        }

        match execute_tool(&self.tools, name, &args, call).await {
            Ok(output) => Ok(build_tool_call_response(name, output.into_envelope(name), false)),
            Err(err) => {
                tracing::warn!(tool = name, code = %err.code, error = %err.message, "tool call failed");
                Ok(build_tool_call_response(name, error_envelope(name, &err), true))
            }
        }
    }

    fn check_exposed(&self, name: &str) -> Result<(), ToolError> {
        let Some(tool) = find_tool(name) else {
            // Unknown names fall through to the dispatcher's own error.
            return Ok(());
        };
        if !self.config.is_allowed(name) {
            return Err(ToolError::new(
                codes::UNKNOWN_TOOL,
                format!("Tool '{name}' is not enabled on this server"),
            )
            .with_field("name")
            .with_docs_hint("Call tools/list to see the available tool names."));
        }
        if tool.is_write() && !self.config.enable_write_tools {
            return Err(write_tools_disabled(name));
        }
        Ok(())
    }
}

fn build_tool_call_response(tool_name: &str, envelope: Value, is_error: bool) -> Value {
    let text = tool_text_content(tool_name, &envelope);
    if is_error {
        json!({
            "isError": true,
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    } else {
        json!({
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    }
}

// Agents usually read only the text block, so it carries the whole envelope.
fn tool_text_content(_tool: &str, envelope: &Value) -> String {
    to_pretty_json(envelope)
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
    data: Option<Value>,
}

impl RpcError {
    fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
            data: None,
        }
    }

    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
            data: Some(json!({ "method": method })),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    let mut payload = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    });
    if let Some(data) = error.data {
        payload["error"]["data"] = data;
    }
    payload
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    ContentLength,
    NewlineDelimited,
}

struct Frame {
    framing: Framing,
    body: Result<Value, String>,
}

fn parse_body(bytes: &[u8]) -> Result<Value, String> {
    serde_json::from_slice(bytes).map_err(|e| format!("Invalid JSON payload: {e}"))
}

/// Reads one message. A line starting with `{` or `[` is a whole message;
/// anything else starts a `Content-Length` header block.
async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut in_headers = false;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if !in_headers {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if !in_headers {
            let start = line.trim_start();
            if start.is_empty() {
                continue;
            }
            if start.starts_with('{') || start.starts_with('[') {
                return Ok(Some(Frame {
                    framing: Framing::NewlineDelimited,
                    body: parse_body(start.as_bytes()),
                }));
            }
            in_headers = true;
        }

        if line.is_empty() {
            break;
        }
        if line.to_ascii_lowercase().starts_with("content-length:") {
            let raw_len = line
                .split_once(':')
                .map(|(_, right)| right.trim())
                .unwrap_or_default();
            let parsed = raw_len.parse::<usize>().map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "Invalid Content-Length header",
                )
            })?;
            content_length = Some(parsed);
        }
    }

    let content_length = content_length.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Missing Content-Length header",
        )
    })?;
    if content_length > MAX_FRAME_BYTES {
        let mut body = (&mut *reader).take(content_length as u64);
        io::copy(&mut body, &mut io::sink()).await?;
        tracing::warn!(content_length, "discarded oversized mcp frame");
        return Ok(Some(Frame {
            framing: Framing::ContentLength,
            body: Err(format!(
                "Content-Length {content_length} exceeds the {MAX_FRAME_BYTES} byte limit"
            )),
        }));
    }
    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;

    Ok(Some(Frame {
        framing: Framing::ContentLength,
        body: parse_body(&payload),
    }))
}

async fn write_frame<W>(writer: &mut W, value: &Value, framing: Framing) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
        Framing::NewlineDelimited => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

pub fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
