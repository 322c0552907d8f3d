//! JSON-RPC 2.0 and MCP wire types.
//!
//! Only the slice of the Model Context Protocol this service implements:
//! `initialize`, `ping`, `tools/list`, `tools/call`, `resources/list`,
//! `resources/read`, and the `notifications/initialized` handshake tail.
//! Key names follow the MCP schema (camelCase on the wire).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision implemented by this server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Malformed or unroutable request.
pub const INVALID_REQUEST: i64 = -32600;

/// Unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Parameters failed validation.
pub const INVALID_PARAMS: i64 = -32602;

/// Handler failure.
pub const INTERNAL_ERROR: i64 = -32603;

/// Local extension: the `mcp-session-id` header named no live session.
pub const SESSION_NOT_FOUND: i64 = -32001;

/// JSON-RPC request id: number or string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id.
    Num(i64),
    /// String id.
    Str(String),
}

/// An incoming JSON-RPC request or notification.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol marker, expected to be `"2.0"`.
    pub jsonrpc: String,
    /// Request id; absent for notifications.
    #[serde(default)]
    pub id: Option<RequestId>,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    /// Whether this is a notification (no id, no response expected).
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Whether this is the session-opening `initialize` request.
    #[must_use]
    pub fn is_initialize(&self) -> bool {
        self.method == "initialize"
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

/// An outgoing JSON-RPC response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Protocol marker, always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Id of the request being answered.
    pub id: Option<RequestId>,
    /// Successful result, mutually exclusive with `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error object, mutually exclusive with `result`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a success response.
    #[must_use]
    pub const fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response.
    #[must_use]
    pub fn error(id: Option<RequestId>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// `serverInfo` block of the initialize result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

/// Client identity from the initialize params.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

impl ClientInfo {
    /// Compact `name/version` form used in logs and session entries.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.version {
            Some(version) => format!("{}/{version}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Result of the `initialize` method.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Implemented protocol revision.
    pub protocol_version: &'static str,
    /// Advertised capabilities (`tools`, `resources`).
    pub capabilities: Value,
    /// Server identity.
    pub server_info: ServerInfo,
    /// Usage instructions surfaced to the client model.
    pub instructions: String,
}

/// One tool in a `tools/list` result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Tool name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON Schema of the tool input.
    pub input_schema: Value,
}

/// Result of `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ListToolsResult {
    /// Registered tools.
    pub tools: Vec<ToolDescriptor>,
}

/// Parameters of `tools/call`.
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    /// Tool to invoke.
    pub name: String,
    /// Tool arguments.
    #[serde(default)]
    pub arguments: Value,
}

/// One content item of a tool result.
#[derive(Debug, Clone, Serialize)]
pub struct ContentItem {
    /// Content discriminator, always `"text"` here.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Text body.
    pub text: String,
}

impl ContentItem {
    /// Builds a text content item.
    #[must_use]
    pub const fn text(text: String) -> Self {
        Self { kind: "text", text }
    }
}

/// Result of `tools/call`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// Result content items.
    pub content: Vec<ContentItem>,
    /// Set when the tool reports a failure.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

/// One resource in a `resources/list` result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// Resource URI, `guidelines://{key}`.
    pub uri: String,
    /// Display name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Declared MIME type.
    pub mime_type: String,
}

/// Result of `resources/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ListResourcesResult {
    /// Exposed resources.
    pub resources: Vec<ResourceDescriptor>,
}

/// Parameters of `resources/read`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadResourceParams {
    /// URI to read.
    pub uri: String,
}

/// One content block of `resources/read`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    /// Resource URI.
    pub uri: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// Resource body.
    pub text: String,
}

/// Result of `resources/read`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadResourceResult {
    /// Content blocks.
    pub contents: Vec<ResourceContent>,
}
