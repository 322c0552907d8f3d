//! Per-session MCP server.
//!
//! Each session gets a fresh instance at initialize time. Construction is
//! cheap: the instance holds references to the shared searcher and the
//! product configuration, plus the assembled instructions string. Every
//! tool invocation runs under the ambient request context and emits one
//! structured access-log line.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Value, json};

use crate::config::ResolvedConfig;
use crate::mcp::context;
use crate::mcp::protocol::{
    CallToolParams, CallToolResult, ContentItem, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    InitializeResult, JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse, ListResourcesResult,
    ListToolsResult, METHOD_NOT_FOUND, PROTOCOL_VERSION, ReadResourceParams, ReadResourceResult,
    ResourceContent, ResourceDescriptor, ServerInfo, ToolDescriptor,
};
use crate::search::Searcher;

/// Upper bound a client may request via the `limit` tool argument.
const MAX_TOOL_LIMIT: u64 = 20;

/// Fixed workflow preamble of the server instructions.
const WORKFLOW_INSTRUCTIONS: &str = "Documentation retrieval workflow:\n\
    1. Call `search` with a natural-language query to find relevant documentation chunks.\n\
    2. Inspect `content_preview` and `doc_id` in the results.\n\
    3. Call `fetch` with a `doc_id` to read the full document.\n\
    4. Call `get_code_guidelines` before writing code samples for this product.";

/// URI scheme under which guideline resources are exposed.
const GUIDELINES_SCHEME: &str = "guidelines://";

enum ToolFailure {
    InvalidParams(String),
    Internal(String),
}

/// MCP server bound to one product's searcher and configuration.
pub struct McpServer {
    config: Arc<ResolvedConfig>,
    searcher: Arc<Searcher>,
    instructions: String,
}

impl McpServer {
    /// Creates a server instance for one session.
    #[must_use]
    pub fn new(config: Arc<ResolvedConfig>, searcher: Arc<Searcher>) -> Self {
        let instructions = config.instructions.as_ref().map_or_else(
            || WORKFLOW_INSTRUCTIONS.to_string(),
            |extra| format!("{WORKFLOW_INSTRUCTIONS}\n\n{extra}"),
        );
        Self {
            config,
            searcher,
            instructions,
        }
    }

    /// Processes one JSON-RPC message. Notifications return `None`.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            // notifications/initialized and friends: accepted silently.
            return None;
        }
        let id = request.id.clone();
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                id,
                INVALID_REQUEST,
                "expected jsonrpc 2.0",
            ));
        }

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.initialize_result()),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(
                id,
                json_or_internal(&ListToolsResult {
                    tools: self.tool_descriptors(),
                }),
            ),
            "tools/call" => self.call_tool(id, request.params).await,
            "resources/list" => JsonRpcResponse::success(
                id,
                json_or_internal(&ListResourcesResult {
                    resources: self.resource_descriptors(),
                }),
            ),
            "resources/read" => self.read_resource(id, request.params),
            other => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            ),
        };
        Some(response)
    }

    fn initialize_result(&self) -> Value {
        json_or_internal(&InitializeResult {
            protocol_version: PROTOCOL_VERSION,
            capabilities: json!({"tools": {}, "resources": {}}),
            server_info: ServerInfo {
                name: format!("{}-docs", self.config.product_id),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: self.instructions.clone(),
        })
    }

    fn tool_descriptors(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor {
                name: "search".to_string(),
                description: format!(
                    "Hybrid semantic + lexical search over the {} documentation. \
                     Returns ranked chunks with previews and doc ids.",
                    self.config.name
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "minLength": 1,
                            "description": "Natural-language query",
                        },
                        "limit": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": MAX_TOOL_LIMIT,
                            "default": self.config.search.default_limit,
                            "description": "Maximum results to return",
                        },
                    },
                    "required": ["query"],
                }),
            },
            ToolDescriptor {
                name: "fetch".to_string(),
                description: "Fetch a whole document by doc_id, chunks joined in order."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "doc_id": {
                            "type": "string",
                            "description": "Document id from a search result",
                        },
                    },
                    "required": ["doc_id"],
                }),
            },
            ToolDescriptor {
                name: "get_code_guidelines".to_string(),
                description: format!(
                    "Coding guidelines and conventions for {} samples.",
                    self.config.name
                ),
                input_schema: json!({"type": "object", "properties": {}}),
            },
        ]
    }

    async fn call_tool(&self, id: Option<crate::mcp::protocol::RequestId>, params: Value) -> JsonRpcResponse {
        let Ok(params) = serde_json::from_value::<CallToolParams>(params) else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "invalid tools/call params");
        };

        let started = Instant::now();
        let outcome = match params.name.as_str() {
            "search" => self.tool_search(&params.arguments).await,
            "fetch" => self.tool_fetch(&params.arguments).await,
            "get_code_guidelines" => self.tool_guidelines(),
            other => Err(ToolFailure::InvalidParams(format!("unknown tool: {other}"))),
        };
        self.log_access(&params.name, started, &outcome);

        match outcome {
            Ok((payload, _)) => {
                let text = serde_json::to_string_pretty(&payload)
                    .unwrap_or_else(|_| payload.to_string());
                let result = CallToolResult {
                    content: vec![ContentItem::text(text)],
                    is_error: false,
                };
                JsonRpcResponse::success(id, json_or_internal(&result))
            }
            Err(ToolFailure::InvalidParams(message)) => {
                JsonRpcResponse::error(id, INVALID_PARAMS, message)
            }
            Err(ToolFailure::Internal(message)) => {
                JsonRpcResponse::error(id, INTERNAL_ERROR, message)
            }
        }
    }

    async fn tool_search(&self, arguments: &Value) -> Result<(Value, usize), ToolFailure> {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| {
                ToolFailure::InvalidParams("query must be a non-empty string".to_string())
            })?;

        let limit = match arguments.get("limit") {
            None | Some(Value::Null) => self.config.search.default_limit,
            Some(value) => {
                let limit = value.as_u64().filter(|l| (1..=MAX_TOOL_LIMIT).contains(l));
                #[allow(clippy::cast_possible_truncation)]
                match limit {
                    Some(l) => l as usize,
                    None => {
                        return Err(ToolFailure::InvalidParams(format!(
                            "limit must be an integer in 1..={MAX_TOOL_LIMIT}"
                        )));
                    }
                }
            }
        };

        let response = self
            .searcher
            .search(query, Some(limit), None)
            .await
            .map_err(|e| ToolFailure::Internal(e.to_string()))?;

        let count = response.total;
        let mut payload = serde_json::to_value(&response)
            .map_err(|e| ToolFailure::Internal(e.to_string()))?;
        if let Some(map) = payload.as_object_mut() {
            map.insert(
                "next_step".to_string(),
                json!("Call `fetch` with a doc_id from the results to read the full document."),
            );
        }
        Ok((payload, count))
    }

    async fn tool_fetch(&self, arguments: &Value) -> Result<(Value, usize), ToolFailure> {
        let doc_id = arguments
            .get("doc_id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                ToolFailure::InvalidParams("doc_id must be a non-empty string".to_string())
            })?;

        let chunks = self
            .searcher
            .get_doc_chunks(doc_id)
            .await
            .map_err(|e| ToolFailure::Internal(e.to_string()))?;

        let chunk_count = chunks.len();
        let full_content = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let next_step = if chunk_count == 0 {
            "No chunks found for this doc_id. Use `search` to find valid doc ids."
        } else {
            "Full document retrieved. Use `search` again to explore related topics."
        };
        let payload = json!({
            "doc_id": doc_id,
            "chunk_count": chunk_count,
            "full_content": full_content,
            "next_step": next_step,
        });
        Ok((payload, chunk_count))
    }

    fn tool_guidelines(&self) -> Result<(Value, usize), ToolFailure> {
        if self.config.resources.is_empty() {
            let payload = json!({
                "guidelines": {},
                "message": "No code guidelines are configured for this product.",
            });
            return Ok((payload, 0));
        }
        let guidelines: serde_json::Map<String, Value> = self
            .config
            .resources
            .iter()
            .map(|(key, resource)| {
                (
                    key.clone(),
                    json!({
                        "name": resource.name,
                        "description": resource.description,
                        "content": resource.content,
                    }),
                )
            })
            .collect();
        let count = guidelines.len();
        Ok((json!({ "guidelines": guidelines }), count))
    }

    fn resource_descriptors(&self) -> Vec<ResourceDescriptor> {
        self.config
            .resources
            .iter()
            .map(|(key, resource)| ResourceDescriptor {
                uri: format!("{GUIDELINES_SCHEME}{key}"),
                name: resource.name.clone(),
                description: resource.description.clone(),
                mime_type: resource.mime_type.clone(),
            })
            .collect()
    }

    fn read_resource(
        &self,
        id: Option<crate::mcp::protocol::RequestId>,
        params: Value,
    ) -> JsonRpcResponse {
        let Ok(params) = serde_json::from_value::<ReadResourceParams>(params) else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "invalid resources/read params");
        };
        let Some(key) = params.uri.strip_prefix(GUIDELINES_SCHEME) else {
            return JsonRpcResponse::error(
                id,
                INVALID_PARAMS,
                format!("unknown resource uri: {}", params.uri),
            );
        };
        match self.config.resources.get(key) {
            Some(resource) => JsonRpcResponse::success(
                id,
                json_or_internal(&ReadResourceResult {
                    contents: vec![ResourceContent {
                        uri: params.uri.clone(),
                        mime_type: resource.mime_type.clone(),
                        text: resource.content.clone(),
                    }],
                }),
            ),
            None => JsonRpcResponse::error(
                id,
                INVALID_PARAMS,
                format!("unknown resource: {key}"),
            ),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn log_access(
        &self,
        tool: &str,
        started: Instant,
        outcome: &Result<(Value, usize), ToolFailure>,
    ) {
        let ctx = context::current();
        let (request_id, session_id, client_info, client_ip) = ctx.as_ref().map_or(
            (None, None, None, None),
            |c| {
                (
                    Some(c.request_id.as_str()),
                    Some(c.session_id.as_str()),
                    c.client_info.as_deref(),
                    c.client_ip.as_deref(),
                )
            },
        );
        let duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok((_, result_count)) => tracing::info!(
                r#type = "access",
                request_id,
                session_id,
                product_id = %self.config.product_id,
                client_info,
                client_ip,
                tool,
                duration_ms,
                result_count,
                "tool call"
            ),
            Err(ToolFailure::InvalidParams(message) | ToolFailure::Internal(message)) => {
                tracing::info!(
                    r#type = "access",
                    request_id,
                    session_id,
                    product_id = %self.config.product_id,
                    client_info,
                    client_ip,
                    tool,
                    duration_ms,
                    error = %message,
                    "tool call failed"
                );
            }
        }
    }
}

fn json_or_internal<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| json!({"serialization_error": e.to_string()}))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{ChunkerKind, ResourceEntry, SearchParams};
    use crate::embedding::VoyageClient;
    use crate::limiter::RateLimiter;
    use crate::mcp::protocol::RequestId;
    use crate::store::QdrantClient;
    use std::collections::BTreeMap;

    pub(crate) fn test_config() -> Arc<ResolvedConfig> {
        let mut resources = BTreeMap::new();
        resources.insert(
            "style".to_string(),
            ResourceEntry {
                name: "Style guide".to_string(),
                description: "Sample style".to_string(),
                mime_type: "text/markdown".to_string(),
                content: "Suspend painting around batch updates.".to_string(),
            },
        );
        Arc::new(ResolvedConfig {
            product_id: "spreadjs".to_string(),
            name: "SpreadJS".to_string(),
            company_short: "GR".to_string(),
            chunker: ChunkerKind::Typedoc,
            doc_subdirs: vec!["apis".to_string()],
            search: SearchParams::default(),
            instructions: Some("Prefer the API reference.".to_string()),
            min_chunk_size: 100,
            lang: "en".to_string(),
            doc_language: "en".to_string(),
            collection: "spreadjs_en".to_string(),
            raw_data: "spreadjs_en".to_string(),
            description: None,
            resources,
        })
    }

    pub(crate) fn test_server() -> Arc<McpServer> {
        test_server_with_urls("http://127.0.0.1:1", "http://127.0.0.1:1")
    }

    pub(crate) fn test_server_with_urls(voyage_url: &str, qdrant_url: &str) -> Arc<McpServer> {
        let config = test_config();
        let limiter = Arc::new(RateLimiter::new(10_000, 100_000_000));
        let embedder = Arc::new(
            VoyageClient::new("k", "voyage-code-3", "rerank-2.5", 128, limiter)
                .with_base_url(voyage_url),
        );
        let store = Arc::new(QdrantClient::new(qdrant_url, None));
        let searcher = Arc::new(Searcher::new(Arc::clone(&config), embedder, store));
        Arc::new(McpServer::new(config, searcher))
    }

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(RequestId::Num(1)),
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn test_initialize_carries_instructions() {
        let server = test_server();
        let response = server
            .handle(request("initialize", json!({})))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "spreadjs-docs");
        let instructions = result["instructions"].as_str().unwrap();
        assert!(instructions.contains("Documentation retrieval workflow"));
        assert!(instructions.ends_with("Prefer the API reference."));
    }

    #[tokio::test]
    async fn test_tools_list_is_fixed_surface() {
        let server = test_server();
        let response = server.handle(request("tools/list", json!({}))).await.unwrap();
        let result = response.result.unwrap();
        let names: Vec<&str> = result["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["search", "fetch", "get_code_guidelines"]);
        // The search schema advertises the product default limit.
        assert_eq!(result["tools"][0]["inputSchema"]["properties"]["limit"]["default"], 5);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let server = test_server();
        let notification = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: "notifications/initialized".to_string(),
            params: json!({}),
        };
        assert!(server.handle(notification).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let server = test_server();
        let response = server
            .handle(request("prompts/list", json!({})))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_search_rejects_bad_params() {
        let server = test_server();

        let response = server
            .handle(request(
                "tools/call",
                json!({"name": "search", "arguments": {"query": "   "}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);

        let response = server
            .handle(request(
                "tools/call",
                json!({"name": "search", "arguments": {"query": "ok", "limit": 50}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_unknown_tool_rejected() {
        let server = test_server();
        let response = server
            .handle(request(
                "tools/call",
                json!({"name": "delete_everything", "arguments": {}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_guidelines_tool_returns_resources() {
        let server = test_server();
        let response = server
            .handle(request(
                "tools/call",
                json!({"name": "get_code_guidelines", "arguments": {}}),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        let payload: Value = serde_json::from_str(text).unwrap();
        assert_eq!(payload["guidelines"]["style"]["name"], "Style guide");
        assert!(
            payload["guidelines"]["style"]["content"]
                .as_str()
                .unwrap()
                .contains("Suspend painting")
        );
    }

    #[tokio::test]
    async fn test_resources_list_and_read() {
        let server = test_server();
        let response = server
            .handle(request("resources/list", json!({})))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["resources"][0]["uri"], "guidelines://style");
        assert_eq!(result["resources"][0]["mimeType"], "text/markdown");

        let response = server
            .handle(request(
                "resources/read",
                json!({"uri": "guidelines://style"}),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert!(
            result["contents"][0]["text"]
                .as_str()
                .unwrap()
                .contains("Suspend painting")
        );

        let response = server
            .handle(request(
                "resources/read",
                json!({"uri": "guidelines://missing"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_search_failure_maps_to_internal_error() {
        // Unroutable upstream: the search tool must fail with -32603.
        let server = test_server();
        let response = server
            .handle(request(
                "tools/call",
                json!({"name": "search", "arguments": {"query": "conditional formatting"}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, INTERNAL_ERROR);
    }
}
