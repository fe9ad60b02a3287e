//! MCP tool surface.
//!
//! Exposes the two search operations as MCP tools so coding agents can
//! consult the indexes directly:
//!
//! * `ripgrep_search { pattern, caseSensitive?, maxResults? }`
//! * `embedding_search { query, maxResults?, model?, extensions? }`
//!
//! Tool results are JSON-stringified payloads of the same shape the HTTP
//! endpoints return. The handler is served over the streamable HTTP
//! transport nested into the axum router (see [`crate::server`]).

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler};

use crate::server::{
    run_embedding_search, run_ripgrep_search, AppState, EmbeddingSearchRequest,
    RipgrepSearchRequest,
};

/// MCP handler; every session shares the same state clone.
#[derive(Clone)]
pub struct SearchTools {
    state: AppState,
}

impl SearchTools {
    pub fn new(state: AppState) -> Self {
        SearchTools { state }
    }

    fn tool(name: &'static str, description: &'static str, schema: serde_json::Value) -> Tool {
        let input_schema: Arc<serde_json::Map<String, serde_json::Value>> = match schema {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };

        Tool {
            name: Cow::Borrowed(name),
            title: None,
            description: Some(Cow::Borrowed(description)),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(true)),
            icons: None,
        }
    }

    fn ripgrep_tool() -> Tool {
        Self::tool(
            "ripgrep_search",
            "Exact text search over all indexed folders and repositories using ripgrep.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Regular expression to search for"
                    },
                    "caseSensitive": {
                        "type": "boolean",
                        "description": "Match case exactly (default false)"
                    },
                    "maxResults": {
                        "type": "integer",
                        "description": "Hard cap on returned matches"
                    }
                },
                "required": ["pattern"]
            }),
        )
    }

    fn embedding_tool() -> Tool {
        Self::tool(
            "embedding_search",
            "Semantic similarity search over all indexed fragments.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Natural-language query"
                    },
                    "maxResults": {
                        "type": "integer",
                        "description": "Hard cap on returned fragments"
                    },
                    "model": {
                        "type": "string",
                        "description": "Embedding model (defaults to the configured one)"
                    },
                    "extensions": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Restrict results to these file extensions"
                    }
                },
                "required": ["query"]
            }),
        )
    }
}

impl ServerHandler for SearchTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "codescout".to_string(),
                title: Some("codescout".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Local code and document search. Use ripgrep_search for exact text \
                 matches and embedding_search for semantic lookups over the indexed \
                 folders and git repositories."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult::with_all_items(vec![
            Self::ripgrep_tool(),
            Self::embedding_tool(),
        ])))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let params = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        match request.name.as_ref() {
            "ripgrep_search" => {
                let parsed: RipgrepSearchRequest =
                    serde_json::from_value(params).map_err(invalid_params)?;
                let response = run_ripgrep_search(&self.state, parsed).await;
                let text = serde_json::to_string_pretty(&response).unwrap_or_default();
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            "embedding_search" => {
                let parsed: EmbeddingSearchRequest =
                    serde_json::from_value(params).map_err(invalid_params)?;
                match run_embedding_search(&self.state, parsed).await {
                    Ok(response) => {
                        let text = serde_json::to_string_pretty(&response).unwrap_or_default();
                        Ok(CallToolResult::success(vec![Content::text(text)]))
                    }
                    Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
                }
            }
            other => Err(McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {other}"),
                None,
            )),
        }
    }
}

fn invalid_params(e: serde_json::Error) -> McpError {
    McpError::new(
        ErrorCode::INVALID_PARAMS,
        format!("invalid tool arguments: {e}"),
        None,
    )
}
