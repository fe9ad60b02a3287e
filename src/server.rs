//! HTTP/JSON API over the query engine.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET`  | `/` | none | Service info |
//! | `GET`  | `/openapi.json` | none | OpenAPI document |
//! | `POST` | `/search/ripgrep` | Bearer | Lexical search across all indexes |
//! | `POST` | `/search/embedding` | Bearer | Semantic search across all indexes |
//! | any    | `/mcp` | Bearer | MCP streamable HTTP endpoint |
//!
//! # Error contract
//!
//! Every error is JSON of the form
//! `{ "error": { "code": "...", "message": "..." } }`: unknown paths are
//! 404, wrong methods 405, missing/invalid bearer tokens 401, and a body
//! that fails to parse as JSON is 500. Request bodies are read as raw bytes
//! and parsed by hand so the malformed-JSON shape stays under our control.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; `OPTIONS` preflights
//! answer 200.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::mcp::SearchTools;
use crate::search::{self, GrepHit, SemanticHit};

/// Default result cap for lexical searches.
pub const DEFAULT_GREP_RESULTS: usize = 50;
/// Default result cap for semantic searches.
pub const DEFAULT_EMBEDDING_RESULTS: usize = 10;

/// Shared state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub app_dir: PathBuf,
}

/// Build the full application router, including the nested MCP endpoint.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mcp_state = state.clone();
    let mcp_service = StreamableHttpService::new(
        move || Ok(SearchTools::new(mcp_state.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let mcp_router = Router::new()
        .fallback_service(mcp_service)
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/", get(handle_info).fallback(handle_method_not_allowed))
        .route(
            "/openapi.json",
            get(handle_openapi).fallback(handle_method_not_allowed),
        )
        .route(
            "/search/ripgrep",
            post(handle_ripgrep).fallback(handle_method_not_allowed),
        )
        .route(
            "/search/embedding",
            post(handle_embedding).fallback(handle_method_not_allowed),
        )
        .nest("/mcp", mcp_router)
        .fallback(handle_not_found)
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server (and the nested MCP endpoint) on `bind`.
pub async fn run_server(config: &Config, app_dir: &Path, bind: &str) -> anyhow::Result<()> {
    let state = AppState {
        config: Arc::new(config.clone()),
        app_dir: app_dir.to_path_buf(),
    };
    let app = build_router(state);

    println!("serving on http://{bind}");
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Errors and auth ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: code.to_string(),
            message: message.into(),
        },
    };
    (status, Json(body)).into_response()
}

fn authorized(headers: &HeaderMap, config: &Config) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", config.api_key))
        .unwrap_or(false)
}

/// Bearer-token middleware for the MCP subtree.
async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !authorized(request.headers(), &state.config) {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid bearer token",
        );
    }
    next.run(request).await
}

async fn handle_not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "not_found", "unknown path")
}

async fn handle_method_not_allowed() -> Response {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        "method_not_allowed",
        "method not allowed for this path",
    )
}

// ============ Request / response types ============

/// JSON request body for `POST /search/ripgrep`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RipgrepSearchRequest {
    pub pattern: String,
    pub case_sensitive: bool,
    pub max_results: usize,
}

impl Default for RipgrepSearchRequest {
    fn default() -> Self {
        RipgrepSearchRequest {
            pattern: String::new(),
            case_sensitive: false,
            max_results: DEFAULT_GREP_RESULTS,
        }
    }
}

/// JSON request body for `POST /search/embedding`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSearchRequest {
    pub query: String,
    pub max_results: usize,
    pub model: Option<String>,
    pub extensions: Vec<String>,
}

impl Default for EmbeddingSearchRequest {
    fn default() -> Self {
        EmbeddingSearchRequest {
            query: String::new(),
            max_results: DEFAULT_EMBEDDING_RESULTS,
            model: None,
            extensions: Vec::new(),
        }
    }
}

#[derive(Serialize)]
pub struct RipgrepSearchResponse {
    pub results: Vec<GrepHit>,
}

/// Semantic hit trimmed for the wire: the embedding vector itself is not
/// returned to clients.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingHit {
    pub path: String,
    pub filename: String,
    pub start_line: u32,
    pub end_line: u32,
    pub chunk_algorithm: String,
    pub fragment_type: String,
    pub model: String,
    pub content_score: u8,
    pub similarity: f32,
}

impl From<SemanticHit> for EmbeddingHit {
    fn from(hit: SemanticHit) -> Self {
        EmbeddingHit {
            path: hit.file.path,
            filename: hit.file.filename,
            start_line: hit.fragment.start_line,
            end_line: hit.fragment.end_line,
            chunk_algorithm: hit.fragment.chunk_algorithm,
            fragment_type: hit.fragment.fragment_type,
            model: hit.fragment.model,
            content_score: hit.fragment.content_score,
            similarity: hit.similarity,
        }
    }
}

#[derive(Serialize)]
pub struct EmbeddingSearchResponse {
    pub results: Vec<EmbeddingHit>,
}

/// Run a lexical search across all stored indexes (shared with MCP).
pub async fn run_ripgrep_search(
    state: &AppState,
    request: RipgrepSearchRequest,
) -> RipgrepSearchResponse {
    let results = search::lexical_search_all(
        &state.app_dir,
        &request.pattern,
        request.case_sensitive,
        request.max_results,
    )
    .await;
    RipgrepSearchResponse { results }
}

/// Run a semantic search across all stored indexes (shared with MCP).
pub async fn run_embedding_search(
    state: &AppState,
    request: EmbeddingSearchRequest,
) -> crate::error::Result<EmbeddingSearchResponse> {
    let hits = search::search_all_indexes(
        &state.config,
        &state.app_dir,
        &request.query,
        request.max_results,
        request.model.as_deref(),
        &request.extensions,
    )
    .await?;
    Ok(EmbeddingSearchResponse {
        results: hits.into_iter().map(EmbeddingHit::from).collect(),
    })
}

// ============ Handlers ============

#[derive(Serialize)]
struct InfoResponse {
    name: String,
    version: String,
    endpoints: Vec<String>,
}

async fn handle_info() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "codescout".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: vec![
            "GET /".to_string(),
            "GET /openapi.json".to_string(),
            "POST /search/ripgrep".to_string(),
            "POST /search/embedding".to_string(),
            "POST /mcp".to_string(),
        ],
    })
}

async fn handle_openapi() -> Json<serde_json::Value> {
    Json(openapi_document())
}

async fn handle_ripgrep(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !authorized(&headers, &state.config) {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid bearer token",
        );
    }
    let request: RipgrepSearchRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "bad_json",
                format!("malformed request body: {e}"),
            )
        }
    };
    if request.pattern.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "pattern must not be empty",
        );
    }

    Json(run_ripgrep_search(&state, request).await).into_response()
}

async fn handle_embedding(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !authorized(&headers, &state.config) {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid bearer token",
        );
    }
    let request: EmbeddingSearchRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "bad_json",
                format!("malformed request body: {e}"),
            )
        }
    };
    if request.query.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "query must not be empty",
        );
    }

    match run_embedding_search(&state, request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string()),
    }
}

fn openapi_document() -> serde_json::Value {
    serde_json::json!({
        "openapi": "3.0.3",
        "info": {
            "title": "codescout",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Local code and document search over fragment indexes."
        },
        "paths": {
            "/search/ripgrep": {
                "post": {
                    "summary": "Lexical search via ripgrep across all indexes",
                    "security": [{"bearerAuth": []}],
                    "requestBody": {
                        "required": true,
                        "content": {"application/json": {"schema": {
                            "type": "object",
                            "required": ["pattern"],
                            "properties": {
                                "pattern": {"type": "string"},
                                "caseSensitive": {"type": "boolean", "default": false},
                                "maxResults": {"type": "integer", "default": DEFAULT_GREP_RESULTS}
                            }
                        }}}
                    },
                    "responses": {"200": {"description": "Ranked matches"}}
                }
            },
            "/search/embedding": {
                "post": {
                    "summary": "Semantic search across all indexes",
                    "security": [{"bearerAuth": []}],
                    "requestBody": {
                        "required": true,
                        "content": {"application/json": {"schema": {
                            "type": "object",
                            "required": ["query"],
                            "properties": {
                                "query": {"type": "string"},
                                "maxResults": {"type": "integer", "default": DEFAULT_EMBEDDING_RESULTS},
                                "model": {"type": "string"},
                                "extensions": {"type": "array", "items": {"type": "string"}}
                            }
                        }}}
                    },
                    "responses": {"200": {"description": "Ranked fragments"}}
                }
            }
        },
        "components": {
            "securitySchemes": {
                "bearerAuth": {"type": "http", "scheme": "bearer"}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_apply() {
        let req: RipgrepSearchRequest = serde_json::from_str(r#"{"pattern":"foo"}"#).unwrap();
        assert_eq!(req.pattern, "foo");
        assert!(!req.case_sensitive);
        assert_eq!(req.max_results, DEFAULT_GREP_RESULTS);

        let req: EmbeddingSearchRequest =
            serde_json::from_str(r#"{"query":"q","maxResults":3,"extensions":[".rs"]}"#).unwrap();
        assert_eq!(req.max_results, 3);
        assert_eq!(req.extensions, vec![".rs".to_string()]);
        assert!(req.model.is_none());
    }

    #[test]
    fn bearer_check_is_exact() {
        let config = Config {
            api_key: "secret".to_string(),
            ..Config::default()
        };

        let mut headers = HeaderMap::new();
        assert!(!authorized(&headers, &config));

        headers.insert(header::AUTHORIZATION, "Bearer secret".parse().unwrap());
        assert!(authorized(&headers, &config));

        headers.insert(header::AUTHORIZATION, "Bearer wrong".parse().unwrap());
        assert!(!authorized(&headers, &config));

        headers.insert(header::AUTHORIZATION, "secret".parse().unwrap());
        assert!(!authorized(&headers, &config));
    }

    #[test]
    fn openapi_document_lists_both_search_paths() {
        let doc = openapi_document();
        assert!(doc["paths"]["/search/ripgrep"]["post"].is_object());
        assert!(doc["paths"]["/search/embedding"]["post"].is_object());
    }
}
