use crate::config::RelayConfig;
use crate::context_store::ContextStore;
use crate::logging::{LogLevel, SharedLogger};
use crate::proxy::ChatProvider;
use crate::translate::relay_types::{ChatRequest, ErrorResponse, RelayResponse};

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::handler::Handler;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: RelayConfig,
    pub provider: Arc<dyn ChatProvider>,
    pub contexts: ContextStore,
    pub logger: SharedLogger,
}

impl AppState {
    /// State with an empty context store.
    pub fn new(config: RelayConfig, provider: Arc<dyn ChatProvider>, logger: SharedLogger) -> Self {
        Self {
            config,
            provider,
            contexts: ContextStore::new(),
            logger,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Files under the static root win over the JSON 404, for any method.
    let root_files = ServeDir::new(&state.config.static_files.root)
        .call_fallback_on_method_not_allowed(true)
        .fallback(handle_not_found.with_state(state.clone()));

    Router::new()
        .route("/api/llm", post(handle_llm).fallback(handle_not_found))
        .route(
            "/api/dog-context/:id",
            get(handle_get_context)
                .post(handle_put_context)
                .put(handle_put_context)
                .fallback(handle_not_found),
        )
        .route(
            "/api/check-ar",
            get(handle_check_ar).fallback(handle_not_found),
        )
        .route("/api/log", post(handle_client_log).fallback(handle_not_found))
        .route_service("/", ServeFile::new(state.config.index_path()))
        .nest_service("/assets", ServeDir::new(&state.config.static_files.assets))
        .fallback_service(root_files)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Log a start line and a finish line (with elapsed time) for every request.
async fn log_requests(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let method = req.method().clone();
    let url = req.uri().to_string();
    let started = Instant::now();

    state.logger.log_with_context(
        LogLevel::Info,
        "http",
        format!("--> {} {}", method, url),
        json!({
            "requestId": request_id,
            "method": method.as_str(),
            "url": url,
            "headers": headers_to_json(req.headers()),
        }),
    );

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    state.logger.log_with_context(
        LogLevel::Info,
        "http",
        format!("<-- {} {} {} {}ms", method, url, status, elapsed_ms),
        json!({
            "requestId": request_id,
            "method": method.as_str(),
            "url": url,
            "status": status,
            "elapsedMs": elapsed_ms,
        }),
    );

    if response.status().is_server_error() {
        state.logger.log_with_context(
            LogLevel::Error,
            "http",
            format!("Response error: {} {} returned {}", method, url, status),
            json!({ "requestId": request_id, "status": status }),
        );
    }

    response
}

async fn handle_llm(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    // Only a body that is not JSON at all is refused; fields are taken as sent.
    let req = match parse_json_body(&body) {
        Ok(v) => ChatRequest::from_body(v),
        Err(e) => {
            state
                .logger
                .error("server", format!("Failed to parse request: {}", e));
            let err = ErrorResponse::with_details("Invalid request body", Value::String(e.to_string()));
            return (StatusCode::BAD_REQUEST, Json(err)).into_response();
        }
    };

    state.logger.info(
        "server",
        format!(
            "Relay: provider={} messages={} max_tokens={} temperature={}",
            state.provider.kind(),
            req.turn_count(),
            req.max_tokens,
            req.temperature
        ),
    );

    match state.provider.send(&req).await {
        Ok(resp) => resp.into_response(),
        Err(e) => {
            state
                .logger
                .error("server", format!("Error calling LLM API: {}", e));
            let err = ErrorResponse::with_details("Failed to process request", e.details());
            (StatusCode::INTERNAL_SERVER_ERROR, Json(err)).into_response()
        }
    }
}

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Passthrough(body) => (
                [(header::CONTENT_TYPE, "application/json")],
                Body::from(body),
            )
                .into_response(),
            Self::Normalized(resp) => Json(resp).into_response(),
        }
    }
}

async fn handle_put_context(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    let context = match parse_json_body(&body) {
        Ok(v) => v,
        Err(e) => {
            state
                .logger
                .warn("context", format!("Rejected context for {}: {}", id, e));
            let err = ErrorResponse::with_details("Invalid JSON body", Value::String(e.to_string()));
            return (StatusCode::BAD_REQUEST, Json(err)).into_response();
        }
    };

    state.contexts.upsert(&id, context);
    state.logger.info(
        "context",
        format!("Stored context for {} ({} held)", id, state.contexts.len()),
    );

    Json(json!({ "success": true })).into_response()
}

async fn handle_get_context(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.contexts.get(&id) {
        Some(record) => Json(record).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Context not found")),
        )
            .into_response(),
    }
}

/// Diagnostic endpoint for the client's AR capability check. Sets its own
/// CORS headers rather than relying on the global layer.
async fn handle_check_ar(headers: HeaderMap) -> Response {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let payload = json!({
        "status": "ok",
        "message": "AR check endpoint reached",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "headers": headers_to_json(&headers),
        "userAgent": user_agent,
    });

    (
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                "Origin, X-Requested-With, Content-Type, Accept",
            ),
        ],
        Json(payload),
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientLog {
    #[serde(default)]
    message: Option<Value>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    user_agent: Option<String>,
    #[serde(default)]
    timestamp: Option<Value>,
}

async fn handle_client_log(State(state): State<Arc<AppState>>, body: Bytes) -> Json<Value> {
    let log: ClientLog = parse_json_body(&body)
        .and_then(serde_json::from_value)
        .unwrap_or_default();

    let message = match log.message {
        Some(Value::String(ref s)) => s.clone(),
        Some(ref other) => other.to_string(),
        None => String::new(),
    };

    state.logger.log_with_context(
        LogLevel::from_client_type(log.kind.as_deref()),
        "client",
        message,
        json!({
            "type": log.kind,
            "userAgent": log.user_agent,
            "timestamp": log.timestamp,
        }),
    );

    Json(json!({ "received": true }))
}

async fn handle_not_found(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Response {
    state
        .logger
        .warn("server", format!("404 Not Found: {} {}", method, uri));
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("Endpoint not found")),
    )
        .into_response()
}

/// An empty body reads as `{}`.
fn parse_json_body(body: &Bytes) -> std::result::Result<Value, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body)
}

fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut out = Map::new();
    for key in headers.keys() {
        let joined = headers
            .get_all(key)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        out.insert(key.as_str().to_string(), Value::String(joined));
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_empty_body_is_empty_object() {
        assert_eq!(parse_json_body(&Bytes::new()).unwrap(), json!({}));
        assert_eq!(parse_json_body(&Bytes::from_static(b"  \n")).unwrap(), json!({}));
        assert!(parse_json_body(&Bytes::from_static(b"{not json")).is_err());
    }

    #[test]
    fn test_headers_to_json_joins_repeated_values() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("test-agent"));
        headers.append(header::ACCEPT, HeaderValue::from_static("text/html"));
        headers.append(header::ACCEPT, HeaderValue::from_static("application/json"));

        let out = headers_to_json(&headers);
        assert_eq!(out["user-agent"], "test-agent");
        assert_eq!(out["accept"], "text/html, application/json");
    }

    #[test]
    fn test_client_log_fields() {
        let log: ClientLog = serde_json::from_value(json!({
            "message": "camera denied",
            "type": "error",
            "userAgent": "Safari",
            "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(log.kind.as_deref(), Some("error"));
        assert_eq!(log.user_agent.as_deref(), Some("Safari"));
    }
}
