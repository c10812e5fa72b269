use crate::config::AppState;
use crate::middleware::auth::require_bearer;
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use fx_core::{AuthContext, FxError};
use fx_mcp::protocol::JsonRpcRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

mod oauth;

/// Start the HTTP transport
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("MCP HTTP endpoint listening on http://{}/mcp", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the API router
fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    // Only the MCP endpoint sits behind the auth gate
    let protected = Router::new()
        .route("/mcp", post(mcp_endpoint))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    let mut router = Router::new()
        .route("/health", get(health_check))
        .merge(protected);

    if state.oauth.is_some() {
        router = router
            .route(
                "/.well-known/oauth-protected-resource",
                get(oauth::protected_resource_metadata),
            )
            .route("/auth/login", get(oauth::login))
            .route("/auth/callback", get(oauth::callback));
    }

    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "fx-mcp-server",
        "version": env!("CARGO_PKG_VERSION"),
        "auth": state.mcp.gate().is_enabled(),
    }))
}

/// One JSON-RPC message per POST; notifications are acknowledged with 202.
async fn mcp_endpoint(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    body: String,
) -> Response {
    let request = match JsonRpcRequest::parse(&body) {
        Ok(request) => request,
        Err(rejection) => {
            tracing::warn!(code = ?rejection.error.as_ref().map(|e| e.code), "Rejected JSON-RPC message");
            return (StatusCode::BAD_REQUEST, Json(rejection)).into_response();
        }
    };

    match state.mcp.handle_request(request, Some(&auth)).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// Error type for non-MCP handlers
pub struct ApiError(FxError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            FxError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            FxError::UpstreamUnavailable(_) | FxError::UpstreamMalformed(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let response = ErrorResponse::with_details(self.0.kind(), self.0.to_string());
        (status, Json(response)).into_response()
    }
}

impl From<FxError> for ApiError {
    fn from(err: FxError) -> Self {
        Self(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
