// GitHub OAuth helper endpoints, mounted only when auth is enabled

use super::{ApiError, ApiResult, ErrorResponse};
use crate::config::AppState;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use fx_core::auth::{GitHubOAuth, TokenResponse};
use fx_core::FxError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn oauth(state: &AppState) -> ApiResult<&Arc<GitHubOAuth>> {
    state
        .oauth
        .as_ref()
        .ok_or_else(|| ApiError::from(FxError::Unauthenticated("OAuth is not configured".to_string())))
}

/// RFC 9728 protected resource metadata
pub async fn protected_resource_metadata(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let oauth = oauth(&state)?;
    let config = oauth.config();

    Ok(Json(serde_json::json!({
        "resource": config.public_url("mcp"),
        "authorization_servers": ["https://github.com/login/oauth"],
        "scopes_supported": config.scopes,
        "bearer_methods_supported": ["header"],
        "resource_documentation": config.public_url("health"),
    })))
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub state: Option<String>,
}

/// Redirect the user agent to GitHub's consent page
pub async fn login(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
) -> ApiResult<Response> {
    let oauth = oauth(&state)?;
    let url = oauth.authorize_url(query.state.as_deref());

    tracing::info!("Redirecting to GitHub authorization");
    Ok((StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    #[serde(flatten)]
    pub token: TokenResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Exchange the authorization code GitHub redirected back with
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<Response> {
    let oauth = oauth(&state)?;

    if let Some(error) = query.error {
        tracing::warn!(error = %error, "GitHub authorization denied");
        let response = match query.error_description {
            Some(description) => ErrorResponse::with_details(error, description),
            None => ErrorResponse::new(error),
        };
        return Ok((StatusCode::BAD_REQUEST, Json(response)).into_response());
    }

    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("missing authorization code")),
        )
            .into_response());
    };

    let token = oauth.exchange_code(&code).await?;
    tracing::info!("Issued GitHub access token");

    Ok(Json(CallbackResponse {
        token,
        state: query.state,
    })
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::super::create_router;
    use crate::config::AppState;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use fx_core::auth::{GitHubOAuth, OAuthConfig};
    use fx_core::{AuthGate, FxOperations};
    use fx_core::{FrankfurterClient, UpstreamConfig};
    use fx_mcp::tools::fx_registry;
    use fx_mcp::McpServer;
    use std::sync::Arc;
    use tower::ServiceExt;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state(token_url: &str) -> AppState {
        let ops = Arc::new(FxOperations::new(Arc::new(
            FrankfurterClient::new(UpstreamConfig::default()).unwrap(),
        )));
        let mut config = OAuthConfig::github(
            "client-id".to_string(),
            "client-secret".to_string(),
            Url::parse("https://fx.example.com").unwrap(),
        );
        config.token_url = Url::parse(token_url).unwrap();

        AppState::from_parts(
            McpServer::new(fx_registry(ops), AuthGate::Disabled),
            Some(Arc::new(GitHubOAuth::new(config).unwrap())),
        )
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_login_redirects_to_github() {
        let app = create_router(state("https://github.com/login/oauth/access_token"));

        let response = app.oneshot(get("/auth/login?state=abc")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);

        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(location.contains("client_id=client-id"));
        assert!(location.contains("state=abc"));
    }

    #[tokio::test]
    async fn test_callback_exchanges_code() {
        let github = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "gho_fresh",
                "token_type": "bearer",
                "scope": "user:email"
            })))
            .mount(&github)
            .await;

        let app = create_router(state(&format!("{}/login/oauth/access_token", github.uri())));
        let response = app
            .oneshot(get("/auth/callback?code=xyz&state=abc"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["access_token"], "gho_fresh");
        assert_eq!(body["state"], "abc");
    }

    #[tokio::test]
    async fn test_callback_errors() {
        let app = create_router(state("https://github.com/login/oauth/access_token"));

        let response = app
            .clone()
            .oneshot(get("/auth/callback?error=access_denied"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(get("/auth/callback")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
