use crate::api::ErrorResponse;
use crate::config::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use fx_core::FxError;
use std::sync::Arc;

/// Extract the bearer token from the authorization header.
///
/// Other schemes (Basic, etc.) count as no credential.
pub fn bearer_from_headers(headers: &HeaderMap) -> Option<&str> {
    let auth_str = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = auth_str.split_once(' ')?;

    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}

/// Run the auth gate once per request and hand the resolved
/// [`fx_core::AuthContext`] to the handler as an extension.
pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let credential = bearer_from_headers(req.headers()).map(str::to_string);

    match state.mcp.gate().authenticate(credential.as_deref()).await {
        Ok(auth) => {
            tracing::debug!(caller = auth.subject(), "Request authenticated");
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(err @ FxError::Unauthenticated(_)) => {
            tracing::warn!("Rejected request: {}", err);
            unauthorized(&state, &err)
        }
        Err(err) => {
            tracing::error!("Token verification failed: {}", err);
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse::with_details(err.kind(), err.to_string())),
            )
                .into_response()
        }
    }
}

fn unauthorized(state: &AppState, err: &FxError) -> Response {
    let mut challenge = String::from("Bearer error=\"invalid_token\"");
    if let Some(url) = state.resource_metadata_url() {
        challenge.push_str(&format!(", resource_metadata=\"{}\"", url));
    }

    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::with_details(err.kind(), err.to_string())),
    )
        .into_response();

    if let Ok(value) = HeaderValue::from_str(&challenge) {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_from_headers(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer token123"));
        assert_eq!(bearer_from_headers(&headers), Some("token123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer  token123 "));
        assert_eq!(bearer_from_headers(&headers), Some("token123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_from_headers(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer"));
        assert_eq!(bearer_from_headers(&headers), None);
    }
}
