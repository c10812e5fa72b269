//! Authentication gate in front of tool dispatch.
//!
//! The gate mode is chosen once at startup. When enabled, every invocation
//! must present a bearer credential that a [`TokenVerifier`] accepts before
//! any tool code runs.

use crate::error::{FxError, FxResult};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const GITHUB_API_BASE: &str = "https://api.github.com";
pub const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";

/// Scopes required unless configured otherwise.
pub fn default_required_scopes() -> Vec<String> {
    vec!["user:email".to_string()]
}

/// Identity resolved from a verified credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub login: String,
    pub id: u64,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Who is calling, for the lifetime of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthContext {
    /// Gate disabled
    Anonymous,
    User(Identity),
}

impl AuthContext {
    pub fn subject(&self) -> &str {
        match self {
            Self::Anonymous => "anonymous",
            Self::User(identity) => &identity.login,
        }
    }
}

/// Validates an opaque bearer token with an OAuth provider.
#[async_trait::async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> FxResult<Identity>;
}

/// Fixed-for-process authentication mode
#[derive(Clone)]
pub enum AuthGate {
    Disabled,
    Enabled(Arc<dyn TokenVerifier>),
}

impl fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("AuthGate::Disabled"),
            Self::Enabled(_) => f.write_str("AuthGate::Enabled"),
        }
    }
}

impl AuthGate {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }

    /// Resolve the caller for one invocation.
    ///
    /// `credential` may be a raw token or an `Authorization` header value
    /// with a `Bearer` prefix.
    pub async fn authenticate(&self, credential: Option<&str>) -> FxResult<AuthContext> {
        let verifier = match self {
            Self::Disabled => return Ok(AuthContext::Anonymous),
            Self::Enabled(verifier) => verifier,
        };

        let token = credential
            .map(strip_bearer)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| FxError::Unauthenticated("missing bearer token".to_string()))?;

        let identity = verifier.verify(token).await?;
        debug!(login = %identity.login, "Authenticated caller");
        Ok(AuthContext::User(identity))
    }
}

fn strip_bearer(credential: &str) -> &str {
    let trimmed = credential.trim();
    if trimmed.eq_ignore_ascii_case("bearer") {
        return "";
    }
    match trimmed.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => trimmed[7..].trim(),
        _ => trimmed,
    }
}

/// Whether `granted` covers `required`. GitHub's `user` scope implies every
/// `user:*` scope.
fn scope_granted(granted: &[String], required: &str) -> bool {
    granted.iter().any(|scope| {
        scope == required
            || required
                .split_once(':')
                .is_some_and(|(parent, _)| scope == parent)
    })
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
    id: u64,
}

/// Verifies tokens by calling GitHub's `/user` endpoint.
#[derive(Debug, Clone)]
pub struct GitHubTokenVerifier {
    client: Client,
    api_base: Url,
    required_scopes: Vec<String>,
}

impl GitHubTokenVerifier {
    pub fn new(api_base: Url, required_scopes: Vec<String>) -> FxResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!("fx-mcp/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FxError::UpstreamUnavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base,
            required_scopes,
        })
    }
}

#[async_trait::async_trait]
impl TokenVerifier for GitHubTokenVerifier {
    async fn verify(&self, token: &str) -> FxResult<Identity> {
        let url = format!("{}/user", self.api_base.as_str().trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "GitHub token check could not be completed");
                FxError::Unauthenticated(format!("token could not be verified with GitHub: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "GitHub rejected bearer token");
            return Err(FxError::Unauthenticated(format!(
                "token rejected by GitHub (status {})",
                status.as_u16()
            )));
        }

        // Header absent for fine-grained tokens and GitHub App tokens
        let scopes_header = response
            .headers()
            .get("x-oauth-scopes")
            .and_then(|value| value.to_str().ok())
            .map(|value| {
                value
                    .split(',')
                    .map(|scope| scope.trim().to_string())
                    .filter(|scope| !scope.is_empty())
                    .collect::<Vec<_>>()
            });

        if let Some(granted) = &scopes_header {
            if let Some(missing) = self
                .required_scopes
                .iter()
                .find(|required| !scope_granted(granted, required))
            {
                return Err(FxError::Unauthenticated(format!(
                    "token is missing required scope '{}'",
                    missing
                )));
            }
        }

        let user: GitHubUser = response
            .json()
            .await
            .map_err(|e| {
                warn!(error = %e, "Unexpected GitHub user response");
                FxError::Unauthenticated(format!("token could not be verified with GitHub: {}", e))
            })?;

        Ok(Identity {
            login: user.login,
            id: user.id,
            scopes: scopes_header.unwrap_or_default(),
        })
    }
}

/// GitHub OAuth app settings
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Public base URL of this server; the callback lives under it.
    pub base_url: Url,
    pub scopes: Vec<String>,
    pub authorize_url: Url,
    pub token_url: Url,
}

impl OAuthConfig {
    pub fn github(client_id: String, client_secret: String, base_url: Url) -> Self {
        Self {
            client_id,
            client_secret,
            base_url,
            scopes: default_required_scopes(),
            authorize_url: Url::parse(GITHUB_AUTHORIZE_URL).expect("GitHub authorize URL is valid"),
            token_url: Url::parse(GITHUB_TOKEN_URL).expect("GitHub token URL is valid"),
        }
    }

    /// Absolute URL under the public base.
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn redirect_uri(&self) -> String {
        self.public_url("auth/callback")
    }
}

/// Token endpoint response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenEndpointResponse {
    Token(TokenResponse),
    Error {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
    },
}

/// Authorization-code flow against GitHub.
#[derive(Debug, Clone)]
pub struct GitHubOAuth {
    client: Client,
    config: Arc<OAuthConfig>,
}

impl GitHubOAuth {
    pub fn new(config: OAuthConfig) -> FxResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!("fx-mcp/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FxError::UpstreamUnavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// URL the user agent is redirected to for consent. `state` is chosen
    /// and checked by the client.
    pub fn authorize_url(&self, state: Option<&str>) -> Url {
        let mut url = self.config.authorize_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &self.config.redirect_uri())
                .append_pair("scope", &self.config.scopes.join(" "));
            if let Some(state) = state {
                pairs.append_pair("state", state);
            }
        }
        url
    }

    /// Exchange an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> FxResult<TokenResponse> {
        let redirect_uri = self.config.redirect_uri();
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
        ];

        let response = self
            .client
            .post(self.config.token_url.clone())
            .header(header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| FxError::UpstreamUnavailable(format!("GitHub token exchange failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FxError::UpstreamUnavailable(format!(
                "GitHub token endpoint returned status {}",
                status.as_u16()
            )));
        }

        let body: TokenEndpointResponse = response
            .json()
            .await
            .map_err(|e| FxError::UpstreamMalformed(format!("unexpected token response: {}", e)))?;

        match body {
            TokenEndpointResponse::Token(token) => Ok(token),
            TokenEndpointResponse::Error {
                error,
                error_description,
            } => Err(FxError::Unauthenticated(match error_description {
                Some(description) => format!("{}: {}", error, description),
                None => error,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_string_contains, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticVerifier {
        token: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TokenVerifier for StaticVerifier {
        async fn verify(&self, token: &str) -> FxResult<Identity> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if token == self.token {
                Ok(Identity {
                    login: "octocat".to_string(),
                    id: 1,
                    scopes: vec![],
                })
            } else {
                Err(FxError::Unauthenticated("bad token".to_string()))
            }
        }
    }

    fn gate() -> (AuthGate, Arc<StaticVerifier>) {
        let verifier = Arc::new(StaticVerifier {
            token: "gho_valid",
            calls: AtomicUsize::new(0),
        });
        (AuthGate::Enabled(verifier.clone()), verifier)
    }

    #[tokio::test]
    async fn test_disabled_gate_is_anonymous() {
        let ctx = AuthGate::Disabled.authenticate(None).await.unwrap();
        assert_eq!(ctx, AuthContext::Anonymous);
        assert_eq!(ctx.subject(), "anonymous");
    }

    #[tokio::test]
    async fn test_missing_credential_skips_verifier() {
        let (gate, verifier) = gate();

        for credential in [None, Some(""), Some("Bearer "), Some("   ")] {
            let err = gate.authenticate(credential).await.unwrap_err();
            assert_eq!(err.kind(), "Unauthenticated");
        }
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bearer_prefix_handling() {
        let (gate, _) = gate();

        for credential in ["gho_valid", "Bearer gho_valid", "bearer gho_valid", "  BEARER gho_valid "] {
            let ctx = gate.authenticate(Some(credential)).await.unwrap();
            assert_eq!(ctx.subject(), "octocat");
        }

        let err = gate.authenticate(Some("Bearer nope")).await.unwrap_err();
        assert_eq!(err.kind(), "Unauthenticated");
    }

    #[test]
    fn test_scope_hierarchy() {
        let granted = vec!["user".to_string()];
        assert!(scope_granted(&granted, "user:email"));
        assert!(!scope_granted(&["repo".to_string()], "user:email"));
        assert!(scope_granted(&["user:email".to_string()], "user:email"));
    }

    #[tokio::test]
    async fn test_github_verifier_accepts_valid_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header_matcher("Authorization", "Bearer gho_abc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-OAuth-Scopes", "read:org, user:email")
                    .set_body_json(serde_json::json!({"login": "octocat", "id": 583231})),
            )
            .mount(&server)
            .await;

        let verifier =
            GitHubTokenVerifier::new(Url::parse(&server.uri()).unwrap(), default_required_scopes()).unwrap();
        let identity = verifier.verify("gho_abc").await.unwrap();

        assert_eq!(identity.login, "octocat");
        assert_eq!(identity.id, 583231);
        assert_eq!(identity.scopes, vec!["read:org", "user:email"]);
    }

    #[tokio::test]
    async fn test_github_verifier_rejects() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header_matcher("Authorization", "Bearer gho_revoked"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header_matcher("Authorization", "Bearer gho_narrow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-OAuth-Scopes", "repo")
                    .set_body_json(serde_json::json!({"login": "octocat", "id": 1})),
            )
            .mount(&server)
            .await;

        let verifier =
            GitHubTokenVerifier::new(Url::parse(&server.uri()).unwrap(), default_required_scopes()).unwrap();

        let err = verifier.verify("gho_revoked").await.unwrap_err();
        assert_eq!(err.kind(), "Unauthenticated");

        let err = verifier.verify("gho_narrow").await.unwrap_err();
        assert!(err.to_string().contains("user:email"));
    }

    #[tokio::test]
    async fn test_github_verifier_failures_are_unauthenticated() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
            .mount(&server)
            .await;

        let verifier =
            GitHubTokenVerifier::new(Url::parse(&server.uri()).unwrap(), default_required_scopes()).unwrap();
        let err = verifier.verify("gho_valid").await.unwrap_err();
        assert_eq!(err.kind(), "Unauthenticated");

        drop(server);
        let err = verifier.verify("gho_valid").await.unwrap_err();
        assert_eq!(err.kind(), "Unauthenticated");
    }

    fn oauth_config(token_url: &str) -> OAuthConfig {
        let mut config = OAuthConfig::github(
            "client-123".to_string(),
            "secret-456".to_string(),
            Url::parse("https://fx.example.com/").unwrap(),
        );
        config.token_url = Url::parse(token_url).unwrap();
        config
    }

    #[test]
    fn test_authorize_url() {
        let oauth = GitHubOAuth::new(oauth_config(GITHUB_TOKEN_URL)).unwrap();
        let url = oauth.authorize_url(Some("xyz"));

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(url.host_str(), Some("github.com"));
        assert_eq!(pairs["client_id"], "client-123");
        assert_eq!(pairs["redirect_uri"], "https://fx.example.com/auth/callback");
        assert_eq!(pairs["scope"], "user:email");
        assert_eq!(pairs["state"], "xyz");
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .and(body_string_contains("code=good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "gho_new",
                "token_type": "bearer",
                "scope": "user:email"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .and(body_string_contains("code=stale"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "bad_verification_code",
                "error_description": "The code passed is incorrect or expired."
            })))
            .mount(&server)
            .await;

        let oauth = GitHubOAuth::new(oauth_config(&format!(
            "{}/login/oauth/access_token",
            server.uri()
        )))
        .unwrap();

        let token = oauth.exchange_code("good").await.unwrap();
        assert_eq!(token.access_token, "gho_new");

        let err = oauth.exchange_code("stale").await.unwrap_err();
        assert!(err.to_string().contains("bad_verification_code"));
    }
}
