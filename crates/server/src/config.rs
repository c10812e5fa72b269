use anyhow::{bail, Context, Result};
use fx_core::auth::{
    default_required_scopes, GitHubOAuth, GitHubTokenVerifier, OAuthConfig, GITHUB_API_BASE,
};
use fx_core::client::DEFAULT_API_BASE;
use fx_core::{AuthGate, FrankfurterClient, FxOperations, UpstreamConfig};
use fx_mcp::tools::fx_registry;
use fx_mcp::McpServer;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub upstream: UpstreamSection,

    #[serde(default)]
    pub auth: AuthSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSection {
    #[serde(default = "default_api_base")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSection {
    #[serde(default = "default_github_api")]
    pub github_api_url: String,

    #[serde(default = "default_required_scopes")]
    pub required_scopes: Vec<String>,
}

fn default_github_api() -> String {
    GITHUB_API_BASE.to_string()
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            github_api_url: default_github_api(),
            required_scopes: default_required_scopes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Append-only log file; `None` logs to the console only
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,

    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("/tmp/fx-mcp-server.log"))
}

fn default_log_filter() -> String {
    "fx_server=info,fx_mcp=info,fx_core=info,tower_http=info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            filter: default_log_filter(),
        }
    }
}

impl ServerConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        // Load config file if it exists, otherwise use defaults
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read configuration file {}", config_path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file {}", config_path.display()))
    }

    /// Apply command-line / environment values on top of the file.
    pub fn apply_overrides(&mut self, api_base_url: Option<String>, log_file: Option<PathBuf>) {
        if let Some(base_url) = api_base_url {
            self.upstream.base_url = base_url;
        }
        if let Some(file) = log_file {
            // An empty path disables the file sink
            self.logging.file = if file.as_os_str().is_empty() { None } else { Some(file) };
        }
    }

    pub fn upstream_config(&self) -> Result<UpstreamConfig> {
        let base_url = Url::parse(&self.upstream.base_url)
            .with_context(|| format!("Invalid upstream base URL: {}", self.upstream.base_url))?;

        Ok(UpstreamConfig {
            base_url,
            timeout: Duration::from_secs(self.upstream.timeout_secs),
            ..Default::default()
        })
    }
}

/// GitHub OAuth settings as read from the environment.
#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    pub enabled: bool,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub base_url: Option<String>,
}

impl AuthSettings {
    /// OAuth configuration when auth is enabled, or an error naming every
    /// missing variable.
    pub fn resolve(&self) -> Result<Option<OAuthConfig>> {
        if !self.enabled {
            return Ok(None);
        }

        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        let missing: Vec<&str> = [
            ("GITHUB_CLIENT_ID", present(&self.client_id)),
            ("GITHUB_CLIENT_SECRET", present(&self.client_secret)),
            ("AUTH_BASE_URL", present(&self.base_url)),
        ]
        .into_iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            bail!(
                "ENABLE_AUTH=true but missing required environment variables: {}",
                missing.join(", ")
            );
        }

        let (Some(client_id), Some(client_secret), Some(base_url)) =
            (&self.client_id, &self.client_secret, &self.base_url)
        else {
            bail!("ENABLE_AUTH=true but GitHub OAuth settings are incomplete");
        };

        let base_url = Url::parse(base_url).with_context(|| format!("Invalid AUTH_BASE_URL: {}", base_url))?;
        Ok(Some(OAuthConfig::github(
            client_id.clone(),
            client_secret.clone(),
            base_url,
        )))
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub mcp: Arc<McpServer>,
    pub oauth: Option<Arc<GitHubOAuth>>,
}

impl AppState {
    pub fn new(config: &ServerConfig, oauth: Option<OAuthConfig>) -> Result<Self> {
        let client = FrankfurterClient::new(config.upstream_config()?)
            .context("Failed to create upstream rate client")?;
        let ops = Arc::new(FxOperations::new(Arc::new(client)));

        let (gate, oauth) = match oauth {
            Some(mut oauth_config) => {
                oauth_config.scopes = config.auth.required_scopes.clone();
                let api_base = Url::parse(&config.auth.github_api_url)
                    .with_context(|| format!("Invalid GitHub API URL: {}", config.auth.github_api_url))?;
                let verifier = GitHubTokenVerifier::new(api_base, config.auth.required_scopes.clone())
                    .context("Failed to create GitHub token verifier")?;
                let oauth = GitHubOAuth::new(oauth_config).context("Failed to create GitHub OAuth client")?;
                (AuthGate::Enabled(Arc::new(verifier)), Some(Arc::new(oauth)))
            }
            None => (AuthGate::Disabled, None),
        };

        Ok(Self::from_parts(McpServer::new(fx_registry(ops), gate), oauth))
    }

    pub fn from_parts(mcp: McpServer, oauth: Option<Arc<GitHubOAuth>>) -> Self {
        Self {
            mcp: Arc::new(mcp),
            oauth,
        }
    }

    /// Where clients discover how to obtain a token.
    pub fn resource_metadata_url(&self) -> Option<String> {
        self.oauth
            .as_ref()
            .map(|oauth| oauth.config().public_url(".well-known/oauth-protected-resource"))
    }
}
