use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod api;
mod config;
mod logging;
mod middleware;

use config::{AppState, AuthSettings, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "fx-mcp-server")]
#[command(about = "MCP server exposing foreign-exchange rate tools", long_about = None)]
struct Args {
    /// Serve MCP over stdin/stdout instead of HTTP
    #[arg(long)]
    stdio: bool,

    /// Path to configuration file
    #[arg(short, long, env = "FX_CONFIG", default_value = "fx-mcp.toml")]
    config: PathBuf,

    /// Port to listen on (HTTP mode)
    #[arg(short, long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Host to bind to (HTTP mode)
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Require a GitHub bearer token for tool calls
    #[arg(long, env = "ENABLE_AUTH")]
    enable_auth: bool,

    /// GitHub OAuth app client id
    #[arg(long, env = "GITHUB_CLIENT_ID")]
    github_client_id: Option<String>,

    /// GitHub OAuth app client secret
    #[arg(long, env = "GITHUB_CLIENT_SECRET", hide_env_values = true)]
    github_client_secret: Option<String>,

    /// Public base URL of this server, used for OAuth redirects
    #[arg(long, env = "AUTH_BASE_URL")]
    auth_base_url: Option<String>,

    /// Exchange-rate API base URL
    #[arg(long, env = "FX_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Log file path (empty to disable)
    #[arg(long, env = "FX_LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = ServerConfig::load(&args.config)?;
    config.apply_overrides(args.api_base_url.clone(), args.log_file.clone());

    logging::init_logging(&config.logging)?;

    tracing::info!("Starting FX rates MCP server");
    if !args.config.exists() {
        tracing::info!("Configuration file not found, using defaults");
    }
    tracing::info!("Upstream rates API: {}", config.upstream.base_url);

    let oauth = AuthSettings {
        enabled: args.enable_auth,
        client_id: args.github_client_id,
        client_secret: args.github_client_secret,
        base_url: args.auth_base_url,
    }
    .resolve()?;

    if oauth.is_some() {
        tracing::info!("GitHub authentication enabled");
    } else {
        tracing::info!("Running without authentication");
    }

    let state = AppState::new(&config, oauth)?;

    if args.stdio {
        state.mcp.serve_stdio().await?;
    } else {
        let addr = format!("{}:{}", args.host, args.port);
        tracing::info!("Starting HTTP transport on {}", addr);
        api::serve(&addr, state).await?;
    }

    Ok(())
}
