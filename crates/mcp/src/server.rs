// MCP server: authentication gate, tool dispatch and the stdio transport

use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, ServerCapabilities, ServerInfo, ToolsCapability,
};
use crate::tools::ToolRegistry;
use anyhow::{Context, Result};
use futures::StreamExt;
use fx_core::{AuthContext, AuthGate, FxError, FxResult};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, FramedRead, LinesCodec, LinesCodecError};

pub const SERVER_NAME: &str = "fx-rates";

/// Longest accepted stdio message; longer lines are answered with a parse error.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

const INSTRUCTIONS: &str = "Foreign-exchange rates from the Frankfurter API. \
Currency codes are 3-letter uppercase ISO codes; dates use YYYY-MM-DD and start at 2020-01-01.";

pub struct McpServer {
    registry: ToolRegistry,
    gate: AuthGate,
}

impl McpServer {
    pub fn new(registry: ToolRegistry, gate: AuthGate) -> Self {
        Self { registry, gate }
    }

    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    /// Authenticate the caller, then run the named tool.
    ///
    /// A gate failure returns before the registry is consulted, so no tool
    /// code runs for an unauthenticated caller.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: serde_json::Value,
        credential: Option<&str>,
    ) -> FxResult<serde_json::Value> {
        let auth = self.gate.authenticate(credential).await?;
        self.dispatch(name, arguments, &auth).await
    }

    /// Run the named tool for an already authenticated caller.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: serde_json::Value,
        auth: &AuthContext,
    ) -> FxResult<serde_json::Value> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| FxError::UnknownTool(name.to_string()))?;

        tracing::debug!(tool = name, caller = auth.subject(), "Dispatching tool call");
        tool.execute(arguments).await
    }

    /// Handle one JSON-RPC message.
    ///
    /// `auth` is set when the transport already authenticated the caller
    /// (HTTP); otherwise `tools/call` authenticates from `params._meta`.
    /// Returns `None` for notifications.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        auth: Option<&AuthContext>,
    ) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            tracing::debug!(method = %request.method, "Received notification");
            return None;
        };

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request()));
        }

        let response = match request.method.as_str() {
            "initialize" => match self.initialize(request.params) {
                Ok(result) => JsonRpcResponse::success(id, result),
                Err(error) => JsonRpcResponse::error(id, error),
            },
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            "tools/list" => JsonRpcResponse::success(
                id,
                ListToolsResult {
                    tools: self.registry.list_schemas(),
                },
            ),
            "tools/call" => match self.call_tool(request.params, auth).await {
                Ok(result) => JsonRpcResponse::success(id, result),
                Err(error) => JsonRpcResponse::error(id, error),
            },
            method => {
                tracing::warn!(method, "Unknown method");
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(method))
            }
        };

        Some(response)
    }

    /// Handle one raw line of newline-delimited JSON-RPC.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let response = match JsonRpcRequest::parse(line) {
            Ok(request) => self.handle_request(request, None).await?,
            Err(rejection) => {
                tracing::warn!(code = ?rejection.error.as_ref().map(|e| e.code), "Rejected JSON-RPC message");
                rejection
            }
        };

        encode(&response)
    }

    /// Serve newline-delimited JSON-RPC over process stdin/stdout until EOF.
    pub async fn serve_stdio(&self) -> Result<()> {
        tracing::info!("MCP server listening on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC over any reader/writer pair.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = FramedRead::new(reader, MessageCodec::new());

        while let Some(frame) = lines.next().await {
            let response = match frame.context("Failed to read JSON-RPC message")? {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => self.handle_line(&line).await,
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable input line");
                    encode(&JsonRpcResponse::error(
                        serde_json::Value::Null,
                        JsonRpcError::parse_error(),
                    ))
                }
            };

            if let Some(response) = response {
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        tracing::info!("Input closed, MCP server stopping");
        Ok(())
    }

    fn initialize(&self, params: Option<serde_json::Value>) -> Result<InitializeResult, JsonRpcError> {
        let params: InitializeParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("Missing params for initialize"))
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| JsonRpcError::invalid_params(format!("Invalid initialize params: {}", e)))
            })?;

        let protocol_version = params.negotiated_version();
        tracing::info!(
            client = %params.client_info.name,
            client_version = %params.client_info.version,
            requested = %params.protocol_version,
            protocol_version,
            "Client initialized"
        );

        Ok(InitializeResult {
            protocol_version: protocol_version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        })
    }

    async fn call_tool(
        &self,
        params: Option<serde_json::Value>,
        auth: Option<&AuthContext>,
    ) -> Result<CallToolResult, JsonRpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("Missing params for tools/call"))
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)))
            })?;

        let auth = match auth {
            Some(auth) => auth.clone(),
            None => {
                let credential = params.meta.as_ref().and_then(|m| m.authorization.as_deref());
                self.gate
                    .authenticate(credential)
                    .await
                    .map_err(|e| rpc_error(&e))?
            }
        };

        match self.dispatch(&params.name, params.arguments, &auth).await {
            Ok(value) => Ok(CallToolResult::json(value)),
            Err(e) if e.is_tool_failure() => {
                tracing::error!(tool = %params.name, kind = e.kind(), "Tool failed: {}", e);
                Ok(CallToolResult::failure(e.to_string()))
            }
            Err(e) => {
                tracing::warn!(tool = %params.name, kind = e.kind(), "Rejected tool call: {}", e);
                Err(rpc_error(&e))
            }
        }
    }
}

fn encode(response: &JsonRpcResponse) -> Option<String> {
    match serde_json::to_string(response) {
        Ok(encoded) => Some(encoded),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode JSON-RPC response");
            None
        }
    }
}

/// Newline framing that survives bad lines.
///
/// `FramedRead` stops after the first decoder error, so a line that is not
/// UTF-8 or exceeds [`MAX_LINE_LENGTH`] is yielded as an `Err` frame instead.
/// `LinesCodec` has already consumed (or started discarding) such a line.
/// Read failures of the underlying stream still end the stream.
struct MessageCodec {
    lines: LinesCodec,
}

impl MessageCodec {
    fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        }
    }
}

impl Decoder for MessageCodec {
    type Item = Result<String, LinesCodecError>;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.lines.decode(buf).transpose())
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.lines.decode_eof(buf).transpose())
    }
}

/// JSON-RPC error for failures raised before a tool runs.
pub fn rpc_error(error: &FxError) -> JsonRpcError {
    let base = match error {
        FxError::Unauthenticated(_) => JsonRpcError::unauthenticated(error.to_string()),
        FxError::UnknownTool(_) | FxError::InvalidParameters { .. } => {
            JsonRpcError::invalid_params(error.to_string())
        }
        _ => JsonRpcError::internal_error(error.to_string()),
    };
    base.with_data(serde_json::json!({ "kind": error.kind() }))
}
