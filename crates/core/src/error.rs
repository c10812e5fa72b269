//! Error taxonomy shared by every layer of the FX server.

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;

/// Errors surfaced to tool callers.
///
/// Every message names the offending field or value so a calling agent can
/// correct its request without guessing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FxError {
    /// A currency code outside the supported catalog.
    #[error("Unknown currency code: '{0}'")]
    UnknownCurrency(String),

    /// Amount is negative, NaN or infinite, or converts to a non-finite value.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A date that does not parse or falls outside the supported window.
    #[error("Invalid {field} '{value}': {reason}")]
    InvalidDate {
        field: String,
        value: String,
        reason: String,
    },

    /// Start date after end date.
    #[error("Invalid date range: start_date {start} is after end_date {end}")]
    InvalidDateRange { start: String, end: String },

    /// No tool registered under this name.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments do not match the tool's parameter schema.
    #[error("Invalid parameters for {tool}: {message}")]
    InvalidParameters { tool: String, message: String },

    /// Missing or rejected bearer credential.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Network failure or non-2xx response from an upstream service.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Upstream answered but the body is not in the expected shape.
    #[error("Upstream response malformed: {0}")]
    UpstreamMalformed(String),
}

impl FxError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownCurrency(_) => "UnknownCurrency",
            Self::InvalidAmount(_) => "InvalidAmount",
            Self::InvalidDate { .. } => "InvalidDate",
            Self::InvalidDateRange { .. } => "InvalidDateRange",
            Self::UnknownTool(_) => "UnknownTool",
            Self::InvalidParameters { .. } => "InvalidParameters",
            Self::Unauthenticated(_) => "Unauthenticated",
            Self::UpstreamUnavailable(_) => "UpstreamUnavailable",
            Self::UpstreamMalformed(_) => "UpstreamMalformed",
        }
    }

    /// Whether this error was raised while executing a tool, as opposed to
    /// failing before dispatch (auth, lookup, argument decoding).
    pub fn is_tool_failure(&self) -> bool {
        !matches!(
            self,
            Self::UnknownTool(_) | Self::InvalidParameters { .. } | Self::Unauthenticated(_)
        )
    }

    pub(crate) fn invalid_date(
        field: &str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidDate {
            field: field.to_string(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}
