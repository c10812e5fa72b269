// Core types and operations for the FX rates MCP server

pub mod auth;
pub mod catalog;
pub mod client;
pub mod error;
pub mod operations;
pub mod types;

pub use auth::{AuthContext, AuthGate, Identity, TokenVerifier};
pub use catalog::{CurrencyCatalog, CurrencyCode};
pub use client::{FrankfurterClient, RateProvider, UpstreamConfig};
pub use error::{FxError, FxResult};
pub use operations::FxOperations;
pub use types::*;
