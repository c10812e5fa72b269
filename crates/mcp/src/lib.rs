// MCP (Model Context Protocol) server exposing FX rate tools

pub mod protocol;
pub mod server;
pub mod tools;

#[cfg(test)]
mod testing;

pub use server::McpServer;
