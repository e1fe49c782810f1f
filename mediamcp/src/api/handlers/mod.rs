//! Axum route handlers.
//!
//! - [`tools`]: plain HTTP tool calls and listing
//! - [`mcp`]: MCP JSON-RPC endpoint
//! - [`health`]: liveness probe
//!
//! Tool calls never fail at the HTTP level. Every failure is returned in-band as
//! `{"error": "<Kind>: <message>"}` with status 200, see [`crate::tools::handler`].

pub mod health;
pub mod mcp;
pub mod tools;
