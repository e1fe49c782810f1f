//! HTTP surface of a tool server.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: request and response bodies
//!
//! # Routes
//!
//! - `POST /tools/call`: run a tool, always answered with a `ToolResponse`
//! - `GET /tools`: list the served tools and their argument schemas
//! - `POST /mcp`: MCP JSON-RPC (`initialize`, `tools/list`, `tools/call`, `ping`)
//! - `GET /healthz`: liveness
//!
//! API documentation is served at `/docs`.

pub mod handlers;
pub mod models;
