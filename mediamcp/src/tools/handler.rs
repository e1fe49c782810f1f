//! The uniform tool-call pipeline shared by `POST /tools/call` and MCP `tools/call`.
//!
//! Order matters: the auth gate runs before the tool lookup so an unauthenticated caller learns
//! nothing about which tools exist, and no provider or storage call is made for them.

use axum::http::HeaderMap;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use tracing::{error, info, instrument};

use crate::AppState;
use crate::errors::{Error, Result};
use crate::types::{ToolOutput, ToolResponse};

use super::context::ToolContext;

/// Run one tool call to completion. Never fails: every error becomes `{"error": ...}`.
#[instrument(skip_all, fields(tool = %name))]
pub async fn handle(state: &AppState, headers: &HeaderMap, name: &str, arguments: Value) -> ToolResponse {
    let outcome = AssertUnwindSafe(dispatch(state, headers, name, arguments))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(%message, "Tool panicked");
            Err(Error::Other(anyhow::anyhow!("tool panicked: {message}")))
        });

    match outcome {
        Ok(output) => {
            info!(attachments = output.attachments.len(), "Tool call succeeded");
            ToolResponse::Success(output)
        }
        Err(e) => {
            e.log();
            ToolResponse::failure(&e)
        }
    }
}

async fn dispatch(state: &AppState, headers: &HeaderMap, name: &str, arguments: Value) -> Result<ToolOutput> {
    let token = state.auth.authenticate(headers).await?;

    let tool = state
        .tools
        .get(name)
        .ok_or_else(|| Error::invalid_input(format!("unknown tool '{name}'")))?;

    let ctx = ToolContext::new(token, state.services.clone());
    tool.call(&ctx, arguments).await
}
