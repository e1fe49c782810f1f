//! HTTP handlers for calling and listing tools.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};

use crate::AppState;
use crate::api::models::tools::{ToolCallRequest, ToolList};
use crate::errors::Error;
use crate::tools::handler;
use crate::types::ToolResponse;

#[utoipa::path(
    post,
    path = "/tools/call",
    tag = "tools",
    summary = "Call a tool",
    description = "Runs one tool and returns its attachments and summary.

The response is always 200. A failed call is reported in the body as `{\"error\": \"<Kind>: <message>\"}`, where Kind is one of Unauthorized, InvalidInput, UpstreamError, ProviderError, UploadError or InternalError.",
    request_body = ToolCallRequest,
    responses(
        (status = 200, description = "Tool result or in-band error", body = ToolResponse),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn call_tool(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Result<Json<ToolCallRequest>, JsonRejection>,
) -> Json<ToolResponse> {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => {
            let err = Error::invalid_input(rejection.body_text());
            err.log();
            return Json(ToolResponse::failure(&err));
        }
    };

    Json(handler::handle(&state, &headers, &request.name, request.arguments).await)
}

#[utoipa::path(
    get,
    path = "/tools",
    tag = "tools",
    summary = "List tools",
    description = "Lists the tools served by this process with a JSON Schema for each tool's arguments.",
    responses(
        (status = 200, description = "Served tools", body = ToolList),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_tools(State(state): State<AppState>) -> Json<ToolList> {
    Json(ToolList {
        tools: state.tools.descriptors(),
    })
}
