//! MCP over plain HTTP: one JSON-RPC message (or batch) per `POST /mcp`.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::AppState;
use crate::api::models::mcp::{
    CallToolParams, CallToolResult, Content, JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse, McpTool,
    PROTOCOL_VERSION, RpcError, SUPPORTED_PROTOCOL_VERSIONS,
};
use crate::tools::handler;

#[utoipa::path(
    post,
    path = "/mcp",
    tag = "mcp",
    summary = "MCP JSON-RPC",
    description = "Model Context Protocol endpoint. Supports `initialize`, `tools/list`, `tools/call` and `ping`.

`tools/call` needs `Authorization: Bearer <token>` and answers with the tool's response serialized as text content. Notifications (messages without an `id`) are acknowledged with 202 and no body.",
    request_body = JsonRpcRequest,
    responses(
        (status = 200, description = "JSON-RPC response", body = JsonRpcResponse),
        (status = 202, description = "Notification accepted"),
    ),
    security(("BearerAuth" = []))
)]
#[instrument(skip_all)]
pub async fn mcp(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let incoming: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return Json(JsonRpcResponse::failure(
                Value::Null,
                RpcError::parse_error(format!("Parse error: {e}")),
            ))
            .into_response();
        }
    };

    match incoming {
        Value::Array(batch) => {
            if batch.is_empty() {
                return Json(JsonRpcResponse::failure(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ))
                .into_response();
            }
            let mut responses = Vec::with_capacity(batch.len());
            for message in batch {
                if let Some(response) = handle_message(&state, &headers, message).await {
                    responses.push(response);
                }
            }
            if responses.is_empty() {
                StatusCode::ACCEPTED.into_response()
            } else {
                Json(responses).into_response()
            }
        }
        message => match handle_message(&state, &headers, message).await {
            Some(response) => Json(response).into_response(),
            None => StatusCode::ACCEPTED.into_response(),
        },
    }
}

/// Answer one message. Notifications get no answer.
async fn handle_message(state: &AppState, headers: &HeaderMap, message: Value) -> Option<JsonRpcResponse> {
    let id_hint = message.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(message) {
        Ok(request) => request,
        Err(e) => return Some(JsonRpcResponse::failure(id_hint, RpcError::invalid_request(e.to_string()))),
    };

    if request.jsonrpc != JSONRPC_VERSION {
        return Some(JsonRpcResponse::failure(
            id_hint,
            RpcError::invalid_request("jsonrpc must be '2.0'"),
        ));
    }

    let Some(id) = request.id else {
        debug!(method = %request.method, "Notification received");
        return None;
    };

    Some(match handle_request(state, headers, &request.method, request.params).await {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(error) => JsonRpcResponse::failure(id, error),
    })
}

async fn handle_request(
    state: &AppState,
    headers: &HeaderMap,
    method: &str,
    params: Value,
) -> Result<Value, RpcError> {
    match method {
        "initialize" => Ok(initialize_payload(state, &params)),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(tools_list_payload(state)),
        "tools/call" => tools_call(state, headers, params).await,
        _ => Err(RpcError::method_not_found(method)),
    }
}

fn initialize_payload(state: &AppState, params: &Value) -> Value {
    let protocol_version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .filter(|requested| SUPPORTED_PROTOCOL_VERSIONS.contains(requested))
        .unwrap_or(PROTOCOL_VERSION);
    json!({
        "protocolVersion": protocol_version,
        "capabilities": {
            "tools": {"listChanged": false}
        },
        "serverInfo": {
            "name": format!("mediamcp ({})", state.tools.names().join(", ")),
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn tools_list_payload(state: &AppState) -> Value {
    let tools: Vec<McpTool> = state
        .tools
        .descriptors()
        .into_iter()
        .map(|d| McpTool {
            name: d.name,
            description: d.description,
            input_schema: d.input_schema,
        })
        .collect();
    json!({ "tools": tools })
}

async fn tools_call(state: &AppState, headers: &HeaderMap, params: Value) -> Result<Value, RpcError> {
    let params: CallToolParams =
        serde_json::from_value(params).map_err(|e| RpcError::invalid_params(format!("Invalid params: {e}")))?;

    let response = handler::handle(state, headers, &params.name, params.arguments).await;
    let text = serde_json::to_string(&response).map_err(|e| RpcError::internal(e.to_string()))?;

    let result = CallToolResult {
        content: vec![Content::Text { text }],
        is_error: response.is_error(),
    };
    serde_json::to_value(result).map_err(|e| RpcError::internal(e.to_string()))
}
