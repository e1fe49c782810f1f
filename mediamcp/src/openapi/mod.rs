//! OpenAPI document for a tool server, served by Scalar at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api::{self, models};
use crate::types::{Attachment, ToolOutput, ToolResponse};

/// Bearer token security scheme used by tool calls.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "The caller's platform token. It is checked on every call and forwarded to the \
                            backend when requesting an upload ticket:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::tools::call_tool,
        api::handlers::tools::list_tools,
        api::handlers::mcp::mcp,
        api::handlers::health::healthz,
    ),
    components(schemas(
        models::tools::ToolCallRequest,
        models::tools::ToolList,
        models::tools::HealthResponse,
        models::mcp::JsonRpcRequest,
        models::mcp::JsonRpcResponse,
        models::mcp::RpcError,
        crate::tools::ToolDescriptor,
        ToolResponse,
        ToolOutput,
        Attachment,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "tools", description = "Call and list media tools"),
        (name = "mcp", description = "Model Context Protocol over JSON-RPC"),
        (name = "health", description = "Liveness"),
    ),
    info(
        title = "mediamcp",
        description = "Media tool server. Each call checks the bearer token, runs one provider and stores the result through a presigned upload.",
    )
)]
pub struct ApiDoc;
