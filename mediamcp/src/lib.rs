//! # mediamcp: media tool servers
//!
//! `mediamcp` runs small HTTP services, each exposing one or more media tools: grayscale
//! conversion, old photo restoration, upscaling, voice cloning, product and fashion photoshoots,
//! background replacement, inpainting, video background removal, text-to-3D and texture
//! generation.
//!
//! ## Request flow
//!
//! Every tool call follows the same pipeline, implemented once in [`tools::handler`]:
//!
//! 1. **Authenticate**: the `Authorization: Bearer` token is checked, and by default confirmed
//!    with the backend ([`auth`]). Nothing else happens for a rejected caller.
//! 2. **Validate**: arguments are deserialized into the tool's typed parameters and checked.
//! 3. **Process**: the tool calls its provider (fal or Gemini) or works in-process.
//! 4. **Resolve**: the result's content type and file extension are settled
//!    ([`storage::content_type`]).
//! 5. **Store**: a presigned upload ticket is requested from the backend on the caller's behalf,
//!    and the bytes are sent straight to object storage ([`storage::upload`]).
//! 6. **Respond**: `{"attachments": [...], "summary": ...}`, or `{"error": "<Kind>: <message>"}`.
//!
//! Calls arrive either as plain JSON on `POST /tools/call` or as MCP JSON-RPC on `POST /mcp`.
//!
//! ## Deployment
//!
//! Each tool has a well-known port and normally runs as its own process:
//!
//! ```bash
//! mediamcp --tool bria_genfill            # listens on 9008
//! mediamcp --tool grayscale_image --port 8080
//! ```
//!
//! Several tools can share a process by repeating `--tool`. Configuration comes from
//! `config.yaml`, `MEDIAMCP_*` variables and the plain variables (`FAL_KEY`, `GEMINI_API_KEY`,
//! `API_BASE_URL`, ...); see [`config`].
//!
//! ## Modules
//!
//! - [`api`]: HTTP handlers and request/response models
//! - [`auth`]: bearer token guard
//! - [`config`]: CLI args and layered configuration
//! - [`errors`]: the error taxonomy shown to callers
//! - [`providers`]: fal and Gemini clients
//! - [`storage`]: content-type resolution and presigned uploads
//! - [`tools`]: tool definitions, registry and the shared pipeline
//! - [`telemetry`]: tracing and OpenTelemetry export

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod http;
mod openapi;
pub mod providers;
pub mod storage;
pub mod telemetry;
pub mod tools;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use axum::{
    Router,
    http::{Method, header},
    routing::{get, post},
};
use bon::Builder;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;

use crate::auth::Authenticator;
use crate::openapi::ApiDoc;
use crate::tools::{Services, ToolRegistry};

/// Shared state handed to every handler.
///
/// - `config`: the loaded configuration
/// - `tools`: the tools served by this process
/// - `auth`: the bearer token guard
/// - `services`: HTTP clients, the uploader and the provider clients
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub tools: ToolRegistry,
    pub auth: Authenticator,
    pub services: Arc<Services>,
}

impl AppState {
    /// Build every client the config asks for.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let services = Arc::new(Services::from_config(&config)?);
        let auth = Authenticator::new(&config, services.http.generic.clone())?;
        let tools = ToolRegistry::new(&config.tools);

        Ok(Self::builder()
            .tools(tools)
            .auth(auth)
            .services(services)
            .config(config)
            .build())
    }
}

fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Build the router: tool routes, MCP, health and API docs.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/tools", get(api::handlers::tools::list_tools))
        .route("/tools/call", post(api::handlers::tools::call_tool))
        .route("/mcp", post(api::handlers::mcp::mcp))
        .route("/healthz", get(api::handlers::health::healthz))
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    router.layer(create_cors_layer()).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// A configured tool server.
///
/// 1. **Create**: [`Application::new`] builds the clients and the router
/// 2. **Serve**: [`Application::serve`] binds the port and handles requests until shutdown
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting tool server with configuration: {:#?}", config);

        let state = AppState::from_config(config.clone())?;
        info!(tools = ?state.tools, "Tools registered");

        let router = build_router(state);
        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Tool server listening on http://{}, docs at http://localhost:{}/docs",
            bind_addr,
            self.config.port()
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::TestBackend;
    use crate::tools::ToolKind;

    #[test_log::test(tokio::test)]
    async fn test_state_serves_only_configured_tools() {
        let backend = TestBackend::start().await;
        let state = backend.state(&[ToolKind::Texture, ToolKind::Texture, ToolKind::Grayscale]);

        assert_eq!(state.tools.names(), vec!["generate_texture", "grayscale_image"]);
        assert!(state.tools.get("bria_genfill").is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_providers_built_only_with_keys() {
        let backend = TestBackend::start().await;
        let mut config = backend.config();
        config.tools = vec![ToolKind::Grayscale];
        config.fal.api_key = None;

        let state = AppState::from_config(config).unwrap();
        assert!(state.services.fal.is_none());
        assert!(state.services.gemini.is_some());
    }

    #[test_log::test(tokio::test)]
    async fn test_docs_are_served() {
        let backend = TestBackend::start().await;
        let server = backend.test_server(&[ToolKind::Grayscale]).await;

        let response = server.get("/docs").await;
        response.assert_status_ok();
        assert!(response.text().contains("mediamcp"));
    }

    #[test_log::test(tokio::test)]
    async fn test_cors_preflight() {
        let backend = TestBackend::start().await;
        let server = backend.test_server(&[ToolKind::Grayscale]).await;

        let response = server
            .method(Method::OPTIONS, "/tools/call")
            .add_header("origin", "https://app.example.com")
            .add_header("access-control-request-method", "POST")
            .await;
        response.assert_status_ok();
        assert_eq!(response.header("access-control-allow-origin"), "*");
    }
}
