//! Test fixtures: a wiremock server standing in for the backend, object storage and the
//! providers, plus tiny in-memory images.

use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
use axum_test::TestServer;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{Value, json};
use std::io::Cursor;
use std::sync::Arc;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::config::Config;
use crate::tools::{Services, ToolContext, ToolKind};
use crate::types::AuthToken;
use crate::{AppState, Application};

/// One mock server playing every remote party. Paths:
///
/// - `/api/v1/auth/me` and `/api/v1/files/upload`: the backend
/// - `/storage/upload`: the presigned upload target
/// - `/fal/{model}` and `/gemini/...`: providers
/// - anything mounted with [`TestBackend::serve_file`]: input and result files
pub struct TestBackend {
    pub server: MockServer,
}

impl TestBackend {
    pub const TOKEN: &'static str = "test-token";
    pub const FILE_ID: &'static str = "stored-file-1";

    pub async fn start() -> Self {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/auth/me"))
            .and(header("authorization", format!("Bearer {}", Self::TOKEN).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "user-1"})))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/auth/me"))
            .respond_with(ResponseTemplate::new(401))
            .with_priority(10)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/v1/files/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "upload_url": format!("{}/storage/upload", server.uri()),
                "file_id": Self::FILE_ID
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/storage/upload"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        Self { server }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// Config pointing every remote at this server, serving every tool.
    pub fn config(&self) -> Config {
        let mut config = Config {
            tools: ToolKind::ALL.to_vec(),
            api_base_url: Url::parse(&self.url("/api/v1")).unwrap(),
            ..Default::default()
        };
        config.fal.base_url = Url::parse(&self.url("/fal")).unwrap();
        config.fal.api_key = Some("test-fal-key".to_string());
        config.gemini.base_url = Url::parse(&self.url("/gemini")).unwrap();
        config.gemini.api_key = Some("test-gemini-key".to_string());
        config.gemini.model = "gemini-test".to_string();
        config
    }

    pub fn services(&self) -> Arc<Services> {
        Arc::new(Services::from_config(&self.config()).unwrap())
    }

    pub fn context(&self, token: AuthToken) -> ToolContext {
        ToolContext::new(token, self.services())
    }

    pub fn state(&self, tools: &[ToolKind]) -> AppState {
        let mut config = self.config();
        config.tools = tools.to_vec();
        AppState::from_config(config).unwrap()
    }

    pub async fn test_server(&self, tools: &[ToolKind]) -> TestServer {
        let mut config = self.config();
        config.tools = tools.to_vec();
        Application::new(config).await.unwrap().into_test_server()
    }

    pub async fn serve_file(&self, file_path: &str, body: Vec<u8>, content_type: &str) {
        Mock::given(method("GET"))
            .and(path(file_path))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", content_type)
                    .set_body_bytes(body),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer `POST /fal/{model}` with `output`.
    pub async fn mount_fal(&self, model: &str, output: Value) {
        Mock::given(method("POST"))
            .and(path(format!("/fal/{model}")))
            .and(header("authorization", "Key test-fal-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(output))
            .mount(&self.server)
            .await;
    }

    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    pub async fn request_count(&self) -> usize {
        self.requests().await.len()
    }

    /// JSON body of the last request to `request_path`.
    pub async fn last_json_body(&self, request_path: &str) -> Value {
        let request = self
            .requests()
            .await
            .into_iter()
            .rev()
            .find(|r| r.url.path() == request_path)
            .unwrap_or_else(|| panic!("no request to {request_path}"));
        serde_json::from_slice(&request.body).unwrap()
    }

    /// Byte count of the last object PUT to storage.
    pub async fn last_upload_size(&self) -> u64 {
        self.requests()
            .await
            .into_iter()
            .rev()
            .find(|r| r.url.path() == "/storage/upload")
            .map(|r| r.body.len() as u64)
            .expect("nothing was uploaded")
    }

    /// Content-Type of the last object PUT to storage.
    pub async fn last_upload_content_type(&self) -> String {
        self.requests()
            .await
            .into_iter()
            .rev()
            .find(|r| r.url.path() == "/storage/upload")
            .and_then(|r| r.headers.get("content-type").and_then(|v| v.to_str().ok()).map(str::to_string))
            .expect("nothing was uploaded")
    }
}

pub fn bearer_headers(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
    headers
}

fn encode_fixture(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| Rgb([(x * 40) as u8, (y * 40) as u8, 200]));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}

pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    encode_fixture(width, height, ImageFormat::Png)
}

pub fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
    encode_fixture(width, height, ImageFormat::Jpeg)
}
