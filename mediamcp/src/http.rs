//! Outbound HTTP plumbing shared by the auth guard, the providers and the upload client.
//!
//! Two pooled clients are built once at startup: `generic` for backend and storage traffic and
//! `ai` for provider calls, which get a much longer read timeout. Both clients are cheap to clone.

use bytes::Bytes;
use reqwest::{Client, Response, StatusCode, header::CONTENT_TYPE};
use std::sync::Once;
use std::time::Duration;
use thiserror::Error as ThisError;
use tracing::{debug, instrument};
use url::Url;

use crate::config::{Config, TimeoutConfig};

/// Error bodies longer than this are cut before they reach a caller-visible message.
const MAX_ERROR_BODY_CHARS: usize = 300;

static CRYPTO_PROVIDER: Once = Once::new();

/// Install the rustls crypto provider. reqwest is built without a default provider, so this must
/// run before the first client is constructed. Safe to call more than once.
pub fn install_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        // Err means another provider was already installed by the embedding process
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

#[derive(Debug, Clone)]
pub struct HttpClients {
    pub generic: Client,
    pub ai: Client,
}

impl HttpClients {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        install_crypto_provider();
        Ok(Self {
            generic: build_client(&config.http)?,
            ai: build_client(&config.ai_http)?,
        })
    }
}

fn build_client(timeouts: &TimeoutConfig) -> anyhow::Result<Client> {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_timeout_secs))
        .read_timeout(Duration::from_secs(timeouts.read_timeout_secs))
        .user_agent(concat!("mediamcp/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Why an outbound request failed. The messages are safe to show to callers.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("{0}")]
    Transport(String),
}

impl TransferError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransferError::Status { status, .. } => Some(*status),
            TransferError::Transport(_) => None,
        }
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(err: reqwest::Error) -> Self {
        TransferError::Transport(describe_transport_error(&err))
    }
}

/// Short, URL-free description of a reqwest failure.
///
/// URLs are stripped because presigned URLs and some provider URLs carry credentials in the
/// query string.
pub fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() || err.is_connect() {
        // A refused or unroutable connection reads the same as one that never answered
        "connection timeout".to_string()
    } else if err.is_decode() {
        "undecodable response body".to_string()
    } else {
        let mut message = String::new();
        let mut source: Option<&dyn std::error::Error> = Some(err);
        // Flatten the chain; the top-level reqwest message alone is usually "error sending request"
        while let Some(current) = source {
            if !message.is_empty() {
                message.push_str(": ");
            }
            message.push_str(&current.to_string());
            source = current.source();
        }
        strip_urls(&message)
    }
}

fn strip_urls(message: &str) -> String {
    message
        .split(' ')
        .map(|word| {
            let bare = word.trim_matches(|c| c == '(' || c == ')');
            if bare.starts_with("http://") || bare.starts_with("https://") {
                "<url>"
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turn a non-2xx response into a [`TransferError::Status`], keeping a bounded slice of the body.
pub async fn error_for_status(response: Response) -> Result<Response, TransferError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransferError::Status {
        status,
        body: truncate(body.trim(), MAX_ERROR_BODY_CHARS),
    })
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    }
}

/// A fully buffered remote file.
#[derive(Debug, Clone)]
pub struct DownloadedAsset {
    pub bytes: Bytes,
    /// `Content-Type` response header, verbatim
    pub content_type: Option<String>,
    pub url: String,
}

#[instrument(skip_all, fields(url = %truncate(url, 120)))]
pub async fn download(client: &Client, url: &str) -> Result<DownloadedAsset, TransferError> {
    let response = client.get(url).send().await?;
    let response = error_for_status(response).await?;
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.bytes().await?;
    debug!(size = bytes.len(), content_type = ?content_type, "Downloaded asset");
    Ok(DownloadedAsset {
        bytes,
        content_type,
        url: url.to_string(),
    })
}

/// Ensure a base URL ends with `/` so `Url::join` appends instead of replacing the last segment.
pub fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut url = url.clone();
        url.set_path(&format!("{}/", url.path()));
        url
    }
}

/// Append a relative path (leading slashes ignored) to a base URL.
pub fn join_path(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    ensure_slash(base).join(path.trim_start_matches('/'))
}
