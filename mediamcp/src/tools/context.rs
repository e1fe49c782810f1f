//! Per-request context handed to every tool: the caller's token plus the shared clients.

use anyhow::Context as _;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::errors::{Error, Result};
use crate::http::{DownloadedAsset, HttpClients, download};
use crate::providers::{FalClient, GeminiClient};
use crate::storage::{MediaCategory, UploadClient, resolve};
use crate::types::{Attachment, AuthToken, ProcessedResult, ResultPayload};

/// Clients shared by every request. Built once from the config, never mutated.
#[derive(Debug, Clone)]
pub struct Services {
    pub http: HttpClients,
    pub uploader: UploadClient,
    pub fal: Option<FalClient>,
    pub gemini: Option<GeminiClient>,
}

impl Services {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = HttpClients::from_config(config)?;
        let uploader =
            UploadClient::new(&config.api_base_url, http.generic.clone()).context("invalid api_base_url")?;

        let fal = config
            .fal
            .api_key
            .as_ref()
            .map(|key| FalClient::new(http.ai.clone(), config.fal.base_url.clone(), key.clone()));
        let gemini = config.gemini.api_key.as_ref().map(|key| {
            GeminiClient::new(
                http.ai.clone(),
                config.gemini.base_url.clone(),
                config.gemini.model.clone(),
                key.clone(),
            )
        });

        Ok(Self {
            http,
            uploader,
            fal,
            gemini,
        })
    }
}

/// An uploaded result and the provider URL it came from, if any.
#[derive(Debug, Clone)]
pub struct Stored {
    pub attachment: Attachment,
    pub source_url: Option<String>,
}

pub struct ToolContext {
    pub token: AuthToken,
    pub services: Arc<Services>,
}

impl ToolContext {
    pub fn new(token: AuthToken, services: Arc<Services>) -> Self {
        Self { token, services }
    }

    pub fn fal(&self) -> Result<&FalClient> {
        self.services
            .fal
            .as_ref()
            .ok_or_else(|| Error::provider("fal is not configured (FAL_KEY is unset)"))
    }

    pub fn gemini(&self) -> Result<&GeminiClient> {
        self.services
            .gemini
            .as_ref()
            .ok_or_else(|| Error::provider("Gemini is not configured (GEMINI_API_KEY is unset)"))
    }

    /// Download a caller-supplied file. Failures are the caller's problem: `InvalidInput`.
    pub async fn fetch_input(&self, url: &str) -> Result<DownloadedAsset> {
        download(&self.services.http.ai, url)
            .await
            .map_err(|e| Error::invalid_input(format!("could not download input: {e}")))
    }

    /// Download a provider's output. Failures are attributed to the provider.
    pub async fn fetch_result(&self, url: &str) -> Result<DownloadedAsset> {
        download(&self.services.http.ai, url)
            .await
            .map_err(|e| Error::provider(format!("could not download result: {e}")))
    }

    /// Resolve the result's type, name it `{base_name}{ext}` and upload it.
    #[instrument(skip_all, fields(base_name = %base_name, ?category))]
    pub async fn store(&self, result: ProcessedResult, category: MediaCategory, base_name: &str) -> Result<Stored> {
        let declared = result.declared_content_type.as_deref();

        let (bytes, content_type, source_url) = match result.payload {
            ResultPayload::Url(url) => {
                let asset = self.fetch_result(&url).await?;
                let ct = resolve(declared, asset.content_type.as_deref(), Some(&url), category);
                (asset.bytes, ct, Some(url))
            }
            ResultPayload::Bytes(bytes) => (bytes, resolve(declared, None, None, category), None),
        };

        if bytes.is_empty() {
            return Err(Error::provider("provider returned an empty result"));
        }

        let filename = format!("{base_name}{}", content_type.extension);
        debug!(%filename, mime = content_type.mime, size = bytes.len(), "Storing result");

        let attachment = self
            .services
            .uploader
            .upload(&self.token, bytes, content_type, &filename)
            .await?;

        Ok(Stored { attachment, source_url })
    }
}
