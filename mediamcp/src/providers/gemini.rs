//! Gemini `generateContent` with an inline image in and an inline image out.

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};
use url::Url;

use crate::errors::{Error, Result};
use crate::http::{TransferError, describe_transport_error, join_path, truncate};

/// Raw image bytes plus their MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Bytes,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: Url,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(alias = "inline_data", rename = "inlineData")]
    inline_data: Option<Blob>,
}

#[derive(Debug, Deserialize)]
struct Blob {
    #[serde(alias = "mime_type", rename = "mimeType")]
    mime_type: String,
    data: String,
}

impl GeminiClient {
    pub fn new(client: Client, base_url: Url, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url,
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Send `prompt` and `image`, return the first image part of the reply.
    #[instrument(skip_all, fields(model = %self.model, input_size = image.data.len()))]
    pub async fn generate_image(&self, prompt: &str, image: InlineImage) -> Result<InlineImage> {
        let url = join_path(&self.base_url, &format!("v1beta/models/{}:generateContent", self.model))
            .map_err(|e| Error::provider(format!("invalid Gemini model: {e}")))?;

        let body = json!({
            "contents": [{
                "parts": [
                    {"text": prompt},
                    {"inlineData": {"mimeType": image.mime_type, "data": STANDARD.encode(&image.data)}}
                ]
            }],
            "generationConfig": {"responseModalities": ["IMAGE", "TEXT"]}
        });

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::provider(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::provider(format!("Gemini returned {status}: {}", error_message(&body))));
        }

        let reply: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::provider(format!("Gemini returned an unreadable body: {}", TransferError::from(e))))?;

        let image = first_image(reply)?;
        info!(output_size = image.data.len(), mime = %image.mime_type, "Gemini returned image");
        Ok(image)
    }
}

fn first_image(reply: GenerateContentResponse) -> Result<InlineImage> {
    if let Some(reason) = reply.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(Error::provider(format!("Gemini blocked the request: {reason}")));
    }

    let mut finish_reason = None;
    for candidate in reply.candidates {
        finish_reason = finish_reason.or(candidate.finish_reason);
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        for blob in parts.into_iter().filter_map(|p| p.inline_data) {
            if !blob.mime_type.starts_with("image/") {
                continue;
            }
            let data = STANDARD
                .decode(blob.data.as_bytes())
                .map_err(|e| Error::provider(format!("Gemini returned invalid image data: {e}")))?;
            return Ok(InlineImage {
                mime_type: blob.mime_type,
                data: Bytes::from(data),
            });
        }
    }

    warn!(finish_reason = ?finish_reason, "Gemini reply had no image part");
    Err(Error::provider(match finish_reason {
        Some(reason) => format!("The AI model did not return a valid image (finish reason: {reason})"),
        None => "The AI model did not return a valid image".to_string(),
    }))
}

/// Gemini errors look like `{"error": {"code": 400, "message": "...", "status": "..."}}`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| truncate(body.trim(), 300))
}
