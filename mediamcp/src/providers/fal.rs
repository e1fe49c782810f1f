//! fal.ai synchronous run endpoint.
//!
//! `POST {base_url}/{model_id}` with the model arguments as the JSON body blocks until the model
//! finishes and returns its output document. Auth uses fal's `Key` scheme.

use reqwest::{Client, header::AUTHORIZATION};
use serde_json::Value;
use tracing::{info, instrument};
use url::Url;

use crate::errors::{Error, Result};
use crate::http::{TransferError, describe_transport_error, join_path, truncate};

#[derive(Clone)]
pub struct FalClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl std::fmt::Debug for FalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FalClient").field("base_url", &self.base_url.as_str()).finish()
    }
}

impl FalClient {
    pub fn new(client: Client, base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Run `model` with `arguments` and return the output document.
    #[instrument(skip(self, arguments))]
    pub async fn run(&self, model: &str, arguments: &Value) -> Result<Value> {
        let url = join_path(&self.base_url, model).map_err(|e| Error::provider(format!("invalid model id: {e}")))?;

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Key {}", self.api_key))
            .json(arguments)
            .send()
            .await
            .map_err(|e| Error::provider(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::provider(format!(
                "{model} returned {status}: {}",
                error_detail(&body)
            )));
        }

        let output: Value = response
            .json()
            .await
            .map_err(|e| Error::provider(format!("{model} returned an unreadable body: {}", TransferError::from(e))))?;

        // Some models report failure inside a 200
        if let Some(message) = output.get("error").and_then(Value::as_str) {
            return Err(Error::provider(format!("{model} failed: {message}")));
        }

        info!(model, "fal run complete");
        Ok(output)
    }
}

/// Pull a human-readable message out of a fal error body.
///
/// fal answers with `{"detail": "..."}`, `{"detail": [{"msg": ...}]}` for validation errors, or
/// `{"error": "..."}`. Anything else is passed through, truncated.
fn error_detail(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return truncate(body.trim(), 300);
    };

    let detail = match value.get("detail") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(items)) => {
            let messages: Vec<&str> = items.iter().filter_map(|item| item.get("msg")?.as_str()).collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    };

    detail
        .or_else(|| value.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| truncate(body.trim(), 300))
}
