//! Value types that flow between the auth guard, the tools and the upload client.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use utoipa::ToSchema;

use crate::errors::Error;

/// Number of token characters kept when a token is logged.
const TOKEN_PREFIX_LEN: usize = 6;

/// A bearer token taken from the `Authorization` header.
///
/// Lives for a single request. `Debug` and `Display` only show a short prefix so
/// the token can be logged without leaking it.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub(crate) fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for forwarding to the backend.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(TOKEN_PREFIX_LEN).collect();
        format!("{prefix}...")
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AuthToken").field(&self.redacted()).finish()
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Caller-visible record of a stored result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Attachment {
    /// Storage key, as issued by the backend in the upload ticket
    pub s3_key: String,
    /// Exact number of bytes uploaded
    pub size: u64,
    pub filename: String,
}

/// Backend-issued, single-use upload target.
#[derive(Debug, Clone, Deserialize)]
pub struct PresignedUploadTicket {
    #[serde(alias = "url")]
    pub upload_url: String,
    /// Form fields for a presigned POST, possibly empty. Absent or `null` means a plain PUT.
    #[serde(default)]
    pub fields: Option<BTreeMap<String, String>>,
    pub file_id: String,
}

/// What a provider handed back: either the bytes themselves or a URL to fetch them from.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPayload {
    Url(String),
    Bytes(Bytes),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedResult {
    pub payload: ResultPayload,
    /// Content type the provider declared alongside the result, if any
    pub declared_content_type: Option<String>,
}

impl ProcessedResult {
    pub fn url(url: impl Into<String>, declared_content_type: Option<String>) -> Self {
        Self {
            payload: ResultPayload::Url(url.into()),
            declared_content_type,
        }
    }

    pub fn bytes(bytes: impl Into<Bytes>, declared_content_type: Option<String>) -> Self {
        Self {
            payload: ResultPayload::Bytes(bytes.into()),
            declared_content_type,
        }
    }
}

/// Successful tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ToolOutput {
    pub attachments: Vec<Attachment>,
    pub summary: String,
    /// Tool-specific extra fields, such as `source_image_url`
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

impl ToolOutput {
    pub fn new(attachments: Vec<Attachment>, summary: impl Into<String>) -> Self {
        Self {
            attachments,
            summary: summary.into(),
            extra: Map::new(),
        }
    }

    /// Adds an extra field. A `null` value (e.g. a `None` source URL) leaves the key out.
    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Null => {}
            value => {
                self.extra.insert(key.to_string(), value);
            }
        }
        self
    }
}

/// The sole contract every tool call produces. Failures are reported in-band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ToolResponse {
    Success(ToolOutput),
    Failure { error: String },
}

impl ToolResponse {
    pub fn failure(err: &Error) -> Self {
        ToolResponse::Failure { error: err.to_string() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolResponse::Failure { .. })
    }
}
