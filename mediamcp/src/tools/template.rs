//! The shared shape of a fal-backed tool: call a model, find the result in its output, store it.
//!
//! Each tool only supplies the model id, the arguments and an [`OutputShape`]. Output documents
//! differ per model, so each shape tries the locations its models are known to use.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::Value;
use tracing::{instrument, warn};

use crate::errors::{Error, Result};
use crate::storage::MediaCategory;
use crate::types::ProcessedResult;

use super::context::{Stored, ToolContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    /// `images[0]` or `image`
    Image,
    /// `video` or a top-level `url`
    Video,
    /// `audio`
    Audio,
    /// `model`, `model_glb`, `asset` or a top-level `url`
    Model3d,
    /// `images[0]`, as a URL (possibly a data URI) or base64 `content`
    Texture,
}

impl OutputShape {
    pub fn category(self) -> MediaCategory {
        match self {
            OutputShape::Image | OutputShape::Texture => MediaCategory::Image,
            OutputShape::Video => MediaCategory::Video,
            OutputShape::Audio => MediaCategory::Audio,
            OutputShape::Model3d => MediaCategory::Model3d,
        }
    }

    /// Locate the result in a provider output document.
    pub fn extract(self, output: &Value) -> Result<ProcessedResult> {
        let found = match self {
            OutputShape::Image => find_ref(output, &["/images/0", "/image"], file_ref),
            OutputShape::Video => find_ref(output, &["/video"], file_ref).or_else(|| top_level_url(output)),
            OutputShape::Audio => find_ref(output, &["/audio", "/audio_file"], file_ref),
            OutputShape::Model3d => find_ref(output, &["/model", "/model_glb", "/model_mesh", "/asset"], file_ref)
                .or_else(|| top_level_url(output)),
            OutputShape::Texture => find_ref(output, &["/images/0"], texture_ref),
        };

        found.ok_or_else(|| {
            warn!(shape = ?self, keys = ?output.as_object().map(|o| o.keys().collect::<Vec<_>>()), "No result in provider output");
            Error::provider(format!("provider did not return {}", self.label()))
        })
    }

    fn label(self) -> &'static str {
        match self {
            OutputShape::Image | OutputShape::Texture => "an image",
            OutputShape::Video => "a video",
            OutputShape::Audio => "an audio file",
            OutputShape::Model3d => "a 3D model",
        }
    }
}

/// First location that holds a usable reference.
fn find_ref(output: &Value, pointers: &[&str], read: fn(&Value) -> Option<ProcessedResult>) -> Option<ProcessedResult> {
    pointers.iter().find_map(|p| output.pointer(p).and_then(read))
}

/// A fal file reference: `{"url": ..., "content_type": ...}` or a bare URL string.
fn file_ref(value: &Value) -> Option<ProcessedResult> {
    match value {
        Value::String(url) if !url.is_empty() => Some(url_or_data(url, None)),
        Value::Object(file) => {
            let url = file.get("url")?.as_str().filter(|u| !u.is_empty())?;
            let declared = file.get("content_type").and_then(Value::as_str).map(str::to_string);
            Some(url_or_data(url, declared))
        }
        _ => None,
    }
}

fn texture_ref(value: &Value) -> Option<ProcessedResult> {
    file_ref(value).or_else(|| {
        let content = value.get("content")?.as_str()?;
        let bytes = STANDARD.decode(content).ok()?;
        let declared = value.get("content_type").and_then(Value::as_str).map(str::to_string);
        Some(ProcessedResult::bytes(bytes, declared))
    })
}

fn top_level_url(output: &Value) -> Option<ProcessedResult> {
    output
        .get("url")
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .map(|u| url_or_data(u, None))
}

/// fal's sync mode inlines results as `data:<mime>;base64,<payload>` URIs.
fn url_or_data(url: &str, declared: Option<String>) -> ProcessedResult {
    if let Some(rest) = url.strip_prefix("data:")
        && let Some((meta, payload)) = rest.split_once(',')
        && let Some(mime) = meta.strip_suffix(";base64")
        && let Ok(bytes) = STANDARD.decode(payload)
    {
        let declared = declared.or_else(|| (!mime.is_empty()).then(|| mime.to_string()));
        return ProcessedResult::bytes(bytes, declared);
    }
    ProcessedResult::url(url, declared)
}

/// One fal model call that produces one stored file.
#[derive(Debug, Clone)]
pub struct FalJob {
    pub model: &'static str,
    pub arguments: Value,
    pub output: OutputShape,
}

impl FalJob {
    pub fn new(model: &'static str, arguments: Value, output: OutputShape) -> Self {
        Self {
            model,
            arguments,
            output,
        }
    }

    /// Run the model, pull out the result and upload it as `{base_name}{ext}`.
    #[instrument(skip_all, fields(model = self.model))]
    pub async fn execute(self, ctx: &ToolContext, base_name: &str) -> Result<Stored> {
        let output = ctx.fal()?.run(self.model, &self.arguments).await?;
        let result = self.output.extract(&output)?;
        ctx.store(result, self.output.category(), base_name).await
    }
}
