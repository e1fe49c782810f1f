//! Seamless texture generation with SDXL.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use utoipa::ToSchema;

use crate::errors::{Error, Result};
use crate::types::ToolOutput;

use super::params::require_non_empty;
use super::template::{FalJob, OutputShape};
use super::{MediaTool, ToolContext, ToolKind};

const SEAMLESS: &str = "seamless";
const MAX_SIDE: u32 = 2048;

fn default_style() -> String {
    SEAMLESS.to_string()
}

fn default_resolution() -> String {
    "1024x1024".to_string()
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TextureParams {
    /// What the texture depicts, e.g. "mossy cobblestone"
    pub prompt: String,
    /// Only "seamless" is supported
    #[serde(default = "default_style")]
    #[schema(default = "seamless")]
    pub style: String,
    /// Output size as WIDTHxHEIGHT
    #[serde(default = "default_resolution")]
    #[schema(default = "1024x1024", example = "512x512")]
    pub resolution: String,
    #[serde(default)]
    pub seed: Option<i64>,
}

/// Parse `WIDTHxHEIGHT`, each side in `1..=2048`.
fn parse_resolution(resolution: &str) -> Result<(u32, u32)> {
    let (width, height) = resolution
        .trim()
        .split_once(['x', 'X'])
        .and_then(|(w, h)| Some((w.trim().parse::<u32>().ok()?, h.trim().parse::<u32>().ok()?)))
        .ok_or_else(|| Error::invalid_input("Invalid resolution format. Expected format like 512x512."))?;

    if width == 0 || height == 0 || width > MAX_SIDE || height > MAX_SIDE {
        return Err(Error::invalid_input(format!(
            "Resolution sides must be between 1 and {MAX_SIDE}, got {width}x{height}."
        )));
    }
    Ok((width, height))
}

pub struct Texture;

#[async_trait]
impl MediaTool for Texture {
    const KIND: ToolKind = ToolKind::Texture;
    const DESCRIPTION: &'static str =
        "Generates a seamless, tileable PBR-style texture from a text prompt and stores the image.";

    type Params = TextureParams;

    fn validate(&self, params: &Self::Params) -> Result<()> {
        require_non_empty("prompt", &params.prompt)?;
        if params.style != SEAMLESS {
            return Err(Error::invalid_input("Only seamless style is currently supported."));
        }
        parse_resolution(&params.resolution).map(|_| ())
    }

    async fn run(&self, ctx: &ToolContext, params: Self::Params) -> Result<ToolOutput> {
        let (width, height) = parse_resolution(&params.resolution)?;

        let mut arguments = Map::new();
        arguments.insert(
            "prompt".into(),
            json!(format!("a seamless texture of {}, tileable, PBR material", params.prompt.trim())),
        );
        arguments.insert("width".into(), json!(width));
        arguments.insert("height".into(), json!(height));
        if let Some(seed) = params.seed {
            arguments.insert("seed".into(), json!(seed));
        }

        let base_name = match params.seed {
            Some(seed) => format!("texture_{seed}"),
            None => "texture".to_string(),
        };

        let job = FalJob::new("fal-ai/fast-sdxl", Value::Object(arguments), OutputShape::Texture);
        let stored = job.execute(ctx, &base_name).await?;
        Ok(ToolOutput::new(
            vec![stored.attachment],
            format!("Generated a {width}x{height} seamless texture."),
        ))
    }
}
