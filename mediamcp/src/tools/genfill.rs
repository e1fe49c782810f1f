//! Bria GenFill: inpaint the masked region of an image from a prompt.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use utoipa::ToSchema;

use crate::errors::{Error, Result};
use crate::types::ToolOutput;

use super::params::{present, require_http_url, require_non_empty};
use super::template::{FalJob, OutputShape};
use super::{MediaTool, ToolContext, ToolKind};

const MAX_IMAGES: u32 = 4;

fn default_true() -> bool {
    true
}

fn default_num_images() -> u32 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenfillParams {
    /// HTTP(S) URL of the source image
    pub image_url: String,
    /// HTTP(S) URL of the mask; white pixels are regenerated
    pub mask_url: String,
    /// What to paint into the masked region
    pub prompt: String,
    #[serde(default = "default_num_images")]
    #[schema(default = 1, minimum = 1, maximum = 4)]
    pub num_images: u32,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default = "default_true")]
    #[schema(default = true)]
    pub refine_prompt: bool,
    #[serde(default)]
    pub seed: Option<i64>,
    #[serde(default = "default_true")]
    #[schema(default = true)]
    pub fast: bool,
}

impl GenfillParams {
    fn arguments(&self) -> Value {
        let mut arguments = Map::new();
        arguments.insert("image_url".into(), json!(self.image_url));
        arguments.insert("mask_url".into(), json!(self.mask_url));
        arguments.insert("prompt".into(), json!(self.prompt));
        arguments.insert("num_images".into(), json!(self.num_images));
        if let Some(negative_prompt) = present(&self.negative_prompt) {
            arguments.insert("negative_prompt".into(), json!(negative_prompt));
        }
        arguments.insert("refine_prompt".into(), json!(self.refine_prompt));
        arguments.insert("fast".into(), json!(self.fast));
        if let Some(seed) = self.seed {
            arguments.insert("seed".into(), json!(seed));
        }
        Value::Object(arguments)
    }
}

pub struct Genfill;

#[async_trait]
impl MediaTool for Genfill {
    const KIND: ToolKind = ToolKind::Genfill;
    const DESCRIPTION: &'static str =
        "Fills the masked region of an image from a text prompt with Bria GenFill and stores the first result.";

    type Params = GenfillParams;

    fn validate(&self, params: &Self::Params) -> Result<()> {
        require_http_url("image_url", &params.image_url)?;
        require_http_url("mask_url", &params.mask_url)?;
        require_non_empty("prompt", &params.prompt)?;
        if !(1..=MAX_IMAGES).contains(&params.num_images) {
            return Err(Error::invalid_input(format!("num_images must be between 1 and {MAX_IMAGES}")));
        }
        Ok(())
    }

    async fn run(&self, ctx: &ToolContext, params: Self::Params) -> Result<ToolOutput> {
        let job = FalJob::new("fal-ai/bria/genfill", params.arguments(), OutputShape::Image);
        let stored = job.execute(ctx, "bria_genfill").await?;
        Ok(ToolOutput::new(vec![stored.attachment], "GenFill completed successfully.")
            .with_extra("source_image_url", stored.source_url))
    }
}
