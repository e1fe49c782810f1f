//! ESRGAN upscaling. Two deployments share the model: `process_image` forwards the URL as is,
//! `upscale_image` first downloads the input and checks that it decodes as an image.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::errors::{Error, Result};
use crate::types::ToolOutput;

use super::params::require_http_url;
use super::template::{FalJob, OutputShape};
use super::{MediaTool, ToolContext, ToolKind};

const ESRGAN_MODEL: &str = "fal-ai/esrgan";
const SUMMARY: &str = "The image has been successfully upscaled and enhanced.";

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpscaleParams {
    /// HTTP(S) URL of the image to upscale
    pub file_url: String,
}

async fn upscale(ctx: &ToolContext, file_url: &str) -> Result<ToolOutput> {
    let job = FalJob::new(ESRGAN_MODEL, json!({"image_url": file_url}), OutputShape::Image);
    let stored = job.execute(ctx, "upscaled_image").await?;
    Ok(ToolOutput::new(vec![stored.attachment], SUMMARY))
}

pub struct ProcessImage;

#[async_trait]
impl MediaTool for ProcessImage {
    const KIND: ToolKind = ToolKind::ProcessImage;
    const DESCRIPTION: &'static str = "Upscales and enhances an image with ESRGAN and stores the result.";

    type Params = UpscaleParams;

    fn validate(&self, params: &Self::Params) -> Result<()> {
        require_http_url("file_url", &params.file_url)
    }

    async fn run(&self, ctx: &ToolContext, params: Self::Params) -> Result<ToolOutput> {
        upscale(ctx, &params.file_url).await
    }
}

pub struct UpscaleImage;

#[async_trait]
impl MediaTool for UpscaleImage {
    const KIND: ToolKind = ToolKind::UpscaleImage;
    const DESCRIPTION: &'static str =
        "Checks that the URL points at a decodable image, upscales it with ESRGAN and stores the result.";

    type Params = UpscaleParams;

    fn validate(&self, params: &Self::Params) -> Result<()> {
        require_http_url("file_url", &params.file_url)
    }

    async fn run(&self, ctx: &ToolContext, params: Self::Params) -> Result<ToolOutput> {
        let input = ctx.fetch_input(&params.file_url).await?;

        tokio::task::spawn_blocking(move || image::load_from_memory(&input.bytes).map(|_| ()))
            .await
            .map_err(|e| Error::Other(anyhow::anyhow!("image check failed: {e}")))?
            .map_err(|_| Error::invalid_input("Downloaded file is not a valid image."))?;

        upscale(ctx, &params.file_url).await
    }
}
