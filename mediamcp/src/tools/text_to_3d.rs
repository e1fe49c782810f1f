//! Text-to-3D generation with Meshy.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::errors::{Error, Result};
use crate::types::ToolOutput;

use super::template::{FalJob, OutputShape};
use super::{MediaTool, ToolContext, ToolKind};

const MIN_PROMPT_CHARS: usize = 3;

#[derive(Debug, Deserialize, ToSchema)]
pub struct TextTo3dParams {
    /// Description of the object to model, at least three characters
    #[schema(min_length = 3)]
    pub prompt: String,
}

pub struct TextTo3d;

#[async_trait]
impl MediaTool for TextTo3d {
    const KIND: ToolKind = ToolKind::TextTo3d;
    const DESCRIPTION: &'static str =
        "Generates a 3D model from a text prompt with Meshy and stores the resulting asset.";

    type Params = TextTo3dParams;

    fn validate(&self, params: &Self::Params) -> Result<()> {
        if params.prompt.trim().chars().count() < MIN_PROMPT_CHARS {
            return Err(Error::invalid_input("A non-empty prompt is required."));
        }
        Ok(())
    }

    async fn run(&self, ctx: &ToolContext, params: Self::Params) -> Result<ToolOutput> {
        let job = FalJob::new(
            "fal-ai/meshy/v6-preview/text-to-3d",
            json!({"prompt": params.prompt.trim()}),
            OutputShape::Model3d,
        );
        let stored = job.execute(ctx, "meshy_text_to_3d").await?;
        Ok(
            ToolOutput::new(vec![stored.attachment], "3D model generated from text and uploaded successfully.")
                .with_extra("source_asset_url", stored.source_url),
        )
    }
}
