//! Virtual try-on: dress a face in a garment.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::errors::Result;
use crate::types::ToolOutput;

use super::params::require_http_url;
use super::template::{FalJob, OutputShape};
use super::{MediaTool, ToolContext, ToolKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FashionParams {
    /// HTTP(S) URL of the garment image
    pub garment_image_url: String,
    /// HTTP(S) URL of the model's face
    pub face_image_url: String,
    #[schema(inline)]
    pub gender: Gender,
}

pub struct FashionPhotoshoot;

#[async_trait]
impl MediaTool for FashionPhotoshoot {
    const KIND: ToolKind = ToolKind::FashionPhotoshoot;
    const DESCRIPTION: &'static str =
        "Generates a fashion photoshoot image of a person wearing the given garment.";

    type Params = FashionParams;

    fn validate(&self, params: &Self::Params) -> Result<()> {
        require_http_url("garment_image_url", &params.garment_image_url)?;
        require_http_url("face_image_url", &params.face_image_url)
    }

    async fn run(&self, ctx: &ToolContext, params: Self::Params) -> Result<ToolOutput> {
        let job = FalJob::new(
            "easel-ai/fashion-photoshoot",
            json!({
                "garment_image": params.garment_image_url,
                "face_image": params.face_image_url,
                "gender": params.gender,
            }),
            OutputShape::Image,
        );
        let stored = job.execute(ctx, "fashion_photoshoot").await?;
        Ok(ToolOutput::new(
            vec![stored.attachment],
            "The fashion photoshoot image has been successfully generated.",
        ))
    }
}
