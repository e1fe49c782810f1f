//! Product banner generation: place a product photo into a described scene.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::errors::Result;
use crate::types::ToolOutput;

use super::params::{require_http_url, require_non_empty, url_stem};
use super::template::{FalJob, OutputShape};
use super::{MediaTool, ToolContext, ToolKind};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductBannerParams {
    /// HTTP(S) URL of the product image
    pub product_image_url: String,
    /// The scene to generate around the product, e.g. "a bright modern kitchen"
    pub scene_description: String,
    /// Where and how the product sits in the scene
    pub product_placement_description: String,
}

pub struct ProductBanner;

#[async_trait]
impl MediaTool for ProductBanner {
    const KIND: ToolKind = ToolKind::ProductBanner;
    const DESCRIPTION: &'static str =
        "Creates a product banner photo by placing a product image into a described scene.";

    type Params = ProductBannerParams;

    fn validate(&self, params: &Self::Params) -> Result<()> {
        require_http_url("product_image_url", &params.product_image_url)?;
        require_non_empty("scene_description", &params.scene_description)?;
        require_non_empty("product_placement_description", &params.product_placement_description)
    }

    async fn run(&self, ctx: &ToolContext, params: Self::Params) -> Result<ToolOutput> {
        let job = FalJob::new(
            "easel-ai/product-photoshoot",
            json!({
                "product_image": params.product_image_url,
                "scene": params.scene_description,
                "product_placement": params.product_placement_description,
            }),
            OutputShape::Image,
        );
        let stored = job.execute(ctx, &url_stem(&params.product_image_url)).await?;
        Ok(ToolOutput::new(vec![stored.attachment], "Here is Generated Product Banner."))
    }
}
