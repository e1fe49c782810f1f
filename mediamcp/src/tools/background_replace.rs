//! Bria background replacement, guided by either a reference image or a prompt.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use utoipa::ToSchema;

use crate::errors::{Error, Result};
use crate::types::ToolOutput;

use super::params::{present, require_http_url};
use super::template::{FalJob, OutputShape};
use super::{MediaTool, ToolContext, ToolKind};

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BackgroundReplaceParams {
    /// HTTP(S) URL of the input image
    pub image_url: String,
    /// HTTP(S) URL of an image whose background should be used
    #[serde(default)]
    pub ref_image_url: Option<String>,
    /// Description of the new background
    #[serde(default)]
    pub prompt: Option<String>,
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

impl BackgroundReplaceParams {
    fn arguments(&self) -> Value {
        let mut arguments = Map::new();
        arguments.insert("image_url".into(), json!(self.image_url));
        if let Some(ref_image_url) = present(&self.ref_image_url) {
            arguments.insert("ref_image_url".into(), json!(ref_image_url));
        }
        if let Some(prompt) = present(&self.prompt) {
            arguments.insert("prompt".into(), json!(prompt));
        }
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

pub struct BackgroundReplace;

#[async_trait]
impl MediaTool for BackgroundReplace {
    const KIND: ToolKind = ToolKind::BackgroundReplace;
    const DESCRIPTION: &'static str = "Replaces the background of an image with Bria. \
        Provide either ref_image_url or prompt to describe the new background.";

    type Params = BackgroundReplaceParams;

    fn validate(&self, params: &Self::Params) -> Result<()> {
        require_http_url("image_url", &params.image_url)?;
        if let Some(ref_image_url) = present(&params.ref_image_url) {
            require_http_url("ref_image_url", ref_image_url)?;
        }
        if present(&params.ref_image_url).is_some() && present(&params.prompt).is_some() {
            return Err(Error::invalid_input("Provide either ref_image_url or prompt, not both"));
        }
        Ok(())
    }

    async fn run(&self, ctx: &ToolContext, params: Self::Params) -> Result<ToolOutput> {
        let job = FalJob::new("fal-ai/bria/background/replace", params.arguments(), OutputShape::Image);
        let stored = job.execute(ctx, "bria_background_replace").await?;
        Ok(ToolOutput::new(vec![stored.attachment], "Background replaced successfully.")
            .with_extra("source_image_url", stored.source_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestBackend, png_fixture};
    use crate::tools::DynTool;
    use crate::types::AuthToken;

    #[test_log::test(tokio::test)]
    async fn test_background_replace_echoes_source_url() {
        let backend = TestBackend::start().await;
        let result_url = backend.url("/results/replaced.png");
        backend
            .mount_fal(
                "fal-ai/bria/background/replace",
                json!({"images": [{"url": result_url, "content_type": "image/png"}]}),
            )
            .await;
        backend.serve_file("/results/replaced.png", png_fixture(4, 4), "image/png").await;

        let ctx = backend.context(AuthToken::new("test-token"));
        let output = BackgroundReplace
            .call(
                &ctx,
                json!({"image_url": "https://cdn.example.com/person.png", "prompt": "a beach at sunset", "seed": 7}),
            )
            .await
            .unwrap();

        assert_eq!(output.attachments[0].filename, "bria_background_replace.png");
        assert_eq!(output.extra["source_image_url"], json!(result_url));
        assert_eq!(
            backend.last_json_body("/fal/fal-ai/bria/background/replace").await,
            json!({
                "image_url": "https://cdn.example.com/person.png",
                "prompt": "a beach at sunset",
                "refine_prompt": true,
                "fast": true,
                "seed": 7
            })
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_ref_image_and_prompt_are_exclusive() {
        let backend = TestBackend::start().await;
        let ctx = backend.context(AuthToken::new("test-token"));

        let err = BackgroundReplace
            .call(
                &ctx,
                json!({
                    "image_url": "https://cdn.example.com/person.png",
                    "ref_image_url": "https://cdn.example.com/beach.png",
                    "prompt": "a beach"
                }),
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "InvalidInput: Provide either ref_image_url or prompt, not both");
        assert_eq!(backend.request_count().await, 0);
    }

    #[test]
    fn test_seed_omitted_when_absent() {
        let params: BackgroundReplaceParams =
            serde_json::from_value(json!({"image_url": "https://a/b.png", "fast": false})).unwrap();
        let arguments = params.arguments();
        assert!(arguments.get("seed").is_none());
        assert_eq!(arguments["fast"], false);
    }
}
