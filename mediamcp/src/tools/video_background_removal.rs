//! Bria video background removal.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use utoipa::ToSchema;

use crate::errors::Result;
use crate::types::ToolOutput;

use super::params::{present, require_http_url};
use super::template::{FalJob, OutputShape};
use super::{MediaTool, ToolContext, ToolKind};

#[derive(Debug, Deserialize, ToSchema)]
pub struct VideoBackgroundRemovalParams {
    /// HTTP(S) URL of the input video
    pub video_url: String,
    /// Color to put behind the subject, e.g. "Black" or "Transparent"
    #[serde(default)]
    pub background_color: Option<String>,
    /// Container and codec of the output, e.g. "mp4_h264" or "webm_vp9"
    #[serde(default)]
    pub output_container_and_codec: Option<String>,
}

pub struct VideoBackgroundRemoval;

#[async_trait]
impl MediaTool for VideoBackgroundRemoval {
    const KIND: ToolKind = ToolKind::VideoBackgroundRemoval;
    const DESCRIPTION: &'static str = "Removes the background from a video with Bria and stores the result.";

    type Params = VideoBackgroundRemovalParams;

    fn validate(&self, params: &Self::Params) -> Result<()> {
        require_http_url("video_url", &params.video_url)
    }

    async fn run(&self, ctx: &ToolContext, params: Self::Params) -> Result<ToolOutput> {
        let mut arguments = Map::new();
        arguments.insert("video_url".into(), json!(params.video_url));
        if let Some(color) = present(&params.background_color) {
            arguments.insert("background_color".into(), json!(color));
        }
        if let Some(codec) = present(&params.output_container_and_codec) {
            arguments.insert("output_container_and_codec".into(), json!(codec));
        }

        let job = FalJob::new("bria/video/background-removal", Value::Object(arguments), OutputShape::Video);
        let stored = job.execute(ctx, "bria_video_bg_removed").await?;

        Ok(ToolOutput::new(vec![stored.attachment], "Background removed from video successfully.")
            .with_extra("source_video_url", stored.source_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestBackend;
    use crate::tools::DynTool;
    use crate::types::AuthToken;

    #[test_log::test(tokio::test)]
    async fn test_video_extension_from_url_when_header_is_generic() {
        let backend = TestBackend::start().await;
        let result_url = backend.url("/results/clip.webm");
        backend
            .mount_fal("bria/video/background-removal", json!({"url": result_url}))
            .await;
        backend
            .serve_file("/results/clip.webm", vec![7u8; 128], "application/octet-stream")
            .await;

        let ctx = backend.context(AuthToken::new("test-token"));
        let output = VideoBackgroundRemoval
            .call(
                &ctx,
                json!({"video_url": "https://cdn.example.com/in.mp4", "output_container_and_codec": "webm_vp9"}),
            )
            .await
            .unwrap();

        assert_eq!(output.attachments[0].filename, "bria_video_bg_removed.webm");
        assert_eq!(output.attachments[0].size, 128);
        assert_eq!(output.extra["source_video_url"], json!(result_url));
        assert_eq!(backend.last_upload_content_type().await, "video/webm");
        assert_eq!(
            backend.last_json_body("/fal/bria/video/background-removal").await,
            json!({"video_url": "https://cdn.example.com/in.mp4", "output_container_and_codec": "webm_vp9"})
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_video_is_provider_error() {
        let backend = TestBackend::start().await;
        backend
            .mount_fal("bria/video/background-removal", json!({"status": "done"}))
            .await;

        let ctx = backend.context(AuthToken::new("test-token"));
        let err = VideoBackgroundRemoval
            .call(&ctx, json!({"video_url": "https://cdn.example.com/in.mp4"}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "ProviderError: provider did not return a video");
    }
}
