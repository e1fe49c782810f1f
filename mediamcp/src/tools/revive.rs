//! Old photo restoration through Gemini image generation.

use async_trait::async_trait;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::errors::Result;
use crate::providers::InlineImage;
use crate::storage::{ContentType, MediaCategory};
use crate::types::{ProcessedResult, ToolOutput};

use super::params::require_http_url;
use super::{MediaTool, ToolContext, ToolKind};

const RESTORATION_PROMPT: &str = "You are an expert digital image restoration specialist. Revive the provided old image.
1. Colorize: if the image is black and white or sepia, apply natural and historically plausible colors.
2. Restore: remove scratches, dust, folds and other physical damage.
3. Enhance: improve sharpness, clarity, lighting and contrast without creating an artificial look.
4. Preserve: keep the original composition, subjects and character of the photo. Do not add or remove any elements.
Return only the final restored image, with no text or commentary.";

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviveParams {
    /// HTTP(S) URL of the old image to revive
    pub file_url: String,
    /// Extra instructions appended to the restoration prompt
    #[serde(default)]
    pub user_prompt: Option<String>,
}

pub struct ReviveOldImage;

#[async_trait]
impl MediaTool for ReviveOldImage {
    const KIND: ToolKind = ToolKind::ReviveOldImage;
    const DESCRIPTION: &'static str =
        "Restores, colorizes and enhances an old photo with an image model and stores the result.";

    type Params = ReviveParams;

    fn validate(&self, params: &Self::Params) -> Result<()> {
        require_http_url("file_url", &params.file_url)
    }

    async fn run(&self, ctx: &ToolContext, params: Self::Params) -> Result<ToolOutput> {
        let gemini = ctx.gemini()?;
        let input = ctx.fetch_input(&params.file_url).await?;

        // Gemini needs a concrete image type; unknown inputs are sent as JPEG
        let mime_type = ContentType::from_mime(input.content_type.as_deref().unwrap_or_default())
            .or_else(|| ContentType::from_url(&input.url))
            .filter(|ct| ct.category == MediaCategory::Image)
            .map_or("image/jpeg", |ct| ct.mime);

        let prompt = match params.user_prompt.as_deref().map(str::trim) {
            Some(extra) if !extra.is_empty() => format!("{RESTORATION_PROMPT}\nAdditional instructions: {extra}"),
            _ => RESTORATION_PROMPT.to_string(),
        };

        let revived = gemini
            .generate_image(
                &prompt,
                InlineImage {
                    mime_type: mime_type.to_string(),
                    data: input.bytes,
                },
            )
            .await?;

        let result = ProcessedResult::bytes(revived.data, Some(revived.mime_type));
        let stored = ctx.store(result, MediaCategory::Image, "revived_image").await?;

        Ok(ToolOutput::new(
            vec![stored.attachment],
            "The old image has been successfully restored, colorized, and enhanced.",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestBackend, png_fixture};
    use crate::tools::DynTool;
    use crate::types::AuthToken;
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    async fn mount_gemini(backend: &TestBackend, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/gemini/v1beta/models/gemini-test:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&backend.server)
            .await;
    }

    #[test_log::test(tokio::test)]
    async fn test_revive_uploads_gemini_image() {
        let backend = TestBackend::start().await;
        backend.serve_file("/input/old.png", png_fixture(2, 2), "image/png").await;
        mount_gemini(
            &backend,
            json!({"candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "image/jpeg", "data": STANDARD.encode(b"restored")}}
            ]}}]}),
        )
        .await;

        let ctx = backend.context(AuthToken::new("test-token"));
        let output = ReviveOldImage
            .call(
                &ctx,
                json!({"file_url": backend.url("/input/old.png"), "user_prompt": "warm tones"}),
            )
            .await
            .unwrap();

        assert_eq!(output.attachments[0].filename, "revived_image.jpg");
        assert_eq!(output.attachments[0].size, 8);
        assert_eq!(backend.last_upload_content_type().await, "image/jpeg");

        let sent = backend
            .last_json_body("/gemini/v1beta/models/gemini-test:generateContent")
            .await;
        let prompt = sent["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.ends_with("Additional instructions: warm tones"));
        assert_eq!(sent["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/png");
    }

    #[test_log::test(tokio::test)]
    async fn test_no_image_part_is_provider_error() {
        let backend = TestBackend::start().await;
        backend.serve_file("/input/old.png", png_fixture(2, 2), "image/png").await;
        mount_gemini(&backend, json!({"candidates": [{"content": {"parts": [{"text": "sorry"}]}}]})).await;

        let ctx = backend.context(AuthToken::new("test-token"));
        let err = ReviveOldImage
            .call(&ctx, json!({"file_url": backend.url("/input/old.png")}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ProviderError");
    }
}
