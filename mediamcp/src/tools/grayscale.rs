//! In-process grayscale conversion. The only tool that calls no provider.

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use std::io::Cursor;
use tracing::debug;
use utoipa::ToSchema;

use crate::errors::{Error, Result};
use crate::storage::MediaCategory;
use crate::types::{ProcessedResult, ToolOutput};

use super::params::require_http_url;
use super::{MediaTool, ToolContext, ToolKind};

/// Formats written back as-is; everything else is re-encoded as PNG.
const PRESERVED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::WebP,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
    ImageFormat::Gif,
];

#[derive(Debug, Deserialize, ToSchema)]
pub struct GrayscaleParams {
    /// HTTP(S) URL of the image to convert
    pub file_url: String,
}

pub struct Grayscale;

#[async_trait]
impl MediaTool for Grayscale {
    const KIND: ToolKind = ToolKind::Grayscale;
    const DESCRIPTION: &'static str =
        "Downloads an image from a URL, converts it to grayscale and stores the result.";

    type Params = GrayscaleParams;

    fn validate(&self, params: &Self::Params) -> Result<()> {
        require_http_url("file_url", &params.file_url)
    }

    async fn run(&self, ctx: &ToolContext, params: Self::Params) -> Result<ToolOutput> {
        let input = ctx.fetch_input(&params.file_url).await?;

        let (bytes, format) = tokio::task::spawn_blocking(move || to_grayscale(&input.bytes))
            .await
            .map_err(|e| Error::Other(anyhow::anyhow!("grayscale task failed: {e}")))??;

        let result = ProcessedResult::bytes(bytes, Some(format.to_mime_type().to_string()));
        let stored = ctx.store(result, MediaCategory::Image, "grayscale").await?;

        Ok(ToolOutput::new(
            vec![stored.attachment],
            "Image converted to grayscale and uploaded successfully.",
        ))
    }
}

/// Decode, drop to 8-bit luma and re-encode, keeping the source format where possible.
pub fn to_grayscale(source: &[u8]) -> Result<(Bytes, ImageFormat)> {
    let invalid = || Error::invalid_input("Downloaded file is not a valid image.");

    let format = image::guess_format(source).map_err(|_| invalid())?;
    let decoded = image::load_from_memory_with_format(source, format).map_err(|_| invalid())?;
    let gray = DynamicImage::ImageLuma8(decoded.to_luma8());

    let target = if PRESERVED_FORMATS.contains(&format) {
        format
    } else {
        ImageFormat::Png
    };

    match encode(&gray, target) {
        Ok(bytes) => Ok((bytes, target)),
        Err(e) if target != ImageFormat::Png => {
            // Some encoders reject single-channel input
            debug!(?target, error = %e, "Falling back to PNG");
            let bytes = encode(&gray, ImageFormat::Png)
                .map_err(|e| Error::Other(anyhow::anyhow!("PNG encoding failed: {e}")))?;
            Ok((bytes, ImageFormat::Png))
        }
        Err(e) => Err(Error::Other(anyhow::anyhow!("PNG encoding failed: {e}"))),
    }
}

fn encode(image: &DynamicImage, format: ImageFormat) -> image::ImageResult<Bytes> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format)?;
    Ok(Bytes::from(buffer.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestBackend, jpeg_fixture, png_fixture};
    use crate::tools::DynTool;
    use crate::types::AuthToken;
    use serde_json::json;

    #[test]
    fn test_to_grayscale_keeps_png() {
        let (bytes, format) = to_grayscale(&png_fixture(4, 3)).unwrap();
        assert_eq!(format, ImageFormat::Png);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.color(), image::ColorType::L8);
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }

    #[test]
    fn test_to_grayscale_keeps_jpeg() {
        let (_, format) = to_grayscale(&jpeg_fixture(8, 8)).unwrap();
        assert_eq!(format, ImageFormat::Jpeg);
    }

    #[test]
    fn test_not_an_image() {
        let err = to_grayscale(b"<html>404</html>").unwrap_err();
        assert_eq!(err.to_string(), "InvalidInput: Downloaded file is not a valid image.");
    }

    #[test_log::test(tokio::test)]
    async fn test_grayscale_end_to_end() {
        let backend = TestBackend::start().await;
        backend.serve_file("/input/cat.png", png_fixture(2, 2), "image/png").await;

        let ctx = backend.context(AuthToken::new("test-token"));
        let output = Grayscale
            .call(&ctx, json!({"file_url": backend.url("/input/cat.png")}))
            .await
            .unwrap();

        assert_eq!(output.attachments.len(), 1);
        let attachment = &output.attachments[0];
        assert_eq!(attachment.s3_key, TestBackend::FILE_ID);
        assert_eq!(attachment.filename, "grayscale.png");
        assert_eq!(attachment.size, backend.last_upload_size().await);
        assert!(!output.summary.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_rejects_non_http_url() {
        let backend = TestBackend::start().await;
        let ctx = backend.context(AuthToken::new("test-token"));

        let err = Grayscale.call(&ctx, json!({"file_url": "file:///etc/passwd"})).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
        assert_eq!(backend.request_count().await, 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_input_is_invalid_input() {
        let backend = TestBackend::start().await;
        let ctx = backend.context(AuthToken::new("test-token"));

        let err = Grayscale
            .call(&ctx, json!({"file_url": backend.url("/input/missing.png")}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
        assert!(err.to_string().contains("404"), "{err}");
    }
}
