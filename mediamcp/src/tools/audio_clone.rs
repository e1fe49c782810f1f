//! Voice cloning with Zonos: speak `prompt` in the voice of a reference recording.

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
pub struct CloneAudioParams {
    /// HTTP(S) URL of the reference voice recording
    pub audio_url: String,
    /// Text to speak in the cloned voice
    pub prompt: String,
}

pub struct CloneAudio;

#[async_trait]
impl MediaTool for CloneAudio {
    const KIND: ToolKind = ToolKind::CloneAudio;
    const DESCRIPTION: &'static str =
        "Generates speech for a text prompt in the voice of a reference recording and stores the audio.";

    type Params = CloneAudioParams;

    fn validate(&self, params: &Self::Params) -> Result<()> {
        require_http_url("audio_url", &params.audio_url)?;
        require_non_empty("prompt", &params.prompt)
    }

    async fn run(&self, ctx: &ToolContext, params: Self::Params) -> Result<ToolOutput> {
        let job = FalJob::new(
            "fal-ai/zonos",
            json!({"reference_audio_url": params.audio_url, "prompt": params.prompt}),
            OutputShape::Audio,
        );
        let stored = job.execute(ctx, &url_stem(&params.audio_url)).await?;
        Ok(ToolOutput::new(vec![stored.attachment], "Here is Generated Audio."))
    }
}
