//! Tool definitions and the registry a server process is built from.
//!
//! Every tool implements [`MediaTool`]: a typed parameter struct, a validation step and an async
//! `run` that calls one provider and stores one result. The blanket [`DynTool`] impl erases the
//! parameter type so the HTTP and MCP layers can dispatch by name.

pub mod audio_clone;
pub mod background_replace;
pub mod context;
pub mod fashion_photoshoot;
pub mod genfill;
pub mod grayscale;
pub mod handler;
pub mod params;
pub mod product_photoshoot;
pub mod revive;
pub mod template;
pub mod text_to_3d;
pub mod texture;
pub mod upscale;
pub mod video_background_removal;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use utoipa::{PartialSchema, ToSchema};

use crate::errors::{Error, Result};
use crate::types::ToolOutput;

pub use context::{Services, Stored, ToolContext};

/// Which remote service a tool depends on. Drives the startup key check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    InProcess,
    Gemini,
    Fal,
}

/// Every tool this crate can serve. The serialized name is the tool name callers use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum, ToSchema)]
pub enum ToolKind {
    #[serde(rename = "grayscale_image")]
    #[value(name = "grayscale_image")]
    Grayscale,
    #[serde(rename = "revive_old_image")]
    #[value(name = "revive_old_image")]
    ReviveOldImage,
    #[serde(rename = "process_image")]
    #[value(name = "process_image")]
    ProcessImage,
    #[serde(rename = "clone_audio")]
    #[value(name = "clone_audio")]
    CloneAudio,
    #[serde(rename = "create_product_banner_photo")]
    #[value(name = "create_product_banner_photo")]
    ProductBanner,
    #[serde(rename = "generate_photoshoot")]
    #[value(name = "generate_photoshoot")]
    FashionPhotoshoot,
    #[serde(rename = "bria_background_replace")]
    #[value(name = "bria_background_replace")]
    BackgroundReplace,
    #[serde(rename = "bria_genfill")]
    #[value(name = "bria_genfill")]
    Genfill,
    #[serde(rename = "bria_video_background_removal")]
    #[value(name = "bria_video_background_removal")]
    VideoBackgroundRemoval,
    #[serde(rename = "generate_text_to_3d")]
    #[value(name = "generate_text_to_3d")]
    TextTo3d,
    #[serde(rename = "generate_texture")]
    #[value(name = "generate_texture")]
    Texture,
    #[serde(rename = "upscale_image")]
    #[value(name = "upscale_image")]
    UpscaleImage,
}

impl ToolKind {
    pub const ALL: [ToolKind; 12] = [
        ToolKind::Grayscale,
        ToolKind::ReviveOldImage,
        ToolKind::ProcessImage,
        ToolKind::CloneAudio,
        ToolKind::ProductBanner,
        ToolKind::FashionPhotoshoot,
        ToolKind::BackgroundReplace,
        ToolKind::Genfill,
        ToolKind::VideoBackgroundRemoval,
        ToolKind::TextTo3d,
        ToolKind::Texture,
        ToolKind::UpscaleImage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Grayscale => "grayscale_image",
            ToolKind::ReviveOldImage => "revive_old_image",
            ToolKind::ProcessImage => "process_image",
            ToolKind::CloneAudio => "clone_audio",
            ToolKind::ProductBanner => "create_product_banner_photo",
            ToolKind::FashionPhotoshoot => "generate_photoshoot",
            ToolKind::BackgroundReplace => "bria_background_replace",
            ToolKind::Genfill => "bria_genfill",
            ToolKind::VideoBackgroundRemoval => "bria_video_background_removal",
            ToolKind::TextTo3d => "generate_text_to_3d",
            ToolKind::Texture => "generate_texture",
            ToolKind::UpscaleImage => "upscale_image",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Well-known port for a single-tool deployment. 9012 is reserved.
    pub fn default_port(self) -> u16 {
        match self {
            ToolKind::Grayscale => 9001,
            ToolKind::ReviveOldImage => 9002,
            ToolKind::ProcessImage => 9003,
            ToolKind::CloneAudio => 9004,
            ToolKind::ProductBanner => 9005,
            ToolKind::FashionPhotoshoot => 9006,
            ToolKind::BackgroundReplace => 9007,
            ToolKind::Genfill => 9008,
            ToolKind::VideoBackgroundRemoval => 9009,
            ToolKind::TextTo3d => 9010,
            ToolKind::Texture => 9011,
            ToolKind::UpscaleImage => 9013,
        }
    }

    pub fn provider(self) -> Provider {
        match self {
            ToolKind::Grayscale => Provider::InProcess,
            ToolKind::ReviveOldImage => Provider::Gemini,
            _ => Provider::Fal,
        }
    }

    pub fn build(self) -> Arc<dyn DynTool> {
        match self {
            ToolKind::Grayscale => Arc::new(grayscale::Grayscale),
            ToolKind::ReviveOldImage => Arc::new(revive::ReviveOldImage),
            ToolKind::ProcessImage => Arc::new(upscale::ProcessImage),
            ToolKind::CloneAudio => Arc::new(audio_clone::CloneAudio),
            ToolKind::ProductBanner => Arc::new(product_photoshoot::ProductBanner),
            ToolKind::FashionPhotoshoot => Arc::new(fashion_photoshoot::FashionPhotoshoot),
            ToolKind::BackgroundReplace => Arc::new(background_replace::BackgroundReplace),
            ToolKind::Genfill => Arc::new(genfill::Genfill),
            ToolKind::VideoBackgroundRemoval => Arc::new(video_background_removal::VideoBackgroundRemoval),
            ToolKind::TextTo3d => Arc::new(text_to_3d::TextTo3d),
            ToolKind::Texture => Arc::new(texture::Texture),
            ToolKind::UpscaleImage => Arc::new(upscale::UpscaleImage),
        }
    }
}

/// A single media tool.
#[async_trait]
pub trait MediaTool: Send + Sync + 'static {
    const KIND: ToolKind;
    const DESCRIPTION: &'static str;

    type Params: DeserializeOwned + ToSchema + Send + 'static;

    /// Checks that serde cannot express. Runs before any network call.
    fn validate(&self, _params: &Self::Params) -> Result<()> {
        Ok(())
    }

    async fn run(&self, ctx: &ToolContext, params: Self::Params) -> Result<ToolOutput>;
}

/// Object-safe view of a [`MediaTool`].
#[async_trait]
pub trait DynTool: Send + Sync {
    fn kind(&self) -> ToolKind;
    fn description(&self) -> &'static str;
    /// JSON Schema of the tool's arguments
    fn input_schema(&self) -> Value;
    /// Deserialize and validate `arguments`, then run the tool.
    async fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<ToolOutput>;
}

#[async_trait]
impl<T: MediaTool> DynTool for T {
    fn kind(&self) -> ToolKind {
        T::KIND
    }

    fn description(&self) -> &'static str {
        T::DESCRIPTION
    }

    fn input_schema(&self) -> Value {
        serde_json::to_value(<T::Params as PartialSchema>::schema()).unwrap_or(Value::Null)
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<ToolOutput> {
        let arguments = if arguments.is_null() {
            Value::Object(Default::default())
        } else {
            arguments
        };
        let params: T::Params =
            serde_json::from_value(arguments).map_err(|e| Error::invalid_input(e.to_string()))?;
        self.validate(&params)?;
        self.run(ctx, params).await
    }
}

/// Listing entry for `GET /tools` and MCP `tools/list`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[schema(value_type = Object)]
    pub input_schema: Value,
}

/// The tools served by this process.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn DynTool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ToolRegistry {
    pub fn new(kinds: &[ToolKind]) -> Self {
        let mut tools: Vec<Arc<dyn DynTool>> = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if !tools.iter().any(|t| t.kind() == *kind) {
                tools.push(kind.build());
            }
        }
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn DynTool>> {
        self.tools.iter().find(|t| t.kind().name() == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.kind().name()).collect()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|t| ToolDescriptor {
                name: t.kind().name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_serde_and_clap() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
            assert_eq!(serde_json::to_value(kind).unwrap(), Value::String(kind.name().to_string()));
            assert_eq!(ToolKind::from_str(kind.name(), false).unwrap(), kind);
        }
    }

    #[test]
    fn test_ports_are_unique_and_skip_reserved() {
        let mut ports: Vec<u16> = ToolKind::ALL.iter().map(|k| k.default_port()).collect();
        ports.sort_unstable();
        ports.dedup();
        assert_eq!(ports.len(), ToolKind::ALL.len());
        assert!(!ports.contains(&9012));
    }

    #[test]
    fn test_built_tool_reports_its_kind() {
        for kind in ToolKind::ALL {
            assert_eq!(kind.build().kind(), kind);
        }
    }

    #[test]
    fn test_registry_dedups_and_keeps_order() {
        let registry = ToolRegistry::new(&[ToolKind::Genfill, ToolKind::Grayscale, ToolKind::Genfill]);
        assert_eq!(registry.names(), vec!["bria_genfill", "grayscale_image"]);
        assert!(registry.get("bria_genfill").is_some());
        assert!(registry.get("clone_audio").is_none());
    }

    #[test]
    fn test_descriptors_carry_object_schemas() {
        let registry = ToolRegistry::new(&ToolKind::ALL);
        for descriptor in registry.descriptors() {
            assert_eq!(descriptor.input_schema["type"], "object", "{}", descriptor.name);
            assert!(!descriptor.description.is_empty());
        }
    }

    #[test]
    fn test_genfill_schema_lists_required_fields() {
        let registry = ToolRegistry::new(&[ToolKind::Genfill]);
        let schema = &registry.descriptors()[0].input_schema;
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(required.contains(&"image_url"));
        assert!(required.contains(&"mask_url"));
        assert!(required.contains(&"prompt"));
        assert!(!required.contains(&"num_images"));
    }
}
