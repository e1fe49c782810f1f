use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::tools::ToolDescriptor;

/// Body of `POST /tools/call`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ToolCallRequest {
    /// Tool name, e.g. `grayscale_image`
    pub name: String,
    /// Tool arguments; see `GET /tools` for each tool's schema
    #[serde(default)]
    #[schema(value_type = Object)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ToolList {
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub tools: Vec<String>,
}
