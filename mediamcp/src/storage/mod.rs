//! Result persistence: content-type resolution and the presigned upload flow.

pub mod content_type;
pub mod upload;

pub use content_type::{ContentType, MediaCategory, resolve};
pub use upload::UploadClient;
