//! Inference provider clients. Each wraps one remote API behind a typed call and maps every
//! failure to `ProviderError`.

pub mod fal;
pub mod gemini;

pub use fal::FalClient;
pub use gemini::{GeminiClient, InlineImage};
