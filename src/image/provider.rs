//! Image provider trait.

use crate::error::Result;
use crate::image::types::{GeneratedImage, GenerationRequest};
use async_trait::async_trait;

/// Trait for image restyling backends.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Sends the prompt and source image, returning the generated image.
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage>;

    /// Model identifier used for generation.
    fn model(&self) -> &str;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;
}
