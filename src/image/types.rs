//! Core types for image restyling.

use crate::error::Result;
use std::path::Path;

/// Metadata about the generation process.
#[derive(Debug, Clone, Default)]
pub struct GenerationMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Round-trip duration of the API call in milliseconds.
    pub duration_ms: Option<u64>,
    /// Text the model returned alongside the image, if any.
    pub text: Option<String>,
}

/// A request to restyle an image.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The instruction sent with the image.
    pub prompt: String,
    /// Source image (raw bytes). Forwarded without validation.
    pub input_image: Vec<u8>,
}

impl GenerationRequest {
    /// Creates a new request from a prompt and the source image bytes.
    pub fn new(prompt: impl Into<String>, input_image: Vec<u8>) -> Self {
        Self {
            prompt: prompt.into(),
            input_image,
        }
    }

    /// Encodes the source image as standard padded base64.
    pub fn encoded_image(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.input_image)
    }
}

/// A generated image with its data and metadata.
#[derive(Debug, Clone)]
#[must_use = "generated image should be saved or processed"]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GeneratedImage {
    /// Creates a new generated image.
    pub fn new(data: Vec<u8>, metadata: GenerationMetadata) -> Self {
        Self { data, metadata }
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    #[test]
    fn test_encoded_image_is_lossless() {
        let bytes: Vec<u8> = (0..=255).collect();
        let req = GenerationRequest::new("prompt", bytes.clone());
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(req.encoded_image())
            .unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn test_encoded_image_empty_input() {
        let req = GenerationRequest::new("prompt", Vec::new());
        assert_eq!(req.encoded_image(), "");
    }

    #[test]
    fn test_generated_image_size() {
        let image = GeneratedImage::new(vec![0; 42], GenerationMetadata::default());
        assert_eq!(image.size(), 42);
    }
}
