//! OpenRouter chat-completions image provider.

use crate::error::{parse_retry_after, sanitize_error_message, RestylerError, Result};
use crate::image::provider::ImageProvider;
use crate::image::types::{GeneratedImage, GenerationMetadata, GenerationRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Default OpenRouter API base URL.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Model used for restyling.
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash-image-preview";

/// MIME type the source image is labelled with, whatever its real format.
const SOURCE_MIME: &str = "image/png";

/// Environment variable holding the bearer token.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Builder for OpenRouterProvider.
#[derive(Debug, Clone, Default)]
pub struct OpenRouterProviderBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
}

impl OpenRouterProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `OPENROUTER_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API base URL (default: `https://openrouter.ai/api/v1`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<OpenRouterProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                RestylerError::Config(format!("{API_KEY_ENV} environment variable not set"))
            })?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(OpenRouterProvider {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// OpenRouter image provider.
pub struct OpenRouterProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenRouterProvider {
    /// Creates a new `OpenRouterProviderBuilder`.
    pub fn builder() -> OpenRouterProviderBuilder {
        OpenRouterProviderBuilder::new()
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn parse_error(
        &self,
        status: u16,
        text: &str,
        headers: &reqwest::header::HeaderMap,
    ) -> RestylerError {
        let message = sanitize_error_message(text);
        match status {
            401 | 403 => RestylerError::Auth { status, message },
            402 => RestylerError::Billing { status, message },
            429 => RestylerError::RateLimited {
                status,
                message,
                retry_after: parse_retry_after(headers).map(std::time::Duration::from_secs),
            },
            _ => RestylerError::Api { status, message },
        }
    }
}

#[async_trait]
impl ImageProvider for OpenRouterProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let start = Instant::now();
        let url = self.completions_url();
        let body = ChatRequest::from_generation_request(request);

        tracing::debug!(
            url = %url,
            model = DEFAULT_MODEL,
            image_bytes = request.input_image.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let text = response.text().await?;
        let chat_response: ChatResponse = serde_json::from_str(&text)?;
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(duration_ms, "chat completion received");

        let message = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                RestylerError::UnexpectedResponse("No choices in OpenRouter response".into())
            })?
            .message;

        let image_url = message
            .images
            .into_iter()
            .next()
            .ok_or_else(|| {
                RestylerError::UnexpectedResponse(
                    "No images in OpenRouter response. The model may have answered with text only."
                        .into(),
                )
            })?
            .image_url
            .url;

        let data = decode_base64_lenient(extract_image_payload(&image_url))
            .map_err(|e| RestylerError::Decode(e.to_string()))?;

        Ok(GeneratedImage::new(
            data,
            GenerationMetadata {
                model: Some(chat_response.model.unwrap_or_else(|| DEFAULT_MODEL.into())),
                duration_ms: Some(duration_ms),
                text: message.content.filter(|text| !text.trim().is_empty()),
            },
        ))
    }

    fn model(&self) -> &str {
        DEFAULT_MODEL
    }

    fn name(&self) -> &str {
        "OpenRouter"
    }
}

/// Returns the base64 payload of an image URL.
///
/// Everything up to and including the first comma is dropped, so a full data
/// URI yields its payload and a bare base64 string is returned unchanged.
pub fn extract_image_payload(url: &str) -> &str {
    match url.split_once(',') {
        Some((_, payload)) => payload,
        None => url,
    }
}

/// Decodes base64 that may carry whitespace or lack padding.
fn decode_base64_lenient(input: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;

    let cleaned: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }

    base64::engine::general_purpose::STANDARD_NO_PAD.decode(&cleaned)
}

// Request/Response types
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    modalities: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageUrl {
    url: String,
}

impl ChatRequest {
    fn from_generation_request(req: &GenerationRequest) -> Self {
        let data_uri = format!("data:{SOURCE_MIME};base64,{}", req.encoded_image());

        Self {
            model: DEFAULT_MODEL.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: req.prompt.clone(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_uri },
                    },
                ],
            }],
            modalities: vec!["image".to_string(), "text".to_string()],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    images: Vec<ResponseImage>,
}

#[derive(Debug, Deserialize)]
struct ResponseImage {
    image_url: ImageUrl,
}
