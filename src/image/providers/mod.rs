//! Image restyling providers.

mod openrouter;

pub use openrouter::{
    extract_image_payload, OpenRouterProvider, OpenRouterProviderBuilder, API_KEY_ENV,
    DEFAULT_BASE_URL, DEFAULT_MODEL,
};
