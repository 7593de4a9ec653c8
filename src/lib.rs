#![warn(missing_docs)]
//! Restyler - restyle local images through a multimodal generation API.
//!
//! A source image and a fixed prompt are sent to OpenRouter's chat
//! completions endpoint. The returned image is written next to a timestamp
//! and the source file is removed.
//!
//! # Quick Start
//!
//! ```no_run
//! use restyler::{Layout, OpenRouterProvider, Runner};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> restyler::Result<()> {
//!     let runner = Runner::new(Layout::default());
//!     let provider = OpenRouterProvider::builder().build()?;
//!     let outcome = runner
//!         .run(&provider, "photo.jpg", chrono::Local::now().naive_local())
//!         .await?;
//!     println!("wrote {}", outcome.output_path.display());
//!     Ok(())
//! }
//! ```
//!
//! # Layout
//!
//! - `prompt.txt`: prompt text
//! - `source/<name>`: input images, deleted after a successful run
//! - `result/<stem>_<YYYYMMDD_HHMMSS>.<ext>`: generated images
//!
//! # Features
//!
//! - `cli`: Command-line interface (default)

mod error;
pub mod image;
pub mod runner;

// Re-export error types at crate root
pub use error::{RestylerError, Result};

pub use image::providers::{OpenRouterProvider, OpenRouterProviderBuilder};
pub use image::{GeneratedImage, GenerationMetadata, GenerationRequest, ImageProvider};
pub use runner::{output_file_name, Layout, Progress, RunOutcome, Runner};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{RestylerError, Result};
    pub use crate::image::providers::OpenRouterProvider;
    pub use crate::image::{GeneratedImage, GenerationRequest, ImageProvider};
    pub use crate::runner::{Layout, Runner};
}
