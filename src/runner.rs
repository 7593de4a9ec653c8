//! Image transform runner.
//!
//! Drives a single restyle: read the prompt, read the source image, ask the
//! provider for a new image, write it under a timestamped name and delete the
//! source. Steps run strictly in that order and nothing is retried.

use crate::error::{RestylerError, Result};
use crate::image::{GenerationRequest, ImageProvider};
use chrono::NaiveDateTime;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extension used when the source name has none.
pub const DEFAULT_EXTENSION: &str = "png";

/// Timestamp format appended to output file stems.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Where the runner reads and writes files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// File holding the prompt text.
    pub prompt_file: PathBuf,
    /// Directory source images are taken from.
    pub source_dir: PathBuf,
    /// Directory results are written to.
    pub result_dir: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            prompt_file: PathBuf::from("prompt.txt"),
            source_dir: PathBuf::from("source"),
            result_dir: PathBuf::from("result"),
        }
    }
}

impl Layout {
    /// Creates a layout rooted at `root` using the default names.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let default = Self::default();
        Self {
            prompt_file: root.join(default.prompt_file),
            source_dir: root.join(default.source_dir),
            result_dir: root.join(default.result_dir),
        }
    }

    /// Reads the prompt file.
    pub fn load_prompt(&self) -> Result<String> {
        Ok(std::fs::read_to_string(&self.prompt_file)?)
    }

    /// Joins `name` onto the source directory, failing if nothing is there.
    pub fn resolve_source(&self, name: &str) -> Result<PathBuf> {
        let path = self.source_dir.join(name);
        if !path.exists() {
            return Err(RestylerError::SourceNotFound {
                name: name.to_string(),
                dir: self.source_dir.clone(),
            });
        }
        Ok(path)
    }

    /// Path of the result file for `source_name` generated at `timestamp`.
    pub fn result_path(&self, source_name: &str, timestamp: NaiveDateTime) -> PathBuf {
        self.result_dir
            .join(output_file_name(Path::new(source_name), timestamp))
    }
}

/// Builds `<stem>_<YYYYMMDD_HHMMSS>.<ext>` for a source file.
///
/// Only the final path component is used. A missing or empty extension falls
/// back to `png`.
pub fn output_file_name(source: &Path, timestamp: NaiveDateTime) -> OsString {
    let stem = source.file_stem().unwrap_or(source.as_os_str());
    let ext = source
        .extension()
        .filter(|ext| !ext.is_empty())
        .unwrap_or(OsStr::new(DEFAULT_EXTENSION));

    let mut name = OsString::from(stem);
    name.push("_");
    name.push(timestamp.format(TIMESTAMP_FORMAT).to_string());
    name.push(".");
    name.push(ext);
    name
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Where the generated image was written.
    pub output_path: PathBuf,
    /// Size of the written image.
    pub bytes_written: usize,
    /// Model reported by the provider.
    pub model: Option<String>,
    /// API round-trip time in milliseconds.
    pub duration_ms: Option<u64>,
}

/// A step reached during [`Runner::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress<'a> {
    /// Reading the source image.
    Encoding { source: &'a Path },
    /// Waiting on the provider.
    Generating { model: &'a str },
    /// Writing the result.
    Saving { output: &'a Path },
    /// Removing the source image.
    Deleting { source: &'a Path },
}

impl std::fmt::Display for Progress<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encoding { source } => write!(f, "Encoding source image: {}", source.display()),
            Self::Generating { model } => write!(f, "Generating new image with model {model}..."),
            Self::Saving { output } => {
                write!(f, "Saving generated image to: {}", output.display())
            }
            Self::Deleting { source } => write!(f, "Deleting source image: {}", source.display()),
        }
    }
}

type ProgressHook = Arc<dyn Fn(&Progress<'_>) + Send + Sync>;

/// Runs one restyle over a [`Layout`].
#[derive(Clone, Default)]
pub struct Runner {
    layout: Layout,
    on_progress: Option<ProgressHook>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("layout", &self.layout)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl Runner {
    /// Creates a runner over `layout`.
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            on_progress: None,
        }
    }

    /// Calls `hook` at each step of a run. Steps are always logged at info level.
    pub fn on_progress(mut self, hook: impl Fn(&Progress<'_>) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(hook));
        self
    }

    fn report(&self, step: Progress<'_>) {
        tracing::info!("{step}");
        if let Some(hook) = &self.on_progress {
            hook(&step);
        }
    }

    /// Returns the layout this runner works on.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Restyles `source_name` with `provider`, naming the result after `timestamp`.
    ///
    /// The source is deleted only after the result is written. If deletion
    /// fails the result stays on disk and the error is returned.
    pub async fn run<P>(
        &self,
        provider: &P,
        source_name: &str,
        timestamp: NaiveDateTime,
    ) -> Result<RunOutcome>
    where
        P: ImageProvider + ?Sized,
    {
        let source_path = self.layout.resolve_source(source_name)?;
        std::fs::create_dir_all(&self.layout.result_dir)?;

        let prompt = self.layout.load_prompt()?;

        self.report(Progress::Encoding {
            source: &source_path,
        });
        let input_image = std::fs::read(&source_path)?;
        let request = GenerationRequest::new(prompt, input_image);

        self.report(Progress::Generating {
            model: provider.model(),
        });
        let image = provider.generate(&request).await?;
        if let Some(text) = &image.metadata.text {
            tracing::info!(provider = provider.name(), "model replied: {text}");
        }

        let output_path = self.layout.result_path(source_name, timestamp);
        self.report(Progress::Saving {
            output: &output_path,
        });
        image.save(&output_path)?;

        self.report(Progress::Deleting {
            source: &source_path,
        });
        std::fs::remove_file(&source_path)?;

        Ok(RunOutcome {
            output_path,
            bytes_written: image.size(),
            model: image.metadata.model,
            duration_ms: image.metadata.duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{GeneratedImage, GenerationMetadata};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
    }

    /// Scratch directory removed on drop.
    struct Scratch(PathBuf);

    impl Scratch {
        fn new(tag: &str) -> Self {
            static COUNTER: AtomicUsize = AtomicUsize::new(0);
            let dir = std::env::temp_dir().join(format!(
                "restyler-{tag}-{}-{}",
                std::process::id(),
                COUNTER.fetch_add(1, Ordering::Relaxed)
            ));
            std::fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn layout(&self) -> Layout {
            Layout::rooted_at(&self.0)
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn seed(layout: &Layout, source_name: &str, bytes: &[u8]) {
        std::fs::write(&layout.prompt_file, "Turn this into a pencil sketch").unwrap();
        std::fs::create_dir_all(&layout.source_dir).unwrap();
        std::fs::write(layout.source_dir.join(source_name), bytes).unwrap();
    }

    /// Provider stub that records requests.
    struct StubProvider {
        reply: std::result::Result<Vec<u8>, u16>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl StubProvider {
        fn ok(bytes: &[u8]) -> Self {
            Self {
                reply: Ok(bytes.to_vec()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                reply: Err(status),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ImageProvider for StubProvider {
        async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(bytes) => Ok(GeneratedImage::new(
                    bytes.clone(),
                    GenerationMetadata {
                        model: Some("stub-model".into()),
                        duration_ms: Some(1),
                        text: Some("done".into()),
                    },
                )),
                Err(status) => Err(RestylerError::Api {
                    status: *status,
                    message: "boom".into(),
                }),
            }
        }

        fn model(&self) -> &str {
            "stub-model"
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    #[test]
    fn test_layout_defaults() {
        let layout = Layout::default();
        assert_eq!(layout.prompt_file, PathBuf::from("prompt.txt"));
        assert_eq!(layout.source_dir, PathBuf::from("source"));
        assert_eq!(layout.result_dir, PathBuf::from("result"));
    }

    #[test]
    fn test_output_file_name_keeps_extension() {
        assert_eq!(
            output_file_name(Path::new("photo.jpg"), ts()),
            OsString::from("photo_20240102_030405.jpg")
        );
    }

    #[test]
    fn test_output_file_name_defaults_to_png() {
        assert_eq!(
            output_file_name(Path::new("image"), ts()),
            OsString::from("image_20240102_030405.png")
        );
        assert_eq!(
            output_file_name(Path::new("photo."), ts()),
            OsString::from("photo_20240102_030405.png")
        );
    }

    #[test]
    fn test_output_file_name_edge_cases() {
        assert_eq!(
            output_file_name(Path::new("archive.tar.gz"), ts()),
            OsString::from("archive.tar_20240102_030405.gz")
        );
        assert_eq!(
            output_file_name(Path::new(".hidden"), ts()),
            OsString::from(".hidden_20240102_030405.png")
        );
        assert_eq!(
            output_file_name(Path::new("nested/dir/cat.webp"), ts()),
            OsString::from("cat_20240102_030405.webp")
        );
    }

    #[test]
    fn test_load_prompt_missing_file() {
        let scratch = Scratch::new("prompt");
        let err = scratch.layout().load_prompt().unwrap_err();
        assert!(matches!(err, RestylerError::Io(_)));
    }

    #[tokio::test]
    async fn test_run_success() {
        let scratch = Scratch::new("success");
        let layout = scratch.layout();
        seed(&layout, "photo.jpg", b"original");
        let provider = StubProvider::ok(b"generated");

        let outcome = Runner::new(layout.clone())
            .run(&provider, "photo.jpg", ts())
            .await
            .unwrap();

        let expected = layout.result_dir.join("photo_20240102_030405.jpg");
        assert_eq!(outcome.output_path, expected);
        assert_eq!(outcome.bytes_written, 9);
        assert_eq!(outcome.model.as_deref(), Some("stub-model"));
        assert_eq!(std::fs::read(&expected).unwrap(), b"generated");
        assert!(!layout.source_dir.join("photo.jpg").exists());

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].prompt, "Turn this into a pencil sketch");
        assert_eq!(seen[0].input_image, b"original");
    }

    #[tokio::test]
    async fn test_run_reports_steps_in_order() {
        let scratch = Scratch::new("progress");
        let layout = scratch.layout();
        seed(&layout, "photo.jpg", b"original");
        let provider = StubProvider::ok(b"generated");

        let steps = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&steps);
        let runner = Runner::new(layout.clone())
            .on_progress(move |step| sink.lock().unwrap().push(step.to_string()));

        runner.run(&provider, "photo.jpg", ts()).await.unwrap();

        let source = layout.source_dir.join("photo.jpg");
        let output = layout.result_dir.join("photo_20240102_030405.jpg");
        assert_eq!(
            *steps.lock().unwrap(),
            vec![
                format!("Encoding source image: {}", source.display()),
                "Generating new image with model stub-model...".to_string(),
                format!("Saving generated image to: {}", output.display()),
                format!("Deleting source image: {}", source.display()),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_failure_stops_reporting() {
        let scratch = Scratch::new("progressfail");
        let layout = scratch.layout();
        seed(&layout, "photo.jpg", b"original");
        let provider = StubProvider::failing(502);

        let steps = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&steps);
        let runner = Runner::new(layout)
            .on_progress(move |step| sink.lock().unwrap().push(step.to_string()));

        assert!(runner.run(&provider, "photo.jpg", ts()).await.is_err());
        assert_eq!(steps.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_run_without_extension() {
        let scratch = Scratch::new("noext");
        let layout = scratch.layout();
        seed(&layout, "image", b"original");
        let provider = StubProvider::ok(b"generated");

        let outcome = Runner::new(layout.clone())
            .run(&provider, "image", ts())
            .await
            .unwrap();

        assert_eq!(
            outcome.output_path,
            layout.result_dir.join("image_20240102_030405.png")
        );
    }

    #[tokio::test]
    async fn test_run_missing_source() {
        let scratch = Scratch::new("missing");
        let layout = scratch.layout();
        std::fs::write(&layout.prompt_file, "prompt").unwrap();
        let provider = StubProvider::ok(b"generated");

        let err = Runner::new(layout.clone())
            .run(&provider, "does_not_exist.png", ts())
            .await
            .unwrap_err();

        assert!(matches!(err, RestylerError::SourceNotFound { .. }));
        assert_eq!(provider.calls(), 0);
        assert!(!layout.result_dir.exists());
    }

    #[tokio::test]
    async fn test_run_api_failure_keeps_source() {
        let scratch = Scratch::new("apifail");
        let layout = scratch.layout();
        seed(&layout, "photo.jpg", b"original");
        let provider = StubProvider::failing(500);

        let err = Runner::new(layout.clone())
            .run(&provider, "photo.jpg", ts())
            .await
            .unwrap_err();

        assert!(matches!(err, RestylerError::Api { status: 500, .. }));
        assert_eq!(provider.calls(), 1);
        assert!(layout.source_dir.join("photo.jpg").exists());
        let written = std::fs::read_dir(&layout.result_dir).unwrap().count();
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn test_run_missing_prompt_skips_provider() {
        let scratch = Scratch::new("noprompt");
        let layout = scratch.layout();
        std::fs::create_dir_all(&layout.source_dir).unwrap();
        std::fs::write(layout.source_dir.join("photo.jpg"), b"original").unwrap();
        let provider = StubProvider::ok(b"generated");

        let err = Runner::new(layout.clone())
            .run(&provider, "photo.jpg", ts())
            .await
            .unwrap_err();

        assert!(matches!(err, RestylerError::Io(_)));
        assert_eq!(provider.calls(), 0);
        assert!(layout.source_dir.join("photo.jpg").exists());
    }

    #[tokio::test]
    async fn test_run_with_existing_result_dir() {
        let scratch = Scratch::new("existing");
        let layout = scratch.layout();
        seed(&layout, "photo.png", b"original");
        std::fs::create_dir_all(&layout.result_dir).unwrap();
        let provider = StubProvider::ok(b"generated");

        let outcome = Runner::new(layout)
            .run(&provider, "photo.png", ts())
            .await
            .unwrap();

        assert!(outcome.output_path.exists());
    }
}
