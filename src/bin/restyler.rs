//! CLI for Restyler - restyle an image from the source directory.

use clap::Parser;
use restyler::{Layout, OpenRouterProvider, RestylerError, Runner};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "restyler")]
#[command(about = "Restyle an image from ./source with the prompt in ./prompt.txt")]
#[command(version)]
struct Cli {
    /// Image file name inside the source directory
    image: String,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // A missing .env is fine; real environment variables win.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runner = Runner::new(Layout::default()).on_progress(|step| println!("{step}"));

    if let Err(e) = runner.layout().resolve_source(&cli.image) {
        match e {
            RestylerError::SourceNotFound { .. } => println!("Error: {e}."),
            other => eprintln!("An error occurred: {other}"),
        }
        return ExitCode::FAILURE;
    }

    match run(&runner, &cli.image).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("An error occurred: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(runner: &Runner, image: &str) -> anyhow::Result<()> {
    let provider = OpenRouterProvider::builder().build()?;
    let timestamp = chrono::Local::now().naive_local();

    let outcome = runner.run(&provider, image, timestamp).await?;

    tracing::info!(
        output = %outcome.output_path.display(),
        bytes = outcome.bytes_written,
        model = outcome.model.as_deref().unwrap_or_default(),
        duration_ms = outcome.duration_ms.unwrap_or_default(),
        "restyle complete"
    );
    println!("Done.");

    Ok(())
}

/// Initialize tracing with verbosity-based filtering.
fn init_tracing(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbosity {
            0 => "warn",
            1 => "restyler=info",
            2 => "restyler=debug",
            _ => "trace",
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity >= 2)
        .init();
}
