//! CLI binary for pdf-extractor.
//!
//! A thin shim over the library crate: `serve` runs the HTTP service,
//! `extract` pushes a single local file through the same coordinator.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_extractor::gateway::{is_pdf_filename, shutdown_signal};
use pdf_extractor::{serve, AppState, JobCoordinator, OutputFormat, ServiceConfig};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on the default port (9000)
  pdf-extractor serve

  # Two workers, custom scratch directory
  pdf-extractor serve --workers 2 --staging-dir /var/tmp/pdf-extractor

  # Upload a document to a running service
  curl -F file=@report.pdf 'http://localhost:9000/extract?output_format=csv'

  # One-off extraction without the service
  pdf-extractor extract report.pdf --format txt -o report.txt

ENVIRONMENT VARIABLES:
  PDF_EXTRACTOR_BIND         Listen address (default 0.0.0.0:9000)
  PDF_EXTRACTOR_STAGING_DIR  Scratch directory for uploads and outputs
  PDF_EXTRACTOR_WORKERS      Worker pool size (default: logical CPUs)
  PDF_EXTRACTOR_MAX_UPLOAD_MB  Largest accepted upload in MiB
  PDF_EXTRACTOR_PASSWORD     Password for encrypted PDFs
  PDFIUM_LIB_PATH            Directory containing libpdfium
  RUST_LOG                   Log filter, overrides --verbose
"#;

/// Extract text and tables from PDFs as JSON, CSV or plain text.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-extractor",
    version,
    about = "Extract text and tables from PDFs as JSON, CSV or plain text",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Scratch directory for staged uploads and outputs.
    #[arg(long, global = true, env = "PDF_EXTRACTOR_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Worker pool size.
    #[arg(short, long, global = true, env = "PDF_EXTRACTOR_WORKERS")]
    workers: Option<usize>,

    /// Directory containing libpdfium.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, global = true, env = "PDF_EXTRACTOR_PASSWORD")]
    password: Option<String>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF_EXTRACTOR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF_EXTRACTOR_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "PDF_EXTRACTOR_BIND", default_value = "0.0.0.0:9000")]
        bind: SocketAddr,

        /// Largest accepted upload, in MiB.
        #[arg(long, env = "PDF_EXTRACTOR_MAX_UPLOAD_MB", default_value_t = 64,
              value_parser = clap::value_parser!(u64).range(1..=4096))]
        max_upload_mb: u64,
    },

    /// Extract a single local PDF.
    Extract {
        /// Path to the PDF.
        input: PathBuf,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "json")]
        format: FormatArg,

        /// Write the result to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Json,
    Csv,
    Txt,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Txt => OutputFormat::Txt,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // A one-off extraction shows a spinner instead of info logs.
    let show_spinner = !cli.quiet && !cli.verbose && matches!(cli.command, Command::Extract { .. });
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_spinner {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    match cli.command {
        Command::Serve { .. } => run_serve(config).await,
        Command::Extract {
            ref input,
            format,
            ref output,
        } => run_extract(&config, input, format.into(), output.as_deref(), show_spinner).await,
    }
}

fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder();
    if let Some(dir) = &cli.staging_dir {
        builder = builder.staging_dir(dir);
    }
    if let Some(n) = cli.workers {
        builder = builder.workers(n);
    }
    if let Some(path) = &cli.pdfium_lib {
        builder = builder.pdfium_lib_path(path);
    }
    if let Some(pwd) = &cli.password {
        builder = builder.password(pwd);
    }
    if let Command::Serve {
        bind,
        max_upload_mb,
    } = cli.command
    {
        builder = builder
            .bind_addr(bind)
            .max_upload_bytes((max_upload_mb * 1024 * 1024) as usize);
    }
    builder.build().context("Invalid configuration")
}

async fn run_serve(config: ServiceConfig) -> Result<()> {
    let coordinator = JobCoordinator::from_config(&config)
        .await
        .context("Failed to prepare staging area")?;
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    serve(
        listener,
        AppState::new(coordinator),
        config.max_upload_bytes,
        shutdown_signal(),
    )
    .await
    .context("Server error")
}

async fn run_extract(
    config: &ServiceConfig,
    input: &Path,
    format: OutputFormat,
    output: Option<&Path>,
    show_spinner: bool,
) -> Result<()> {
    let name = input.file_name().map(|n| n.to_string_lossy().into_owned());
    if !name.as_deref().is_some_and(is_pdf_filename) {
        bail!("Only PDF files are supported (got '{}')", input.display());
    }

    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let spinner = show_spinner.then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Extracting");
        bar.set_message(input.display().to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let start = Instant::now();
    let coordinator = JobCoordinator::from_config(config)
        .await
        .context("Failed to prepare staging area")?;
    let result = coordinator
        .process(bytes, Some(&format.to_string()), None)
        .await;

    let artifact = match result {
        Ok(a) => a,
        Err(e) => {
            if let Some(bar) = &spinner {
                bar.finish_and_clear();
            }
            return Err(e).with_context(|| format!("Extraction of {} failed", input.display()));
        }
    };

    let body = artifact
        .read_to_vec()
        .await
        .context("Failed to read extraction output")?;
    let job_id = artifact.job_id();
    artifact.release().await;

    if let Some(bar) = &spinner {
        bar.finish_with_message(format!(
            "job {} done in {:.1}s ({} bytes of {})",
            job_id,
            start.elapsed().as_secs_f64(),
            body.len(),
            format
        ));
    }

    match output {
        Some(path) => std::fs::write(path, &body)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&body).context("Failed to write to stdout")?;
            stdout.flush().context("Failed to flush stdout")?;
        }
    }
    Ok(())
}
