//! CLI binary for pdfsight.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdfsight::{
    default_output_path, extract_only, process, process_to_file, AnalysisType, PipelineConfig,
    PipelineProgressCallback, PipelineStage, ProgressEvent, ReplacementTemplates,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar per pipeline stage, with per-image
/// log lines during analysis. Designed to work correctly when images settle
/// out of order within a dispatch window.
struct CliProgressCallback {
    bar: ProgressBar,
    failures: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failures: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, prefix: &str, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_style(style);
        self.bar.set_prefix(prefix.to_string());
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.reset_eta();
    }

    fn stage_label(stage: PipelineStage) -> &'static str {
        match stage {
            PipelineStage::Extract => "Extracting",
            PipelineStage::Deduplicate => "Deduplicating",
            PipelineStage::Analyze => "Analysing",
            PipelineStage::Replace => "Assembling",
        }
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: PipelineStage, total: usize) {
        self.activate_bar(Self::stage_label(stage), total);
        if stage == PipelineStage::Analyze {
            self.bar.println(format!(
                "{} {}",
                cyan("◆"),
                bold(&format!("Analysing {total} unique images…"))
            ));
        }
    }

    fn on_item_complete(&self, event: ProgressEvent) {
        self.bar.set_position(event.current as u64);
    }

    fn on_image_analyzed(&self, image_id: &str, page_number: usize, success: bool) {
        if success {
            self.bar.println(format!(
                "  {} page {:>3}  {}",
                green("✓"),
                page_number,
                dim(image_id)
            ));
        } else {
            self.failures.fetch_add(1, Ordering::SeqCst);
            self.bar.println(format!(
                "  {} page {:>3}  {}",
                red("✗"),
                page_number,
                red(image_id)
            ));
        }
    }

    fn on_pipeline_complete(&self, total_images: usize, analyzed_ok: usize) {
        self.bar.finish_and_clear();
        let failed = self.failures.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} of {} images analysed",
                green("✔"),
                bold(&analyzed_ok.to_string()),
                total_images
            );
        } else {
            eprintln!(
                "{} {}/{} images analysed  ({} failed)",
                cyan("⚠"),
                bold(&analyzed_ok.to_string()),
                total_images,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (stdout)
  pdfsight document.pdf

  # Convert to file
  pdfsight document.pdf -o output.txt

  # Write next to the source, named after it
  pdfsight document.pdf --save

  # Scan every page regardless of content
  pdfsight --scan-all-pages scanned-book.pdf -o book.txt

  # Page-level descriptions instead of transcription
  pdfsight --analysis-type page_description slides.pdf

  # Use a specific model
  pdfsight --model gpt-4.1 --provider openai document.pdf

  # Convert from URL
  pdfsight https://arxiv.org/pdf/1706.03762 -o attention.txt

  # Inspect the extracted document as JSON (no API key needed)
  pdfsight --extract-only --json document.pdf > document.json

  # Custom templates ({pageNumber} and \n are expanded)
  pdfsight --image-prefix '[Figure: ' --image-suffix ']' \
           --page-heading '--- Page {pageNumber} ---' document.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  PDFSIGHT_LLM_PROVIDER   Override provider (openai, anthropic, gemini, ollama)
  PDFSIGHT_MODEL          Override model ID
  PDFIUM_DYNAMIC_LIB_PATH Path to an existing libpdfium shared library

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Convert:         pdfsight document.pdf -o output.txt
"#;

/// Convert PDF files and URLs to normalized text using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdfsight",
    version,
    about = "Convert PDF files and URLs to normalized text using Vision LLMs",
    long_about = "Convert PDF documents (local files or URLs) to a single normalized text \
stream. Positioned text is extracted deterministically; every unique embedded image and \
scanned page is described by a Vision Language Model and spliced back into reading order.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write text to this file instead of stdout.
    #[arg(short, long, env = "PDFSIGHT_OUTPUT")]
    output: Option<PathBuf>,

    /// Write to a file named after the source document (stem + .txt).
    #[arg(long, conflicts_with = "output")]
    save: bool,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "PDFSIGHT_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "PDFSIGHT_PROVIDER")]
    provider: Option<String>,

    /// Number of concurrent vision calls per dispatch window (1-1000).
    #[arg(short, long, env = "PDFSIGHT_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,

    /// Retries per image on transient model failure.
    #[arg(long, env = "PDFSIGHT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Re-analysis rounds when the model refuses (0-5).
    #[arg(long, env = "PDFSIGHT_REFUSAL_RETRIES", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(0..=5))]
    refusal_retries: u32,

    /// LLM temperature (0.0-1.0).
    #[arg(long, env = "PDFSIGHT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per image.
    #[arg(long, env = "PDFSIGHT_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Force a full-page scan of every page.
    #[arg(long, env = "PDFSIGHT_SCAN_ALL_PAGES")]
    scan_all_pages: bool,

    /// Analysis type: general or page_description.
    #[arg(long, env = "PDFSIGHT_ANALYSIS_TYPE", default_value = "general",
          value_parser = parse_analysis_type)]
    analysis_type: AnalysisType,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFSIGHT_PASSWORD")]
    password: Option<String>,

    /// Banner above each page's text ({pageNumber} expanded).
    #[arg(long, env = "PDFSIGHT_PAGE_HEADING")]
    page_heading: Option<String>,

    /// Prefix wrapped around image descriptions.
    #[arg(long, env = "PDFSIGHT_IMAGE_PREFIX")]
    image_prefix: Option<String>,

    /// Suffix wrapped around image descriptions.
    #[arg(long, env = "PDFSIGHT_IMAGE_SUFFIX")]
    image_suffix: Option<String>,

    /// Prefix wrapped around full-page scan text.
    #[arg(long, env = "PDFSIGHT_SCAN_PREFIX")]
    scan_prefix: Option<String>,

    /// Suffix wrapped around full-page scan text.
    #[arg(long, env = "PDFSIGHT_SCAN_SUFFIX")]
    scan_suffix: Option<String>,

    /// Separator between pages in the assembled output (\n expanded).
    #[arg(long, env = "PDFSIGHT_SEPARATOR")]
    separator: Option<String>,

    /// Output the full pipeline result as JSON instead of plain text.
    #[arg(long, env = "PDFSIGHT_JSON")]
    json: bool,

    /// Extract and deduplicate only — no model calls, no API key needed.
    #[arg(long)]
    extract_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFSIGHT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFSIGHT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFSIGHT_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFSIGHT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

fn parse_analysis_type(s: &str) -> Result<AnalysisType, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    let config = build_config(&cli, show_progress)?;

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let document = extract_only(&cli.input, &config)
            .await
            .context("Extraction failed")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&document)
                    .context("Failed to serialise document")?
            );
        } else {
            println!("File:            {}", cli.input);
            println!("Pages:           {}", document.total_pages);
            println!(
                "Scanned pages:   {}",
                document.pages.iter().filter(|p| p.is_scanned).count()
            );
            println!("Images found:    {}", document.original_image_count);
            println!("Images unique:   {}", document.images.len());
            println!("Skipped objects: {}", document.skipped_objects.len());
            println!("Extraction:      {}ms", document.processing_time_ms);
        }
        return Ok(());
    }

    // ── Run the pipeline ─────────────────────────────────────────────────
    let output_path = if cli.save {
        Some(default_output_path(&cli.input))
    } else {
        cli.output.clone()
    };

    if let Some(ref path) = output_path {
        let stats = process_to_file(&cli.input, path, &config)
            .await
            .context("Pipeline failed")?;

        if !cli.quiet {
            eprintln!(
                "{}  {} pages, {}/{} images  {}ms  →  {}",
                if stats.images_failed == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                stats.total_pages,
                stats.images_analyzed,
                stats.images_unique,
                stats.total_duration_ms,
                bold(&path.display().to_string()),
            );
        }
    } else {
        let output = process(&cli.input, &config)
            .await
            .context("Pipeline failed")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(output.text.as_bytes())
                .context("Failed to write to stdout")?;
            if !output.text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }

        if !cli.quiet && !show_progress && !cli.json {
            eprintln!(
                "Processed {} pages, {}/{} images in {}ms",
                output.stats.total_pages,
                output.stats.images_analyzed,
                output.stats.images_unique,
                output.stats.total_duration_ms
            );
            if output.stats.images_failed > 0 {
                eprintln!("  {} images failed", output.stats.images_failed);
            }
            if output.stats.images_refused > 0 {
                eprintln!("  {} images refused", output.stats.images_refused);
            }
        }
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, show_progress: bool) -> Result<PipelineConfig> {
    let mut templates = ReplacementTemplates::default();
    if let Some(ref h) = cli.page_heading {
        templates.page_heading = Some(h.clone());
    }
    if let Some(ref p) = cli.image_prefix {
        templates.image_prefix = p.clone();
    }
    if let Some(ref s) = cli.image_suffix {
        templates.image_suffix = s.clone();
    }
    if let Some(ref p) = cli.scan_prefix {
        templates.scan_prefix = p.clone();
    }
    if let Some(ref s) = cli.scan_suffix {
        templates.scan_suffix = s.clone();
    }
    if let Some(ref sep) = cli.separator {
        templates.page_separator = sep.clone();
    }

    let mut builder = PipelineConfig::builder()
        .max_concurrent_requests(cli.concurrency)
        .max_retries(cli.max_retries)
        .max_refusal_retries(cli.refusal_retries)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .scan_all_pages(cli.scan_all_pages)
        .analysis_type(cli.analysis_type)
        .download_timeout_secs(cli.download_timeout)
        .templates(templates);

    if show_progress {
        builder = builder.progress_callback(CliProgressCallback::new());
    }

    let mut config = builder.build().context("Invalid configuration")?;

    // Fields the builder forwards verbatim.
    config.model = cli.model.clone();
    config.provider_name = cli.provider.clone();
    config.password = cli.password.clone();

    Ok(config)
}
