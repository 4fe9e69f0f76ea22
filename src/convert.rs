//! Full-pipeline entry points.
//!
//! The pipeline is a batch, run-to-completion transformation: extract →
//! deduplicate → analyze → replace, then return everything at once. Stages
//! run as cooperative async tasks on the caller's runtime; concurrency
//! exists only inside the analysis stage's dispatch windows.
//!
//! A run returns `Ok` even when individual images failed or were refused —
//! check [`PipelineStats::images_failed`] and
//! [`PipelineStats::images_refused`]. Only document-level problems (file
//! missing, not a PDF, corrupt, no provider) surface as `Err`.

use crate::config::PipelineConfig;
use crate::document::{AnalysisResult, Document, ReplacedPage};
use crate::error::PdfsightError;
use crate::model;
use crate::pipeline::{analyze, dedup, extract, input, replace};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Everything a pipeline run produces.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    /// The extracted (and deduplicated) document model.
    pub document: Document,
    /// One terminal result per unique image, index-aligned with
    /// `document.images`.
    pub results: Vec<AnalysisResult>,
    /// Per-page text after placeholder substitution.
    pub pages: Vec<ReplacedPage>,
    /// The assembled document text.
    pub text: String,
    pub stats: PipelineStats,
}

/// Aggregate counters and timings for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    pub total_pages: usize,
    /// Images found during extraction, before deduplication.
    pub images_found: usize,
    /// Unique images after deduplication.
    pub images_unique: usize,
    /// Images whose analysis produced usable text.
    pub images_analyzed: usize,
    pub images_failed: usize,
    pub images_refused: usize,
    pub extract_duration_ms: u64,
    pub analysis_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Convert a PDF file or URL into a normalized text stream.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str` — Local file path or HTTP/HTTPS URL to a PDF
/// * `config` — Pipeline configuration
///
/// # Errors
/// Returns `Err(PdfsightError)` only for fatal errors: file not found, not
/// a valid PDF, corrupt document, provider not configured.
pub async fn process(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, PdfsightError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting pipeline: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;

    // ── Step 2: Extract the document model ───────────────────────────────
    let extract_start = Instant::now();
    let mut document = extract::extract_document(resolved.path(), config).await?;
    let images_found = document.original_image_count;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} pages, {} images in {}ms",
        document.total_pages, images_found, extract_duration_ms
    );

    // ── Step 3: Deduplicate images ───────────────────────────────────────
    dedup::deduplicate_images(&mut document, config.progress_callback.as_ref());
    let images_unique = document.images.len();

    // ── Step 4: Analyse unique images ────────────────────────────────────
    // The provider is resolved lazily: a document with no images needs no
    // model (and no API key).
    let analysis_start = Instant::now();
    let results = if document.images.is_empty() {
        debug!("no images to analyse");
        Vec::new()
    } else {
        let vision = model::resolve_model(config)?;
        analyze::analyze_images(&vision, &document.images, config).await
    };
    let analysis_duration_ms = analysis_start.elapsed().as_millis() as u64;

    // ── Step 5: Replace placeholders and assemble ────────────────────────
    let replaced = replace::replace_document(
        &document,
        &results,
        &config.templates,
        config.progress_callback.as_ref(),
    );

    // ── Step 6: Stats ────────────────────────────────────────────────────
    let images_analyzed = results.iter().filter(|r| r.is_usable()).count();
    let images_failed = results.iter().filter(|r| !r.success).count();
    let images_refused = results.iter().filter(|r| r.refusal_detected).count();

    let stats = PipelineStats {
        total_pages: document.total_pages,
        images_found,
        images_unique,
        images_analyzed,
        images_failed,
        images_refused,
        extract_duration_ms,
        analysis_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Pipeline complete: {} pages, {}/{} images analysed, {}ms total",
        stats.total_pages, stats.images_analyzed, stats.images_unique, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_pipeline_complete(images_unique, images_analyzed);
    }

    Ok(PipelineOutput {
        document,
        results,
        pages: replaced.pages,
        text: replaced.text,
        stats,
    })
}

/// Convert PDF bytes in memory to a normalized text stream.
///
/// This avoids the need for the caller to create a temporary file.
/// Internally the library writes `bytes` to a managed [`tempfile`] and
/// cleans it up automatically on return or panic.
///
/// This is the recommended API when PDF data comes from a database, network
/// stream, or in-memory buffer rather than a file on disk.
pub async fn process_from_bytes(
    bytes: &[u8],
    config: &PipelineConfig,
) -> Result<PipelineOutput, PdfsightError> {
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| PdfsightError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| PdfsightError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    // `tmp` is dropped (and the file deleted) when `process` returns
    process(&path, config).await
}

/// Extract and deduplicate without calling the model.
///
/// Useful for inspecting what the pipeline sees — page classification,
/// placeholders, skip reasons — before spending API calls. Does not require
/// a provider or API key.
pub async fn extract_only(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<Document, PdfsightError> {
    let resolved =
        input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let mut document = extract::extract_document(resolved.path(), config).await?;
    dedup::deduplicate_images(&mut document, config.progress_callback.as_ref());
    Ok(document)
}

/// Run the pipeline and write the assembled text to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn process_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineStats, PdfsightError> {
    let output = process(input_str, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PdfsightError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp_path, &output.text)
        .await
        .map_err(|e| PdfsightError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| PdfsightError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(output.stats)
}

/// Synchronous wrapper around [`process`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_sync(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, PdfsightError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PdfsightError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(process(input_str, config))
}

/// Default output path: the source document's name with a `.txt` extension.
///
/// URLs use the final path segment; inputs with no usable stem fall back to
/// `output.txt`.
pub fn default_output_path(input_str: &str) -> PathBuf {
    let name = input_str
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("output");
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("output");
    PathBuf::from(format!("{stem}.txt"))
}
