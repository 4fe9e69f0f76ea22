//! # pdfsight
//!
//! Convert PDF documents into a single normalized text stream by combining
//! deterministic document parsing with vision-language-model image
//! understanding.
//!
//! ## Why this crate?
//!
//! Plain text extraction drops every figure, chart, and scanned page on the
//! floor. pdfsight extracts positioned text the deterministic way, marks
//! each image with a placeholder token, sends every *unique* image to a VLM
//! for description, and splices the model's text back into reading order —
//! so the output reads as one continuous document, images included.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract   per-page object sweep: positioned text, embedded images,
//!  │               scanned-page detection, full-page scans (pdfium,
//!  │               spawn_blocking)
//!  ├─ 2. Dedup     merge visually identical images (same page, ≥99% pixel
//!  │               similarity) so each is analysed once
//!  ├─ 3. Analyze   windowed concurrent VLM calls with transient retry and
//!  │               refusal detection/retry
//!  └─ 4. Replace   substitute model text into placeholders, assemble pages
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfsight::{process, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = PipelineConfig::default();
//!     let output = process("document.pdf", &config).await?;
//!     println!("{}", output.text);
//!     eprintln!(
//!         "{} images analysed, {} refused, {} failed",
//!         output.stats.images_analyzed,
//!         output.stats.images_refused,
//!         output.stats.images_failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! Only document-level problems return `Err` — a missing file, a corrupt
//! PDF, an unconfigured provider. Everything smaller is carried as data: an
//! unextractable image object lands in `document.skipped_objects`, a failed
//! model call yields an [`AnalysisResult`] with `success: false`, and a
//! persistent model refusal sets `refusal_detected` with empty text. One bad
//! image never fails the batch.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfsight` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdfsight = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod retry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AnalysisType, PipelineConfig, PipelineConfigBuilder, ReplacementTemplates};
pub use convert::{
    default_output_path, extract_only, process, process_from_bytes, process_sync,
    process_to_file, PipelineOutput, PipelineStats,
};
pub use document::{
    AnalysisResult, Document, ExtractedImage, ImageReference, Page, PageContent, ReplacedPage,
    SkippedObject,
};
pub use error::PdfsightError;
pub use model::{ModelError, VisionModel, VisionRequest};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, PipelineStage, ProgressEvent};
pub use retry::{retry_transient, with_retry, RetryFailure, RetryOutcome, RetryPolicy};
