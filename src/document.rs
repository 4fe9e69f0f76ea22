//! Core data model for the extraction pipeline.
//!
//! A [`Document`] is built once per input PDF by the extractor, reduced by
//! the deduplicator, and then read (never mutated) by the analysis
//! orchestrator and the replacement engine. Replacement produces derived
//! [`ReplacedPage`] values rather than rewriting the pages in place, so the
//! extracted document stays a faithful record of what was found.
//!
//! Serialisation note: [`ExtractedImage`] carries the decoded raster so the
//! deduplicator can compare pixels without re-decoding. The raster is
//! skipped when serialising — the JSON surface exposes image metadata only.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Everything extracted from one PDF, prior to model analysis.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    /// Total pages in the source PDF.
    pub total_pages: usize,
    /// Per-page content and image references, in page order.
    pub pages: Vec<Page>,
    /// Unique images across the document (post-dedup this may be shorter
    /// than the number of placeholders that were assigned).
    pub images: Vec<ExtractedImage>,
    /// Objects that failed extraction; recorded, never fatal.
    pub skipped_objects: Vec<SkippedObject>,
    /// Image count before deduplication. `images.len()` never exceeds it.
    pub original_image_count: usize,
    /// Wall-clock extraction time.
    pub processing_time_ms: u64,
}

/// One page of extracted content.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    /// 1-based page number.
    pub page_number: usize,
    /// Classifier verdict: image-dominated page.
    pub is_scanned: bool,
    pub content: PageContent,
    /// Page-local pointers into [`Document::images`].
    pub image_references: Vec<ImageReference>,
}

/// The two text renditions produced by the content organizer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContent {
    /// Reading-order text with no placeholder tokens.
    pub raw_text: String,
    /// Reading-order text with one placeholder per image occurrence.
    pub formatted_text: String,
}

/// A page-local pointer to an entry in [`Document::images`].
///
/// `id` is remapped by the deduplicator when the referenced image is merged
/// into a representative; the placeholder itself never changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageReference {
    pub id: String,
    /// The `[IMAGE_n]` token embedded in the page's formatted text.
    pub placeholder: String,
    pub is_full_page: bool,
    /// Global placeholder index, 1-based across the document.
    pub index: usize,
}

/// Device-space anchor of an image on its page, y increasing downward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImagePosition {
    pub x: f32,
    pub y: f32,
}

/// A rasterised image extracted from the document.
///
/// Created by the renderer; the deduplicator is the only stage that mutates
/// one afterwards (replacing `id` with a merged composite id and raising
/// `combined_images` above 1).
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedImage {
    /// `img_{page}_{counter}`, or a `+`-joined composite after merging.
    pub id: String,
    pub page_number: usize,
    pub width: u32,
    pub height: u32,
    pub is_full_page: bool,
    pub is_scanned: bool,
    /// Full-page raster forced by the scan-all-pages policy; exempt from
    /// blankness checks and never merged across its page boundary.
    pub is_forced_scan: bool,
    pub position: ImagePosition,
    /// Decoded pixels, kept for similarity comparison. Not serialised.
    #[serde(skip_serializing)]
    pub raster: RgbaImage,
    /// The pre-merge id of the group representative, set by the deduplicator.
    pub original_id: Option<String>,
    /// Number of source images this entry stands for (1 = unmerged).
    pub combined_images: u32,
}

impl ExtractedImage {
    /// Pixel count of the stored raster.
    pub fn pixel_area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// An object that failed extraction and was skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedObject {
    pub page_number: usize,
    pub object_id: String,
    pub reason: String,
}

/// Terminal outcome of analysing one unique image.
///
/// Emitted once per entry in [`Document::images`] and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub image_id: String,
    pub success: bool,
    /// Model description; empty when the call failed or the model refused.
    pub text: String,
    /// The model declined even after refusal retries. The refusal text
    /// itself is never surfaced — downstream sees an empty description.
    pub refusal_detected: bool,
    pub refusal_retries: u32,
    /// Transient-failure retries spent on the final (kept) call.
    pub retries: u32,
    pub page_number: usize,
    pub is_forced_scan: bool,
    pub error: Option<String>,
}

impl AnalysisResult {
    /// Whether this result contributes text during replacement.
    pub fn is_usable(&self) -> bool {
        self.success && !self.refusal_detected && !self.text.trim().is_empty()
    }
}

/// Final text for one page after placeholder substitution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplacedPage {
    pub page_number: usize,
    pub content: String,
}

/// Build the `[IMAGE_n]` placeholder token for a global index.
pub fn placeholder_token(index: usize) -> String {
    format!("[IMAGE_{index}]")
}

/// Build the `img_{page}_{counter}` id for an extracted image.
pub fn image_id(page_number: usize, counter: usize) -> String {
    format!("img_{page_number}_{counter}")
}
