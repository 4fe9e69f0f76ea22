//! Page classification: is this page "scanned" (image-dominated)?
//!
//! The verdict steers two downstream decisions: the full-page-scan policy in
//! the extractor and the render scale used for scans. The conditions are
//! cheap OR-heuristics over the page's object counts, and ties break toward
//! "scanned" — a false positive costs one extra raster, a false negative
//! loses page content.
//!
//! The thresholds are empirically chosen and tunable; nothing downstream
//! depends on their exact values.

/// Per-page counts gathered during the extractor's object sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageOpStats {
    /// Image-paint objects.
    pub image_ops: usize,
    /// Path, shading, and form objects.
    pub path_ops: usize,
    /// Text-show objects.
    pub text_ops: usize,
    /// All objects on the page.
    pub total_ops: usize,
    /// Text objects with non-whitespace content.
    pub text_element_count: usize,
}

/// Classifier verdict for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageClassification {
    pub is_scanned: bool,
    pub has_images: bool,
    pub image_count: usize,
    pub text_element_count: usize,
    pub is_empty: bool,
}

/// An "empty" page with more operations than this is likely a scan whose
/// content pdfium sees only as drawing operations.
const EMPTY_PAGE_OP_THRESHOLD: usize = 50;

/// Pages with fewer text elements than this are "sparse".
const SPARSE_TEXT_THRESHOLD: usize = 10;

/// Fraction of non-text operations above which a page counts as scanned.
const NON_TEXT_FRACTION_THRESHOLD: f32 = 0.6;

/// Pages with images and fewer text elements than this are image-dominated.
const IMAGE_DOMINANT_TEXT_THRESHOLD: usize = 3;

/// Classify a page from its operation counts. Never fails.
pub fn classify_page(stats: &PageOpStats) -> PageClassification {
    let has_images = stats.image_ops > 0;
    let is_empty = stats.text_element_count == 0 && stats.image_ops == 0;

    let non_text_fraction = if stats.total_ops > 0 {
        (stats.image_ops + stats.path_ops) as f32 / stats.total_ops as f32
    } else {
        0.0
    };

    // OR-conditions, not a combined score. Each catches a distinct shape of
    // scanned page the others miss.
    let empty_but_busy = is_empty && stats.total_ops > EMPTY_PAGE_OP_THRESHOLD;
    let sparse_text_with_images =
        stats.text_element_count < SPARSE_TEXT_THRESHOLD && stats.image_ops > 0;
    let graphics_dominated = non_text_fraction > NON_TEXT_FRACTION_THRESHOLD;
    let image_dominant =
        has_images && stats.text_element_count < IMAGE_DOMINANT_TEXT_THRESHOLD;

    PageClassification {
        is_scanned: empty_but_busy || sparse_text_with_images || graphics_dominated || image_dominant,
        has_images,
        image_count: stats.image_ops,
        text_element_count: stats.text_element_count,
        is_empty,
    }
}
