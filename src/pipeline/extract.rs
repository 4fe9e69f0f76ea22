//! PDF content extraction: build the [`Document`] model page by page.
//!
//! Pages are processed strictly sequentially — every page shares the one
//! underlying pdfium document handle, so there is nothing to parallelise
//! here. For each page the extractor:
//!
//! 1. sweeps the page's object stream, counting operations for the
//!    classifier, collecting positioned text runs, and decoding embedded
//!    images (one extraction per distinct image even when it is painted
//!    multiple times);
//! 2. decides whether the page needs a full-page scan (policy table below);
//! 3. hands text and image markers to the organizer for reading-order
//!    assembly.
//!
//! Scan policy:
//!
//! | condition | action |
//! |---|---|
//! | `scan_all_pages` is on | forced full-page scan, blankness check bypassed |
//! | classifier says scanned, or text elements < 10 with images present | natural full-page scan |
//! | otherwise | no full-page scan |
//!
//! Per-image failures are recorded in `skipped_objects` and never abort the
//! page; only a document that cannot be loaded at all is fatal.
//!
//! The whole extraction runs inside `spawn_blocking`: pdfium wraps a C++
//! library with thread-local state that must stay off the async workers.

use crate::config::PipelineConfig;
use crate::document::{
    image_id, placeholder_token, Document, ExtractedImage, ImagePosition, ImageReference, Page,
    SkippedObject,
};
use crate::error::PdfsightError;
use crate::pipeline::classify::{classify_page, PageOpStats};
use crate::pipeline::organize::{organize_page, ImageMarker, TextItem};
use crate::pipeline::render;
use crate::progress::{PipelineStage, ProgressEvent};
use image::RgbaImage;
use pdfium_render::prelude::*;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Pages with fewer text elements than this and at least one image get a
/// natural full-page scan even when the classifier was not triggered.
const NATURAL_SCAN_TEXT_THRESHOLD: usize = 10;

/// Extract the document model from a PDF on disk.
pub async fn extract_document(
    pdf_path: &Path,
    config: &PipelineConfig,
) -> Result<Document, PdfsightError> {
    let path = pdf_path.to_path_buf();
    let config = config.clone();

    tokio::task::spawn_blocking(move || extract_blocking(&path, &config))
        .await
        .map_err(|e| PdfsightError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of document extraction.
fn extract_blocking(pdf_path: &Path, config: &PipelineConfig) -> Result<Document, PdfsightError> {
    let start = Instant::now();
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, config.password.as_deref())
        .map_err(|e| map_load_error(e, pdf_path, config.password.is_some()))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(PipelineStage::Extract, total_pages);
    }

    let mut out_pages: Vec<Page> = Vec::with_capacity(total_pages);
    let mut images: Vec<ExtractedImage> = Vec::new();
    let mut skipped: Vec<SkippedObject> = Vec::new();
    // Global placeholder counter, shared by embedded images and page scans.
    let mut placeholder_index: usize = 0;

    for (page_idx, page) in pages.iter().enumerate() {
        let page_number = page_idx + 1;
        let page = extract_page(
            &document,
            &page,
            page_number,
            config,
            &mut placeholder_index,
            &mut images,
            &mut skipped,
        );
        out_pages.push(page);

        if let Some(ref cb) = config.progress_callback {
            cb.on_item_complete(ProgressEvent {
                stage: PipelineStage::Extract,
                current: page_number,
                total: total_pages,
            });
        }
    }

    let original_image_count = images.len();
    let processing_time_ms = start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} pages, {} images, {} skipped objects in {}ms",
        total_pages,
        original_image_count,
        skipped.len(),
        processing_time_ms
    );

    Ok(Document {
        total_pages,
        pages: out_pages,
        images,
        skipped_objects: skipped,
        original_image_count,
        processing_time_ms,
    })
}

/// Sweep one page: stats, text runs, embedded images, scan decision,
/// reading-order assembly.
fn extract_page(
    document: &PdfDocument,
    page: &PdfPage,
    page_number: usize,
    config: &PipelineConfig,
    placeholder_index: &mut usize,
    images: &mut Vec<ExtractedImage>,
    skipped: &mut Vec<SkippedObject>,
) -> Page {
    let page_height = page.height().value;

    let mut stats = PageOpStats::default();
    let mut text_items: Vec<TextItem> = Vec::new();
    let mut image_markers: Vec<ImageMarker> = Vec::new();
    let mut page_refs: Vec<ImageReference> = Vec::new();
    // One extraction per distinct embedded image, even when painted twice.
    let mut seen_rasters: HashSet<u64> = HashSet::new();
    let mut image_ordinal = 0usize;

    for object in page.objects().iter() {
        stats.total_ops += 1;
        match object.object_type() {
            PdfPageObjectType::Text => {
                stats.text_ops += 1;
                let Some(text_obj) = object.as_text_object() else {
                    continue;
                };
                let content = text_obj.text();
                if content.trim().is_empty() {
                    continue;
                }
                stats.text_element_count += 1;
                if let Ok(bounds) = object.bounds() {
                    text_items.push(TextItem {
                        text: content,
                        x: bounds.left().value,
                        y: page_height - bounds.top().value,
                    });
                }
            }
            PdfPageObjectType::Image => {
                stats.image_ops += 1;
                image_ordinal += 1;
                let Some(image_obj) = object.as_image_object() else {
                    continue;
                };
                // The effective transform is baked into the object's device
                // space bounds; the top-left corner is the reading anchor.
                let anchor = object
                    .bounds()
                    .map(|b| ImagePosition {
                        x: b.left().value,
                        y: page_height - b.top().value,
                    })
                    .unwrap_or_default();

                match render::render_embedded(image_obj, document) {
                    Ok(raster) => {
                        if !render::passes_size_gate(raster.width(), raster.height()) {
                            skipped.push(SkippedObject {
                                page_number,
                                object_id: format!("page{page_number}_image{image_ordinal}"),
                                reason: format!(
                                    "below minimum size ({}x{})",
                                    raster.width(),
                                    raster.height()
                                ),
                            });
                            continue;
                        }
                        if !seen_rasters.insert(raster_fingerprint(&raster)) {
                            debug!(
                                "page {}: image {} repeats an already-extracted image",
                                page_number, image_ordinal
                            );
                            continue;
                        }
                        if !render::has_visible_content(&raster) {
                            skipped.push(SkippedObject {
                                page_number,
                                object_id: format!("page{page_number}_image{image_ordinal}"),
                                reason: "render is blank".to_string(),
                            });
                            continue;
                        }

                        *placeholder_index += 1;
                        let id = image_id(page_number, *placeholder_index);
                        let placeholder = placeholder_token(*placeholder_index);
                        image_markers.push(ImageMarker {
                            placeholder: placeholder.clone(),
                            x: anchor.x,
                            y: anchor.y,
                        });
                        page_refs.push(ImageReference {
                            id: id.clone(),
                            placeholder,
                            is_full_page: false,
                            index: *placeholder_index,
                        });
                        images.push(ExtractedImage {
                            id,
                            page_number,
                            width: raster.width(),
                            height: raster.height(),
                            is_full_page: false,
                            is_scanned: false,
                            is_forced_scan: false,
                            position: anchor,
                            raster,
                            original_id: None,
                            combined_images: 1,
                        });
                    }
                    Err(reason) => {
                        warn!("page {}: image {} skipped: {}", page_number, image_ordinal, reason);
                        skipped.push(SkippedObject {
                            page_number,
                            object_id: format!("page{page_number}_image{image_ordinal}"),
                            reason,
                        });
                    }
                }
            }
            _ => {
                stats.path_ops += 1;
            }
        }
    }

    let classification = classify_page(&stats);

    let scan = if config.scan_all_pages {
        Some(true)
    } else if classification.is_scanned
        || (stats.text_element_count < NATURAL_SCAN_TEXT_THRESHOLD && stats.image_ops > 0)
    {
        Some(false)
    } else {
        None
    };

    let mut full_page_placeholder: Option<String> = None;
    if let Some(forced) = scan {
        match render::render_page(page, classification.is_scanned) {
            Ok(raster) => {
                // Forced scans bypass the blankness check: scan-all-pages
                // promises one scan per page, blank or not.
                if forced || render::has_visible_content(&raster) {
                    *placeholder_index += 1;
                    let id = image_id(page_number, *placeholder_index);
                    let placeholder = placeholder_token(*placeholder_index);
                    page_refs.push(ImageReference {
                        id: id.clone(),
                        placeholder: placeholder.clone(),
                        is_full_page: true,
                        index: *placeholder_index,
                    });
                    images.push(ExtractedImage {
                        id,
                        page_number,
                        width: raster.width(),
                        height: raster.height(),
                        is_full_page: true,
                        is_scanned: classification.is_scanned,
                        is_forced_scan: forced,
                        position: ImagePosition::default(),
                        raster,
                        original_id: None,
                        combined_images: 1,
                    });
                    full_page_placeholder = Some(placeholder);
                } else {
                    skipped.push(SkippedObject {
                        page_number,
                        object_id: format!("page{page_number}_scan"),
                        reason: "full-page render is blank".to_string(),
                    });
                }
            }
            Err(reason) => {
                warn!("page {}: full-page scan failed: {}", page_number, reason);
                skipped.push(SkippedObject {
                    page_number,
                    object_id: format!("page{page_number}_scan"),
                    reason,
                });
            }
        }
    }

    let content = organize_page(&text_items, &image_markers, full_page_placeholder.as_deref());

    debug!(
        "page {}: {} text elements, {} images, scanned={}",
        page_number,
        stats.text_element_count,
        page_refs.len(),
        classification.is_scanned
    );

    Page {
        page_number,
        is_scanned: classification.is_scanned,
        content,
        image_references: page_refs,
    }
}

/// Bind to a pdfium library next to the executable, else system-wide.
fn bind_pdfium() -> Result<Pdfium, PdfsightError> {
    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| PdfsightError::PdfiumBindingFailed(format!("{e:?}")))
}

/// Map a pdfium load failure onto the document-level error taxonomy.
fn map_load_error(e: PdfiumError, path: &Path, had_password: bool) -> PdfsightError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if had_password {
            PdfsightError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            PdfsightError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        PdfsightError::CorruptPdf {
            path: path.to_path_buf(),
            detail: err_str,
        }
    }
}

/// Content hash used to collapse repeated paints of one embedded image.
fn raster_fingerprint(raster: &RgbaImage) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    raster.width().hash(&mut hasher);
    raster.height().hash(&mut hasher);
    raster.as_raw().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn fingerprint_distinguishes_content_and_dims() {
        let a = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        let b = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        let c = RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]));
        let d = RgbaImage::from_pixel(2, 8, Rgba([1, 2, 3, 255]));
        assert_eq!(raster_fingerprint(&a), raster_fingerprint(&b));
        assert_ne!(raster_fingerprint(&a), raster_fingerprint(&c));
        assert_ne!(raster_fingerprint(&a), raster_fingerprint(&d));
    }
}
