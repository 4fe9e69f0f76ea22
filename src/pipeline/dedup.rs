//! Image deduplication: merge visually identical images into one
//! representative entry per group.
//!
//! PDFs routinely paint the same logo, watermark, or decorative rule on a
//! page several times under different object ids. Analysing each copy wastes
//! model calls and produces repeated text, so near-identical images are
//! collapsed before the batch is dispatched.
//!
//! Scope rules keep the comparison cheap and safe:
//!
//! * only images on the **same page** are compared — cross-page merging
//!   would detach an image from the page whose text references it;
//! * only images within a **10 % size ratio** are compared;
//! * **forced scans** are partitioned out before grouping and re-combined
//!   after, so scan-all-pages always yields exactly one scan per page no
//!   matter what the similarity heuristics think.
//!
//! A merged entry keeps the first member's raster, takes the `+`-join of all
//! member ids as its id, and records the group size in `combined_images`.
//! Page references are remapped to the surviving id; a page never lists the
//! same representative twice (duplicate references are dropped and their
//! placeholders scrubbed from the page text).

use crate::document::{Document, ExtractedImage};
use crate::progress::{PipelineStage, ProgressCallback, ProgressEvent};
use image::RgbaImage;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Candidate pairs must be within this dimension ratio.
const SIZE_RATIO_LIMIT: f32 = 1.1;

/// Fraction of sampled pixels that must match for two images to merge.
const SIMILARITY_THRESHOLD: f64 = 0.99;

/// Two pixels match when every channel differs by at most this.
const CHANNEL_TOLERANCE: u8 = 3;

/// Images at or below this pixel area are sampled exhaustively; larger ones
/// every 4th pixel.
const EXHAUSTIVE_SAMPLE_AREA: u64 = 100_000;

/// Deduplicate `document.images` in place and remap page references.
pub fn deduplicate_images(document: &mut Document, progress: Option<&ProgressCallback>) {
    let images = std::mem::take(&mut document.images);
    let total = images.len();

    if let Some(cb) = progress {
        cb.on_stage_start(PipelineStage::Deduplicate, total);
    }

    // Forced scans sit out of the grouping entirely.
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut grouped: Vec<bool> = vec![false; images.len()];

    for i in 0..images.len() {
        if grouped[i] || images[i].is_forced_scan {
            continue;
        }
        grouped[i] = true;
        let mut members = vec![i];
        for j in (i + 1)..images.len() {
            if grouped[j] || images[j].is_forced_scan {
                continue;
            }
            if images[i].page_number != images[j].page_number {
                continue;
            }
            if !within_size_ratio(&images[i], &images[j]) {
                continue;
            }
            let similarity = pixel_similarity(&images[i].raster, &images[j].raster);
            if similarity >= SIMILARITY_THRESHOLD {
                debug!(
                    "merging {} into {} (similarity {:.4})",
                    images[j].id, images[i].id, similarity
                );
                grouped[j] = true;
                members.push(j);
            }
        }
        groups.push(members);
    }

    // Forced scans re-enter as singleton groups so overall order is kept.
    for (i, image) in images.iter().enumerate() {
        if image.is_forced_scan {
            groups.push(vec![i]);
        }
    }
    groups.sort_by_key(|members| members[0]);

    let mut id_remap: HashMap<String, String> = HashMap::new();
    let mut merged = Vec::with_capacity(groups.len());

    for (done, members) in groups.into_iter().enumerate() {
        let mut representative = images[members[0]].clone();
        if members.len() > 1 {
            let joined_id = members
                .iter()
                .map(|&m| images[m].id.as_str())
                .collect::<Vec<_>>()
                .join("+");
            representative.original_id = Some(representative.id.clone());
            representative.combined_images = members.len() as u32;
            for &m in &members {
                id_remap.insert(images[m].id.clone(), joined_id.clone());
            }
            representative.id = joined_id;
        }
        merged.push(representative);

        if let Some(cb) = progress {
            cb.on_item_complete(ProgressEvent {
                stage: PipelineStage::Deduplicate,
                current: done + 1,
                total,
            });
        }
    }

    info!(
        "deduplication: {} images -> {} unique",
        document.original_image_count,
        merged.len()
    );
    document.images = merged;

    remap_page_references(document, &id_remap);
}

/// Point every page reference at its surviving id, dropping duplicates.
///
/// When two references on one page collapse onto the same representative,
/// the later reference is removed and its placeholder scrubbed from the
/// page's formatted text so no dangling token survives.
fn remap_page_references(document: &mut Document, id_remap: &HashMap<String, String>) {
    for page in &mut document.pages {
        let mut seen: HashSet<String> = HashSet::new();
        let mut kept = Vec::with_capacity(page.image_references.len());
        for mut reference in page.image_references.drain(..) {
            if let Some(new_id) = id_remap.get(&reference.id) {
                reference.id = new_id.clone();
            }
            if seen.insert(reference.id.clone()) {
                kept.push(reference);
            } else {
                page.content.formatted_text = page
                    .content
                    .formatted_text
                    .replacen(&reference.placeholder, "", 1);
            }
        }
        page.image_references = kept;
    }
}

fn within_size_ratio(a: &ExtractedImage, b: &ExtractedImage) -> bool {
    dimension_ratio(a.width, b.width) <= SIZE_RATIO_LIMIT
        && dimension_ratio(a.height, b.height) <= SIZE_RATIO_LIMIT
}

fn dimension_ratio(a: u32, b: u32) -> f32 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    if lo == 0 {
        f32::INFINITY
    } else {
        hi as f32 / lo as f32
    }
}

/// Fraction of sampled pixels whose channels all sit within
/// [`CHANNEL_TOLERANCE`] of each other. Compared over the overlapping
/// top-left region when dimensions differ slightly.
pub fn pixel_similarity(a: &RgbaImage, b: &RgbaImage) -> f64 {
    let width = a.width().min(b.width());
    let height = a.height().min(b.height());
    if width == 0 || height == 0 {
        return 0.0;
    }

    let area = u64::from(width) * u64::from(height);
    let stride = if area <= EXHAUSTIVE_SAMPLE_AREA { 1 } else { 4 };

    let mut sampled = 0u64;
    let mut identical = 0u64;
    let mut index = 0u64;
    while index < area {
        let x = (index % u64::from(width)) as u32;
        let y = (index / u64::from(width)) as u32;
        let pa = a.get_pixel(x, y).0;
        let pb = b.get_pixel(x, y).0;
        sampled += 1;
        if pa
            .iter()
            .zip(pb.iter())
            .all(|(&ca, &cb)| ca.abs_diff(cb) <= CHANNEL_TOLERANCE)
        {
            identical += 1;
        }
        index += stride;
    }

    identical as f64 / sampled as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ExtractedImage, ImagePosition, ImageReference, Page, PageContent};
    use image::Rgba;

    fn raster(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
    }

    fn img(id: &str, page: usize, raster: RgbaImage) -> ExtractedImage {
        ExtractedImage {
            id: id.to_string(),
            page_number: page,
            width: raster.width(),
            height: raster.height(),
            is_full_page: false,
            is_scanned: false,
            is_forced_scan: false,
            position: ImagePosition::default(),
            raster,
            original_id: None,
            combined_images: 1,
        }
    }

    fn doc(images: Vec<ExtractedImage>, pages: Vec<Page>) -> Document {
        let original_image_count = images.len();
        Document {
            total_pages: pages.len(),
            pages,
            images,
            skipped_objects: vec![],
            original_image_count,
            processing_time_ms: 0,
        }
    }

    fn page_with_refs(page_number: usize, refs: Vec<(&str, &str)>, formatted: &str) -> Page {
        Page {
            page_number,
            is_scanned: false,
            content: PageContent {
                raw_text: String::new(),
                formatted_text: formatted.to_string(),
            },
            image_references: refs
                .into_iter()
                .enumerate()
                .map(|(i, (id, placeholder))| ImageReference {
                    id: id.to_string(),
                    placeholder: placeholder.to_string(),
                    is_full_page: false,
                    index: i + 1,
                })
                .collect(),
        }
    }

    #[test]
    fn identical_same_page_images_merge() {
        let page = page_with_refs(
            1,
            vec![("img_1_1", "[IMAGE_1]"), ("img_1_2", "[IMAGE_2]")],
            "a [IMAGE_1] b [IMAGE_2]",
        );
        let mut d = doc(
            vec![
                img("img_1_1", 1, raster(40, 40, 10)),
                img("img_1_2", 1, raster(40, 40, 10)),
            ],
            vec![page],
        );
        deduplicate_images(&mut d, None);

        assert_eq!(d.images.len(), 1);
        assert_eq!(d.images[0].combined_images, 2);
        assert_eq!(d.images[0].id, "img_1_1+img_1_2");
        assert_eq!(d.images[0].original_id.as_deref(), Some("img_1_1"));
        assert!(d.images.len() <= d.original_image_count);

        // One reference survives; the duplicate's placeholder is scrubbed.
        assert_eq!(d.pages[0].image_references.len(), 1);
        assert_eq!(d.pages[0].image_references[0].id, "img_1_1+img_1_2");
        assert!(!d.pages[0].content.formatted_text.contains("[IMAGE_2]"));
        assert!(d.pages[0].content.formatted_text.contains("[IMAGE_1]"));
    }

    #[test]
    fn cross_page_images_never_merge() {
        let mut d = doc(
            vec![
                img("img_1_1", 1, raster(40, 40, 10)),
                img("img_2_2", 2, raster(40, 40, 10)),
            ],
            vec![],
        );
        deduplicate_images(&mut d, None);
        assert_eq!(d.images.len(), 2);
        assert_eq!(d.original_image_count, 2);
    }

    #[test]
    fn size_ratio_gate_blocks_comparison() {
        // 40 vs 60 px wide: ratio 1.5, far past the 10% band.
        let mut d = doc(
            vec![
                img("img_1_1", 1, raster(40, 40, 10)),
                img("img_1_2", 1, raster(60, 40, 10)),
            ],
            vec![],
        );
        deduplicate_images(&mut d, None);
        assert_eq!(d.images.len(), 2);
    }

    #[test]
    fn dissimilar_pixels_do_not_merge() {
        let mut d = doc(
            vec![
                img("img_1_1", 1, raster(40, 40, 10)),
                img("img_1_2", 1, raster(40, 40, 200)),
            ],
            vec![],
        );
        deduplicate_images(&mut d, None);
        assert_eq!(d.images.len(), 2);
    }

    #[test]
    fn channel_tolerance_absorbs_compression_noise() {
        // Within +/-3 per channel: still identical.
        let a = raster(40, 40, 100);
        let b = raster(40, 40, 103);
        assert_eq!(pixel_similarity(&a, &b), 1.0);

        let c = raster(40, 40, 105);
        assert_eq!(pixel_similarity(&a, &c), 0.0);
    }

    #[test]
    fn forced_scans_stay_out_of_groups() {
        let mut forced = img("img_1_2", 1, raster(40, 40, 10));
        forced.is_forced_scan = true;
        forced.is_full_page = true;
        let mut d = doc(
            vec![img("img_1_1", 1, raster(40, 40, 10)), forced],
            vec![],
        );
        deduplicate_images(&mut d, None);
        assert_eq!(d.images.len(), 2, "forced scan must survive dedup");
        assert!(d.images.iter().any(|i| i.is_forced_scan));
    }

    #[test]
    fn equality_only_without_merges() {
        let mut d = doc(
            vec![
                img("img_1_1", 1, raster(40, 40, 0)),
                img("img_1_2", 1, raster(40, 40, 255)),
            ],
            vec![],
        );
        deduplicate_images(&mut d, None);
        assert_eq!(d.images.len(), d.original_image_count);
    }
}
