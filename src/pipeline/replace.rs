//! Text replacement: substitute analysis results back into placeholders and
//! assemble the final document.
//!
//! This stage is a pure function of its inputs — the extracted [`Document`]
//! and the [`AnalysisResult`] list are read, never mutated; output is a
//! fresh set of [`ReplacedPage`] values plus the concatenated document
//! string.
//!
//! Substitution policy per image reference:
//!
//! * result missing, failed, or refusal-flagged → the placeholder is removed
//!   outright, contributing nothing;
//! * otherwise the result text is wrapped in the configured prefix/suffix
//!   (the page-scan pair for full-page references, the image pair for
//!   embedded ones) and substituted exactly once.
//!
//! Templates are applied verbatim after two expansions: the `{pageNumber}`
//! token and literal `\n` escape sequences. Any placeholder still present
//! after substitution (a dangling token from a dedup-dropped reference or a
//! defect upstream) is scrubbed defensively.

use crate::config::ReplacementTemplates;
use crate::document::{AnalysisResult, Document, ReplacedPage};
use crate::progress::{PipelineStage, ProgressCallback, ProgressEvent};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// Final output of the replacement stage.
#[derive(Debug, Clone)]
pub struct ReplacedDocument {
    pub pages: Vec<ReplacedPage>,
    /// All pages joined with the configured separator and optional headings.
    pub text: String,
}

static RE_LEFTOVER_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[IMAGE_\d+\]").unwrap());

/// Substitute every page's placeholders and assemble the document text.
pub fn replace_document(
    document: &Document,
    results: &[AnalysisResult],
    templates: &ReplacementTemplates,
    progress: Option<&ProgressCallback>,
) -> ReplacedDocument {
    if let Some(cb) = progress {
        cb.on_stage_start(PipelineStage::Replace, document.pages.len());
    }

    let by_id: HashMap<&str, &AnalysisResult> =
        results.iter().map(|r| (r.image_id.as_str(), r)).collect();

    let mut pages = Vec::with_capacity(document.pages.len());
    for (done, page) in document.pages.iter().enumerate() {
        let content = replace_page(page, &by_id, templates);
        pages.push(ReplacedPage {
            page_number: page.page_number,
            content,
        });

        if let Some(cb) = progress {
            cb.on_item_complete(ProgressEvent {
                stage: PipelineStage::Replace,
                current: done + 1,
                total: document.pages.len(),
            });
        }
    }

    let text = assemble_document(&pages, templates);
    ReplacedDocument { pages, text }
}

/// Substitute one page. Pages without references pass through unchanged.
fn replace_page(
    page: &crate::document::Page,
    by_id: &HashMap<&str, &AnalysisResult>,
    templates: &ReplacementTemplates,
) -> String {
    if page.image_references.is_empty() {
        return page.content.formatted_text.clone();
    }

    let mut text = page.content.formatted_text.clone();
    for reference in &page.image_references {
        let replacement = match by_id.get(reference.id.as_str()) {
            Some(result) if result.is_usable() => {
                let (prefix, suffix) = if reference.is_full_page {
                    (&templates.scan_prefix, &templates.scan_suffix)
                } else {
                    (&templates.image_prefix, &templates.image_suffix)
                };
                format!(
                    "{}{}{}",
                    expand_template(prefix, page.page_number),
                    result.text,
                    expand_template(suffix, page.page_number)
                )
            }
            Some(result) => {
                debug!(
                    "page {}: dropping placeholder {} ({})",
                    page.page_number,
                    reference.placeholder,
                    if result.refusal_detected {
                        "refused"
                    } else {
                        "failed"
                    }
                );
                String::new()
            }
            None => {
                debug!(
                    "page {}: no analysis result for {}, dropping placeholder",
                    page.page_number, reference.id
                );
                String::new()
            }
        };
        text = text.replacen(&reference.placeholder, &replacement, 1);
    }

    // Dangling tokens (duplicated placeholders, upstream defects) must not
    // leak into the output.
    RE_LEFTOVER_PLACEHOLDER.replace_all(&text, "").into_owned()
}

/// Expand `{pageNumber}` and literal `\n` escapes in a template string.
pub fn expand_template(template: &str, page_number: usize) -> String {
    template
        .replace("{pageNumber}", &page_number.to_string())
        .replace("\\n", "\n")
}

/// Join pages with the configured separator and optional heading banners.
fn assemble_document(pages: &[ReplacedPage], templates: &ReplacementTemplates) -> String {
    let mut parts: Vec<String> = Vec::new();
    for page in pages {
        let content = page.content.trim_end();
        let heading = templates
            .page_heading
            .as_deref()
            .map(|h| expand_template(h, page.page_number));

        if content.is_empty() && heading.is_none() {
            continue;
        }

        let mut section = String::new();
        if let Some(h) = heading {
            section.push_str(&h);
            if !content.is_empty() {
                section.push('\n');
            }
        }
        section.push_str(content);
        parts.push(section);
    }

    parts.join(&expand_template(&templates.page_separator, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ImageReference, Page, PageContent};

    fn result(id: &str, success: bool, text: &str, refused: bool) -> AnalysisResult {
        AnalysisResult {
            image_id: id.to_string(),
            success,
            text: text.to_string(),
            refusal_detected: refused,
            refusal_retries: 0,
            retries: 0,
            page_number: 1,
            is_forced_scan: false,
            error: if success { None } else { Some("boom".into()) },
        }
    }

    fn page(formatted: &str, refs: Vec<ImageReference>) -> Page {
        Page {
            page_number: 1,
            is_scanned: false,
            content: PageContent {
                raw_text: String::new(),
                formatted_text: formatted.to_string(),
            },
            image_references: refs,
        }
    }

    fn reference(id: &str, placeholder: &str, is_full_page: bool) -> ImageReference {
        ImageReference {
            id: id.to_string(),
            placeholder: placeholder.to_string(),
            is_full_page,
            index: 1,
        }
    }

    fn doc(pages: Vec<Page>) -> Document {
        Document {
            total_pages: pages.len(),
            pages,
            images: vec![],
            skipped_objects: vec![],
            original_image_count: 0,
            processing_time_ms: 0,
        }
    }

    fn templates(image_prefix: &str, image_suffix: &str) -> ReplacementTemplates {
        ReplacementTemplates {
            image_prefix: image_prefix.to_string(),
            image_suffix: image_suffix.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn successful_result_is_wrapped_in_templates() {
        let d = doc(vec![page(
            "Before [IMAGE_1] after",
            vec![reference("img_1_1", "[IMAGE_1]", false)],
        )]);
        let results = vec![result("img_1_1", true, "A cat", false)];
        let out = replace_document(&d, &results, &templates("<IMG>", "</IMG>"), None);
        assert_eq!(out.pages[0].content, "Before <IMG>A cat</IMG> after");
    }

    #[test]
    fn refusal_removes_the_placeholder() {
        let d = doc(vec![page(
            "Before [IMAGE_1] after",
            vec![reference("img_1_1", "[IMAGE_1]", false)],
        )]);
        let results = vec![result("img_1_1", true, "", true)];
        let out = replace_document(&d, &results, &templates("<IMG>", "</IMG>"), None);
        assert_eq!(out.pages[0].content, "Before  after");
    }

    #[test]
    fn failed_result_removes_the_placeholder() {
        let d = doc(vec![page(
            "x [IMAGE_1] y",
            vec![reference("img_1_1", "[IMAGE_1]", false)],
        )]);
        let results = vec![result("img_1_1", false, "", false)];
        let out = replace_document(&d, &results, &ReplacementTemplates::default(), None);
        assert_eq!(out.pages[0].content, "x  y");
    }

    #[test]
    fn missing_result_removes_the_placeholder() {
        let d = doc(vec![page(
            "x [IMAGE_1] y",
            vec![reference("img_1_1", "[IMAGE_1]", false)],
        )]);
        let out = replace_document(&d, &[], &ReplacementTemplates::default(), None);
        assert_eq!(out.pages[0].content, "x  y");
    }

    #[test]
    fn page_without_references_is_untouched() {
        let original = "Hello\nworld  [not a placeholder]";
        let d = doc(vec![page(original, vec![])]);
        let out = replace_document(&d, &[], &ReplacementTemplates::default(), None);
        assert_eq!(out.pages[0].content, original);
    }

    #[test]
    fn scan_references_use_the_scan_templates() {
        let t = ReplacementTemplates {
            scan_prefix: "<SCAN p{pageNumber}>".to_string(),
            scan_suffix: "</SCAN>".to_string(),
            ..Default::default()
        };
        let d = doc(vec![page(
            "[IMAGE_1]",
            vec![reference("img_1_1", "[IMAGE_1]", true)],
        )]);
        let results = vec![result("img_1_1", true, "Page text", false)];
        let out = replace_document(&d, &results, &t, None);
        assert_eq!(out.pages[0].content, "<SCAN p1>Page text</SCAN>");
    }

    #[test]
    fn templates_expand_escaped_newlines() {
        assert_eq!(expand_template("a\\nb", 1), "a\nb");
        assert_eq!(expand_template("page {pageNumber}\\n", 7), "page 7\n");
    }

    #[test]
    fn dangling_placeholders_are_scrubbed() {
        // [IMAGE_2]'s reference was dropped by dedup; the token must go.
        let d = doc(vec![page(
            "a [IMAGE_1] b [IMAGE_2]",
            vec![reference("img_1_1", "[IMAGE_1]", false)],
        )]);
        let results = vec![result("img_1_1", true, "cat", false)];
        let out = replace_document(&d, &results, &templates("", ""), None);
        assert_eq!(out.pages[0].content, "a cat b ");
    }

    #[test]
    fn assembly_joins_pages_with_separator_and_headings() {
        let t = ReplacementTemplates {
            page_heading: Some("--- Page {pageNumber} ---".to_string()),
            page_separator: "\\n\\n".to_string(),
            ..Default::default()
        };
        let mut p1 = page("First", vec![]);
        p1.page_number = 1;
        let mut p2 = page("Second", vec![]);
        p2.page_number = 2;
        let d = doc(vec![p1, p2]);
        let out = replace_document(&d, &[], &t, None);
        assert_eq!(
            out.text,
            "--- Page 1 ---\nFirst\n\n--- Page 2 ---\nSecond"
        );
    }

    #[test]
    fn empty_pages_are_skipped_in_assembly() {
        let mut p1 = page("Only content", vec![]);
        p1.page_number = 1;
        let mut p2 = page("", vec![]);
        p2.page_number = 2;
        let d = doc(vec![p1, p2]);
        let out = replace_document(&d, &[], &ReplacementTemplates::default(), None);
        assert_eq!(out.text, "Only content");
        assert_eq!(out.pages.len(), 2, "per-page output still lists every page");
    }
}
