//! Prompts for vision-model image analysis and refusal classification.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing how images are described (or how
//!    refusals are judged) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompt selection directly
//!    without spinning up a real model, making prompt regressions easy to
//!    catch.

use crate::config::AnalysisType;

/// Prompt for an embedded image under [`AnalysisType::General`].
pub const IMAGE_PROMPT: &str = r#"Describe this image from a document accurately and concisely.

Rules:
- If the image contains text, transcribe ALL of it verbatim.
- If it is a chart, diagram, or table, describe its structure and report the data it shows.
- If it is a photograph or illustration, describe what it depicts in one or two sentences.
- Do NOT speculate about content you cannot see.
- Output ONLY the description, with no preamble or commentary."#;

/// Prompt for a full-page scan under [`AnalysisType::General`].
///
/// Scans are whole-page rasters, so the goal shifts from description to
/// transcription: the scan stands in for text the extractor could not read.
pub const PAGE_SCAN_PROMPT: &str = r#"This image is a scan of a full document page. Transcribe its content as plain text.

Rules:
- Preserve ALL text content completely and accurately.
- Maintain the reading order as a human would read the page.
- Render tables as plain text rows, one row per line.
- Describe figures briefly in square brackets where they appear.
- Do NOT add commentary, page numbers, or explanations.
- Start directly with the page content."#;

/// Prompt used for every image under [`AnalysisType::PageDescription`].
pub const PAGE_DESCRIPTION_PROMPT: &str = r#"Describe this document page as a whole.

Summarise in a short paragraph: the kind of page it is, its main topic, and
any notable structures (tables, figures, forms, signatures). Do NOT
transcribe the full text. Output ONLY the description."#;

/// Instruction for the secondary refusal-classification call.
///
/// The candidate text is appended, truncated to
/// [`REFUSAL_CANDIDATE_MAX_CHARS`] characters by the caller. The model must
/// answer with a single YES/NO token, which keeps parsing trivial.
pub const REFUSAL_CLASSIFIER_PROMPT: &str = r#"You are a strict classifier. Decide whether the following text is a REFUSAL — a response that declines to describe an image, says it cannot help, or contains no usable content about the image — rather than a substantive description or transcription.

Answer with exactly one word: YES if it is a refusal, NO otherwise.

Text:
"#;

/// Maximum candidate characters forwarded to the refusal classifier.
pub const REFUSAL_CANDIDATE_MAX_CHARS: usize = 500;

/// Select the analysis prompt for one image.
///
/// Keyed by the configured analysis type and by whether the image is a
/// full-page scan (forced or natural) as opposed to an embedded image.
pub fn select_prompt(analysis_type: AnalysisType, is_full_page: bool) -> &'static str {
    match (analysis_type, is_full_page) {
        (AnalysisType::PageDescription, _) => PAGE_DESCRIPTION_PROMPT,
        (AnalysisType::General, true) => PAGE_SCAN_PROMPT,
        (AnalysisType::General, false) => IMAGE_PROMPT,
    }
}

/// Build the full refusal-classification prompt for a candidate response.
pub fn refusal_classifier_input(candidate: &str) -> String {
    let truncated: String = candidate.chars().take(REFUSAL_CANDIDATE_MAX_CHARS).collect();
    format!("{REFUSAL_CLASSIFIER_PROMPT}{truncated}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_selects_by_full_page_flag() {
        assert_eq!(select_prompt(AnalysisType::General, false), IMAGE_PROMPT);
        assert_eq!(select_prompt(AnalysisType::General, true), PAGE_SCAN_PROMPT);
    }

    #[test]
    fn page_description_ignores_full_page_flag() {
        assert_eq!(
            select_prompt(AnalysisType::PageDescription, false),
            PAGE_DESCRIPTION_PROMPT
        );
        assert_eq!(
            select_prompt(AnalysisType::PageDescription, true),
            PAGE_DESCRIPTION_PROMPT
        );
    }

    #[test]
    fn refusal_input_truncates_long_candidates() {
        let long = "x".repeat(2_000);
        let built = refusal_classifier_input(&long);
        let tail = built.strip_prefix(REFUSAL_CLASSIFIER_PROMPT).unwrap();
        assert_eq!(tail.chars().count(), REFUSAL_CANDIDATE_MAX_CHARS);
    }

    #[test]
    fn refusal_input_keeps_short_candidates_whole() {
        let built = refusal_classifier_input("I cannot help with that.");
        assert!(built.ends_with("I cannot help with that."));
    }
}
