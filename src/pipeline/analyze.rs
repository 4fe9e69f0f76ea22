//! Batch analysis orchestration: drive every unique image through the
//! vision model under a bounded concurrency window.
//!
//! ## Windowing
//!
//! Images are dispatched in fixed windows of `max_concurrent_requests`.
//! Every image in a window is issued concurrently and the window settles
//! completely before the next one starts — peak concurrency is bounded
//! exactly at the configured limit, at the cost of pipelining across window
//! boundaries. Results are written into a pre-sized array by original index,
//! so completion order never affects final ordering.
//!
//! ## Two-level retry
//!
//! 1. **Transient retry** — a thrown model error (429, 5xx, network) retries
//!    on the exponential-backoff schedule of [`crate::retry::RetryPolicy`].
//! 2. **Refusal retry** — a *successful* response judged to be a refusal
//!    triggers a full re-analysis (with its own transient retries), up to
//!    `max_refusal_retries` rounds. A refusal that survives every round is
//!    a soft outcome, not an error: `refusal_detected` is set and the text
//!    cleared, because the model's refusal prose must never leak into the
//!    assembled document.
//!
//! Failures never cross image boundaries — a dead image yields a
//! `success: false` result and the batch carries on.

use crate::config::PipelineConfig;
use crate::document::{AnalysisResult, ExtractedImage};
use crate::model::{VisionModel, VisionRequest};
use crate::pipeline::{clean, encode};
use crate::progress::{PipelineStage, ProgressEvent};
use crate::prompts;
use crate::retry::{retry_transient, RetryPolicy};
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Analyse every image in `images`, one [`AnalysisResult`] per image.
///
/// `results[i].image_id == images[i].id` holds for every `i`, regardless of
/// completion order. Progress fires after each individual image settles.
pub async fn analyze_images(
    model: &Arc<dyn VisionModel>,
    images: &[ExtractedImage],
    config: &PipelineConfig,
) -> Vec<AnalysisResult> {
    let total = images.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(PipelineStage::Analyze, total);
    }
    if total == 0 {
        return Vec::new();
    }

    let window_size = config.max_concurrent_requests.max(1);
    info!("analysing {} images in windows of {}", total, window_size);

    let mut results: Vec<Option<AnalysisResult>> = (0..total).map(|_| None).collect();
    let settled = AtomicUsize::new(0);

    for (window_idx, window) in images.chunks(window_size).enumerate() {
        let base = window_idx * window_size;
        debug!(
            "window {}: images {}..{}",
            window_idx,
            base,
            base + window.len()
        );

        let futures = window.iter().enumerate().map(|(offset, image)| {
            let index = base + offset;
            let model = Arc::clone(model);
            let settled = &settled;
            async move {
                let result = analyze_one(&model, image, config).await;
                let done = settled.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_image_analyzed(&result.image_id, result.page_number, result.success);
                    cb.on_item_complete(ProgressEvent {
                        stage: PipelineStage::Analyze,
                        current: done,
                        total,
                    });
                }
                (index, result)
            }
        });

        // The whole window settles before the next one is dispatched.
        for (index, result) in join_all(futures).await {
            results[index] = Some(result);
        }
    }

    results
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.unwrap_or_else(|| failure_result(&images[i], 0, 0, "analysis never settled"))
        })
        .collect()
}

/// Full two-level retry flow for a single image.
async fn analyze_one(
    model: &Arc<dyn VisionModel>,
    image: &ExtractedImage,
    config: &PipelineConfig,
) -> AnalysisResult {
    let encoded = match encode::encode_raster(&image.raster) {
        Ok(data) => data,
        Err(e) => {
            return failure_result(image, 0, 0, &format!("image encoding failed: {e}"));
        }
    };

    let request = VisionRequest {
        prompt: prompts::select_prompt(config.analysis_type, image.is_full_page).to_string(),
        image: encoded,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };
    let policy = config.retry_policy();

    let mut refusal_round: u32 = 0;
    loop {
        let outcome = match retry_transient(|| model.describe_image(&request), &policy).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                warn!(
                    "image {}: failed after {} retries: {}",
                    image.id, failure.retries, failure.error
                );
                return failure_result(
                    image,
                    failure.retries,
                    refusal_round,
                    &failure.error.to_string(),
                );
            }
        };

        let text = clean::clean_model_text(&outcome.value);

        if !detect_refusal(model, &text, &policy).await {
            return AnalysisResult {
                image_id: image.id.clone(),
                success: true,
                text,
                refusal_detected: false,
                refusal_retries: refusal_round,
                retries: outcome.retries,
                page_number: image.page_number,
                is_forced_scan: image.is_forced_scan,
                error: None,
            };
        }

        if refusal_round >= config.max_refusal_retries {
            debug!(
                "image {}: refusal persisted through {} retries",
                image.id, refusal_round
            );
            // The refusal text itself is never surfaced downstream.
            return AnalysisResult {
                image_id: image.id.clone(),
                success: true,
                text: String::new(),
                refusal_detected: true,
                refusal_retries: refusal_round,
                retries: outcome.retries,
                page_number: image.page_number,
                is_forced_scan: image.is_forced_scan,
                error: None,
            };
        }

        refusal_round += 1;
        debug!(
            "image {}: refusal detected, re-analysing (round {}/{})",
            image.id, refusal_round, config.max_refusal_retries
        );
    }
}

/// Decide whether a model response is a refusal rather than a description.
///
/// Empty responses are refusals without a classifier call. Otherwise a
/// secondary text-only call classifies the candidate; when that call itself
/// fails after retries the response is treated as *not* a refusal — losing
/// real content to classifier downtime is the worse failure mode.
async fn detect_refusal(
    model: &Arc<dyn VisionModel>,
    candidate: &str,
    policy: &RetryPolicy,
) -> bool {
    if candidate.trim().is_empty() {
        return true;
    }

    let prompt = prompts::refusal_classifier_input(candidate);
    match retry_transient(|| model.complete(&prompt), policy).await {
        Ok(outcome) => verdict_is_refusal(&outcome.value),
        Err(failure) => {
            warn!(
                "refusal classifier failed after {} retries ({}); assuming not a refusal",
                failure.retries, failure.error
            );
            false
        }
    }
}

/// Parse the classifier's YES/NO verdict. Anything other than a leading YES
/// counts as "not a refusal".
fn verdict_is_refusal(response: &str) -> bool {
    response
        .trim()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .map(|word| word.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

fn failure_result(
    image: &ExtractedImage,
    retries: u32,
    refusal_retries: u32,
    error: &str,
) -> AnalysisResult {
    AnalysisResult {
        image_id: image.id.clone(),
        success: false,
        text: String::new(),
        refusal_detected: false,
        refusal_retries,
        retries,
        page_number: image.page_number,
        is_forced_scan: image.is_forced_scan,
        error: Some(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_parses_yes_variants() {
        assert!(verdict_is_refusal("YES"));
        assert!(verdict_is_refusal("yes"));
        assert!(verdict_is_refusal("Yes."));
        assert!(verdict_is_refusal("  YES\n"));
    }

    #[test]
    fn verdict_parses_no_and_noise() {
        assert!(!verdict_is_refusal("NO"));
        assert!(!verdict_is_refusal("no, it describes a chart"));
        assert!(!verdict_is_refusal(""));
        assert!(!verdict_is_refusal("maybe"));
        // "yesterday" must not match as YES.
        assert!(!verdict_is_refusal("yesterday's report"));
    }
}
