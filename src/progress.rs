//! Progress-callback trait for structured pipeline events.
//!
//! Inject an `Arc<dyn PipelineProgressCallback>` via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as each stage and item completes. Events carry explicit
//! `(stage, current, total)` state — consumers never need to reconstruct
//! progress by parsing log lines.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a broadcast channel, a WebSocket, a database record, or
//! a terminal progress bar — without the library knowing anything about how
//! the host application communicates. The trait is `Send + Sync` so it works
//! correctly while images are analysed concurrently.

use std::sync::Arc;

/// A pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Per-page text and image extraction.
    Extract,
    /// Cross-document image deduplication.
    Deduplicate,
    /// Batched vision-model analysis.
    Analyze,
    /// Placeholder substitution and document assembly.
    Replace,
}

/// One structured progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProgressEvent {
    pub stage: PipelineStage,
    /// Items completed so far within the stage.
    pub current: usize,
    /// Total items the stage will process.
    pub total: usize,
}

/// Called by the pipeline as it progresses through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. During analysis, `on_item_complete` and
/// `on_image_analyzed` fire after every single image settles — not only at
/// window boundaries — and may interleave across in-flight images.
pub trait PipelineProgressCallback: Send + Sync {
    /// A stage is about to start processing `total` items.
    fn on_stage_start(&self, stage: PipelineStage, total: usize) {
        let _ = (stage, total);
    }

    /// One item within a stage finished (page extracted, image analysed, …).
    fn on_item_complete(&self, event: ProgressEvent) {
        let _ = event;
    }

    /// An image's analysis settled, successfully or not.
    ///
    /// Fired in addition to `on_item_complete` with per-image detail.
    fn on_image_analyzed(&self, image_id: &str, page_number: usize, success: bool) {
        let _ = (image_id, page_number, success);
    }

    /// The whole pipeline finished.
    fn on_pipeline_complete(&self, total_images: usize, analyzed_ok: usize) {
        let _ = (total_images, analyzed_ok);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        items: AtomicUsize,
        images: AtomicUsize,
        failures: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_item_complete(&self, _event: ProgressEvent) {
            self.items.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_analyzed(&self, _image_id: &str, _page_number: usize, success: bool) {
            self.images.fetch_add(1, Ordering::SeqCst);
            if !success {
                self.failures.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(PipelineStage::Extract, 5);
        cb.on_item_complete(ProgressEvent {
            stage: PipelineStage::Extract,
            current: 1,
            total: 5,
        });
        cb.on_image_analyzed("img_1_1", 1, true);
        cb.on_pipeline_complete(5, 4);
    }

    #[test]
    fn tracking_callback_counts_events() {
        let cb = TrackingCallback {
            items: AtomicUsize::new(0),
            images: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        };
        for i in 0..3 {
            cb.on_item_complete(ProgressEvent {
                stage: PipelineStage::Analyze,
                current: i + 1,
                total: 3,
            });
        }
        cb.on_image_analyzed("img_1_1", 1, true);
        cb.on_image_analyzed("img_1_2", 1, false);
        assert_eq!(cb.items.load(Ordering::SeqCst), 3);
        assert_eq!(cb.images.load(Ordering::SeqCst), 2);
        assert_eq!(cb.failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn PipelineProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_stage_start(PipelineStage::Analyze, 10);
        cb.on_pipeline_complete(10, 10);
    }
}
