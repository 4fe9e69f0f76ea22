//! Pipeline stages for PDF-to-text conversion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. switch the rendering backend) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ dedup ──▶ analyze ──▶ replace
//! (URL/path)  (pdfium)  (pixels)  (vision model)  (placeholders)
//! ```
//!
//! 1. [`input`]    — canonicalise the user-supplied path or URL to a local file
//! 2. [`extract`]  — per-page object sweep, classification, rendering, and
//!    reading-order assembly; runs in `spawn_blocking` because pdfium is not
//!    async-safe. Uses [`classify`], [`render`], and [`organize`].
//! 3. [`dedup`]    — merge visually identical images before any model call
//! 4. [`analyze`]  — windowed vision-model calls with transient and refusal
//!    retry; the only stage with network I/O. Uses [`encode`] and [`clean`].
//! 5. [`replace`]  — substitute model output into placeholders and assemble
//!    the final text

pub mod analyze;
pub mod classify;
pub mod clean;
pub mod dedup;
pub mod encode;
pub mod extract;
pub mod input;
pub mod organize;
pub mod render;
pub mod replace;
