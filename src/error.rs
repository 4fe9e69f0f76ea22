//! Error types for the pdfsight library.
//!
//! Only document-level failures are surfaced as `Err`: a PDF that cannot be
//! opened, a provider that cannot be resolved, an output file that cannot be
//! written. Everything below document granularity is carried as data
//! instead:
//!
//! * an image object that fails every extraction strategy becomes a
//!   [`crate::document::SkippedObject`] entry and extraction continues;
//! * a model call that fails after retries becomes an
//!   [`crate::document::AnalysisResult`] with `success: false`;
//! * a model refusal becomes `refusal_detected: true` with empty text.
//!
//! The separation keeps the propagation policy honest: one bad image must
//! never fail the batch, and only a document-load failure stops the
//! pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdfsight library.
#[derive(Debug, Error)]
pub enum PdfsightError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_DYNAMIC_LIB_PATH=/path/to/libpdfium to use an existing copy,\n\
or place the pdfium shared library next to the executable."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_pdf_display_includes_path() {
        let e = PdfsightError::NotAPdf {
            path: PathBuf::from("x.bin"),
            magic: *b"PK\x03\x04",
        };
        let msg = e.to_string();
        assert!(msg.contains("x.bin"), "got: {msg}");
    }

    #[test]
    fn provider_not_configured_display() {
        let e = PdfsightError::ProviderNotConfigured {
            provider: "openai".into(),
            hint: "set OPENAI_API_KEY".into(),
        };
        assert!(e.to_string().contains("openai"));
        assert!(e.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn invalid_config_display() {
        let e = PdfsightError::InvalidConfig("temperature out of range".into());
        assert!(e.to_string().contains("temperature"));
    }

    #[test]
    fn download_timeout_display() {
        let e = PdfsightError::DownloadTimeout {
            url: "https://example.com/a.pdf".into(),
            secs: 120,
        };
        assert!(e.to_string().contains("120"));
    }
}
