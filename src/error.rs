//! Error types for the edgequake-pdf2html library.
//!
//! Two error types reflect two different failure scopes:
//!
//! * [`Pdf2HtmlError`] — **Fatal**: the run cannot produce an HTML file
//!   (bad input path, corrupt PDF, undecodable image, missing template,
//!   provider not configured, bounded retries exhausted). Returned as
//!   `Err(Pdf2HtmlError)` from the top-level `convert*` functions.
//!
//! * [`TranscribeError`] — **Per-call**: a single request to the vision model
//!   failed (transport, quota, content policy, timeout). The retry loop in
//!   [`crate::pipeline::transcribe::TranscriptionClient`] absorbs these and
//!   only converts them into [`Pdf2HtmlError::RetriesExhausted`] when a
//!   bounded [`crate::retry::RetryPolicy`] runs out.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2html library.
#[derive(Debug, Error)]
pub enum Pdf2HtmlError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input path was not found.
    #[error("Input not found: '{path}'\nExpected a .pdf file or a directory of page images.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the input.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input exists but is neither a `.pdf` file nor a directory.
    #[error("Unsupported input '{path}'\nExpected a .pdf file or a directory of page images.")]
    UnsupportedInput { path: PathBuf },

    /// The input resolved to zero pages (empty PDF or empty directory).
    #[error("No pages found in '{path}'")]
    NoPages { path: PathBuf },

    /// An entry of an image directory could not be decoded.
    #[error("Failed to decode image '{path}': {detail}")]
    ImageDecodeFailed { path: PathBuf, detail: String },

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

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// A page image could not be PNG-encoded for the request body.
    #[error("Failed to encode page {page}: {detail}")]
    PageEncodeFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the working directory.\n\
  • Install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A bounded retry policy gave up on a page.
    #[error("Page {page}: transcription failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        page: usize,
        attempts: u32,
        last_error: String,
    },

    // ── Template / output errors ──────────────────────────────────────────
    /// The HTML template could not be read.
    #[error("Failed to read template '{path}': {source}")]
    TemplateReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output HTML file.
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

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure of a single request to the vision model.
///
/// Always considered retryable: the policy, not the error kind, decides
/// whether another attempt is made.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum TranscribeError {
    /// The provider returned an error (transport, quota, auth, content policy).
    #[error("LLM API error: {0}")]
    Api(String),

    /// The call did not complete within the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },
}
