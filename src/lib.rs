//! # edgequake-pdf2html
//!
//! Convert a PDF, or a directory of page images, into a single HTML document
//! using a Vision Language Model (VLM) for transcription.
//!
//! ## Why this crate?
//!
//! Scanned lecture notes and papers are full of formulae that text extractors
//! cannot read. This crate rasterises each page, asks a VLM to transcribe it
//! as Markdown with LaTeX math, and renders the result into an HTML template
//! that typesets the math in the browser.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image dir
//!  │
//!  ├─ 1. Source      rasterise pages via pdfium, or decode images, lazily
//!  ├─ 2. Encode      PNG → base64 ImageData, once per page
//!  ├─ 3. Transcribe  one VLM call per page, previous page as context,
//!  │                 retry with a fixed wait, pacing between calls
//!  ├─ 4. Assemble    trimmed pages joined with newlines
//!  ├─ 5. Render      Markdown → HTML with `$…$` math kept verbatim
//!  └─ 6. Output      substitute into template.html, write `{input}.html`
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2html::{convert_to_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider from GEMINI_API_KEY (or any key edgequake-llm detects)
//!     let config = ConversionConfig::default();
//!     let (path, output) = convert_to_file("lecture.pdf", &config).await?;
//!     eprintln!("wrote {} ({} pages, {} retries)",
//!         path.display(),
//!         output.stats.total_pages,
//!         output.stats.total_retries);
//!     Ok(())
//! }
//! ```
//!
//! ## Custom transcribers
//!
//! Anything implementing [`Transcriber`] can stand in for the VLM, which is
//! how the test suite runs the whole pipeline offline:
//!
//! ```rust
//! use async_trait::async_trait;
//! use edgequake_pdf2html::{ModelReply, Transcriber, TranscriptionRequest, TranscribeError};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Transcriber for Echo {
//!     async fn transcribe(&self, req: &TranscriptionRequest<'_>) -> Result<ModelReply, TranscribeError> {
//!         Ok(ModelReply::text(format!("# {}", req.page.label)))
//!     }
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2html` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2html = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod retry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, DirectoryOrder, MarkupDialect};
pub use convert::{convert, convert_sync, convert_to_file, output_path_for, write_html};
pub use error::{Pdf2HtmlError, TranscribeError};
pub use output::{ConversionOutput, ConversionStats, PageResult};
pub use pipeline::render::{Template, PLACEHOLDER};
pub use pipeline::source::{Page, PageStream};
pub use pipeline::transcribe::{ModelReply, PageContext, Transcriber, TranscriptionRequest};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use retry::{RetryDelay, RetryPolicy};
