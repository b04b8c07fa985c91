//! Pipeline stages for PDF/image-to-HTML conversion.
//!
//! Each submodule implements one transformation step and is testable on its
//! own; [`crate::convert`] wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ encode ──▶ transcribe ──▶ assemble ──▶ render
//! (pdfium/    (base64)   (VLM, retry,   (join pages) (HTML + template)
//!  image dir)             one page ctx)
//! ```
//!
//! 1. [`source`]     — rasterise PDF pages or decode a directory of images,
//!    one at a time on a `spawn_blocking` producer (pdfium is not async-safe)
//! 2. [`encode`]     — PNG-encode and base64-wrap each page image, once, as
//!    the source produces it
//! 3. [`transcribe`] — one model call per page with the previous page as
//!    context, retried under a [`crate::retry::RetryPolicy`]
//! 4. [`assemble`]   — trimmed page texts joined with single newlines
//! 5. [`render`]     — Markdown (math-preserving) or plain text to HTML,
//!    substituted into the template

pub mod assemble;
pub mod encode;
pub mod render;
pub mod source;
pub mod transcribe;
