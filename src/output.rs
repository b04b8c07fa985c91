//! Result types returned by the conversion entry points.

use serde::{Deserialize, Serialize};

/// Everything a finished conversion produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Final HTML: the template with the rendered document substituted.
    pub html: String,
    /// The assembled transcription the HTML was rendered from.
    pub document: String,
    /// Per-page results, in page order.
    pub pages: Vec<PageResult>,
    pub stats: ConversionStats,
}

/// Outcome of one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// File name for image input, `page N` for PDF input.
    pub label: String,
    /// Trimmed transcription.
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
    /// Failed attempts before the successful one.
    pub retries: u32,
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub total_retries: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    /// Time spent rasterising / decoding pages.
    pub load_duration_ms: u64,
    /// Time spent in model calls, retry waits and pacing.
    pub llm_duration_ms: u64,
}

impl ConversionStats {
    /// Sum per-page counters; durations are filled in by the caller.
    pub fn from_pages(pages: &[PageResult]) -> Self {
        Self {
            total_pages: pages.len(),
            total_retries: pages.iter().map(|p| p.retries as u64).sum(),
            total_input_tokens: pages.iter().map(|p| p.input_tokens).sum(),
            total_output_tokens: pages.iter().map(|p| p.output_tokens).sum(),
            ..Default::default()
        }
    }
}
