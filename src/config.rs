//! Configuration types for page transcription and HTML rendering.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The defaults reproduce the classic
//! workflow: 4x rasterisation, Gemini at temperature 0.1, retry forever with
//! a 15 s wait, 5 s pacing after each page, Markdown + LaTeX rendered into
//! `template.html`.

use crate::error::Pdf2HtmlError;
use crate::pipeline::transcribe::Transcriber;
use crate::progress::ProgressCallback;
use crate::retry::RetryPolicy;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default model used when the Gemini key is picked up from the environment.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default template file, resolved against the working directory.
pub const DEFAULT_TEMPLATE: &str = "template.html";

/// Configuration for a PDF/images-to-HTML conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2html::{ConversionConfig, MarkupDialect, RetryPolicy};
/// use std::time::Duration;
///
/// let config = ConversionConfig::builder()
///     .scale(3.0)
///     .dialect(MarkupDialect::PlainText)
///     .retry_policy(RetryPolicy::bounded(5, Duration::from_secs(2)))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rasterisation scale factor for PDF pages. Default: 4.0.
    ///
    /// 1.0 renders at 72 DPI (one pixel per PDF point). Small subscripts and
    /// primes in formulae need roughly 4x before a VLM reads them reliably.
    pub scale: f32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Order in which image-directory entries become pages. Default: listing order.
    pub directory_order: DirectoryOrder,

    /// LLM model identifier, e.g. "gemini-2.0-flash", "gpt-4.1".
    /// If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed transcriber. Takes precedence over every provider field.
    pub transcriber: Option<Arc<dyn Transcriber>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 8192.
    pub max_tokens: usize,

    /// Retry behaviour for failed model calls. Default: forever, 15 s fixed.
    pub retry_policy: RetryPolicy,

    /// Pause after every successful call, for provider rate limits. Default: 5 s.
    pub pacing_delay: Duration,

    /// Per-call timeout in seconds. None disables the timeout. Default: None.
    pub api_timeout_secs: Option<u64>,

    /// Custom instruction prompt. If None, uses the dialect's built-in prompt.
    pub system_prompt: Option<String>,

    /// Markup the model is asked to emit and the renderer interprets.
    pub dialect: MarkupDialect,

    /// HTML template containing the `${text}` placeholder.
    pub template_path: PathBuf,

    /// Per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            scale: 4.0,
            password: None,
            directory_order: DirectoryOrder::default(),
            model: None,
            provider_name: None,
            provider: None,
            transcriber: None,
            temperature: 0.1,
            max_tokens: 8192,
            retry_policy: RetryPolicy::default(),
            pacing_delay: Duration::from_secs(5),
            api_timeout_secs: None,
            system_prompt: None,
            dialect: MarkupDialect::default(),
            template_path: PathBuf::from(DEFAULT_TEMPLATE),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("scale", &self.scale)
            .field("directory_order", &self.directory_order)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("transcriber", &self.transcriber.as_ref().map(|_| "<dyn Transcriber>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("retry_policy", &self.retry_policy)
            .field("pacing_delay", &self.pacing_delay)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("dialect", &self.dialect)
            .field("template_path", &self.template_path)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The instruction prompt sent with every page.
    pub fn prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or_else(|| crate::prompts::default_prompt(self.dialect))
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = scale;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn directory_order(mut self, order: DirectoryOrder) -> Self {
        self.config.directory_order = order;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.config.transcriber = Some(transcriber);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry_policy = policy;
        self
    }

    pub fn pacing_delay(mut self, delay: Duration) -> Self {
        self.config.pacing_delay = delay;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn dialect(mut self, dialect: MarkupDialect) -> Self {
        self.config.dialect = dialect;
        self
    }

    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.template_path = path.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2HtmlError> {
        let c = &self.config;
        if !(c.scale > 0.0 && c.scale <= 10.0) {
            return Err(Pdf2HtmlError::InvalidConfig(format!(
                "Scale must be in (0, 10], got {}",
                c.scale
            )));
        }
        if c.retry_policy.max_attempts == Some(0) {
            return Err(Pdf2HtmlError::InvalidConfig(
                "A bounded retry policy needs at least 1 attempt".into(),
            ));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(Pdf2HtmlError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Markup the model emits and the renderer interprets.
///
/// | Dialect | Model output | Rendering |
/// |---------|--------------|-----------|
/// | `Markdown` | Markdown, LaTeX in `$…$`, `[diagram: …]` descriptions | CommonMark + tables/footnotes/strikethrough |
/// | `PlainText` | Plain text, LaTeX in `$…$`, figures as inline `<svg>` | paragraphs and line breaks only |
///
/// In both dialects math spans reach the HTML byte-for-byte, ready for a
/// client-side renderer such as MathJax or KaTeX loaded by the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarkupDialect {
    /// Markdown with LaTeX math. (default)
    #[default]
    Markdown,
    /// Plain text with LaTeX math and inline SVG figures.
    PlainText,
}

/// Order of pages loaded from an image directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DirectoryOrder {
    /// Whatever order the filesystem lists entries in. (default)
    ///
    /// Not sorted, but stable for an unchanged directory on most filesystems.
    #[default]
    Listing,
    /// Lexicographic by file name.
    Name,
}
