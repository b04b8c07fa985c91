//! Conversion entry points: load → transcribe → assemble → render → write.
//!
//! The run is linear. Pages are transcribed one after another because each
//! request carries the previous page and its answer as context; only that
//! page and the current one are held, the rest are produced on demand. A
//! failure anywhere before the final write discards the run; nothing is
//! checkpointed.

use crate::config::{ConversionConfig, DEFAULT_MODEL};
use crate::error::Pdf2HtmlError;
use crate::output::{ConversionOutput, ConversionStats, PageResult};
use crate::pipeline::assemble::assemble;
use crate::pipeline::render::{render_document, Template};
use crate::pipeline::source::{open_pages, Page, PageStream};
use crate::pipeline::transcribe::{LlmTranscriber, PageContext, Transcriber, TranscriptionClient};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Convert a PDF file or image directory to HTML, without writing it.
///
/// # Errors
/// Returns `Err(Pdf2HtmlError)` for every fatal condition: missing template,
/// unreadable input, no pages, provider not configured, or a bounded retry
/// policy running out. With the default unbounded policy a failing provider
/// blocks instead of erroring.
pub async fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2HtmlError> {
    let total_start = Instant::now();
    let input = input.as_ref();
    info!("Starting conversion: {}", input.display());

    // ── Step 1: Template (fail before spending any tokens) ───────────────
    let template = Template::load(&config.template_path).await?;

    // ── Step 2: Get/create transcriber ───────────────────────────────────
    let transcriber = resolve_transcriber(config)?;
    let client = TranscriptionClient::new(transcriber, config);

    // ── Step 3: Open the page source ─────────────────────────────────────
    let load_start = Instant::now();
    let mut pages = open_pages(input, config).await?;
    let open_elapsed = load_start.elapsed();
    let total_pages = pages.total();
    if total_pages == 0 {
        return Err(Pdf2HtmlError::NoPages {
            path: input.to_path_buf(),
        });
    }
    info!("Opened {} pages in {}ms", total_pages, open_elapsed.as_millis());

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total_pages);
    }

    // ── Step 4: Transcribe, one page of lookback ─────────────────────────
    let llm_start = Instant::now();
    let (results, wait) = process_sequential(&client, &mut pages, input, config).await?;
    let load_duration_ms = (open_elapsed + wait).as_millis() as u64;
    let llm_duration_ms = llm_start.elapsed().saturating_sub(wait).as_millis() as u64;

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(results.len());
    }

    // ── Step 5: Assemble and render ──────────────────────────────────────
    let document = assemble(results.iter().map(|r| r.text.as_str()));
    let html = render_document(&document, config.dialect, &template);

    let stats = ConversionStats {
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        load_duration_ms,
        llm_duration_ms,
        ..ConversionStats::from_pages(&results)
    };

    info!(
        "Conversion complete: {} pages, {} retries, {}ms total",
        stats.total_pages, stats.total_retries, stats.total_duration_ms
    );

    Ok(ConversionOutput {
        html,
        document,
        pages: results,
        stats,
    })
}

/// Convert and write the HTML next to the input as `{input}.html`.
///
/// Returns the output path together with the conversion output.
pub async fn convert_to_file(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<(PathBuf, ConversionOutput), Pdf2HtmlError> {
    let input = input.as_ref();
    let output = convert(input, config).await?;
    let path = output_path_for(input);
    write_html(&path, &output.html)?;
    info!("Wrote {} bytes to {}", output.html.len(), path.display());
    Ok((path, output))
}

/// Synchronous wrapper around [`convert_to_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<(PathBuf, ConversionOutput), Pdf2HtmlError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2HtmlError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_to_file(input, config))
}

/// `{input}.html`: `doc.pdf` → `doc.pdf.html`, `scans/` → `scans.html`.
pub fn output_path_for(input: &Path) -> PathBuf {
    let mut name = input.components().as_path().as_os_str().to_os_string();
    name.push(".html");
    PathBuf::from(name)
}

/// Write `html` as UTF-8, replacing any existing file.
///
/// The bytes go to a temp file in the destination directory first and are
/// then renamed over `path`, so a crash never leaves a truncated file. An
/// existing file keeps its permissions; a new one gets the same mode a plain
/// `create` would (0666 less the umask on Unix).
pub fn write_html(path: &Path, html: &str) -> Result<(), Pdf2HtmlError> {
    let write_err = |source: std::io::Error| Pdf2HtmlError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut builder = tempfile::Builder::new();
    builder.prefix(".pdf2html");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }

    let mut tmp = builder.tempfile_in(dir).map_err(write_err)?;
    tmp.write_all(html.as_bytes()).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    if let Ok(existing) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(existing.permissions())
            .map_err(write_err)?;
    }
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Transcribe pages in order, each with the previous page as context.
///
/// Only the previous page is kept once its successor has been transcribed.
/// Also returns the time spent waiting on the page source.
async fn process_sequential(
    client: &TranscriptionClient,
    pages: &mut PageStream,
    input: &Path,
    config: &ConversionConfig,
) -> Result<(Vec<PageResult>, Duration), Pdf2HtmlError> {
    let total_pages = pages.total();
    let mut results: Vec<PageResult> = Vec::with_capacity(total_pages);
    let mut previous: Option<Page> = None;
    let mut wait = Duration::ZERO;

    loop {
        let waiting = Instant::now();
        let next = pages.next().await;
        wait += waiting.elapsed();
        let page = match next {
            Some(page) => page?,
            None => break,
        };

        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page.number(), total_pages);
        }

        let context = previous
            .as_ref()
            .zip(results.last())
            .map(|(prev, result)| PageContext {
                page: prev,
                response: &result.text,
            });
        let t = client.transcribe(&page, context).await?;

        if let Some(ref cb) = config.progress_callback {
            cb.on_page_complete(page.number(), total_pages, t.text.len());
        }

        results.push(PageResult {
            page_num: page.number(),
            label: page.label.clone(),
            text: t.text,
            input_tokens: t.input_tokens,
            output_tokens: t.output_tokens,
            duration_ms: t.duration_ms,
            retries: t.retries,
        });
        previous = Some(page);
    }

    if results.len() != total_pages {
        return Err(Pdf2HtmlError::Internal(format!(
            "'{}': page source stopped after {} of {} pages",
            input.display(),
            results.len(),
            total_pages
        )));
    }
    debug!("Waited {:?} on the page source", wait);

    Ok((results, wait))
}

fn resolve_transcriber(config: &ConversionConfig) -> Result<Arc<dyn Transcriber>, Pdf2HtmlError> {
    if let Some(ref transcriber) = config.transcriber {
        return Ok(Arc::clone(transcriber));
    }
    let provider = resolve_provider(config)?;
    Ok(Arc::new(LlmTranscriber::new(provider, config)))
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Pdf2HtmlError> {
    debug!("Creating provider {} with model {}", provider_name, model);
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2HtmlError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`, `config.model`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **Gemini key** (`GEMINI_API_KEY`) with [`DEFAULT_MODEL`] unless
///    `config.model` says otherwise.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, Pdf2HtmlError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("gemini", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2HtmlError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY (or OPENAI_API_KEY, ANTHROPIC_API_KEY).\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
