//! CLI binary for edgequake-pdf2html.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and reports progress.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2html::{
    convert_to_file, ConversionConfig, ConversionProgressCallback, DirectoryOrder, MarkupDialect,
    ProgressCallback, RetryPolicy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per page and per
/// retry. Pages arrive strictly in order, so one start time is enough.
struct CliProgressCallback {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
    retries: AtomicU64,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
            retries: AtomicU64::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Transcribing");
        self.bar.reset_eta();
    }

    fn page_elapsed_secs(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Transcribing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut t) = self.page_started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_retry(&self, page_num: usize, attempt: u32, delay: Duration, error: &str) {
        self.retries.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            let mut s: String = error.chars().take(79).collect();
            s.push('\u{2026}');
            s
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}  attempt {} failed: {}  {}",
            yellow("↻"),
            page_num,
            attempt,
            msg,
            dim(&format!("retrying in {}s", delay.as_secs())),
        ));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{:.1}s", self.page_elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize) {
        self.bar.finish_and_clear();
        let retries = self.retries.load(Ordering::SeqCst);
        eprintln!(
            "{} {} pages transcribed{}",
            green("✔"),
            bold(&total_pages.to_string()),
            if retries > 0 {
                dim(&format!("  ({retries} retries)"))
            } else {
                String::new()
            }
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a PDF (writes lecture.pdf.html next to it)
  pdf2html lecture.pdf

  # Convert a folder of scans in file-name order
  pdf2html --sort-by-name scans/

  # Plain text with inline SVG figures instead of Markdown
  pdf2html --dialect plain-text notes.pdf

  # Give up after 5 attempts per page, no pacing
  pdf2html --max-retries 4 --pacing-delay 0 notes.pdf

  # Prompt for the path interactively
  pdf2html

TEMPLATE:
  The HTML template must contain the placeholder ${text}; it is replaced by
  the rendered document. Load MathJax or KaTeX in the template to typeset
  the $…$ and $$…$$ spans, which are passed through verbatim.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium shared library
"#;

/// Convert a PDF or a directory of page images to HTML using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2html",
    version,
    about = "Convert a PDF or a directory of page images to HTML using Vision LLMs",
    long_about = "Transcribe every page of a PDF (or every image in a directory) with a Vision \
Language Model into Markdown with LaTeX math, render it to HTML and substitute it into an \
HTML template. The result is written to <input>.html.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file or directory of page images. Prompted for when omitted.
    input: Option<PathBuf>,

    /// HTML template containing the ${text} placeholder.
    #[arg(long, env = "PDF2HTML_TEMPLATE", default_value = "template.html")]
    template: PathBuf,

    /// LLM model ID (default: gemini-2.0-flash).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// PDF rasterisation scale factor (1.0 = 72 DPI).
    #[arg(long, env = "PDF2HTML_SCALE", default_value_t = 4.0)]
    scale: f32,

    /// Markup the model is asked for and the renderer expects.
    #[arg(long, env = "PDF2HTML_DIALECT", value_enum, default_value = "markdown")]
    dialect: DialectArg,

    /// Order directory images by file name instead of listing order.
    #[arg(long, env = "PDF2HTML_SORT_BY_NAME")]
    sort_by_name: bool,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2HTML_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per page.
    #[arg(long, env = "PDF2HTML_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Retries per page after the first attempt. Unlimited when unset.
    #[arg(long, env = "PDF2HTML_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Seconds to wait after a failed call.
    #[arg(long, env = "PDF2HTML_RETRY_DELAY", default_value_t = 15)]
    retry_delay: u64,

    /// Seconds to wait after each successful call.
    #[arg(long, env = "PDF2HTML_PACING_DELAY", default_value_t = 5)]
    pacing_delay: u64,

    /// Per-call LLM timeout in seconds. No timeout when unset.
    #[arg(long, env = "PDF2HTML_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2HTML_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF2HTML_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Print ConversionStats as JSON on stdout when done.
    #[arg(long, env = "PDF2HTML_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2HTML_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2HTML_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2HTML_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum DialectArg {
    Markdown,
    PlainText,
}

impl From<DialectArg> for MarkupDialect {
    fn from(v: DialectArg) -> Self {
        match v {
            DialectArg::Markdown => MarkupDialect::Markdown,
            DialectArg::PlainText => MarkupDialect::PlainText,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // With the progress bar active only errors are logged; the bar already
    // reports pages and retries.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let input = match cli.input.clone() {
        Some(p) => p,
        None => prompt_for_input().context("Failed to read input path from stdin")?,
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run conversion ───────────────────────────────────────────────────
    let (output_path, output) = convert_to_file(&input, &config)
        .await
        .with_context(|| format!("Conversion of {} failed", input.display()))?;
    let stats = &output.stats;

    if cli.json {
        let json = serde_json::to_string_pretty(stats).context("Failed to serialise stats")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {} pages  {}ms  →  {}",
            green("✔"),
            stats.total_pages,
            stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
        );
    }

    Ok(())
}

/// Ask for the input path on stdin.
fn prompt_for_input() -> Result<PathBuf> {
    let mut stdout = io::stdout();
    write!(stdout, "Enter the PDF path or directory of images: ")?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let path = line.trim();
    if path.is_empty() {
        anyhow::bail!("No input path given");
    }
    Ok(PathBuf::from(path))
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let retry_delay = Duration::from_secs(cli.retry_delay);
    let retry_policy = match cli.max_retries {
        Some(n) => RetryPolicy::bounded(n.saturating_add(1), retry_delay),
        None => RetryPolicy::forever(retry_delay),
    };

    let directory_order = if cli.sort_by_name {
        DirectoryOrder::Name
    } else {
        DirectoryOrder::Listing
    };

    let mut builder = ConversionConfig::builder()
        .template_path(cli.template.clone())
        .scale(cli.scale)
        .dialect(cli.dialect.clone().into())
        .directory_order(directory_order)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .retry_policy(retry_policy)
        .pacing_delay(Duration::from_secs(cli.pacing_delay));

    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
