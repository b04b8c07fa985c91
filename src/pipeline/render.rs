//! Rendering: assembled text → HTML fragment → template substitution.
//!
//! ## Math
//!
//! The template loads a client-side math renderer, which only works if every
//! `$…$` / `$$…$$` span reaches the page byte-for-byte. Left alone, a
//! Markdown parser would turn `$a_i$ and $b_i$` into emphasis and consume
//! the backslash of `\{`. We therefore parse with math enabled and re-emit
//! each math event as raw HTML with its original delimiters.
//!
//! ## Template
//!
//! The template is any HTML file containing [`PLACEHOLDER`]. Only the first
//! occurrence is replaced; a template without it is returned unchanged.

use crate::config::MarkupDialect;
use crate::error::Pdf2HtmlError;
use once_cell::sync::Lazy;
use pulldown_cmark::{html, CowStr, Event, Options, Parser};
use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

/// Token in the template replaced by the rendered document.
pub const PLACEHOLDER: &str = "${text}";

/// Render `text` under `dialect` and substitute it into `template`.
pub fn render_document(text: &str, dialect: MarkupDialect, template: &Template) -> String {
    let fragment = render_fragment(text, dialect);
    debug!(
        "Rendered {} bytes of text → {} bytes of HTML",
        text.len(),
        fragment.len()
    );
    template.substitute(&fragment)
}

/// Render `text` to an HTML fragment.
pub fn render_fragment(text: &str, dialect: MarkupDialect) -> String {
    match dialect {
        MarkupDialect::Markdown => markdown_to_html(text),
        MarkupDialect::PlainText => plain_text_to_html(text),
    }
}

// ── Markdown dialect ─────────────────────────────────────────────────────

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_MATH
}

/// Stands in for `|` inside math while the table parser runs.
const MATH_PIPE: char = '\u{E002}';

/// CommonMark plus tables, footnotes, strikethrough and task lists.
///
/// Raw HTML (inline `<svg>`, `<br>`, ...) passes through unescaped. A `|`
/// inside math (`$|x|$`, `$\{a | b\}$`) never splits a table cell.
pub fn markdown_to_html(text: &str) -> String {
    let shielded = RE_MATH.replace_all(text, |caps: &regex::Captures<'_>| {
        caps[0].replace('|', &MATH_PIPE.to_string())
    });

    let events = Parser::new_ext(&shielded, markdown_options()).map(|event| match event {
        Event::InlineMath(m) => Event::InlineHtml(CowStr::from(format!("${}$", m))),
        Event::DisplayMath(m) => Event::InlineHtml(CowStr::from(format!("$${}$$", m))),
        other => other,
    });

    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, events);
    if out.contains(MATH_PIPE) {
        out = out.replace(MATH_PIPE, "|");
    }
    out
}

// ── Plain-text dialect ───────────────────────────────────────────────────

static RE_PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n\s*").unwrap());

static RE_SVG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<svg\b.*?</svg>").unwrap());

static RE_SVG_SLOT: Lazy<Regex> = Lazy::new(|| Regex::new("\u{E000}(\\d+)\u{E001}").unwrap());

/// Paragraphs on blank lines, `<br>` on single newlines, content unescaped.
///
/// SVG elements are kept intact even when they span blank lines or
/// several lines.
pub fn plain_text_to_html(text: &str) -> String {
    let mut svgs: Vec<String> = Vec::new();
    let shielded = RE_SVG.replace_all(text, |caps: &regex::Captures<'_>| {
        svgs.push(caps[0].to_string());
        format!("\u{E000}{}\u{E001}", svgs.len() - 1)
    });

    let mut out = String::with_capacity(text.len() + 64);
    for para in RE_PARAGRAPH_BREAK.split(shielded.trim()) {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        let body = para
            .lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("<br>\n");
        out.push_str("<p>");
        out.push_str(&body);
        out.push_str("</p>\n");
    }

    RE_SVG_SLOT
        .replace_all(&out, |caps: &regex::Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| svgs.get(i))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}

// ── Math spans ───────────────────────────────────────────────────────────

static RE_MATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\$[^$]+\$\$|\$[^$\n]+\$").unwrap());

/// Every `$…$` / `$$…$$` span in `text`, delimiters included, in order.
pub fn math_spans(text: &str) -> Vec<&str> {
    RE_MATH.find_iter(text).map(|m| m.as_str()).collect()
}

// ── Template ─────────────────────────────────────────────────────────────

/// Static HTML shell with one [`PLACEHOLDER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
}

impl Template {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Read a template from disk.
    pub async fn load(path: &Path) -> Result<Self, Pdf2HtmlError> {
        let source = tokio::fs::read_to_string(path).await.map_err(|e| {
            Pdf2HtmlError::TemplateReadFailed {
                path: path.to_path_buf(),
                source: e,
            }
        })?;
        let template = Self::new(source);
        if !template.has_placeholder() {
            warn!(
                "Template '{}' has no {} placeholder; output will not contain the document",
                path.display(),
                PLACEHOLDER
            );
        }
        Ok(template)
    }

    pub fn has_placeholder(&self) -> bool {
        self.source.contains(PLACEHOLDER)
    }

    /// Replace the first placeholder with `fragment`.
    pub fn substitute(&self, fragment: &str) -> String {
        self.source.replacen(PLACEHOLDER, fragment, 1)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_lists_emphasis() {
        let html = markdown_to_html("# Title\n\nSome *emphasis* and **bold**.\n\n- one\n- two\n");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>emphasis</em>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<li>one</li>"));
    }

    #[test]
    fn tables_render() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| $x$ | 2 |\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>$x$</td>"), "got: {html}");
    }

    #[test]
    fn pipes_inside_math_stay_in_their_cell() {
        let input = "| x | y |\n|---|---|\n| $a|b$ | 2 |\n| $|v|$ | $\\{s \\mid |s| < 1\\}$ |\n";
        let html = markdown_to_html(input);

        assert!(html.contains("<td>$a|b$</td>"), "got: {html}");
        assert!(html.contains("<td>2</td>"), "got: {html}");
        assert!(html.contains("<td>$|v|$</td>"), "got: {html}");
        assert_eq!(html.matches("<td>").count(), 4, "got: {html}");
        assert_eq!(math_spans(input), math_spans(&html));
        assert!(!html.contains(MATH_PIPE));
    }

    #[test]
    fn pipes_inside_math_outside_tables() {
        let html = markdown_to_html("Norm $\\|x\\|$ and $|y|$.");
        assert!(html.contains("$\\|x\\|$"), "got: {html}");
        assert!(html.contains("$|y|$"), "got: {html}");
    }

    #[test]
    fn math_spans_survive_verbatim() {
        let input = "# Limits\n\n\
            Let $a_i$ and $b_i$ be sequences with $\\frac{a}{b} < 1$.\n\n\
            1. Set $\\{x \\mid x > 0\\}$ is open.\n\
            2. Also $x^*$ and $y^*$.\n\n\
            $$\\int_a^b f(x) \\, dx$$\n";
        let html = markdown_to_html(input);
        assert_eq!(math_spans(input), math_spans(&html));
        assert!(html.contains("$\\frac{a}{b} < 1$"));
        assert!(!html.contains("<em>"), "math must not turn into emphasis: {html}");
    }

    #[test]
    fn inline_svg_passes_through() {
        let html = markdown_to_html(
            "Figure: <svg width=\"10\" height=\"10\"><circle r=\"4\"/></svg>\n",
        );
        assert!(html.contains("<svg width=\"10\" height=\"10\"><circle r=\"4\"/></svg>"));
    }

    #[test]
    fn plain_text_paragraphs_and_breaks() {
        let html = plain_text_to_html("line one\nline two\n\n\nsecond $x<y$ para\n");
        assert_eq!(
            html,
            "<p>line one<br>\nline two</p>\n<p>second $x<y$ para</p>\n"
        );
    }

    #[test]
    fn plain_text_keeps_svg_whole() {
        let svg = "<svg width=\"20\" height=\"20\">\n<line x1=\"0\" y1=\"0\" x2=\"9\" y2=\"9\"/>\n\n<text x=\"1\" y=\"5\">$f$</text>\n</svg>";
        let html = plain_text_to_html(&format!("Graph of $f$:\n{svg}\n\nDone."));
        assert!(html.contains(svg), "got: {html}");
        assert!(html.ends_with("<p>Done.</p>\n"));
    }

    #[test]
    fn math_spans_in_order() {
        assert_eq!(
            math_spans("$a$ then $$b$$ then $c$"),
            vec!["$a$", "$$b$$", "$c$"]
        );
        assert!(math_spans("no math here").is_empty());
    }

    #[test]
    fn substitution_replaces_placeholder_once() {
        let t = Template::new("<body>\n${text}\n</body>");
        let out = t.substitute("<h1>Hi</h1>");
        assert_eq!(out, "<body>\n<h1>Hi</h1>\n</body>");
        assert!(!out.contains(PLACEHOLDER));
        assert_eq!(out.matches("<h1>Hi</h1>").count(), 1);
    }

    #[test]
    fn only_first_placeholder_is_replaced() {
        let t = Template::new("${text}|${text}");
        assert_eq!(t.substitute("X"), "X|${text}");
    }

    #[test]
    fn missing_placeholder_returns_template_unchanged() {
        let t = Template::new("<html><body>static</body></html>");
        assert!(!t.has_placeholder());
        assert_eq!(t.substitute("<p>lost</p>"), t.as_str());
    }

    #[test]
    fn render_document_uses_dialect() {
        let t = Template::new("<main>${text}</main>");
        assert_eq!(
            render_document("# A\n", MarkupDialect::Markdown, &t),
            "<main><h1>A</h1>\n</main>"
        );
        assert_eq!(
            render_document("# A\n", MarkupDialect::PlainText, &t),
            "<main><p># A</p>\n</main>"
        );
    }

    #[tokio::test]
    async fn load_missing_template_fails() {
        let err = Template::load(Path::new("/no/such/template.html"))
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2HtmlError::TemplateReadFailed { .. }));
    }
}
