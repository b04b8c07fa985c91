//! Instruction prompts for page transcription.
//!
//! One prompt per [`MarkupDialect`]: the prompt tells the model which markup
//! to emit, and the renderer must interpret exactly that markup, so the two
//! are selected together. Callers can override the prompt via
//! [`crate::config::ConversionConfig::system_prompt`].

use crate::config::MarkupDialect;

/// Markdown output with every mathematical expression in LaTeX `$…$`.
pub const MARKDOWN_LATEX_PROMPT: &str = r#"Please perform OCR on the attached image containing mathematical content. Convert all text to Markdown.

Follow these rules precisely:

1. MATHEMATICS
   - Every piece of mathematical content must be LaTeX inside `$...$` delimiters
     (use `$$...$$` for displayed equations)
   - Do NOT use HTML, Unicode math symbols, or any other formatting for math
   - Fractions: `$\frac{a}{b}$`
   - Integrals: `$\int_a^b f(x) \, dx$`
   - Superscripts and subscripts: `$x^2$`, `$a_i$`

2. FIGURES
   - Replace graphs and diagrams with a detailed description written as
     `[diagram: <description>]`

3. CONTENTS PAGES
   - Do not reproduce dotted leader lines
   - Put the page number directly after the title, for example:

     # Contents

     1. Introduction: 1
     2. Methods: 3
     3. Results: 5

4. OUTPUT FORMAT
   - Output ONLY the transcribed content
   - Do NOT wrap the answer in ```markdown fences
   - Do NOT add commentary or explanations"#;

/// Plain text with LaTeX math and figures redrawn as inline SVG.
pub const PLAIN_TEXT_SVG_PROMPT: &str = r#"Please perform OCR on the attached image containing mathematical content. Transcribe it as plain text.

Follow these rules precisely:

1. MATHEMATICS
   - Every piece of mathematical content must be LaTeX inside `$...$` delimiters
     (use `$$...$$` for displayed equations)
   - Do NOT use Unicode math symbols for math

2. FIGURES
   - Redraw graphs and diagrams as a single inline `<svg>` element with an
     explicit width and height; keep labels as SVG `<text>`

3. LAYOUT
   - Separate paragraphs with one blank line
   - Do NOT use Markdown syntax (no `#`, `*`, `|` tables)

4. OUTPUT FORMAT
   - Output ONLY the transcribed content
   - Do NOT wrap the answer in code fences
   - Do NOT add commentary or explanations"#;

/// Prompt matching the markup the renderer expects.
pub fn default_prompt(dialect: MarkupDialect) -> &'static str {
    match dialect {
        MarkupDialect::Markdown => MARKDOWN_LATEX_PROMPT,
        MarkupDialect::PlainText => PLAIN_TEXT_SVG_PROMPT,
    }
}
