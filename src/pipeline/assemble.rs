//! Document assembly: per-page transcriptions → one text blob.
//!
//! Each page is trimmed and followed by a single newline, in page order.
//! Page boundaries therefore never introduce a blank line, so a paragraph or
//! table the model continued across pages stays one block when rendered.

/// Incrementally built document text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    text: String,
    pages: usize,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one page's transcription.
    pub fn push(&mut self, page_text: &str) {
        self.text.push_str(page_text.trim());
        self.text.push('\n');
        self.pages += 1;
    }

    /// Number of pages appended so far.
    pub fn page_count(&self) -> usize {
        self.pages
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Freeze the document.
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Assemble page texts in order.
pub fn assemble<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pages
        .into_iter()
        .fold(Document::new(), |mut doc, page| {
            doc.push(page.as_ref());
            doc
        })
        .into_text()
}
