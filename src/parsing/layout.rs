//! Page → block → line → span text layout and the PDF loader producing it.
//!
//! The chapter detector only ever looks at trimmed line text in reading order, so the layout
//! keeps just enough structure to reproduce that order: pages hold blocks (runs of lines
//! separated by blank lines in the extracted text), blocks hold lines, and lines hold the text
//! spans a PDF renderer emitted for them. Blocks without lines stand in for image regions and
//! are skipped by every consumer.

use std::path::Path;

use super::ParseError;

/// A single visual line made of one or more text spans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextLine {
    /// Raw span texts in drawing order.
    pub spans: Vec<String>,
}

impl TextLine {
    /// Build a line from its spans.
    pub fn new<S: Into<String>>(spans: impl IntoIterator<Item = S>) -> Self {
        Self {
            spans: spans.into_iter().map(Into::into).collect(),
        }
    }

    /// Span texts joined with a single space and trimmed.
    pub fn text(&self) -> String {
        self.spans.join(" ").trim().to_string()
    }
}

/// Consecutive lines grouped by the extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBlock {
    /// Lines in reading order; empty for image blocks.
    pub lines: Vec<TextLine>,
}

/// Text layout of a single page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLayout {
    /// Blocks in reading order.
    pub blocks: Vec<TextBlock>,
}

impl PageLayout {
    /// Split extracted page text into blocks on blank lines, one span per line.
    pub fn from_text(text: &str) -> Self {
        let mut blocks = Vec::new();
        let mut current = TextBlock::default();

        for raw in text.lines() {
            if raw.trim().is_empty() {
                if !current.lines.is_empty() {
                    blocks.push(std::mem::take(&mut current));
                }
                continue;
            }
            current.lines.push(TextLine::new([raw.trim_end()]));
        }
        if !current.lines.is_empty() {
            blocks.push(current);
        }

        Self { blocks }
    }

    /// Plain text of the page: one line per text line, blank line between blocks.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter(|block| !block.lines.is_empty())
            .map(|block| {
                block
                    .lines
                    .iter()
                    .map(TextLine::text)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Text layout of a whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentLayout {
    /// Pages in document order.
    pub pages: Vec<PageLayout>,
}

impl DocumentLayout {
    /// Wrap already-extracted pages.
    pub fn new(pages: Vec<PageLayout>) -> Self {
        Self { pages }
    }

    /// Build a layout from the plain text of each page.
    pub fn from_page_texts<S: AsRef<str>>(pages: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            pages
                .into_iter()
                .map(|page| PageLayout::from_text(page.as_ref()))
                .collect(),
        )
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Every line's trimmed text with its zero-based page index, in reading order.
    pub fn lines(&self) -> Lines<'_> {
        Lines {
            pages: &self.pages,
            page: 0,
            block: 0,
            line: 0,
        }
    }

    /// Plain text of each page, in order.
    pub fn iter_text(&self) -> impl Iterator<Item = String> + '_ {
        self.pages.iter().map(PageLayout::text)
    }
}

/// Cursor over the lines of a [`DocumentLayout`]; see [`DocumentLayout::lines`].
#[derive(Debug, Clone)]
pub struct Lines<'a> {
    pages: &'a [PageLayout],
    page: usize,
    block: usize,
    line: usize,
}

impl Iterator for Lines<'_> {
    type Item = (usize, String);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let page = self.pages.get(self.page)?;
            let Some(block) = page.blocks.get(self.block) else {
                self.page += 1;
                self.block = 0;
                self.line = 0;
                continue;
            };
            let Some(line) = block.lines.get(self.line) else {
                self.block += 1;
                self.line = 0;
                continue;
            };
            self.line += 1;
            return Some((self.page, line.text()));
        }
    }
}

/// Read a PDF from disk and extract its per-page text layout.
///
/// I/O failures and undecodable documents are returned as [`ParseError`]; callers treat both as
/// fatal for the document.
pub fn load_layout(path: &Path) -> Result<DocumentLayout, ParseError> {
    let bytes = std::fs::read(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|error| {
        ParseError::Pdf {
            path: path.display().to_string(),
            message: error.to_string(),
        }
    })?;
    let layout = DocumentLayout::from_page_texts(&pages);
    tracing::debug!(
        path = %path.display(),
        pages = layout.page_count(),
        "Extracted PDF layout"
    );
    Ok(layout)
}
