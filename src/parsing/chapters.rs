//! Heading heuristics and chapter segmentation.
//!
//! Terms & Conditions documents rarely carry a usable outline, but most of them set section
//! headings in capitals ("LIMITATION OF LIABILITY", "A. TERMS; PRIVACY"). The detector treats a
//! short, all-caps line that is not a sentence as a heading and cuts the document there.
//! Chapters whose body is too short to analyse on its own are not dropped: their text is carried
//! into the following chapter so the oracle still sees it in context.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::layout::{DocumentLayout, Lines};

/// Name given to the text preceding the first heading.
pub const FILE_BEGINNING: &str = "File beginning";

static UPPERCASE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][A-Z\s,;\u{2013}-]{8,}$").expect("uppercase heading pattern compiles")
});

static LETTERED_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]\.\s+[A-Z][A-Z\s,;-]{2,}$").expect("lettered heading pattern compiles")
});

/// Thresholds steering heading detection and chapter emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserSettings {
    /// Chapters are emitted only when their text is strictly longer than this (chars).
    pub min_chapter_length: usize,
    /// Headings must be strictly shorter than this (chars).
    pub max_heading_length: usize,
    /// Headings may contain at most this many words.
    pub max_words_per_heading: usize,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            min_chapter_length: 100,
            max_heading_length: 100,
            max_words_per_heading: 5,
        }
    }
}

/// A logical section of the document, delimited by headings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChapter {
    /// Heading text, or [`FILE_BEGINNING`] for the preamble.
    pub chapter_name: String,
    /// Body text with lines joined by single spaces.
    pub chapter_text: String,
    /// First page (1-based, inclusive) the chapter covers.
    pub page_start: Option<usize>,
    /// Last page (1-based, inclusive) the chapter covers.
    pub page_end: Option<usize>,
}

/// Decides whether a document has heading structure and splits it into chapters.
#[derive(Debug, Clone, Default)]
pub struct ChapterDetector {
    settings: ParserSettings,
}

impl ChapterDetector {
    /// Build a detector with the given thresholds.
    pub fn new(settings: ParserSettings) -> Self {
        Self { settings }
    }

    /// Thresholds in use.
    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    /// Whether `line` looks like a chapter heading.
    ///
    /// The trimmed line must match one of the heading shapes, stay within the word and length
    /// bounds, and must not end with a period.
    pub fn is_heading(&self, line: &str) -> bool {
        let stripped = line.trim();
        (UPPERCASE_BLOCK.is_match(stripped) || LETTERED_HEADING.is_match(stripped))
            && stripped.split_whitespace().count() <= self.settings.max_words_per_heading
            && !stripped.ends_with('.')
            && stripped.chars().count() < self.settings.max_heading_length
    }

    /// Whether a finished chapter body is long enough to stand on its own.
    pub fn is_chapter_valid(&self, chapter_text: &str) -> bool {
        chapter_text.chars().count() > self.settings.min_chapter_length
    }

    /// True as soon as any line of the document qualifies as a heading.
    pub fn has_identifiable_chapters(&self, layout: &DocumentLayout) -> bool {
        layout.lines().any(|(_, line)| self.is_heading(&line))
    }

    /// Lazily split the document into chapters in a single forward pass.
    pub fn parse_using_re<'a>(&'a self, layout: &'a DocumentLayout) -> Chapters<'a> {
        Chapters {
            detector: self,
            lines: layout.lines(),
            current: Some(ChapterBuilder::new(FILE_BEGINNING.to_string(), 1)),
        }
    }

    fn finish(&self, builder: ChapterBuilder) -> Finished {
        let text = builder.lines.join(" ").trim().to_string();
        if self.is_chapter_valid(&text) {
            Finished::Emit(DocumentChapter {
                chapter_name: builder.name,
                chapter_text: text,
                page_start: Some(builder.page_start),
                page_end: Some(builder.page_end),
            })
        } else if text.is_empty() {
            Finished::Empty
        } else {
            Finished::Carry {
                text,
                page_start: builder.page_start,
            }
        }
    }
}

/// Iterator returned by [`ChapterDetector::parse_using_re`].
#[derive(Debug, Clone)]
pub struct Chapters<'a> {
    detector: &'a ChapterDetector,
    lines: Lines<'a>,
    current: Option<ChapterBuilder>,
}

impl Iterator for Chapters<'_> {
    type Item = DocumentChapter;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let builder = self.current.as_mut()?;
            let Some((page_index, line)) = self.lines.next() else {
                let last = self.current.take()?;
                return match self.detector.finish(last) {
                    Finished::Emit(chapter) => Some(chapter),
                    Finished::Carry { .. } | Finished::Empty => None,
                };
            };

            let page = page_index + 1;
            if !self.detector.is_heading(&line) {
                builder.push(line, page);
                continue;
            }

            let previous = std::mem::replace(builder, ChapterBuilder::new(line, page));
            match self.detector.finish(previous) {
                Finished::Emit(chapter) => return Some(chapter),
                Finished::Carry { text, page_start } => {
                    tracing::trace!(
                        chars = text.chars().count(),
                        "Carrying short chapter into the next one"
                    );
                    builder.carry(text, page_start);
                }
                Finished::Empty => {}
            }
        }
    }
}

#[derive(Debug, Clone)]
struct ChapterBuilder {
    name: String,
    lines: Vec<String>,
    page_start: usize,
    page_end: usize,
}

impl ChapterBuilder {
    fn new(name: String, page: usize) -> Self {
        Self {
            name,
            lines: Vec::new(),
            page_start: page,
            page_end: page,
        }
    }

    fn push(&mut self, line: String, page: usize) {
        if line.is_empty() {
            return;
        }
        self.lines.push(line);
        self.page_end = page;
    }

    fn carry(&mut self, text: String, page_start: usize) {
        self.lines.insert(0, text);
        self.page_start = page_start;
    }
}

enum Finished {
    Emit(DocumentChapter),
    Carry { text: String, page_start: usize },
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::layout::{PageLayout, TextBlock, TextLine};

    fn detector() -> ChapterDetector {
        ChapterDetector::new(ParserSettings {
            min_chapter_length: 50,
            max_heading_length: 80,
            max_words_per_heading: 4,
        })
    }

    fn page(lines: &[&str]) -> PageLayout {
        PageLayout {
            blocks: vec![TextBlock {
                lines: lines.iter().map(|line| TextLine::new([*line])).collect(),
            }],
        }
    }

    #[test]
    fn accepts_valid_headings() {
        let detector = detector();
        for heading in [
            "TERMS AND CONDITIONS",
            "PRIVACY POLICY OVERVIEW",
            "A. TERMS; PRIVACY",
            "USER RESPONSIBILITIES",
            "  GOVERNING LAW  ",
        ] {
            assert!(detector.is_heading(heading), "should match: {heading}");
        }
    }

    #[test]
    fn rejects_non_headings() {
        let detector = detector();
        for text in [
            "This is a regular sentence.",
            "short",
            "This is a very long heading that exceeds the maximum length limit",
            "This has too many words to be a valid heading pattern",
            "lowercase heading",
            "",
        ] {
            assert!(!detector.is_heading(text), "should not match: {text}");
        }
    }

    #[test]
    fn each_heading_condition_is_enforced() {
        let detector = detector();
        // pattern
        assert!(!detector.is_heading("SHORT"));
        // word count
        assert!(!detector.is_heading("ONE TWO THREE FOUR FIVE"));
        assert!(detector.is_heading("ONE TWO THREE FOUR"));
        // trailing period
        assert!(!detector.is_heading("TERMS OF USE."));
        // length
        let long = ChapterDetector::new(ParserSettings {
            max_heading_length: 12,
            ..ParserSettings::default()
        });
        assert!(long.is_heading("TERMS OF US"));
        assert!(!long.is_heading("TERMS OF USE"));
    }

    #[test]
    fn chapter_validity_is_strictly_greater_than_minimum() {
        let detector = detector();
        assert!(!detector.is_chapter_valid(&"x".repeat(50)));
        assert!(detector.is_chapter_valid(&"x".repeat(51)));
        assert!(!detector.is_chapter_valid(""));
        assert!(!detector.is_chapter_valid("Short"));
        assert!(detector.is_chapter_valid(&"This is a long chapter ".repeat(10)));
    }

    #[test]
    fn detects_heading_split_across_spans() {
        let layout = DocumentLayout::new(vec![PageLayout {
            blocks: vec![TextBlock {
                lines: vec![TextLine::new(["TERMS", " AND", " CONDITIONS"])],
            }],
        }]);
        assert!(detector().has_identifiable_chapters(&layout));
    }

    #[test]
    fn plain_prose_has_no_chapters() {
        let layout = DocumentLayout::new(vec![page(&["Regular text that is not a heading"])]);
        assert!(!detector().has_identifiable_chapters(&layout));
    }

    #[test]
    fn empty_pages_and_image_blocks_have_no_chapters() {
        let layout = DocumentLayout::new(vec![
            PageLayout::default(),
            PageLayout {
                blocks: vec![TextBlock::default()],
            },
        ]);
        assert!(!detector().has_identifiable_chapters(&layout));
        assert_eq!(detector().parse_using_re(&layout).count(), 0);
    }

    #[test]
    fn splits_chapters_on_headings_with_page_ranges() {
        let intro = "This is the introduction content ".repeat(5);
        let terms = "These are the terms ".repeat(8);
        let layout = DocumentLayout::new(vec![
            page(&["INTRODUCTION", &intro]),
            page(&["TERMS AND CONDITIONS", &terms]),
        ]);

        let chapters: Vec<_> = detector().parse_using_re(&layout).collect();

        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].chapter_name, "INTRODUCTION");
        assert_eq!(chapters[0].chapter_text, intro.trim());
        assert_eq!(chapters[0].page_start, Some(1));
        assert_eq!(chapters[0].page_end, Some(1));
        assert_eq!(chapters[1].chapter_name, "TERMS AND CONDITIONS");
        assert_eq!(chapters[1].page_start, Some(2));
        assert_eq!(chapters[1].page_end, Some(2));
        for chapter in &chapters {
            assert!(!chapter.chapter_name.is_empty());
            assert!(!chapter.chapter_text.is_empty());
        }
    }

    #[test]
    fn preamble_is_named_file_beginning() {
        let preamble = "Welcome to the service, please read everything below carefully.";
        let body = "You agree to all of the following terms and conditions.".repeat(2);
        let layout = DocumentLayout::new(vec![page(&[preamble, "GENERAL TERMS", &body])]);

        let chapters: Vec<_> = detector().parse_using_re(&layout).collect();

        assert_eq!(chapters[0].chapter_name, FILE_BEGINNING);
        assert_eq!(chapters[0].chapter_text, preamble);
        assert_eq!(chapters[1].chapter_name, "GENERAL TERMS");
    }

    #[test]
    fn short_chapter_is_carried_into_the_next() {
        let body = "Payment is due within thirty days of the invoice date, no exceptions.";
        let layout = DocumentLayout::new(vec![
            page(&["DEFINITIONS", "Service means the app."]),
            page(&["PAYMENT TERMS", body]),
        ]);

        let chapters: Vec<_> = detector().parse_using_re(&layout).collect();

        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].chapter_name, "PAYMENT TERMS");
        assert_eq!(
            chapters[0].chapter_text,
            format!("Service means the app. {body}")
        );
        assert_eq!(chapters[0].page_start, Some(1));
        assert_eq!(chapters[0].page_end, Some(2));
    }

    #[test]
    fn trailing_short_chapter_is_dropped() {
        let body = "The provider may terminate the account at any time without notice.";
        let layout = DocumentLayout::new(vec![page(&["TERMINATION", body, "CONTACT US", "Email."])]);

        let chapters: Vec<_> = detector().parse_using_re(&layout).collect();

        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].chapter_name, "TERMINATION");
    }

    #[test]
    fn chapter_spanning_pages_reports_last_body_page() {
        let part = "Liability is limited to the fees paid in the preceding twelve months.";
        let layout = DocumentLayout::new(vec![
            page(&["LIMITATION OF LIABILITY", part]),
            page(&[part]),
            page(&[part]),
        ]);

        let chapters: Vec<_> = detector().parse_using_re(&layout).collect();

        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].page_start, Some(1));
        assert_eq!(chapters[0].page_end, Some(3));
    }
}
