//! PDF text layout extraction and heading-based chapter segmentation.

pub mod chapters;
pub mod layout;

use thiserror::Error;

pub use chapters::{ChapterDetector, Chapters, DocumentChapter, FILE_BEGINNING, ParserSettings};
pub use layout::{DocumentLayout, PageLayout, TextBlock, TextLine, load_layout};

/// Errors raised while turning a PDF file into a text layout.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The file could not be read.
    #[error("failed to read '{path}': {source}")]
    Io {
        /// Path that was requested.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file was read but its content could not be decoded as a PDF.
    #[error("failed to extract text from '{path}': {message}")]
    Pdf {
        /// Path that was requested.
        path: String,
        /// Diagnostic from the PDF decoder.
        message: String,
    },
}
