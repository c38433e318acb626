//! Analysis service choosing between chapter and page segmentation for a document.

use std::path::Path;

use tracing::Instrument;
use uuid::Uuid;

use super::analyzer::ClauseAnalyzer;
use super::types::{AnalysisOutcome, PipelineError};
use crate::parsing::{ChapterDetector, DocumentLayout, load_layout};

/// Coordinates the full pipeline: layout extraction, segmentation, and clause analysis.
///
/// Construct once near process start and share through an `Arc`; concurrent runs over different
/// documents are independent apart from the shared rate limiter inside the analyzer.
pub struct AnalyzerService {
    detector: ChapterDetector,
    analyzer: ClauseAnalyzer,
}

impl AnalyzerService {
    /// Assemble the service from its two stages.
    pub fn new(detector: ChapterDetector, analyzer: ClauseAnalyzer) -> Self {
        Self { detector, analyzer }
    }

    /// Analyse the PDF at `pdf_path`.
    ///
    /// The layout is extracted once on a blocking thread. Documents with recognizable headings
    /// are analysed per chapter, the rest per page. An empty outcome means no chunk produced a
    /// coherent analysis.
    pub async fn analyze(
        &self,
        pdf_path: &Path,
        user_context: &str,
    ) -> Result<AnalysisOutcome, PipelineError> {
        let span = tracing::info_span!(
            "analyze_document",
            run_id = %Uuid::new_v4(),
            path = %pdf_path.display()
        );
        async {
            let path = pdf_path.to_path_buf();
            let layout = tokio::task::spawn_blocking(move || load_layout(&path)).await??;
            self.analyze_layout(&layout, user_context).await
        }
        .instrument(span)
        .await
    }

    /// Analyse an already extracted layout.
    pub async fn analyze_layout(
        &self,
        layout: &DocumentLayout,
        user_context: &str,
    ) -> Result<AnalysisOutcome, PipelineError> {
        if self.detector.has_identifiable_chapters(layout) {
            tracing::info!(pages = layout.page_count(), "Analysing document per chapter");
            let chapters = self.detector.parse_using_re(layout);
            let results = self
                .analyzer
                .analyze_document_per_chapter(chapters, user_context)
                .await?;
            Ok(AnalysisOutcome::PerChapter(results))
        } else {
            tracing::info!(
                pages = layout.page_count(),
                "No chapter headings found; analysing document per page"
            );
            let results = self
                .analyzer
                .analyze_document_per_page(layout.iter_text(), user_context)
                .await?;
            Ok(AnalysisOutcome::PerPage(results))
        }
    }
}
