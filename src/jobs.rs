//! Background-job wrapper around the analysis service.
//!
//! A job owns the document lifecycle: it marks the document as processing, runs the pipeline,
//! stores every result, and finishes in `analyzed` or `failed`. A document without usable
//! clauses still ends up `analyzed`; only fatal errors mark it `failed`.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::parsing::DocumentLayout;
use crate::processing::{AnalysisOutcome, AnalyzerService, PipelineError, Segmentation};
use crate::storage::{AnalysisSink, DocumentStatus, SinkError, StatusReporter, StoredClause};

/// Errors that fail an analysis job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The pipeline could not analyse the document.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// Results or status could not be persisted.
    #[error(transparent)]
    Storage(#[from] SinkError),
}

/// What a finished job produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    /// Analysed document.
    pub document_id: String,
    /// Segmentation the pipeline chose.
    pub segmentation: Segmentation,
    /// Number of records written to the sink.
    pub stored: usize,
}

/// Runs document analyses and persists their outcome.
#[derive(Clone)]
pub struct AnalysisJob {
    service: Arc<AnalyzerService>,
    sink: Arc<dyn AnalysisSink>,
    status: Arc<dyn StatusReporter>,
}

impl AnalysisJob {
    /// Wire a job from the service and its collaborators.
    pub fn new(
        service: Arc<AnalyzerService>,
        sink: Arc<dyn AnalysisSink>,
        status: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            service,
            sink,
            status,
        }
    }

    /// Analyse `pdf_path` on behalf of `document_id`.
    pub async fn run(
        &self,
        document_id: &str,
        pdf_path: &Path,
        user_context: &str,
    ) -> Result<JobSummary, JobError> {
        self.track(document_id, self.service.analyze(pdf_path, user_context))
            .await
    }

    /// Analyse a layout extracted elsewhere on behalf of `document_id`.
    pub async fn run_layout(
        &self,
        document_id: &str,
        layout: &DocumentLayout,
        user_context: &str,
    ) -> Result<JobSummary, JobError> {
        self.track(
            document_id,
            self.service.analyze_layout(layout, user_context),
        )
        .await
    }

    async fn track<F>(&self, document_id: &str, analysis: F) -> Result<JobSummary, JobError>
    where
        F: Future<Output = Result<AnalysisOutcome, PipelineError>>,
    {
        match self.process(document_id, analysis).await {
            Ok(summary) => {
                tracing::info!(
                    document_id,
                    segmentation = ?summary.segmentation,
                    stored = summary.stored,
                    "Document analysed"
                );
                Ok(summary)
            }
            Err(error) => {
                tracing::error!(document_id, error = %error, "Document analysis failed");
                if let Err(status_error) = self
                    .status
                    .update(document_id, DocumentStatus::Failed)
                    .await
                {
                    tracing::warn!(
                        document_id,
                        error = %status_error,
                        "Failed to record document failure; stored status may be stale"
                    );
                }
                Err(error)
            }
        }
    }

    async fn process<F>(&self, document_id: &str, analysis: F) -> Result<JobSummary, JobError>
    where
        F: Future<Output = Result<AnalysisOutcome, PipelineError>>,
    {
        self.status
            .update(document_id, DocumentStatus::Processing)
            .await?;
        let summary = self.store(document_id, analysis).await?;
        self.status
            .update(document_id, DocumentStatus::Analyzed)
            .await?;
        Ok(summary)
    }

    async fn store<F>(&self, document_id: &str, analysis: F) -> Result<JobSummary, JobError>
    where
        F: Future<Output = Result<AnalysisOutcome, PipelineError>>,
    {
        let outcome = analysis.await?;
        let segmentation = outcome.segmentation();
        let records = StoredClause::from_outcome(document_id, outcome);
        if !records.is_empty() {
            self.sink.insert_many(&records).await?;
        }
        Ok(JobSummary {
            document_id: document_id.to_string(),
            segmentation,
            stored: records.len(),
        })
    }
}
