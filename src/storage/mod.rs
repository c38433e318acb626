//! Persistence seams for analysis results and document status.
//!
//! The pipeline never talks to a database directly. Finished analyses go to an
//! [`AnalysisSink`] and lifecycle transitions to a [`StatusReporter`]; the binary wires a JSON
//! lines file and the tracing log, deployments can plug in their own stores.

mod jsonl;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::processing::{AnalysisOutcome, ChapterAnalysis, ClauseAnalysis};

pub use jsonl::JsonlAnalysisSink;

/// Errors raised by sinks and status reporters.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The backing file could not be written.
    #[error("failed to write '{path}': {source}")]
    Io {
        /// Destination path.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// A record could not be encoded.
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    /// A custom backend rejected the operation.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Lifecycle of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Stored, not yet scheduled.
    Uploaded,
    /// Scheduled for analysis.
    QueuedForAnalysis,
    /// Analysis in progress.
    Processing,
    /// Analysis finished, possibly without usable clauses.
    Analyzed,
    /// Analysis aborted by a fatal error.
    Failed,
}

impl DocumentStatus {
    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::QueuedForAnalysis => "queued_for_analysis",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Analyzed => "analyzed",
            DocumentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analysis payload of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StoredRecord {
    /// Result of the chapter path, with chapter name and page range.
    Chapter(ChapterAnalysis),
    /// Result of the page path.
    Clause(ClauseAnalysis),
}

/// One persisted analysis, keyed by the document it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredClause {
    /// Owning document.
    pub document_id: String,
    /// Analysis fields, flattened next to the id.
    #[serde(flatten)]
    pub record: StoredRecord,
}

impl StoredClause {
    /// Turn a document outcome into records ready for insertion, preserving order.
    pub fn from_outcome(document_id: &str, outcome: AnalysisOutcome) -> Vec<StoredClause> {
        let wrap = |record| StoredClause {
            document_id: document_id.to_string(),
            record,
        };
        match outcome {
            AnalysisOutcome::PerPage(items) => items
                .into_iter()
                .map(StoredRecord::Clause)
                .map(wrap)
                .collect(),
            AnalysisOutcome::PerChapter(items) => items
                .into_iter()
                .map(StoredRecord::Chapter)
                .map(wrap)
                .collect(),
        }
    }
}

/// Destination for finished analyses.
#[async_trait]
pub trait AnalysisSink: Send + Sync {
    /// Persist every record in one call.
    async fn insert_many(&self, records: &[StoredClause]) -> Result<(), SinkError>;
}

/// Receiver of document lifecycle transitions.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Record that `document_id` moved to `status`.
    async fn update(&self, document_id: &str, status: DocumentStatus) -> Result<(), SinkError>;
}

/// Status reporter that only writes the transition to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusReporter;

#[async_trait]
impl StatusReporter for TracingStatusReporter {
    async fn update(&self, document_id: &str, status: DocumentStatus) -> Result<(), SinkError> {
        tracing::info!(document_id, status = %status, "Document status changed");
        Ok(())
    }
}
