//! Core data types and error definitions for the analysis pipeline.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::oracle::OracleError;
use crate::parsing::{DocumentChapter, ParseError};

/// Consumer risk carried by a clause, from harmless to "avoid if possible".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Standard industry practice, no significant concerns.
    StandardPractice,
    /// Minor concerns, generally acceptable.
    Low,
    /// Some user-unfriendly terms, review recommended.
    Medium,
    /// Significant consumer risks, legal review advised.
    High,
    /// Extremely problematic, avoid if possible.
    Critical,
}

impl RiskLevel {
    /// Every level, least to most severe.
    pub const ALL: [RiskLevel; 5] = [
        RiskLevel::StandardPractice,
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    /// Wire name of the level.
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::StandardPractice => "standard_practice",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Analysis result for a Terms & Conditions clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClauseAnalysis {
    /// Categories of the clause (as few as possible).
    #[serde(default, deserialize_with = "null_as_empty")]
    #[schemars(with = "Option<Vec<String>>")]
    pub category: Vec<String>,
    /// Risk level for consumers.
    pub risk_level: RiskLevel,
    /// Reasoning for the risk level (short).
    #[serde(default)]
    pub reason: Option<String>,
    /// Key points from the clause (short and concise).
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Conclusion about the clause so the user understands how to proceed.
    pub conclusion: String,
    /// False when the clause text is incoherent (merged headings, gibberish).
    pub is_valid: bool,
}

/// Clause analysis of one chunk of a chapter, tagged with the chapter it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterAnalysis {
    /// Heading of the parent chapter.
    pub chapter_name: String,
    /// First page of the parent chapter.
    pub page_start: Option<usize>,
    /// Last page of the parent chapter.
    pub page_end: Option<usize>,
    /// Oracle verdict for the chunk.
    #[serde(flatten)]
    pub analysis: ClauseAnalysis,
}

impl ChapterAnalysis {
    /// Attach chapter metadata to a chunk-level analysis.
    pub fn new(chapter: &DocumentChapter, analysis: ClauseAnalysis) -> Self {
        Self {
            chapter_name: chapter.chapter_name.clone(),
            page_start: chapter.page_start,
            page_end: chapter.page_end,
            analysis,
        }
    }
}

/// Anything carrying the oracle's coherence verdict.
pub trait Validity {
    /// Whether the analysed text was coherent.
    fn is_valid(&self) -> bool;
}

impl Validity for ClauseAnalysis {
    fn is_valid(&self) -> bool {
        self.is_valid
    }
}

impl Validity for ChapterAnalysis {
    fn is_valid(&self) -> bool {
        self.analysis.is_valid
    }
}

/// Segmentation strategy chosen for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Segmentation {
    /// Heading-delimited chapters.
    Chapters,
    /// One unit per page.
    Pages,
}

/// Successful analyses of one document, shaped by the segmentation that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Results of the per-page path.
    PerPage(Vec<ClauseAnalysis>),
    /// Results of the per-chapter path.
    PerChapter(Vec<ChapterAnalysis>),
}

impl AnalysisOutcome {
    /// Strategy that produced the results.
    pub fn segmentation(&self) -> Segmentation {
        match self {
            AnalysisOutcome::PerPage(_) => Segmentation::Pages,
            AnalysisOutcome::PerChapter(_) => Segmentation::Chapters,
        }
    }

    /// Number of successful analyses.
    pub fn len(&self) -> usize {
        match self {
            AnalysisOutcome::PerPage(items) => items.len(),
            AnalysisOutcome::PerChapter(items) => items.len(),
        }
    }

    /// True when the document yielded no usable clauses.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tuning for chunking, fan-out, and retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerSettings {
    /// Units longer than this many characters are split.
    pub max_chunk_length: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Oracle calls allowed in flight at once.
    pub max_concurrent: usize,
    /// Attempts per chunk, including the first.
    pub max_retries: u32,
    /// Backoff base in seconds; the wait after attempt `n` is `base * 3^n`.
    pub backoff_base_secs: f64,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            max_chunk_length: 8000,
            chunk_overlap: 150,
            max_concurrent: 2,
            max_retries: 3,
            backoff_base_secs: 1.0,
        }
    }
}

/// Errors produced while splitting text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// A zero maximum length cannot hold any text.
    #[error("chunk length must be greater than zero")]
    InvalidChunkLength,
}

/// Terminal failure of a single chunk analysis.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Every attempt failed; carries the last oracle error.
    #[error("clause analysis failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Error returned by the final attempt.
        #[source]
        source: OracleError,
    },
}

/// Errors that abort a whole document analysis.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The PDF could not be read or decoded.
    #[error("Failed to parse document: {0}")]
    Parse(#[from] ParseError),
    /// Chunking configuration was unusable.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// The blocking extraction task did not complete.
    #[error("Document extraction task failed: {0}")]
    Extraction(#[from] tokio::task::JoinError),
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
