//! Clause analysis pipeline: chunking, bounded fan-out, retries, and categorization.

mod analyzer;
pub mod categorize;
pub mod chunking;
pub mod limiter;
mod service;
pub mod types;

pub use analyzer::ClauseAnalyzer;
pub use categorize::{CategorizedResults, categorise};
pub use chunking::{DEFAULT_CHUNK_OVERLAP, split_text};
pub use limiter::ConcurrencyLimiter;
pub use service::AnalyzerService;
pub use types::{
    AnalysisOutcome, AnalyzerError, AnalyzerSettings, ChapterAnalysis, ChunkingError,
    ClauseAnalysis, PipelineError, RiskLevel, Segmentation, Validity,
};
