//! Structured clause-classification oracle.
//!
//! The pipeline only depends on [`ClauseOracle`]: one call per chunk, `{text, user_context}` in,
//! a [`ClauseAnalysis`] out. The bundled adapter talks to an Ollama-compatible runtime and asks
//! it for JSON constrained by the `ClauseAnalysis` schema.

mod ollama;
pub mod prompt;

use async_trait::async_trait;
use thiserror::Error;

use crate::processing::ClauseAnalysis;

pub use ollama::OllamaClauseOracle;

/// Errors surfaced by an oracle call. All of them are treated as transient and retried.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The runtime could not be reached or does not expose the endpoint.
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
    /// The runtime answered with an error status.
    #[error("Failed to classify clause: {0}")]
    GenerationFailed(String),
    /// The answer could not be decoded into a clause analysis.
    #[error("Malformed oracle response: {0}")]
    InvalidResponse(String),
}

/// Inputs for a single classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleInput {
    /// Chunk of clause text.
    pub text: String,
    /// Free-text context supplied by the user; may be empty.
    pub user_context: String,
}

/// Service classifying one chunk of Terms & Conditions text.
#[async_trait]
pub trait ClauseOracle: Send + Sync {
    /// Classify the chunk and return the structured verdict.
    async fn invoke(&self, input: &OracleInput) -> Result<ClauseAnalysis, OracleError>;
}
