#![deny(missing_docs)]

//! Core library for the Terms & Conditions clause-risk analyzer.

/// Environment-driven configuration management.
pub mod config;
/// Analysis jobs tracking document status and persisting results.
pub mod jobs;
/// Structured logging and tracing setup.
pub mod logging;
/// Clause classification oracle and its Ollama adapter.
pub mod oracle;
/// PDF layout extraction and chapter detection.
pub mod parsing;
/// Clause analysis pipeline utilities.
pub mod processing;
/// Sliding-window rate limiting for oracle calls.
pub mod rate_limit;
/// Result sinks and document status reporting.
pub mod storage;
