use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

use crate::parsing::ParserSettings;
use crate::processing::AnalyzerSettings;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_MODEL: &str = "llama3.1";
const DEFAULT_OUTPUT_PATH: &str = "analysis.jsonl";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the analyzer.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the Ollama-compatible runtime answering clause prompts.
    pub ollama_url: String,
    /// Model identifier passed to the oracle.
    pub llm_model_name: String,
    /// Sampling temperature for oracle calls.
    pub llm_temperature: f32,
    /// Per-request HTTP timeout for oracle calls, in seconds.
    pub llm_request_timeout_secs: u64,
    /// Maximum chunk length in characters before a unit is split.
    pub llm_max_chapter_length: usize,
    /// Overlap in characters between consecutive chunks.
    pub llm_chunk_overlap: usize,
    /// Admissions per sliding minute granted by the rate limiter.
    pub llm_requests_per_minute: u32,
    /// Maximum number of oracle calls in flight within one run.
    pub llm_max_concurrent: usize,
    /// Attempts per chunk before giving up.
    pub llm_max_retries: u32,
    /// Base of the exponential backoff, in seconds.
    pub llm_retry_backoff_base: f64,
    /// Optional Redis URL for the shared rate-limit window.
    pub redis_url: Option<String>,
    /// Chapters must be strictly longer than this to be emitted.
    pub parser_min_chapter_length: usize,
    /// Headings must be strictly shorter than this.
    pub parser_max_heading_length: usize,
    /// Headings may contain at most this many words.
    pub parser_max_words_per_heading: usize,
    /// JSON-lines file receiving stored analyses.
    pub analysis_output_path: String,
    /// Optional log file overriding the default `logs/` location.
    pub log_file: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            llm_model_name: load_env_optional("LLM_MODEL_NAME")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm_temperature: parse_or("LLM_TEMPERATURE", 0.2)?,
            llm_request_timeout_secs: parse_or("LLM_REQUEST_TIMEOUT_SECS", 120)?,
            llm_max_chapter_length: parse_or("LLM_MAX_CHAPTER_LENGTH", 8000)?,
            llm_chunk_overlap: parse_or("LLM_CHUNK_OVERLAP", 150)?,
            llm_requests_per_minute: parse_or("LLM_REQUESTS_PER_MINUTE", 15)?,
            llm_max_concurrent: parse_or("LLM_MAX_CONCURRENT", 2)?,
            llm_max_retries: parse_or("LLM_MAX_RETRIES", 3)?,
            llm_retry_backoff_base: parse_or("LLM_RETRY_BACKOFF_BASE", 1.0)?,
            redis_url: load_env_optional("REDIS_URL"),
            parser_min_chapter_length: parse_or("PARSER_MIN_CHAPTER_LENGTH", 100)?,
            parser_max_heading_length: parse_or("PARSER_MAX_HEADING_LENGTH", 100)?,
            parser_max_words_per_heading: parse_or("PARSER_MAX_WORDS_PER_HEADING", 5)?,
            analysis_output_path: load_env_optional("ANALYSIS_OUTPUT_PATH")
                .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string()),
            log_file: load_env_optional("TC_ANALYZER_LOG_FILE"),
        })
    }

    /// Heading and chapter thresholds for the chapter detector.
    pub fn parser_settings(&self) -> ParserSettings {
        ParserSettings {
            min_chapter_length: self.parser_min_chapter_length,
            max_heading_length: self.parser_max_heading_length,
            max_words_per_heading: self.parser_max_words_per_heading,
        }
    }

    /// Chunking, concurrency, and retry knobs for the clause analyzer.
    pub fn analyzer_settings(&self) -> AnalyzerSettings {
        AnalyzerSettings {
            max_chunk_length: self.llm_max_chapter_length,
            chunk_overlap: self.llm_chunk_overlap,
            max_concurrent: self.llm_max_concurrent,
            max_retries: self.llm_max_retries,
            backoff_base_secs: self.llm_retry_backoff_base,
        }
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    parse_value(key, load_env_optional(key), default)
}

fn parse_value<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
///
/// Runs before tracing is installed, so nothing is logged here.
pub fn init_config() -> Result<(), ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let _ = CONFIG.set(config);
    Ok(())
}
