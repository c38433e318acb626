//! Chunk-level oracle calls with pacing and retries, fanned out per document.

use std::sync::Arc;
use std::time::Duration;

use super::categorize::{CategorizedResults, categorise};
use super::chunking::split_text;
use super::limiter::ConcurrencyLimiter;
use super::types::{
    AnalyzerError, AnalyzerSettings, ChapterAnalysis, ChunkingError, ClauseAnalysis, Validity,
};
use crate::oracle::{ClauseOracle, OracleInput};
use crate::parsing::DocumentChapter;
use crate::rate_limit::{LLM_LIMIT_KEY, RateLimiter};

/// Classifies document text through a [`ClauseOracle`] under rate, concurrency, and retry
/// policies.
pub struct ClauseAnalyzer {
    oracle: Arc<dyn ClauseOracle>,
    rate_limiter: Arc<dyn RateLimiter>,
    settings: AnalyzerSettings,
    limiter: ConcurrencyLimiter,
}

impl ClauseAnalyzer {
    /// Build an analyzer around an oracle and a shared rate limiter.
    pub fn new(
        oracle: Arc<dyn ClauseOracle>,
        rate_limiter: Arc<dyn RateLimiter>,
        settings: AnalyzerSettings,
    ) -> Self {
        Self {
            oracle,
            rate_limiter,
            limiter: ConcurrencyLimiter::new(settings.max_concurrent),
            settings,
        }
    }

    /// Active settings.
    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Classify one chunk, retrying transient oracle failures.
    ///
    /// Each attempt is preceded by an advisory rate-limit check; when the window is full the
    /// call waits one backoff period and then proceeds without checking again. After
    /// `max_retries` failed attempts the last oracle error is returned inside
    /// [`AnalyzerError::RetriesExhausted`].
    pub async fn analyze_chunk(
        &self,
        text: &str,
        user_context: &str,
    ) -> Result<ClauseAnalysis, AnalyzerError> {
        let max_attempts = self.settings.max_retries.max(1);
        let input = OracleInput {
            text: text.to_string(),
            user_context: user_context.to_string(),
        };

        let mut attempt = 1;
        loop {
            self.wait_for_slot(attempt).await;
            match self.oracle.invoke(&input).await {
                Ok(analysis) => return Ok(analysis),
                Err(error) if attempt >= max_attempts => {
                    return Err(AnalyzerError::RetriesExhausted {
                        attempts: attempt,
                        source: error,
                    });
                }
                Err(error) => {
                    let delay = backoff_delay(self.settings.backoff_base_secs, attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Clause analysis attempt failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Analyse a document page by page.
    ///
    /// Blank pages are skipped and long pages are chunked. Returns only the coherent analyses;
    /// when none succeed the failure is logged and the list is empty.
    pub async fn analyze_document_per_page<I>(
        &self,
        pages: I,
        user_context: &str,
    ) -> Result<Vec<ClauseAnalysis>, ChunkingError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut chunks = Vec::new();
        for page in pages {
            if page.trim().is_empty() {
                continue;
            }
            chunks.extend(self.split(&page)?);
        }
        tracing::debug!(chunks = chunks.len(), "Dispatching page chunks");

        let results = self
            .limiter
            .execute(
                chunks
                    .iter()
                    .map(|chunk| self.analyze_chunk(chunk, user_context)),
            )
            .await;
        Ok(keep_successful("page", results))
    }

    /// Analyse a document chapter by chapter.
    ///
    /// Every chunk result carries the name and page range of the chapter it was cut from.
    pub async fn analyze_document_per_chapter<I>(
        &self,
        chapters: I,
        user_context: &str,
    ) -> Result<Vec<ChapterAnalysis>, ChunkingError>
    where
        I: IntoIterator<Item = DocumentChapter>,
    {
        let mut chunks = Vec::new();
        for chapter in chapters {
            if chapter.chapter_text.trim().is_empty() {
                continue;
            }
            let pieces = self.split(&chapter.chapter_text)?;
            let chapter = Arc::new(chapter);
            chunks.extend(pieces.into_iter().map(|piece| (Arc::clone(&chapter), piece)));
        }
        tracing::debug!(chunks = chunks.len(), "Dispatching chapter chunks");

        let results = self
            .limiter
            .execute(chunks.iter().map(|(chapter, chunk)| async move {
                self.analyze_chunk(chunk, user_context)
                    .await
                    .map(|analysis| ChapterAnalysis::new(chapter, analysis))
            }))
            .await;
        Ok(keep_successful("chapter", results))
    }

    fn split(&self, text: &str) -> Result<Vec<String>, ChunkingError> {
        split_text(
            text,
            self.settings.max_chunk_length,
            self.settings.chunk_overlap,
        )
    }

    async fn wait_for_slot(&self, attempt: u32) {
        match self.rate_limiter.is_allowed(LLM_LIMIT_KEY).await {
            Ok(true) => {}
            Ok(false) => {
                let delay = backoff_delay(self.settings.backoff_base_secs, attempt);
                tracing::info!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limit reached; waiting before oracle call"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => {
                tracing::warn!(error = %error, "Rate limiter unavailable; calling oracle unpaced");
            }
        }
    }
}

/// Wait after attempt `attempt`: `base * 3^attempt` seconds.
pub(crate) fn backoff_delay(base_secs: f64, attempt: u32) -> Duration {
    let secs = base_secs * 3f64.powi(attempt.min(32) as i32);
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

fn keep_successful<T: Validity>(unit: &str, results: Vec<Result<T, AnalyzerError>>) -> Vec<T> {
    let CategorizedResults {
        successful,
        invalid,
        failed,
    } = categorise(results);
    tracing::info!(
        unit,
        successful = successful.len(),
        invalid = invalid.len(),
        failed = failed.len(),
        "Clause analysis finished"
    );
    if successful.is_empty() {
        tracing::error!(unit, "No clause could be analysed successfully");
        return Vec::new();
    }
    successful
}
