//! Partitioning of per-chunk outcomes.

use super::types::Validity;

/// Per-chunk outcomes of one run split into disjoint, order-preserving buckets.
#[derive(Debug)]
pub struct CategorizedResults<T, E> {
    /// Coherent analyses.
    pub successful: Vec<T>,
    /// Analyses the oracle flagged as incoherent source text.
    pub invalid: Vec<T>,
    /// Chunks whose oracle call failed for good.
    pub failed: Vec<E>,
}

/// Sort every outcome into the successful, invalid, or failed bucket.
pub fn categorise<T, E>(results: impl IntoIterator<Item = Result<T, E>>) -> CategorizedResults<T, E>
where
    T: Validity,
{
    let mut categorized = CategorizedResults {
        successful: Vec::new(),
        invalid: Vec::new(),
        failed: Vec::new(),
    };
    for result in results {
        match result {
            Err(error) => categorized.failed.push(error),
            Ok(item) if !item.is_valid() => categorized.invalid.push(item),
            Ok(item) => categorized.successful.push(item),
        }
    }
    categorized
}
