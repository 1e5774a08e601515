//! Embedding batch sizing and commit cadence.
//!
//! Batches are sized so that a single embedding request stays under the
//! model's token ceiling, assuming chunks of `chunk_size` characters.

use docbase_core::RagConfig;

/// Records inserted between intermediate commits during ingestion.
pub const INSERT_COMMIT_EVERY: usize = 1000;

/// Child deletions between intermediate commits during delete.
pub const DELETE_COMMIT_EVERY: usize = 10;

/// Successful files between folder progress events.
pub const FOLDER_PROGRESS_EVERY: usize = 5;

/// Number of chunks embedded per request for the given chunk size.
///
/// `min(embed_batch_size, floor(token_budget * token_safety_factor / chunk_size))`,
/// never less than one.
///
/// Each character of a chunk is counted as one token. There is no
/// four-characters-per-token discount, so at the default budget a chunk size
/// of 1000 gives batches of 6 rather than 20.
pub fn embed_batch_size(chunk_size: usize, config: &RagConfig) -> usize {
    let chunk_size = chunk_size.max(1);
    let budget = config.token_budget as f64 * config.token_safety_factor;
    let fitting = (budget / chunk_size as f64).floor() as usize;

    config.embed_batch_size.min(fitting).max(1)
}

/// How a document's chunks are split into embedding requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    /// Chunks per embedding request
    pub batch_size: usize,

    /// Number of embedding requests
    pub batch_count: usize,

    /// Log progress every this many batches
    pub log_interval: usize,
}

impl BatchPlan {
    /// Plan batches for `chunk_count` chunks of `chunk_size` characters.
    pub fn new(chunk_count: usize, chunk_size: usize, config: &RagConfig) -> Self {
        let batch_size = embed_batch_size(chunk_size, config);
        let batch_count = chunk_count.div_ceil(batch_size);
        let log_interval = (batch_count / 10).max(1);

        Self {
            batch_size,
            batch_count,
            log_interval,
        }
    }

    /// Whether the batch at `index` (zero-based) should be logged.
    pub fn should_log(&self, index: usize) -> bool {
        (index + 1) % self.log_interval == 0 || index + 1 == self.batch_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_large_chunks() {
        let config = RagConfig::default();
        assert_eq!(embed_batch_size(1000, &config), 6);
    }

    #[test]
    fn test_batch_size_small_chunks_capped_by_nominal() {
        let config = RagConfig::default();
        assert_eq!(embed_batch_size(100, &config), 20);
    }

    #[test]
    fn test_batch_size_never_zero() {
        let config = RagConfig::default();
        assert_eq!(embed_batch_size(100_000, &config), 1);
        assert_eq!(embed_batch_size(0, &config), 20);
    }

    #[test]
    fn test_batch_size_follows_bound() {
        let config = RagConfig::default();
        for c in [1usize, 50, 307, 512, 999, 1000, 2048, 6144, 6145] {
            let expected = 20usize.min(6144 / c).max(1);
            assert_eq!(embed_batch_size(c, &config), expected, "chunk size {}", c);
        }
    }

    #[test]
    fn test_batch_plan() {
        let config = RagConfig::default();
        let plan = BatchPlan::new(13, 1000, &config);
        assert_eq!(plan.batch_size, 6);
        assert_eq!(plan.batch_count, 3);
        assert_eq!(plan.log_interval, 1);

        let plan = BatchPlan::new(2000, 100, &config);
        assert_eq!(plan.batch_count, 100);
        assert_eq!(plan.log_interval, 10);
        assert!(plan.should_log(9));
        assert!(!plan.should_log(10));
        assert!(plan.should_log(99));
    }

    #[test]
    fn test_empty_plan() {
        let plan = BatchPlan::new(0, 1000, &RagConfig::default());
        assert_eq!(plan.batch_count, 0);
        assert_eq!(plan.log_interval, 1);
    }
}
