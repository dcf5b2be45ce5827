use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CleaveError;
use crate::types::Result;

/// How chunk boundaries are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Cut every `target_size` bytes.
    FixedSize,
    /// Rabin-style rolling hash, cut where the hash divides `target_size`.
    RollingHash,
    /// Cut after structural byte patterns, falling back to `target_size`.
    ContentAware,
    /// Entropy-scaled target, then RollingHash.
    Adaptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub strategy: ChunkStrategy,
    pub target_size: usize,
    pub min_size: usize,
    pub max_size: usize,
}

pub const DEFAULT_TARGET_SIZE: usize = 64 * 1024;

impl ChunkingConfig {
    /// Config with min/max derived from the target (target/4 and target*4).
    pub fn new(strategy: ChunkStrategy, target_size: usize) -> Self {
        Self {
            strategy,
            target_size,
            min_size: (target_size / 4).max(1),
            max_size: target_size.saturating_mul(4),
        }
    }

    pub fn with_bounds(
        strategy: ChunkStrategy,
        target_size: usize,
        min_size: usize,
        max_size: usize,
    ) -> Self {
        Self {
            strategy,
            target_size,
            min_size,
            max_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_size == 0 || self.target_size == 0 || self.max_size == 0 {
            return Err(CleaveError::Boundary("chunk sizes must be nonzero"));
        }
        if self.min_size > self.target_size || self.target_size > self.max_size {
            return Err(CleaveError::Boundary(
                "chunk sizes must satisfy min <= target <= max",
            ));
        }
        if self.max_size > u32::MAX as usize {
            return Err(CleaveError::Boundary("max chunk size exceeds u32 range"));
        }
        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::new(ChunkStrategy::RollingHash, DEFAULT_TARGET_SIZE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub worker_count: usize,
    /// Registered backend name, resolved once at executor construction.
    pub backend: String,
    pub max_retries: u32,
    pub retry_base: Duration,
}

impl ExecutorConfig {
    pub fn new(worker_count: usize, backend: impl Into<String>) -> Self {
        Self {
            worker_count: worker_count.max(1),
            backend: backend.into(),
            max_retries: 3,
            retry_base: Duration::from_millis(10),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(workers, "zstd")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_bounds() {
        let config = ChunkingConfig::new(ChunkStrategy::RollingHash, 4096);
        assert_eq!(config.min_size, 1024);
        assert_eq!(config.max_size, 16384);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_bounds() {
        let config = ChunkingConfig::with_bounds(ChunkStrategy::FixedSize, 100, 200, 400);
        assert!(config.validate().is_err());
        let config = ChunkingConfig::with_bounds(ChunkStrategy::FixedSize, 0, 0, 0);
        assert!(config.validate().is_err());
    }
}
