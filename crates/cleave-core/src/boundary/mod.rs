mod content;
pub mod entropy;
mod rolling;

pub use rolling::{RollingHash, WINDOW_SIZE};

use bytes::Bytes;

use crate::config::{ChunkStrategy, ChunkingConfig};
use crate::types::{ChunkDescriptor, Result};

/// Per-strategy boundary detection state.
///
/// `find_cut` expects either at least `max_size` bytes of lookahead or
/// `at_end == true`, so every call resolves to a cut without rescanning.
/// Rolling-hash state persists across chunks; only the chunk length
/// counter restarts at a boundary.
enum BoundaryFinder {
    Fixed,
    Rolling(RollingHash),
    Content,
}

impl BoundaryFinder {
    fn for_strategy(strategy: ChunkStrategy) -> Self {
        match strategy {
            ChunkStrategy::FixedSize => BoundaryFinder::Fixed,
            ChunkStrategy::RollingHash | ChunkStrategy::Adaptive => {
                BoundaryFinder::Rolling(RollingHash::new())
            }
            ChunkStrategy::ContentAware => BoundaryFinder::Content,
        }
    }

    fn find_cut(&mut self, config: &ChunkingConfig, data: &[u8], at_end: bool) -> usize {
        debug_assert!(!data.is_empty());
        debug_assert!(at_end || data.len() >= config.max_size);
        match self {
            BoundaryFinder::Fixed => config.target_size.min(data.len()),
            BoundaryFinder::Rolling(hash) => {
                // The hash test is skipped for the first min_size bytes of
                // every chunk, so the modulus covers only the remaining
                // distance to target; the expected chunk length is then
                // target_size rather than min_size + target_size.
                let modulus = (config.target_size - config.min_size).max(1) as u64;
                for (i, &byte) in data.iter().enumerate() {
                    hash.roll(byte);
                    let len = i + 1;
                    if len >= config.max_size {
                        return len;
                    }
                    if len >= config.min_size && hash.value() % modulus == 0 {
                        return len;
                    }
                }
                data.len()
            }
            BoundaryFinder::Content => {
                if data.len() <= config.min_size {
                    return data.len();
                }
                match content::find_structural_cut(&data[config.min_size..]) {
                    Some(relative) => config.min_size + relative,
                    None => config.target_size.min(data.len()),
                }
            }
        }
    }
}

/// Shared cut-and-describe driver behind the slice, sync-stream and
/// async-stream chunkers.
pub(crate) struct ChunkCutter {
    effective: ChunkingConfig,
    finder: BoundaryFinder,
    next_id: u64,
    offset: u64,
    resolved: bool,
}

impl ChunkCutter {
    /// `config` must already be validated.
    pub(crate) fn new(config: &ChunkingConfig) -> Self {
        Self {
            effective: *config,
            finder: BoundaryFinder::for_strategy(config.strategy),
            next_id: 0,
            offset: 0,
            resolved: config.strategy != ChunkStrategy::Adaptive,
        }
    }

    /// Fixes the adaptive target from a leading sample. Idempotent; no-op
    /// for non-adaptive strategies.
    pub(crate) fn resolve(&mut self, sample: &[u8]) {
        if self.resolved {
            return;
        }
        let scaled = entropy::scale_target(&self.effective, sample);
        tracing::debug!(
            original = self.effective.target_size,
            scaled,
            "adaptive chunk target resolved"
        );
        self.effective.target_size = scaled;
        self.resolved = true;
    }

    /// Next cut length, or `None` when `data` is empty or more input is
    /// needed (`!eof` and fewer than `max_size` bytes buffered).
    pub(crate) fn cut(&mut self, data: &[u8], eof: bool) -> Option<usize> {
        debug_assert!(self.resolved);
        if data.is_empty() {
            return None;
        }
        if !eof && data.len() < self.effective.max_size {
            return None;
        }
        let lookahead = data.len().min(self.effective.max_size);
        let at_end = eof && lookahead == data.len();
        Some(self.finder.find_cut(&self.effective, &data[..lookahead], at_end))
    }

    pub(crate) fn describe(&mut self, raw: &[u8]) -> ChunkDescriptor {
        let descriptor = ChunkDescriptor::new(self.next_id, self.offset, raw);
        self.next_id += 1;
        self.offset += raw.len() as u64;
        descriptor
    }

    /// How many bytes a streaming caller should buffer before calling
    /// [`resolve`](Self::resolve) and [`cut`](Self::cut). Until an adaptive
    /// target is resolved this covers the full entropy sample, so the
    /// verdict does not depend on the source's read granularity.
    pub(crate) fn fill_goal(&self) -> usize {
        if self.resolved {
            self.effective.max_size
        } else {
            self.effective.max_size.max(entropy::SAMPLE_LEN)
        }
    }
}

/// Splits byte slices into chunks according to a [`ChunkingConfig`].
///
/// `chunks` is lazy and restartable: every call starts a fresh pass over
/// the source with fresh ids and offsets.
pub struct ChunkEngine {
    config: ChunkingConfig,
}

impl ChunkEngine {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn chunks<'a>(&self, source: &'a [u8]) -> ChunkIter<'a> {
        let mut cutter = ChunkCutter::new(&self.config);
        cutter.resolve(source);
        ChunkIter {
            source,
            pos: 0,
            cutter,
        }
    }
}

pub struct ChunkIter<'a> {
    source: &'a [u8],
    pos: usize,
    cutter: ChunkCutter,
}

impl Iterator for ChunkIter<'_> {
    type Item = (Bytes, ChunkDescriptor);

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = &self.source[self.pos..];
        let cut = self.cutter.cut(remaining, true)?;
        let raw = &remaining[..cut];
        let descriptor = self.cutter.describe(raw);
        self.pos += cut;
        tracing::trace!(
            id = descriptor.id,
            offset = descriptor.offset,
            length = descriptor.length,
            "chunk boundary"
        );
        Some((Bytes::copy_from_slice(raw), descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(strategy: ChunkStrategy) -> ChunkingConfig {
        ChunkingConfig::with_bounds(strategy, 256, 64, 1024)
    }

    fn sample_data(len: usize) -> Vec<u8> {
        // xorshift, cheap deterministic filler
        let mut state = 0x9E3779B97F4A7C15u64;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                state as u8
            })
            .collect()
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        for strategy in [
            ChunkStrategy::FixedSize,
            ChunkStrategy::RollingHash,
            ChunkStrategy::ContentAware,
            ChunkStrategy::Adaptive,
        ] {
            let engine = ChunkEngine::new(config(strategy)).unwrap();
            assert_eq!(engine.chunks(&[]).count(), 0);
        }
    }

    #[test]
    fn short_input_is_single_chunk() {
        let engine = ChunkEngine::new(config(ChunkStrategy::RollingHash)).unwrap();
        let data = sample_data(40);
        let chunks: Vec<_> = engine.chunks(&data).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(&chunks[0].0[..], &data[..]);
        assert_eq!(chunks[0].1.length, 40);
    }

    #[test]
    fn fixed_size_cuts_at_target() {
        let engine = ChunkEngine::new(config(ChunkStrategy::FixedSize)).unwrap();
        let data = sample_data(1000);
        let lengths: Vec<u32> = engine.chunks(&data).map(|(_, d)| d.length).collect();
        assert_eq!(lengths, vec![256, 256, 256, 232]);
    }

    #[test]
    fn chunks_cover_source_contiguously() {
        let data = sample_data(10_000);
        for strategy in [
            ChunkStrategy::FixedSize,
            ChunkStrategy::RollingHash,
            ChunkStrategy::ContentAware,
            ChunkStrategy::Adaptive,
        ] {
            let engine = ChunkEngine::new(config(strategy)).unwrap();
            let mut expected_offset = 0u64;
            let mut expected_id = 0u64;
            for (raw, descriptor) in engine.chunks(&data) {
                assert_eq!(descriptor.id, expected_id);
                assert_eq!(descriptor.offset, expected_offset);
                assert!(descriptor.verify(&raw));
                expected_id += 1;
                expected_offset = descriptor.end_offset();
            }
            assert_eq!(expected_offset, data.len() as u64);
        }
    }

    #[test]
    fn size_bounds_hold_for_all_but_last() {
        let data = sample_data(50_000);
        let cfg = config(ChunkStrategy::RollingHash);
        let engine = ChunkEngine::new(cfg).unwrap();
        let descriptors: Vec<_> = engine.chunks(&data).map(|(_, d)| d).collect();
        for (i, descriptor) in descriptors.iter().enumerate() {
            assert!((descriptor.length as usize) <= cfg.max_size);
            if i + 1 < descriptors.len() {
                assert!((descriptor.length as usize) >= cfg.min_size);
            }
        }
    }

    #[test]
    fn rolling_hash_is_deterministic() {
        let data = sample_data(20_000);
        let engine = ChunkEngine::new(config(ChunkStrategy::RollingHash)).unwrap();
        let first: Vec<u64> = engine.chunks(&data).map(|(_, d)| d.offset).collect();
        let second: Vec<u64> = engine.chunks(&data).map(|(_, d)| d.offset).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn content_aware_prefers_paragraph_breaks() {
        let mut data = Vec::new();
        for i in 0..40 {
            data.extend_from_slice(format!("paragraph number {i} with filler text\n\n").as_bytes());
        }
        let engine = ChunkEngine::new(config(ChunkStrategy::ContentAware)).unwrap();
        let chunks: Vec<_> = engine.chunks(&data).collect();
        assert!(chunks.len() > 1);
        for (raw, _) in &chunks[..chunks.len() - 1] {
            assert!(raw.ends_with(b"\n\n"));
        }
    }
}
