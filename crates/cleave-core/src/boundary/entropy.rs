use crate::config::ChunkingConfig;

/// Bytes of leading input sampled to classify entropy.
pub const SAMPLE_LEN: usize = 64 * 1024;

/// Below this many bits per byte the input is considered highly redundant.
const LOW_ENTROPY_BITS: f64 = 3.0;
/// Above this many bits per byte the input is considered near-incompressible.
const HIGH_ENTROPY_BITS: f64 = 7.0;

/// Shannon entropy of `data` in bits per byte (0.0 for empty input).
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut counts = [0u64; 256];
    for &byte in data {
        counts[byte as usize] += 1;
    }
    let len = data.len() as f64;
    counts
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Target size scaled by the entropy of a leading sample: redundant input
/// gets larger chunks, high-entropy input smaller ones. Clamped to the
/// configured min/max so the bounds invariant holds unchanged.
pub(crate) fn scale_target(config: &ChunkingConfig, sample: &[u8]) -> usize {
    let sample = &sample[..sample.len().min(SAMPLE_LEN)];
    let bits = shannon_entropy(sample);
    let scaled = if bits < LOW_ENTROPY_BITS {
        config.target_size.saturating_mul(2)
    } else if bits > HIGH_ENTROPY_BITS {
        config.target_size / 2
    } else {
        config.target_size
    };
    scaled.clamp(config.min_size, config.max_size)
}
