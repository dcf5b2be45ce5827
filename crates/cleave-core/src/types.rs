use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CleaveError;

pub type Result<T> = std::result::Result<T, CleaveError>;

pub const CHECKSUM_LEN: usize = 32;

/// Metadata for one chunk of the input stream.
///
/// `compression_ratio`, `processing_time` and `worker_id` start out as
/// `None` and are filled exactly once by the executor that compressed the
/// chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    pub id: u64,
    pub offset: u64,
    pub length: u32,
    pub checksum: [u8; CHECKSUM_LEN],
    pub compression_ratio: Option<f64>,
    pub processing_time: Option<f64>,
    pub worker_id: Option<String>,
}

impl ChunkDescriptor {
    pub fn new(id: u64, offset: u64, data: &[u8]) -> Self {
        Self {
            id,
            offset,
            length: data.len() as u32,
            checksum: checksum(data),
            compression_ratio: None,
            processing_time: None,
            worker_id: None,
        }
    }

    pub fn end_offset(&self) -> u64 {
        self.offset + u64::from(self.length)
    }

    pub fn verify(&self, data: &[u8]) -> bool {
        data.len() == self.length as usize && checksum(data) == self.checksum
    }
}

pub fn checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    Sha256::digest(data).into()
}

/// A chunk queued for compression: pristine descriptor plus raw payload.
#[derive(Debug, Clone)]
pub struct ChunkTask {
    pub descriptor: ChunkDescriptor,
    pub raw: Bytes,
}

/// A successfully compressed chunk, descriptor metrics filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkResult {
    pub descriptor: ChunkDescriptor,
    pub compressed: Vec<u8>,
}

/// A chunk that exhausted its retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub descriptor: ChunkDescriptor,
    pub attempts: u32,
    pub error: String,
}

/// Running totals for a streaming or file operation.
#[derive(Debug, Clone)]
pub struct StreamState {
    pub position: u64,
    pub chunk_count: u64,
    pub bytes_processed: u64,
    pub bytes_compressed: u64,
    pub started_at: Instant,
    pub errors: Vec<String>,
}

impl StreamState {
    pub fn new() -> Self {
        Self {
            position: 0,
            chunk_count: 0,
            bytes_processed: 0,
            bytes_compressed: 0,
            started_at: Instant::now(),
            errors: Vec::new(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Bytes processed per second since the operation started.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.bytes_processed as f64 / secs
    }

    /// Original over compressed size; 1.0 before any chunk completes.
    pub fn compression_ratio(&self) -> f64 {
        if self.bytes_compressed == 0 {
            return 1.0;
        }
        self.bytes_processed as f64 / self.bytes_compressed as f64
    }

    pub fn record_chunk(&mut self, original: u64, compressed: u64) {
        self.position += original;
        self.chunk_count += 1;
        self.bytes_processed += original;
        self.bytes_compressed += compressed;
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_checksum_verifies() {
        let data = b"hello chunk";
        let descriptor = ChunkDescriptor::new(0, 0, data);
        assert_eq!(descriptor.length, data.len() as u32);
        assert!(descriptor.verify(data));
        assert!(!descriptor.verify(b"hello chunk!"));
        assert!(!descriptor.verify(b"hello Chunk"));
    }

    #[test]
    fn stream_state_accounting() {
        let mut state = StreamState::new();
        state.record_chunk(100, 40);
        state.record_chunk(50, 30);
        assert_eq!(state.position, 150);
        assert_eq!(state.chunk_count, 2);
        assert_eq!(state.bytes_processed, 150);
        assert_eq!(state.bytes_compressed, 70);
        assert!((state.compression_ratio() - 150.0 / 70.0).abs() < 1e-9);
    }
}
