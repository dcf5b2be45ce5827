use std::io::Read;

use flate2::Compression;
use flate2::read::{DeflateDecoder, DeflateEncoder};

use crate::error::CleaveError;
use crate::types::Result;

pub struct DeflateBackend {
    level: Compression,
}

impl DeflateBackend {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }
}

impl Default for DeflateBackend {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl super::CompressionBackend for DeflateBackend {
    fn name(&self) -> &str {
        "deflate"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(data, self.level);
        let mut out = Vec::with_capacity(data.len() / 2 + 16);
        encoder
            .read_to_end(&mut out)
            .map_err(|e| CleaveError::backend("deflate", e.to_string()))?;
        Ok(out)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = DeflateDecoder::new(data);
        let mut out = Vec::with_capacity(data.len() * 2);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| CleaveError::backend("deflate", e.to_string()))?;
        Ok(out)
    }
}
