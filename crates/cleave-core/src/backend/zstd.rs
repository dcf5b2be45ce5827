use crate::error::CleaveError;
use crate::types::Result;

pub struct ZstdBackend {
    level: i32,
}

impl ZstdBackend {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdBackend {
    fn default() -> Self {
        Self {
            level: ::zstd::DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl super::CompressionBackend for ZstdBackend {
    fn name(&self) -> &str {
        "zstd"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        ::zstd::stream::encode_all(data, self.level)
            .map_err(|e| CleaveError::backend("zstd", e.to_string()))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        ::zstd::stream::decode_all(data).map_err(|e| CleaveError::backend("zstd", e.to_string()))
    }
}
