use crate::types::Result;

/// Identity pass-through. Useful as a baseline and wherever determinism
/// matters more than size.
pub struct StoreBackend;

impl super::CompressionBackend for StoreBackend {
    fn name(&self) -> &str {
        "store"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}
