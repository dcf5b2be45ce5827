mod deflate;
mod store;
mod zstd;

pub use deflate::DeflateBackend;
pub use store::StoreBackend;
pub use zstd::ZstdBackend;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::CleaveError;
use crate::types::Result;

/// A compression codec. Implementations are opaque byte-to-byte
/// transforms; the pipeline never inspects compressed payloads.
pub trait CompressionBackend: Send + Sync {
    fn name(&self) -> &str;
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

impl std::fmt::Debug for dyn CompressionBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CompressionBackend")
            .field(&self.name())
            .finish()
    }
}

/// Explicit name → backend map. Lookup of an unregistered name is an
/// error at call time; nothing ever falls back to a different codec.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn CompressionBackend>>,
}

impl BackendRegistry {
    pub fn empty() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Registry with the built-in `store`, `deflate` and `zstd` backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(StoreBackend));
        registry.register(Arc::new(DeflateBackend::default()));
        registry.register(Arc::new(ZstdBackend::default()));
        registry
    }

    pub fn register(&mut self, backend: Arc<dyn CompressionBackend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn CompressionBackend>> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| CleaveError::BackendNotRegistered(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_registered() {
        let registry = BackendRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["deflate", "store", "zstd"]);
        assert!(registry.resolve("zstd").is_ok());
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let registry = BackendRegistry::with_defaults();
        let err = registry.resolve("lz77-turbo").unwrap_err();
        assert!(matches!(err, CleaveError::BackendNotRegistered(name) if name == "lz77-turbo"));
    }

    #[test]
    fn builtin_round_trips() {
        let registry = BackendRegistry::with_defaults();
        let data = b"the quick brown fox jumps over the lazy dog".repeat(20);
        for name in registry.names() {
            let backend = registry.resolve(name).unwrap();
            let compressed = backend.compress(&data).unwrap();
            let restored = backend.decompress(&compressed).unwrap();
            assert_eq!(restored, data, "backend {name}");
        }
    }
}
