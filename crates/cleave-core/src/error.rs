use thiserror::Error;

#[derive(Debug, Error)]
pub enum CleaveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("chunk boundary error: {0}")]
    Boundary(&'static str),
    #[error("backend '{backend}' failed: {message}")]
    Backend { backend: String, message: String },
    #[error("backend '{0}' is not registered")]
    BackendNotRegistered(String),
    #[error("invalid container frame: {0}")]
    FrameFormat(&'static str),
    #[error("worker pool error: {0}")]
    WorkerPool(String),
    #[error("out-of-order chunk id {actual} (expected {expected})")]
    OutOfOrder { expected: u64, actual: u64 },
    #[error("checksum mismatch for chunk {id}")]
    ChecksumMismatch { id: u64 },
    #[error("pipeline stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<CleaveError>,
    },
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<CleaveError>,
    },
}

impl CleaveError {
    pub fn with_context(self, context: impl Into<String>) -> Self {
        CleaveError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    pub fn backend(name: impl Into<String>, message: impl Into<String>) -> Self {
        CleaveError::Backend {
            backend: name.into(),
            message: message.into(),
        }
    }
}
