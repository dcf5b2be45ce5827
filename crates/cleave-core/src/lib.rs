pub mod backend;
pub mod boundary;
pub mod config;
pub mod container;
pub mod error;
pub mod executor;
pub mod io;
pub mod ops;
pub mod pipeline;
pub mod stream;
pub mod types;

pub use backend::{BackendRegistry, CompressionBackend, DeflateBackend, StoreBackend, ZstdBackend};
pub use boundary::{ChunkEngine, ChunkIter};
pub use config::{ChunkStrategy, ChunkingConfig, ExecutorConfig};
pub use container::{ContainerReader, ContainerWriter, FRAME_HEADER_SIZE, FrameHeader, ReorderBuffer};
pub use error::CleaveError;
pub use executor::{BatchReport, CancellationToken, ChunkExecutor};
pub use io::MappedInput;
pub use ops::{BlobOutcome, compress_blob, compress_file, decompress_file};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineHandle, StageState};
#[cfg(feature = "async")]
pub use stream::{StreamFrame, compress_stream_async};
pub use stream::{StreamChunker, compress_stream, compress_stream_into, decompress_stream, decompress_stream_into};
pub use types::{ChunkDescriptor, ChunkFailure, ChunkResult, ChunkTask, Result, StreamState};
