use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::backend::CompressionBackend;
use crate::boundary::ChunkEngine;
use crate::config::ChunkingConfig;
use crate::container::{ContainerWriter, FrameHeader};
use crate::executor::ChunkExecutor;
use crate::io::MappedInput;
use crate::stream::decompress_stream_into;
use crate::types::{ChunkDescriptor, ChunkFailure, ChunkTask, Result, StreamState};

/// Result of [`compress_blob`]: a best-effort container plus the list of
/// chunks that could not be compressed. Failed chunks are omitted from
/// the container, never silently dropped.
#[derive(Debug)]
pub struct BlobOutcome {
    pub descriptors: Vec<ChunkDescriptor>,
    pub container: Vec<u8>,
    pub failed: Vec<ChunkFailure>,
}

impl BlobOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Chunks `data`, compresses the chunks on the executor's worker pool and
/// assembles the container in ascending chunk id order.
pub fn compress_blob(
    data: &[u8],
    config: &ChunkingConfig,
    executor: &ChunkExecutor,
) -> Result<BlobOutcome> {
    let engine = ChunkEngine::new(*config)?;
    let tasks: Vec<ChunkTask> = engine
        .chunks(data)
        .map(|(raw, descriptor)| ChunkTask { descriptor, raw })
        .collect();
    let report = executor.execute(tasks)?;

    let mut writer = ContainerWriter::new(Vec::new());
    for result in &report.succeeded {
        let header = FrameHeader::for_payload(result.descriptor.length as usize, result.compressed.len())?;
        writer.append(header, &result.compressed)?;
    }
    let container = writer.finish()?;

    Ok(BlobOutcome {
        descriptors: report.succeeded.into_iter().map(|r| r.descriptor).collect(),
        container,
        failed: report.failed,
    })
}

/// Memory-maps `input`, compresses it in parallel and writes the
/// container to `output`. Per-chunk failures are recorded in the returned
/// state's `errors`, not raised.
pub fn compress_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ChunkingConfig,
    executor: &ChunkExecutor,
) -> Result<StreamState> {
    let mapped = MappedInput::open(input.as_ref())
        .map_err(|e| e.with_context(format!("opening {}", input.as_ref().display())))?;
    let mut state = StreamState::new();

    let engine = ChunkEngine::new(*config)?;
    let tasks: Vec<ChunkTask> = engine
        .chunks(mapped.as_slice())
        .map(|(raw, descriptor)| ChunkTask { descriptor, raw })
        .collect();
    let report = executor.execute(tasks)?;

    let file = File::create(output.as_ref())?;
    let mut writer = ContainerWriter::new(BufWriter::new(file));
    for result in &report.succeeded {
        let header = FrameHeader::for_payload(result.descriptor.length as usize, result.compressed.len())?;
        writer.append(header, &result.compressed)?;
    }
    writer.finish()?;

    state.position = mapped.len() as u64;
    state.chunk_count = report.succeeded.len() as u64;
    state.bytes_processed = report.bytes_processed;
    state.bytes_compressed = report.bytes_compressed;
    for failure in &report.failed {
        state.errors.push(format!(
            "chunk {} failed after {} attempts: {}",
            failure.descriptor.id, failure.attempts, failure.error
        ));
    }

    tracing::debug!(
        input = %mapped.path().display(),
        chunks = state.chunk_count,
        ratio = state.compression_ratio(),
        "file compressed"
    );
    Ok(state)
}

/// Decompresses a container file produced by [`compress_file`] or the
/// streaming codec.
pub fn decompress_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    backend: &dyn CompressionBackend,
) -> Result<StreamState> {
    let reader = BufReader::new(File::open(input.as_ref())?);
    let writer = BufWriter::new(File::create(output.as_ref())?);
    let mut state = StreamState::new();
    decompress_stream_into(reader, writer, backend, &mut state)?;
    Ok(state)
}
