#[cfg(feature = "async")]
mod async_codec;
#[cfg(feature = "async")]
pub use async_codec::{StreamFrame, compress_stream_async};

use std::io::{Read, Write};

use bytes::Bytes;

use crate::backend::CompressionBackend;
use crate::boundary::ChunkCutter;
use crate::config::ChunkingConfig;
use crate::container::{FrameHeader, read_frame};
use crate::types::{ChunkDescriptor, Result, StreamState};

const READ_BUF_SIZE: usize = 64 * 1024;

/// Incremental chunker over any `Read` source.
///
/// Memory stays bounded by the cutter's fill goal plus one read buffer:
/// the internal buffer is refilled until it holds at least `max_size`
/// bytes (or, before an adaptive target is resolved, the full entropy
/// sample; or the source is exhausted) before each cut, which is all any
/// strategy needs to place a boundary.
pub struct StreamChunker<R: Read> {
    reader: R,
    cutter: ChunkCutter,
    buffer: Vec<u8>,
    eof: bool,
}

impl<R: Read> StreamChunker<R> {
    pub fn new(reader: R, config: &ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            reader,
            cutter: ChunkCutter::new(config),
            buffer: Vec::new(),
            eof: false,
        })
    }

    fn fill(&mut self) -> Result<()> {
        let goal = self.cutter.fill_goal();
        let mut scratch = [0u8; READ_BUF_SIZE];
        while !self.eof && self.buffer.len() < goal {
            match self.reader.read(&mut scratch) {
                Ok(0) => self.eof = true,
                Ok(n) => self.buffer.extend_from_slice(&scratch[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn next_chunk(&mut self) -> Result<Option<(Bytes, ChunkDescriptor)>> {
        self.fill()?;
        self.cutter.resolve(&self.buffer);
        let Some(cut) = self.cutter.cut(&self.buffer, self.eof) else {
            return Ok(None);
        };
        let raw: Vec<u8> = self.buffer.drain(..cut).collect();
        let descriptor = self.cutter.describe(&raw);
        Ok(Some((Bytes::from(raw), descriptor)))
    }
}

impl<R: Read> Iterator for StreamChunker<R> {
    type Item = Result<(Bytes, ChunkDescriptor)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => None,
            Err(error) => Some(Err(error)),
        }
    }
}

/// Chunks `reader` and writes a framed container to `writer`, one chunk
/// at a time in bounded memory.
pub fn compress_stream<R: Read, W: Write>(
    reader: R,
    writer: W,
    config: &ChunkingConfig,
    backend: &dyn CompressionBackend,
) -> Result<StreamState> {
    let mut state = StreamState::new();
    compress_stream_into(reader, writer, config, backend, &mut state)?;
    Ok(state)
}

/// Like [`compress_stream`], but records progress into a caller-owned
/// state so partial work stays observable when the operation fails.
pub fn compress_stream_into<R: Read, W: Write>(
    reader: R,
    writer: W,
    config: &ChunkingConfig,
    backend: &dyn CompressionBackend,
    state: &mut StreamState,
) -> Result<()> {
    match run_compress(reader, writer, config, backend, state) {
        Ok(()) => Ok(()),
        Err(error) => {
            state.errors.push(error.to_string());
            Err(error)
        }
    }
}

fn run_compress<R: Read, W: Write>(
    reader: R,
    mut writer: W,
    config: &ChunkingConfig,
    backend: &dyn CompressionBackend,
    state: &mut StreamState,
) -> Result<()> {
    let mut chunker = StreamChunker::new(reader, config)?;
    while let Some((raw, descriptor)) = chunker.next_chunk()? {
        let compressed = backend.compress(&raw)?;
        let header = FrameHeader::for_payload(raw.len(), compressed.len())?;
        header.write_to(&mut writer)?;
        writer.write_all(&compressed)?;
        state.record_chunk(raw.len() as u64, compressed.len() as u64);
        tracing::trace!(
            id = descriptor.id,
            original = header.original_len,
            compressed = header.compressed_len,
            "frame streamed"
        );
    }
    writer.flush()?;
    Ok(())
}

/// Inverse of [`compress_stream`]. Any malformed or truncated frame is
/// fatal; the container has no resynchronization points.
pub fn decompress_stream<R: Read, W: Write>(
    reader: R,
    writer: W,
    backend: &dyn CompressionBackend,
) -> Result<StreamState> {
    let mut state = StreamState::new();
    decompress_stream_into(reader, writer, backend, &mut state)?;
    Ok(state)
}

/// Like [`decompress_stream`], with caller-owned state. On failure the
/// error is also recorded in `state.errors`.
pub fn decompress_stream_into<R: Read, W: Write>(
    reader: R,
    writer: W,
    backend: &dyn CompressionBackend,
    state: &mut StreamState,
) -> Result<()> {
    match run_decompress(reader, writer, backend, state) {
        Ok(()) => Ok(()),
        Err(error) => {
            state.errors.push(error.to_string());
            Err(error)
        }
    }
}

fn run_decompress<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    backend: &dyn CompressionBackend,
    state: &mut StreamState,
) -> Result<()> {
    use crate::error::CleaveError;

    while let Some((header, payload)) = read_frame(&mut reader)? {
        let decompressed = backend.decompress(&payload)?;
        if decompressed.len() != header.original_len as usize {
            return Err(CleaveError::FrameFormat(
                "decompressed length does not match frame header",
            ));
        }
        writer.write_all(&decompressed)?;
        state.record_chunk(decompressed.len() as u64, payload.len() as u64);
    }
    writer.flush()?;
    Ok(())
}
