use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{Semaphore, mpsc};

use crate::backend::CompressionBackend;
use crate::boundary::ChunkCutter;
use crate::config::ChunkingConfig;
use crate::container::{FrameHeader, ReorderBuffer};
use crate::error::CleaveError;
use crate::types::{ChunkDescriptor, Result, StreamState};

const READ_BUF_SIZE: usize = 64 * 1024;

/// One container frame, ready to be written to the wire as
/// `header || payload`.
#[derive(Debug, Clone)]
pub struct StreamFrame {
    pub id: u64,
    pub header: FrameHeader,
    pub payload: Vec<u8>,
}

impl StreamFrame {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(crate::container::FRAME_HEADER_SIZE + self.payload.len());
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

type Completion = std::result::Result<(ChunkDescriptor, Vec<u8>), CleaveError>;

/// Chunks an async source and sends in-order frames into `output`.
///
/// Each chunk's compression is offloaded to `spawn_blocking` (at most
/// `worker_limit` in flight) so the read side keeps consuming input while
/// earlier chunks compress. Completions arrive out of order and are run
/// through a [`ReorderBuffer`], so frames leave in ascending id order; a
/// full `output` channel applies backpressure end to end.
pub async fn compress_stream_async<R>(
    reader: R,
    output: mpsc::Sender<StreamFrame>,
    config: &ChunkingConfig,
    backend: Arc<dyn CompressionBackend>,
    worker_limit: usize,
) -> Result<StreamState>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    config.validate()?;
    let worker_limit = worker_limit.max(1);
    let (done_tx, mut done_rx) = mpsc::channel::<Completion>(worker_limit);

    let producer = tokio::spawn(read_and_dispatch(
        reader,
        *config,
        Arc::clone(&backend),
        done_tx,
        worker_limit,
    ));

    let mut state = StreamState::new();
    let mut reorder: ReorderBuffer<StreamFrame> = ReorderBuffer::new();
    let mut failure: Option<CleaveError> = None;

    'drain: while let Some(completion) = done_rx.recv().await {
        match completion {
            Ok((descriptor, compressed)) => {
                let frame = match FrameHeader::for_payload(descriptor.length as usize, compressed.len())
                {
                    Ok(header) => StreamFrame {
                        id: descriptor.id,
                        header,
                        payload: compressed,
                    },
                    Err(error) => {
                        failure = Some(error);
                        break 'drain;
                    }
                };
                let ready = match reorder.push(frame.id, frame) {
                    Ok(ready) => ready,
                    Err(error) => {
                        failure = Some(error);
                        break 'drain;
                    }
                };
                for frame in ready {
                    state.record_chunk(
                        u64::from(frame.header.original_len),
                        u64::from(frame.header.compressed_len),
                    );
                    if output.send(frame).await.is_err() {
                        failure = Some(CleaveError::WorkerPool(
                            "frame output channel closed".to_string(),
                        ));
                        break 'drain;
                    }
                }
            }
            Err(error) => {
                failure = Some(error);
                break 'drain;
            }
        }
    }
    drop(done_rx);

    match producer.await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            failure.get_or_insert(error);
        }
        Err(join_error) => {
            failure.get_or_insert(CleaveError::WorkerPool(format!(
                "stream producer task failed: {join_error}"
            )));
        }
    }

    if failure.is_none() && !reorder.is_drained() {
        failure = Some(CleaveError::WorkerPool(
            "compression tasks lost before completion".to_string(),
        ));
    }

    match failure {
        Some(error) => {
            state.errors.push(error.to_string());
            Err(error)
        }
        None => Ok(state),
    }
}

async fn read_and_dispatch<R>(
    mut reader: R,
    config: ChunkingConfig,
    backend: Arc<dyn CompressionBackend>,
    done_tx: mpsc::Sender<Completion>,
    worker_limit: usize,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(worker_limit));
    let mut cutter = ChunkCutter::new(&config);
    let mut buffer: Vec<u8> = Vec::new();
    let mut scratch = vec![0u8; READ_BUF_SIZE];
    let mut eof = false;

    loop {
        if done_tx.is_closed() {
            return Err(CleaveError::WorkerPool(
                "completion channel closed mid-stream".to_string(),
            ));
        }
        while !eof && buffer.len() < cutter.fill_goal() {
            let n = reader.read(&mut scratch).await?;
            if n == 0 {
                eof = true;
            } else {
                buffer.extend_from_slice(&scratch[..n]);
            }
        }
        cutter.resolve(&buffer);
        let Some(cut) = cutter.cut(&buffer, eof) else {
            break;
        };
        let raw: Vec<u8> = buffer.drain(..cut).collect();
        let descriptor = cutter.describe(&raw);

        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|_| CleaveError::WorkerPool("compression semaphore closed".to_string()))?;
        let task_backend = Arc::clone(&backend);
        let task_tx = done_tx.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let joined = tokio::task::spawn_blocking(move || {
                let compressed = task_backend.compress(&raw)?;
                Ok::<_, CleaveError>((descriptor, compressed))
            })
            .await;
            let completion = match joined {
                Ok(inner) => inner,
                Err(join_error) => Err(CleaveError::WorkerPool(format!(
                    "compression task panicked: {join_error}"
                ))),
            };
            let _ = task_tx.send(completion).await;
        });
    }
    Ok(())
}
