#![cfg(feature = "async")]

use std::error::Error;
use std::io::Cursor;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::sync::mpsc;

use cleave_core::{
    BackendRegistry, ChunkStrategy, ChunkingConfig, compress_stream_async, decompress_stream,
};

fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn async_compression_round_trips() -> Result<(), Box<dyn Error>> {
    let registry = BackendRegistry::with_defaults();
    let backend = registry.resolve("zstd")?;
    let config = ChunkingConfig::with_bounds(ChunkStrategy::RollingHash, 8192, 1024, 64 * 1024);
    let data = random_bytes(101, 1024 * 1024);

    let (frame_tx, mut frame_rx) = mpsc::channel(4);
    let reader = Cursor::new(data.clone());
    let codec = tokio::spawn({
        let backend = Arc::clone(&backend);
        async move { compress_stream_async(reader, frame_tx, &config, backend, 4).await }
    });

    let mut container = Vec::new();
    let mut next_id = 0u64;
    while let Some(frame) = frame_rx.recv().await {
        assert_eq!(frame.id, next_id, "frames arrive in ascending id order");
        next_id += 1;
        container.extend_from_slice(&frame.to_bytes());
    }

    let state = codec.await??;
    assert_eq!(state.bytes_processed, data.len() as u64);
    assert_eq!(state.chunk_count, next_id);
    assert!(state.errors.is_empty());

    let mut restored = Vec::new();
    decompress_stream(Cursor::new(&container), &mut restored, &*backend)?;
    assert_eq!(restored, data);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_empty_input_sends_no_frames() -> Result<(), Box<dyn Error>> {
    let registry = BackendRegistry::with_defaults();
    let backend = registry.resolve("store")?;
    let config = ChunkingConfig::default();

    let (frame_tx, mut frame_rx) = mpsc::channel(4);
    let state =
        compress_stream_async(Cursor::new(Vec::new()), frame_tx, &config, backend, 2).await?;
    assert_eq!(state.chunk_count, 0);
    assert!(frame_rx.recv().await.is_none());
    Ok(())
}
