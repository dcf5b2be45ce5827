use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};

use crate::backend::{BackendRegistry, CompressionBackend};
use crate::config::ExecutorConfig;
use crate::error::CleaveError;
use crate::types::{ChunkFailure, ChunkResult, ChunkTask, Result};

/// Cooperative cancellation: stops dispatch of new tasks, in-flight tasks
/// run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Outcome of one batch. Both lists are ascending by descriptor id; a
/// non-empty `failed` list does not make the batch an error.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct BatchReport {
    pub succeeded: Vec<ChunkResult>,
    pub failed: Vec<ChunkFailure>,
    pub bytes_processed: u64,
    pub bytes_compressed: u64,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn compression_ratio(&self) -> f64 {
        if self.bytes_compressed == 0 {
            return 1.0;
        }
        self.bytes_processed as f64 / self.bytes_compressed as f64
    }
}

/// Compresses batches of chunks on a pool of worker threads.
///
/// The backend is resolved from the registry once, at construction; an
/// unregistered name fails here rather than mid-batch. Tasks flow through
/// a bounded channel so a slow pool applies backpressure to dispatch.
/// Failures are per chunk: a task that exhausts its retry budget lands in
/// `BatchReport::failed` without affecting its siblings.
pub struct ChunkExecutor {
    backend: Arc<dyn CompressionBackend>,
    config: ExecutorConfig,
}

impl std::fmt::Debug for ChunkExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkExecutor")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}

impl ChunkExecutor {
    pub fn new(config: ExecutorConfig, registry: &BackendRegistry) -> Result<Self> {
        let backend = registry.resolve(&config.backend)?;
        let config = ExecutorConfig {
            worker_count: config.worker_count.max(1),
            ..config
        };
        Ok(Self { backend, config })
    }

    pub fn backend(&self) -> &Arc<dyn CompressionBackend> {
        &self.backend
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn execute(&self, tasks: Vec<ChunkTask>) -> Result<BatchReport> {
        self.execute_with_cancel(tasks, &CancellationToken::new())
    }

    pub fn execute_with_cancel(
        &self,
        tasks: Vec<ChunkTask>,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let started = Instant::now();
        let task_count = tasks.len();
        let (task_tx, task_rx) = bounded::<ChunkTask>(self.config.worker_count * 2);
        let (result_tx, result_rx) = unbounded::<std::result::Result<ChunkResult, ChunkFailure>>();

        let workers: Vec<_> = (0..self.config.worker_count)
            .map(|worker_index| {
                let task_rx = task_rx.clone();
                let result_tx = result_tx.clone();
                let backend = Arc::clone(&self.backend);
                let config = self.config.clone();
                thread::spawn(move || worker_loop(worker_index, backend, config, task_rx, result_tx))
            })
            .collect();
        drop(task_rx);
        drop(result_tx);

        let mut failed = Vec::new();
        for task in tasks {
            if cancel.is_cancelled() {
                tracing::debug!(id = task.descriptor.id, "dispatch stopped by cancellation");
                failed.push(ChunkFailure {
                    descriptor: task.descriptor,
                    attempts: 0,
                    error: "cancelled before dispatch".to_string(),
                });
                continue;
            }
            if task_tx.send(task).is_err() {
                return Err(CleaveError::WorkerPool(
                    "all workers exited before the batch was dispatched".to_string(),
                ));
            }
        }
        drop(task_tx);

        let mut succeeded = Vec::new();
        for outcome in result_rx {
            match outcome {
                Ok(result) => succeeded.push(result),
                Err(failure) => failed.push(failure),
            }
        }
        for worker in workers {
            if worker.join().is_err() {
                return Err(CleaveError::WorkerPool("worker thread panicked".to_string()));
            }
        }

        if succeeded.len() + failed.len() != task_count {
            return Err(CleaveError::WorkerPool(format!(
                "batch accounting mismatch: {} tasks, {} outcomes",
                task_count,
                succeeded.len() + failed.len()
            )));
        }

        succeeded.sort_by_key(|result| result.descriptor.id);
        failed.sort_by_key(|failure| failure.descriptor.id);

        let bytes_processed = succeeded
            .iter()
            .map(|r| u64::from(r.descriptor.length))
            .sum();
        let bytes_compressed = succeeded.iter().map(|r| r.compressed.len() as u64).sum();

        tracing::debug!(
            succeeded = succeeded.len(),
            failed = failed.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch complete"
        );

        Ok(BatchReport {
            succeeded,
            failed,
            bytes_processed,
            bytes_compressed,
            elapsed: started.elapsed(),
        })
    }
}

fn worker_loop(
    worker_index: usize,
    backend: Arc<dyn CompressionBackend>,
    config: ExecutorConfig,
    task_rx: Receiver<ChunkTask>,
    result_tx: Sender<std::result::Result<ChunkResult, ChunkFailure>>,
) {
    for task in task_rx.iter() {
        let outcome = run_task(worker_index, &backend, &config, task);
        if result_tx.send(outcome).is_err() {
            break;
        }
    }
}

fn run_task(
    worker_index: usize,
    backend: &Arc<dyn CompressionBackend>,
    config: &ExecutorConfig,
    task: ChunkTask,
) -> std::result::Result<ChunkResult, ChunkFailure> {
    // A payload that no longer matches its descriptor is not retryable.
    if !task.descriptor.verify(&task.raw) {
        let error = CleaveError::ChecksumMismatch {
            id: task.descriptor.id,
        };
        return Err(ChunkFailure {
            descriptor: task.descriptor,
            attempts: 0,
            error: error.to_string(),
        });
    }

    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| backend.compress(&task.raw)))
            .unwrap_or_else(|_| {
                Err(CleaveError::backend(
                    backend.name(),
                    "panicked during compression",
                ))
            });

        match outcome {
            Ok(compressed) => {
                let mut descriptor = task.descriptor;
                descriptor.processing_time = Some(started.elapsed().as_secs_f64());
                descriptor.worker_id = Some(format!("worker-{worker_index}"));
                descriptor.compression_ratio =
                    Some(task.raw.len() as f64 / compressed.len().max(1) as f64);
                return Ok(ChunkResult {
                    descriptor,
                    compressed,
                });
            }
            Err(error) => {
                if attempt > config.max_retries {
                    tracing::debug!(
                        id = task.descriptor.id,
                        attempts = attempt,
                        error = %error,
                        "chunk failed permanently"
                    );
                    return Err(ChunkFailure {
                        descriptor: task.descriptor,
                        attempts: attempt,
                        error: error.to_string(),
                    });
                }
                let backoff = config
                    .retry_base
                    .saturating_mul(1u32 << (attempt - 1).min(16));
                tracing::debug!(
                    id = task.descriptor.id,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %error,
                    "retrying chunk"
                );
                thread::sleep(backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_sticky() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        let clone = token.clone();
        assert!(clone.is_cancelled());
    }
}
