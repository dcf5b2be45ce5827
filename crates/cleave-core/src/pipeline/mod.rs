use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::error::CleaveError;
use crate::types::Result;

enum Message<T> {
    Item(T),
    End,
}

/// Lifecycle of one stage thread: it runs until it sees the end sentinel,
/// drains by forwarding it, then stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Running,
    Draining,
    Stopped,
}

const STATE_RUNNING: u8 = 0;
const STATE_DRAINING: u8 = 1;
const STATE_STOPPED: u8 = 2;

fn decode_state(raw: u8) -> StageState {
    match raw {
        STATE_RUNNING => StageState::Running,
        STATE_DRAINING => StageState::Draining,
        _ => StageState::Stopped,
    }
}

type StageFn<T> = Box<dyn Fn(T) -> Result<T> + Send>;

struct Stage<T> {
    name: String,
    transform: StageFn<T>,
}

/// Linear multi-stage pipeline: one thread per stage, bounded channels
/// between them.
///
/// Items flow through every stage in submission order. The bounded
/// channel capacity is the only buffering, so a slow stage applies
/// backpressure upstream and the caller can consume output lazily while
/// earlier items are still in flight. A stage error stops the pipeline
/// fail-fast: items already past the failing stage are delivered, then
/// the output iterator yields the error.
pub struct Pipeline<T> {
    stages: Vec<Stage<T>>,
    capacity: usize,
}

pub struct PipelineBuilder<T> {
    stages: Vec<Stage<T>>,
    capacity: usize,
}

impl<T: Send + 'static> Pipeline<T> {
    pub fn builder(capacity: usize) -> PipelineBuilder<T> {
        PipelineBuilder {
            stages: Vec::new(),
            capacity,
        }
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn run<I>(self, input: I) -> PipelineHandle<T>
    where
        I: IntoIterator<Item = T> + Send + 'static,
        I::IntoIter: Send,
    {
        let mut threads = Vec::with_capacity(self.stages.len() + 1);
        let mut states = Vec::with_capacity(self.stages.len());
        let error: Arc<Mutex<Option<CleaveError>>> = Arc::new(Mutex::new(None));

        let (feed_tx, mut upstream_rx) = bounded::<Message<T>>(self.capacity);
        threads.push(std::thread::spawn(move || {
            for item in input {
                if feed_tx.send(Message::Item(item)).is_err() {
                    return;
                }
            }
            let _ = feed_tx.send(Message::End);
        }));

        for stage in self.stages {
            let (tx, rx) = bounded::<Message<T>>(self.capacity);
            let state = Arc::new(AtomicU8::new(STATE_RUNNING));
            let error_slot = Arc::clone(&error);
            states.push(Arc::clone(&state));
            let stage_rx = upstream_rx;
            threads.push(std::thread::spawn(move || {
                run_stage(stage, stage_rx, tx, state, error_slot);
            }));
            upstream_rx = rx;
        }

        PipelineHandle {
            output: Some(upstream_rx),
            error,
            states,
            threads,
            finished: false,
        }
    }
}

impl<T: Send + 'static> PipelineBuilder<T> {
    pub fn stage(
        mut self,
        name: impl Into<String>,
        transform: impl Fn(T) -> Result<T> + Send + 'static,
    ) -> Self {
        self.stages.push(Stage {
            name: name.into(),
            transform: Box::new(transform),
        });
        self
    }

    pub fn build(self) -> Result<Pipeline<T>> {
        if self.stages.is_empty() {
            return Err(CleaveError::WorkerPool(
                "pipeline needs at least one stage".to_string(),
            ));
        }
        if self.capacity == 0 {
            return Err(CleaveError::WorkerPool(
                "pipeline channel capacity must be nonzero".to_string(),
            ));
        }
        Ok(Pipeline {
            stages: self.stages,
            capacity: self.capacity,
        })
    }
}

fn run_stage<T>(
    stage: Stage<T>,
    rx: Receiver<Message<T>>,
    tx: Sender<Message<T>>,
    state: Arc<AtomicU8>,
    error_slot: Arc<Mutex<Option<CleaveError>>>,
) {
    loop {
        match rx.recv() {
            Ok(Message::Item(item)) => match (stage.transform)(item) {
                Ok(out) => {
                    if tx.send(Message::Item(out)).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    tracing::debug!(stage = %stage.name, error = %error, "stage failed, stopping pipeline");
                    let mut slot = error_slot.lock().expect("pipeline error slot poisoned");
                    if slot.is_none() {
                        *slot = Some(CleaveError::Stage {
                            stage: stage.name.clone(),
                            source: Box::new(error),
                        });
                    }
                    drop(slot);
                    let _ = tx.send(Message::End);
                    break;
                }
            },
            Ok(Message::End) | Err(_) => {
                state.store(STATE_DRAINING, Ordering::Release);
                let _ = tx.send(Message::End);
                break;
            }
        }
    }
    state.store(STATE_STOPPED, Ordering::Release);
    tracing::trace!(stage = %stage.name, "stage stopped");
}

/// Lazy output of a running pipeline. Iterating yields transformed items
/// in order; after the last item, a failed run yields exactly one `Err`.
pub struct PipelineHandle<T> {
    output: Option<Receiver<Message<T>>>,
    error: Arc<Mutex<Option<CleaveError>>>,
    states: Vec<Arc<AtomicU8>>,
    threads: Vec<JoinHandle<()>>,
    finished: bool,
}

impl<T> PipelineHandle<T> {
    pub fn stage_state(&self, index: usize) -> Option<StageState> {
        self.states
            .get(index)
            .map(|state| decode_state(state.load(Ordering::Acquire)))
    }

    fn shut_down(&mut self) {
        self.finished = true;
        // Receiver dropped first so blocked senders unwind before join.
        self.output = None;
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
    }

    /// Drains the pipeline into a vector, failing on the first error.
    pub fn into_vec(self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for item in self {
            items.push(item?);
        }
        Ok(items)
    }
}

impl<T> Iterator for PipelineHandle<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let received = match &self.output {
            Some(output) => output.recv(),
            None => return None,
        };
        match received {
            Ok(Message::Item(item)) => Some(Ok(item)),
            Ok(Message::End) | Err(_) => {
                self.shut_down();
                let mut slot = self.error.lock().expect("pipeline error slot poisoned");
                slot.take().map(Err)
            }
        }
    }
}

impl<T> Drop for PipelineHandle<T> {
    fn drop(&mut self) {
        if !self.finished {
            self.shut_down();
        }
    }
}
