use std::collections::BTreeMap;

use crate::error::CleaveError;
use crate::types::Result;

pub const DEFAULT_PENDING_LIMIT: usize = 1024;

/// Restores ascending-id order over items that complete out of order.
///
/// `push` returns every item that became contiguous with the emit cursor,
/// in order. Ids must be dense starting at zero; a stale or duplicate id
/// is an error, as is exceeding the pending limit.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next_id: u64,
    pending: BTreeMap<u64, T>,
    max_pending: usize,
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_PENDING_LIMIT)
    }

    pub fn with_limit(max_pending: usize) -> Self {
        Self {
            next_id: 0,
            pending: BTreeMap::new(),
            max_pending: max_pending.max(1),
        }
    }

    pub fn push(&mut self, id: u64, item: T) -> Result<Vec<T>> {
        if id < self.next_id || self.pending.contains_key(&id) {
            return Err(CleaveError::OutOfOrder {
                expected: self.next_id,
                actual: id,
            });
        }
        if id != self.next_id && self.pending.len() >= self.max_pending {
            return Err(CleaveError::WorkerPool(format!(
                "reorder buffer overflow: {} items pending, id {} still missing",
                self.pending.len(),
                self.next_id
            )));
        }
        self.pending.insert(id, item);

        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next_id) {
            ready.push(item);
            self.next_id += 1;
        }
        Ok(ready)
    }

    pub fn next_expected(&self) -> u64 {
        self.next_id
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_drained(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
