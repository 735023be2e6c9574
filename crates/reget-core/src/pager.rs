//! Lazy paginated enumeration over stored tasks
//!
//! Single-pass and non-restartable: re-enumeration means constructing a new
//! pager. Store errors terminate the sequence and surface to the consumer.

use crate::error::RegetError;
use crate::store::TaskStore;
use reget_types::Task;
use std::collections::VecDeque;

/// Batch-fetching cursor over the store, ordered by id.
pub struct TaskPages {
    store: TaskStore,
    cursor: i64,
    batch_size: i64,
    buffer: VecDeque<Task>,
    exhausted: bool,
}

impl TaskPages {
    pub fn new(store: TaskStore, batch_size: i64) -> Self {
        Self {
            store,
            cursor: 0,
            batch_size: batch_size.max(1),
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Produce the next task, fetching another batch when the buffer runs
    /// dry. `None` once the store has no more rows past the cursor.
    pub async fn next(&mut self) -> Result<Option<Task>, RegetError> {
        if self.buffer.is_empty() && !self.exhausted {
            match self.store.list_range(self.cursor, self.batch_size).await {
                Ok(chunk) if chunk.is_empty() => {
                    self.exhausted = true;
                }
                Ok(chunk) => {
                    self.cursor += chunk.len() as i64;
                    self.buffer.extend(chunk);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Err(e);
                }
            }
        }

        Ok(self.buffer.pop_front())
    }

    /// Wrap this pager so that only tasks matching `predicate` come through,
    /// in the same relative order.
    pub fn filtered<P>(self, predicate: P) -> FilteredTasks<P>
    where
        P: FnMut(&Task) -> bool,
    {
        FilteredTasks {
            pages: self,
            predicate,
        }
    }
}

/// Predicate-filtering wrapper around [`TaskPages`].
pub struct FilteredTasks<P> {
    pages: TaskPages,
    predicate: P,
}

impl<P: FnMut(&Task) -> bool> FilteredTasks<P> {
    pub async fn next(&mut self) -> Result<Option<Task>, RegetError> {
        while let Some(task) = self.pages.next().await? {
            if (self.predicate)(&task) {
                return Ok(Some(task));
            }
        }
        Ok(None)
    }
}
