use async_trait::async_trait;

use crate::error::Result;

/// Source-of-truth records for an import, delivered in finite chunks.
#[async_trait]
pub trait RecordFeed<R>: Send {
    /// Next chunk, or `None` once the feed is exhausted.
    async fn next_batch(&mut self) -> Result<Option<Vec<R>>>;
}

/// Chunks an in-memory list of records.
pub struct VecFeed<R> {
    records: std::vec::IntoIter<R>,
    batch_size: usize,
}

impl<R> VecFeed<R> {
    pub fn new(records: Vec<R>, batch_size: usize) -> Self {
        Self {
            records: records.into_iter(),
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl<R: Send> RecordFeed<R> for VecFeed<R> {
    async fn next_batch(&mut self) -> Result<Option<Vec<R>>> {
        let batch: Vec<R> = self.records.by_ref().take(self.batch_size).collect();
        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }
}
