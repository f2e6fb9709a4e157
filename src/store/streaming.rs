//! Streaming query abstractions
//!
//! Feature documents and schema shapes are both pulled through the same
//! batched interface, so neither the entry source nor schema discovery ever
//! hold a whole result set in memory.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::Cursor;
use mongodb::bson::Document;
use tracing::debug;

use crate::error::{ExportError, Result};

/// Trait for streaming query results in batches
#[async_trait]
pub trait StreamingQuery: Send {
    /// Fetch the next batch of documents
    ///
    /// # Returns
    /// * `Result<Option<Vec<Document>>>` - Next batch, or None once exhausted
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>>;

    /// Release the underlying cursor
    async fn close(&mut self) -> Result<()>;
}

/// [`StreamingQuery`] over a MongoDB cursor
///
/// The cursor is dropped as soon as it is exhausted, fails or is closed,
/// which kills it on the server.
pub struct CursorStreamingQuery {
    cursor: Option<Cursor<Document>>,
    batch_size: usize,
    fetched: u64,
    label: &'static str,
}

impl CursorStreamingQuery {
    /// Wrap a cursor
    ///
    /// # Arguments
    /// * `cursor` - Cursor from an aggregation
    /// * `batch_size` - Documents handed out per batch
    /// * `label` - What the cursor yields, for log lines
    pub fn new(cursor: Cursor<Document>, batch_size: u32, label: &'static str) -> Self {
        Self {
            cursor: Some(cursor),
            batch_size: batch_size.max(1) as usize,
            fetched: 0,
            label,
        }
    }
}

#[async_trait]
impl StreamingQuery for CursorStreamingQuery {
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match cursor.try_next().await {
                Ok(Some(doc)) => batch.push(doc),
                Ok(None) => break,
                Err(e) => {
                    self.cursor = None;
                    return Err(ExportError::cursor(e));
                }
            }
        }

        if batch.is_empty() {
            debug!("{} cursor exhausted after {} documents", self.label, self.fetched);
            self.cursor = None;
            return Ok(None);
        }

        self.fetched += batch.len() as u64;
        debug!(
            "{} cursor: batch of {} (total {})",
            self.label,
            batch.len(),
            self.fetched
        );
        Ok(Some(batch))
    }

    async fn close(&mut self) -> Result<()> {
        if self.cursor.take().is_some() {
            debug!("Closed {} cursor after {} documents", self.label, self.fetched);
        }
        Ok(())
    }
}
