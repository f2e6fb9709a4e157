//! Entry source
//!
//! Turns the store's entry cursor into a sequence of [`Entry`] rows. The
//! store selects and orders the rows; a producer task pulls them in batches,
//! applies collector redaction, and pushes entries into a bounded channel. When the channel is
//! full the producer waits, so the cursor is never read further ahead than
//! the channel's capacity plus one batch.
//!
//! The first error ends the sequence: it is delivered in place of the next
//! entry and nothing follows it.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{Entry, FilterKind, SurveyFeature};
use crate::store::{StreamingQuery, SurveyStore};

/// Configured, not yet started entry source
pub struct EntrySource {
    query: Box<dyn StreamingQuery>,
    redact_collectors: bool,
    watermark: usize,
}

impl EntrySource {
    /// Create an entry source over an entry row query
    ///
    /// # Arguments
    /// * `query` - Entry rows from [`SurveyStore::entry_query`]
    /// * `redact_collectors` - Scrub collector names (open surveys)
    /// * `watermark` - Channel capacity in entries
    pub fn new(query: Box<dyn StreamingQuery>, redact_collectors: bool, watermark: usize) -> Self {
        Self {
            query,
            redact_collectors,
            watermark: watermark.max(1),
        }
    }

    /// Open the entry rows of a survey
    ///
    /// # Arguments
    /// * `store` - Survey store
    /// * `survey_id` - Survey to export
    /// * `filter` - Which entries of each feature to emit
    /// * `redact_collectors` - Scrub collector names (open surveys)
    /// * `watermark` - Channel capacity in entries
    pub async fn open(
        store: &dyn SurveyStore,
        survey_id: &str,
        filter: FilterKind,
        redact_collectors: bool,
        watermark: usize,
    ) -> Result<Self> {
        let query = store.entry_query(survey_id, filter, redact_collectors).await?;
        Ok(Self::new(query, redact_collectors, watermark))
    }

    /// Start the producer task
    pub fn spawn(self) -> EntryStream {
        let (tx, rx) = mpsc::channel(self.watermark);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.produce(tx, cancel.clone()));

        EntryStream {
            rx,
            cancel,
            handle: Some(handle),
        }
    }

    async fn produce(mut self, tx: mpsc::Sender<Result<Entry>>, cancel: CancellationToken) {
        let mut rows = 0u64;
        let mut emitted = 0u64;

        'cursor: loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => break 'cursor,
                batch = self.query.next_batch() => batch,
            };

            let docs = match batch {
                Ok(Some(docs)) => docs,
                Ok(None) => break 'cursor,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    break 'cursor;
                }
            };

            for doc in docs {
                let row = match SurveyFeature::from_document(doc) {
                    Ok(row) => row,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break 'cursor;
                    }
                };
                rows += 1;

                for mut entry in row.into_entries() {
                    if self.redact_collectors {
                        entry.redact_collector();
                    }
                    // A closed channel means the consumer has gone away.
                    if tx.send(Ok(entry)).await.is_err() {
                        break 'cursor;
                    }
                    emitted += 1;
                }
            }
        }

        if let Err(e) = self.query.close().await {
            warn!("Failed to close entry query: {}", e);
        }
        debug!("Entry source finished: {} rows, {} entries", rows, emitted);
    }
}

/// Consumer side of a running entry source
///
/// Dropping the stream stops the producer.
pub struct EntryStream {
    rx: mpsc::Receiver<Result<Entry>>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl EntryStream {
    /// Next entry, or `None` once the source is exhausted
    pub async fn next(&mut self) -> Option<Result<Entry>> {
        self.rx.recv().await
    }

    /// Wait for the producer to release its cursor
    pub async fn close(mut self) {
        self.cancel.cancel();
        self.rx.close();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Entry source task failed: {}", e);
            }
        }
    }
}

impl Drop for EntryStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bson::{Document, doc};

    use super::*;
    use crate::store::MemorySurveyStore;

    fn feature(object_id: &str, created: &[i64]) -> Document {
        let entries: Vec<Document> = created
            .iter()
            .map(|t| {
                doc! {
                    "id": format!("{object_id}-{t}"),
                    "created": bson::DateTime::from_millis(*t),
                    "source": { "type": "mobile", "collector": "Ana" },
                }
            })
            .collect();
        doc! {
            "properties": { "survey": "s1", "object_id": object_id, "centroid": [1.0, 2.0] },
            "entries": entries,
        }
    }

    fn store() -> MemorySurveyStore {
        MemorySurveyStore::new(vec![
            feature("a", &[10, 30, 20]),
            feature("b", &[15]),
            feature("c", &[5, 40]),
            feature("empty", &[]),
        ])
    }

    async fn collect(store: &MemorySurveyStore, filter: FilterKind, open: bool) -> Result<Vec<Entry>> {
        let mut stream = EntrySource::open(store, "s1", filter, open, 2).await?.spawn();
        let mut out = Vec::new();
        while let Some(entry) = stream.next().await {
            out.push(entry?);
        }
        Ok(out)
    }

    fn ids(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    /// Counts pulled batches; one single-entry row per batch
    struct CountingQuery {
        pulled: Arc<AtomicUsize>,
        remaining: usize,
    }

    #[async_trait]
    impl StreamingQuery for CountingQuery {
        async fn next_batch(&mut self) -> Result<Option<Vec<Document>>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            let n = self.pulled.fetch_add(1, Ordering::SeqCst) as i64;
            Ok(Some(vec![feature(&format!("f{n}"), &[n])]))
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_latest_yields_one_per_feature_in_creation_order() {
        let entries = collect(&store(), FilterKind::Latest, false).await.unwrap();
        assert_eq!(ids(&entries), vec!["b-15", "a-30", "c-40"]);
    }

    #[tokio::test]
    async fn test_all_interleaves_features_by_creation() {
        let entries = collect(&store(), FilterKind::All, false).await.unwrap();
        assert_eq!(ids(&entries), vec!["c-5", "a-10", "b-15", "a-20", "a-30", "c-40"]);

        let store = MemorySurveyStore::new(vec![feature("a", &[10, 30]), feature("b", &[20])]);
        let entries = collect(&store, FilterKind::All, false).await.unwrap();
        assert_eq!(ids(&entries), vec!["a-10", "b-20", "a-30"]);
        assert!(entries.windows(2).all(|w| w[0].created <= w[1].created));
    }

    #[tokio::test]
    async fn test_open_export_scrubs_collectors() {
        let entries = collect(&store(), FilterKind::All, true).await.unwrap();
        assert!(entries.iter().all(|e| e.source.collector.is_none()));

        let entries = collect(&store(), FilterKind::All, false).await.unwrap();
        assert!(entries.iter().all(|e| e.source.collector.as_deref() == Some("Ana")));
    }

    #[tokio::test]
    async fn test_cursor_error_ends_sequence() {
        let store = store().fail_after(1);
        let mut stream = EntrySource::open(&store, "s1", FilterKind::Latest, false, 1)
            .await
            .unwrap()
            .spawn();

        assert!(stream.next().await.unwrap().is_ok());
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), "DataAccessError");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_producer_waits_while_channel_is_full() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let query = CountingQuery {
            pulled: Arc::clone(&pulled),
            remaining: 10,
        };
        let mut stream = EntrySource::new(Box::new(query), false, 1).spawn();

        // one entry fills the channel, the next batch waits to be sent
        settle().await;
        assert_eq!(pulled.load(Ordering::SeqCst), 2);

        assert_eq!(stream.next().await.unwrap().unwrap().id, "f0-0");
        settle().await;
        assert_eq!(pulled.load(Ordering::SeqCst), 3);

        stream.close().await;
        assert_eq!(pulled.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_close_stops_producer_early() {
        let features: Vec<Document> = (0..50)
            .map(|i| feature(&format!("f{i}"), &[i]))
            .collect();
        let store = MemorySurveyStore::new(features);
        let mut stream = EntrySource::open(&store, "s1", FilterKind::All, false, 1)
            .await
            .unwrap()
            .spawn();

        assert!(stream.next().await.unwrap().is_ok());
        tokio::time::timeout(std::time::Duration::from_secs(5), stream.close())
            .await
            .unwrap();
    }
}
