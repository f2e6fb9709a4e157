//! In-memory survey store
//!
//! Holds feature documents in a `Vec` and answers both store queries the way
//! the MongoDB store does: entry rows sorted globally by creation time, and
//! the shape projection. Used for local
//! runs against fixture data and throughout the pipeline tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use bson::{Bson, Document, doc};

use crate::error::{DataAccessError, Result};
use crate::model::FilterKind;

use super::SurveyStore;
use super::streaming::StreamingQuery;

/// Survey store over a fixed set of feature documents
#[derive(Debug, Clone, Default)]
pub struct MemorySurveyStore {
    features: Vec<Document>,
    batch_size: usize,
    fail_after: Option<usize>,
}

impl MemorySurveyStore {
    /// Create a store over the given feature documents
    pub fn new(features: Vec<Document>) -> Self {
        Self {
            features,
            batch_size: 2,
            fail_after: None,
        }
    }

    /// Make entry queries fail with a cursor error after `count` rows
    pub fn fail_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    fn survey_features<'a>(&'a self, survey_id: &'a str) -> impl Iterator<Item = &'a Document> + 'a {
        self.features.iter().filter(move |f| {
            f.get_document("properties")
                .ok()
                .and_then(|p| p.get_str("survey").ok())
                == Some(survey_id)
        })
    }

    /// Selected entry rows with their creation time, oldest first
    ///
    /// Both sorts are stable, so equal timestamps keep stored order.
    fn entry_rows(&self, survey_id: &str, filter: FilterKind) -> Vec<(i64, Document)> {
        let mut rows = Vec::new();
        for feature in self.survey_features(survey_id) {
            let mut history: Vec<&Document> = entries(feature).collect();
            history.sort_by_key(|entry| created_millis(entry));
            if filter == FilterKind::Latest {
                history = history.split_off(history.len().saturating_sub(1));
            }
            for entry in history {
                rows.push((created_millis(entry), entry_row(feature, entry)));
            }
        }
        rows.sort_by_key(|(created, _)| *created);
        rows
    }
}

fn created_millis(entry: &Document) -> i64 {
    entry
        .get_datetime("created")
        .map(|d| d.timestamp_millis())
        .unwrap_or(i64::MAX)
}

/// The feature with `entries` narrowed to one entry
fn entry_row(feature: &Document, entry: &Document) -> Document {
    let mut row: Document = feature
        .iter()
        .filter(|(key, _)| key.as_str() != "entries")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    row.insert("entries", vec![Bson::Document(entry.clone())]);
    row
}

fn entries(feature: &Document) -> impl Iterator<Item = &Document> {
    feature
        .get_array("entries")
        .map(|a| a.as_slice())
        .unwrap_or(&[])
        .iter()
        .filter_map(Bson::as_document)
}

fn redact(mut feature: Document) -> Document {
    if let Ok(list) = feature.get_array_mut("entries") {
        for entry in list.iter_mut() {
            if let Some(source) = entry
                .as_document_mut()
                .and_then(|e| e.get_document_mut("source").ok())
            {
                source.remove("collector");
            }
        }
    }
    feature
}

fn shape_of(entry: &Document) -> Document {
    let info: Vec<Bson> = entry
        .get_document("info")
        .map(|d| d.keys().map(|k| Bson::String(k.clone())).collect())
        .unwrap_or_default();

    let responses: Vec<Bson> = entry
        .get_document("responses")
        .map(|d| {
            d.iter()
                .map(|(name, value)| {
                    let arity = match value {
                        Bson::Array(values) => values.len() as i64,
                        _ => 1,
                    };
                    Bson::Document(doc! { "name": name, "arity": arity })
                })
                .collect()
        })
        .unwrap_or_default();

    let files = entry.get_array("files").map(|f| f.len()).unwrap_or(0) as i64;

    doc! { "info": info, "responses": responses, "files": files }
}

#[async_trait]
impl SurveyStore for MemorySurveyStore {
    async fn entry_query(
        &self,
        survey_id: &str,
        filter: FilterKind,
        redact_collectors: bool,
    ) -> Result<Box<dyn StreamingQuery>> {
        let mut rows: Vec<Document> = self
            .entry_rows(survey_id, filter)
            .into_iter()
            .map(|(_, row)| row)
            .collect();
        if redact_collectors {
            rows = rows.into_iter().map(redact).collect();
        }

        Ok(Box::new(VecStreamingQuery {
            docs: rows.into(),
            batch_size: self.batch_size.max(1),
            fail_after: self.fail_after,
            yielded: 0,
        }))
    }

    async fn shape_query(&self, survey_id: &str) -> Result<Box<dyn StreamingQuery>> {
        let mut shapes: Vec<(i64, Document)> = self
            .survey_features(survey_id)
            .flat_map(entries)
            .map(|entry| (created_millis(entry), shape_of(entry)))
            .collect();
        shapes.sort_by_key(|(created, _)| *created);

        Ok(Box::new(VecStreamingQuery {
            docs: shapes.into_iter().map(|(_, shape)| shape).collect(),
            batch_size: self.batch_size.max(1),
            fail_after: None,
            yielded: 0,
        }))
    }
}

/// Batched query over documents already in memory
struct VecStreamingQuery {
    docs: VecDeque<Document>,
    batch_size: usize,
    fail_after: Option<usize>,
    yielded: usize,
}

#[async_trait]
impl StreamingQuery for VecStreamingQuery {
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>> {
        if self.fail_after.is_some_and(|limit| self.yielded >= limit) {
            self.docs.clear();
            return Err(DataAccessError::CursorError("connection reset by peer".to_string()).into());
        }

        let mut take = self.batch_size.min(self.docs.len());
        if let Some(limit) = self.fail_after {
            take = take.min(limit - self.yielded);
        }
        if take == 0 {
            return Ok(None);
        }

        self.yielded += take;
        Ok(Some(self.docs.drain(..take).collect()))
    }

    async fn close(&mut self) -> Result<()> {
        self.docs.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(object_id: &str, survey: &str, created: i64) -> Document {
        doc! {
            "properties": { "survey": survey, "object_id": object_id, "centroid": [0.0, 0.0] },
            "entries": [{
                "id": format!("{object_id}-e"),
                "created": bson::DateTime::from_millis(created),
                "source": { "type": "mobile", "collector": "Ana" },
                "info": { "ward": 1 },
                "responses": { "use": "vacant", "hazards": ["a", "b", "c"] },
                "files": ["x.jpg"],
            }],
        }
    }

    async fn drain(mut query: Box<dyn StreamingQuery>) -> Vec<Document> {
        let mut all = Vec::new();
        while let Some(batch) = query.next_batch().await.unwrap() {
            all.extend(batch);
        }
        all
    }

    fn history(object_id: &str, created: &[i64]) -> Document {
        let entries: Vec<Document> = created
            .iter()
            .map(|t| {
                doc! {
                    "id": format!("{object_id}-{t}"),
                    "created": bson::DateTime::from_millis(*t),
                    "source": { "type": "mobile" },
                }
            })
            .collect();
        doc! {
            "properties": { "survey": "s1", "object_id": object_id, "centroid": [0.0, 0.0] },
            "entries": entries,
        }
    }

    fn entry_ids(rows: &[Document]) -> Vec<String> {
        rows.iter()
            .map(|row| {
                let entries = row.get_array("entries").unwrap();
                assert_eq!(entries.len(), 1);
                entries[0].as_document().unwrap().get_str("id").unwrap().to_string()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_entry_query_matches_survey() {
        let store = MemorySurveyStore::new(vec![
            feature("b", "s1", 2_000),
            feature("x", "other", 0),
            feature("a", "s1", 1_000),
        ]);
        let rows = drain(store.entry_query("s1", FilterKind::All, false).await.unwrap()).await;
        assert_eq!(entry_ids(&rows), vec!["a-e", "b-e"]);
        assert_eq!(
            rows[0].get_document("properties").unwrap().get_str("object_id").unwrap(),
            "a"
        );
    }

    #[tokio::test]
    async fn test_entry_query_orders_rows_across_features() {
        let store = MemorySurveyStore::new(vec![
            history("a", &[30, 10]),
            history("b", &[20]),
            history("c", &[]),
        ]);
        let all = drain(store.entry_query("s1", FilterKind::All, false).await.unwrap()).await;
        assert_eq!(entry_ids(&all), vec!["a-10", "b-20", "a-30"]);

        let latest = drain(store.entry_query("s1", FilterKind::Latest, false).await.unwrap()).await;
        assert_eq!(entry_ids(&latest), vec!["b-20", "a-30"]);
    }

    #[tokio::test]
    async fn test_entry_query_redacts() {
        let store = MemorySurveyStore::new(vec![feature("a", "s1", 0)]);
        let rows = drain(store.entry_query("s1", FilterKind::All, true).await.unwrap()).await;
        let entry = rows[0].get_array("entries").unwrap()[0].as_document().unwrap();
        assert!(!entry.get_document("source").unwrap().contains_key("collector"));
    }

    #[tokio::test]
    async fn test_shape_query_layout() {
        let store = MemorySurveyStore::new(vec![feature("a", "s1", 0)]);
        let shapes = drain(store.shape_query("s1").await.unwrap()).await;
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].get_i64("files").unwrap(), 1);
        let responses = shapes[0].get_array("responses").unwrap();
        let hazards = responses[1].as_document().unwrap();
        assert_eq!(hazards.get_str("name").unwrap(), "hazards");
        assert_eq!(hazards.get_i64("arity").unwrap(), 3);
    }

    #[tokio::test]
    async fn test_fail_after() {
        let store = MemorySurveyStore::new(vec![
            feature("a", "s1", 0),
            feature("b", "s1", 1),
            feature("c", "s1", 2),
        ])
        .fail_after(1);
        let mut query = store.entry_query("s1", FilterKind::All, false).await.unwrap();
        assert_eq!(query.next_batch().await.unwrap().unwrap().len(), 1);
        let err = query.next_batch().await.unwrap_err();
        assert_eq!(err.kind(), "DataAccessError");
    }
}
