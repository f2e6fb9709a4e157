//! MongoDB-backed survey store

use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{Document, doc};
use mongodb::options::{AggregateOptions, ClientOptions};
use mongodb::{Client, Collection};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{DataAccessError, ExportError, Result};
use crate::model::FilterKind;

use super::streaming::{CursorStreamingQuery, StreamingQuery};
use super::SurveyStore;

/// Survey store reading feature documents from one MongoDB collection
pub struct MongoSurveyStore {
    /// MongoDB client instance
    client: Client,

    /// Feature collection
    collection: Collection<Document>,

    /// Cursor batch size
    batch_size: u32,
}

impl MongoSurveyStore {
    /// Connect to the store described by the configuration
    ///
    /// The database is taken from the URI path, falling back to
    /// `store.database`.
    ///
    /// # Arguments
    /// * `config` - Store configuration
    ///
    /// # Returns
    /// * `Result<Self>` - Connected store or data access error
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| DataAccessError::ConnectionFailed(e.to_string()))?;

        let timeout = Duration::from_secs(config.timeout);
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        options.app_name = Some("survey-export".to_string());

        let client = Client::with_options(options)
            .map_err(|e| DataAccessError::ConnectionFailed(e.to_string()))?;

        let database = client
            .default_database()
            .or_else(|| config.database.as_deref().map(|name| client.database(name)))
            .ok_or(DataAccessError::NoDatabase)?;

        info!(
            "Using collection {}.{}",
            database.name(),
            config.collection
        );

        Ok(Self {
            collection: database.collection(&config.collection),
            client,
            batch_size: config.batch_size,
        })
    }

    /// Shut the client down, ending its background monitoring tasks
    pub async fn shutdown(self) {
        self.client.shutdown().await;
        debug!("Store client shut down");
    }

    fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions::builder()
            .allow_disk_use(true)
            .batch_size(self.batch_size)
            .build()
    }

    /// Entry row pipeline
    ///
    /// Entries are unwound and sorted globally by creation time, so rows of
    /// different features interleave. `_id` breaks ties between features.
    fn entry_pipeline(survey_id: &str, filter: FilterKind, redact_collectors: bool) -> Vec<Document> {
        let by_created = doc! { "$sort": { "entries.created": 1, "_id": 1 } };
        let mut pipeline = vec![
            doc! { "$match": { "properties.survey": survey_id } },
            doc! { "$unwind": "$entries" },
            by_created.clone(),
        ];
        if filter == FilterKind::Latest {
            pipeline.push(doc! {
                "$group": {
                    "_id": "$_id",
                    "properties": { "$first": "$properties" },
                    "geometry": { "$first": "$geometry" },
                    "entries": { "$last": "$entries" },
                }
            });
            pipeline.push(by_created);
        }
        if redact_collectors {
            pipeline.push(doc! { "$unset": "entries.source.collector" });
        }
        pipeline.push(doc! {
            "$project": { "properties": 1, "geometry": 1, "entries": ["$entries"] }
        });
        pipeline
    }

    /// Per-entry shape pipeline used by schema discovery
    fn shape_pipeline(survey_id: &str) -> Vec<Document> {
        vec![
            doc! { "$match": { "properties.survey": survey_id } },
            doc! { "$unwind": "$entries" },
            doc! { "$sort": { "entries.created": 1 } },
            doc! {
                "$project": {
                    "_id": 0,
                    "info": {
                        "$map": {
                            "input": { "$objectToArray": { "$ifNull": ["$entries.info", {}] } },
                            "as": "kv",
                            "in": "$$kv.k",
                        }
                    },
                    "responses": {
                        "$map": {
                            "input": { "$objectToArray": { "$ifNull": ["$entries.responses", {}] } },
                            "as": "kv",
                            "in": {
                                "name": "$$kv.k",
                                "arity": {
                                    "$cond": [
                                        { "$isArray": "$$kv.v" },
                                        { "$size": "$$kv.v" },
                                        1
                                    ]
                                },
                            },
                        }
                    },
                    "files": { "$size": { "$ifNull": ["$entries.files", []] } },
                }
            },
        ]
    }
}

#[async_trait]
impl SurveyStore for MongoSurveyStore {
    async fn entry_query(
        &self,
        survey_id: &str,
        filter: FilterKind,
        redact_collectors: bool,
    ) -> Result<Box<dyn StreamingQuery>> {
        debug!("Opening {:?} entry aggregation for survey {}", filter, survey_id);
        let cursor = self
            .collection
            .aggregate(Self::entry_pipeline(survey_id, filter, redact_collectors))
            .with_options(self.aggregate_options())
            .await
            .map_err(ExportError::query)?;

        Ok(Box::new(CursorStreamingQuery::new(
            cursor,
            self.batch_size,
            "entry",
        )))
    }

    async fn shape_query(&self, survey_id: &str) -> Result<Box<dyn StreamingQuery>> {
        debug!("Opening shape aggregation for survey {}", survey_id);
        let cursor = self
            .collection
            .aggregate(Self::shape_pipeline(survey_id))
            .with_options(self.aggregate_options())
            .await
            .map_err(ExportError::query)?;

        Ok(Box::new(CursorStreamingQuery::new(
            cursor,
            self.batch_size,
            "shape",
        )))
    }
}
