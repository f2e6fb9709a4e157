//! Document store access
//!
//! The pipeline only needs two reads from the store:
//! - one row per selected entry of a survey, ordered by entry creation time
//! - one shape document per entry, consumed by schema discovery
//!
//! An entry row keeps the feature layout but its `entries` array holds just
//! the selected entry:
//!
//! ```text
//! { properties, geometry?, entries: [entry] }
//! ```
//!
//! Shape documents have the layout
//!
//! ```text
//! { info: [name, ..], responses: [{ name, arity }, ..], files: count }
//! ```
//!
//! and are decoded by [`crate::export::schema::EntryShape`].

use async_trait::async_trait;

use crate::error::Result;
use crate::model::FilterKind;

pub mod memory;
pub mod mongo;
pub mod streaming;

pub use memory::MemorySurveyStore;
pub use mongo::MongoSurveyStore;
pub use streaming::{CursorStreamingQuery, StreamingQuery};

/// Read access to survey features
#[async_trait]
pub trait SurveyStore: Send + Sync {
    /// Open a query returning one row per selected entry of a survey
    ///
    /// `Latest` selects the newest entry of each feature, `All` every entry.
    /// Features without entries produce no rows.
    ///
    /// # Arguments
    /// * `survey_id` - Survey to export
    /// * `filter` - Which entries of each feature to select
    /// * `redact_collectors` - Exclude `entries.source.collector` server-side
    ///
    /// # Returns
    /// * `Result<Box<dyn StreamingQuery>>` - Entry rows in non-decreasing
    ///   creation order
    async fn entry_query(
        &self,
        survey_id: &str,
        filter: FilterKind,
        redact_collectors: bool,
    ) -> Result<Box<dyn StreamingQuery>>;

    /// Open a query returning one shape document per entry of a survey
    ///
    /// # Arguments
    /// * `survey_id` - Survey to scan
    ///
    /// # Returns
    /// * `Result<Box<dyn StreamingQuery>>` - Shape documents in entry creation order
    async fn shape_query(&self, survey_id: &str) -> Result<Box<dyn StreamingQuery>>;
}
