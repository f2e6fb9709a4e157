//! SQLite table writer
//!
//! Writes entries into a single table `tbl` of a fresh SQLite database,
//! geometry as Well-Known Text in `WKT_GEOMETRY`. The database is only an
//! intermediate for the conversion tool, so writes are not synced.
//!
//! SQLite compares column names case-insensitively; every column goes
//! through one [`NamingRule::SqliteColumn`] namer so that fields differing
//! only by case get distinct columns.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use bson::Bson;
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tracing::debug;

use crate::error::{EncodingError, ExportError, Result};
use crate::export::naming::{FieldNamer, NamingRule};
use crate::export::schema::SchemaDescriptor;
use crate::model::Entry;
use crate::values::{BsonConverter, CellConverter};

use super::{EncoderOptions, FormatWriter, TimeRenderer};

const CORE_SQLITE_COLUMNS: [&str; 10] = [
    "object_id",
    "WKT_GEOMETRY",
    "address",
    "collector",
    "timestamp",
    "source",
    "entry_id",
    "lat",
    "long",
    "photos",
];

/// Writer for the SQLite intermediate
pub struct SqliteTableWriter {
    conn: Option<Mutex<Connection>>,
    path: PathBuf,
    columns: Vec<String>,
    insert_sql: String,
    info_fields: Vec<String>,
    response_fields: Vec<String>,
    file_count: usize,
    time: TimeRenderer,
    converter: CellConverter,
    written: u64,
}

impl SqliteTableWriter {
    /// Create the database file and its table
    ///
    /// # Arguments
    /// * `path` - Database file to create
    /// * `schema` - Discovered schema
    /// * `options` - Encoder options
    ///
    /// # Returns
    /// * `Result<Self>` - Writer ready for inserts
    pub fn create(path: &Path, schema: &SchemaDescriptor, options: &EncoderOptions) -> Result<Self> {
        let columns = Self::column_names(schema);

        let conn = Connection::open(path)?;
        let quoted: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
        conn.execute_batch(&format!(
            "CREATE TABLE tbl({});\nPRAGMA synchronous=OFF;",
            quoted.join(",")
        ))?;

        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(",");
        let insert_sql = format!("INSERT INTO tbl VALUES({placeholders})");

        debug!(
            "Created SQLite table with {} columns at {}",
            columns.len(),
            path.display()
        );

        Ok(Self {
            conn: Some(Mutex::new(conn)),
            path: path.to_path_buf(),
            columns,
            insert_sql,
            info_fields: schema.info_fields().to_vec(),
            response_fields: schema.response_fields().to_vec(),
            file_count: schema.file_count(),
            time: TimeRenderer::new(options),
            converter: CellConverter::new(),
            written: 0,
        })
    }

    /// Column names of the table, in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn column_names(schema: &SchemaDescriptor) -> Vec<String> {
        let mut namer = FieldNamer::new(NamingRule::SqliteColumn);
        let photos = (1..schema.file_count()).map(|i| format!("photos{i}"));

        CORE_SQLITE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(photos)
            .chain(schema.info_fields().iter().map(|f| format!("i_{f}")))
            .chain(schema.response_fields().iter().map(|f| format!("r_{f}")))
            .map(|label| namer.name(&label))
            .collect()
    }

    fn field_value(&self, value: Option<&Bson>) -> Value {
        match value {
            None | Some(Bson::Null) | Some(Bson::Undefined) => Value::Null,
            Some(Bson::String(s)) => Value::Text(s.clone()),
            Some(Bson::Int32(n)) => Value::Integer(i64::from(*n)),
            Some(Bson::Int64(n)) => Value::Integer(*n),
            Some(Bson::Double(f)) => Value::Real(*f),
            Some(Bson::Boolean(b)) => Value::Integer(i64::from(*b)),
            Some(other) => Value::Text(self.converter.convert(other)),
        }
    }

    fn row(&self, entry: &Entry) -> Vec<Value> {
        let text = |s: &str| Value::Text(s.to_string());

        let mut row = Vec::with_capacity(self.columns.len());
        row.push(text(&entry.object_id));
        row.push(Value::Text(entry.geometry.to_wkt()));
        row.push(text(entry.address.as_deref().unwrap_or("")));
        row.push(entry.source.collector.as_deref().map_or(Value::Null, text));
        row.push(Value::Text(self.time.render(&entry.created)));
        row.push(text(&entry.source.kind));
        row.push(text(&entry.id));
        row.push(Value::Real(entry.centroid.lat));
        row.push(Value::Real(entry.centroid.lon));
        row.push(text(entry.files.first().map(String::as_str).unwrap_or("")));
        for i in 1..self.file_count {
            row.push(entry.files.get(i).map_or(Value::Null, |f| text(f)));
        }
        for field in &self.info_fields {
            row.push(self.field_value(entry.info.get(field)));
        }
        for field in &self.response_fields {
            row.push(self.field_value(entry.responses.get(field)));
        }
        row
    }

    fn connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .as_ref()
            .ok_or_else(|| EncodingError::Sqlite("database already closed".to_string()))?
            .lock()
            .map_err(|_| EncodingError::Sqlite("connection lock poisoned".to_string()).into())
    }
}

#[async_trait]
impl FormatWriter for SqliteTableWriter {
    async fn write_entry(&mut self, entry: &Entry) -> Result<()> {
        let row = self.row(entry);
        {
            let conn = self.connection()?;
            let mut statement = conn.prepare_cached(&self.insert_sql)?;
            statement.execute(params_from_iter(row))?;
        }
        self.written += 1;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            let conn = conn.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
            conn.close().map_err(|(_, e)| ExportError::from(e))?;
        }
        debug!(
            "Finalized SQLite table {} ({} rows)",
            self.path.display(),
            self.written
        );
        Ok(())
    }

    async fn file_size(&self) -> Result<u64> {
        let metadata = tokio::fs::metadata(&self.path).await?;
        Ok(metadata.len())
    }
}
