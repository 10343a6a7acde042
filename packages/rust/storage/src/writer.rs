//! Schema-adaptive inserts.
//!
//! A [`SchemaAdaptiveWriter`] projects a [`Record`] onto the columns its
//! table actually has and inserts exactly that projection in one
//! transaction. The column snapshot is read on first use and cached until
//! [`SchemaAdaptiveWriter::refresh`] is called.

use std::collections::BTreeMap;
use std::sync::Arc;

use libsql::Value;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use welfarebridge_shared::{Result, WelfareBridgeError};

use crate::Storage;
use crate::schema::{TableSchema, TableSpec, quote_identifier};

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A value bound for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn to_sql(&self) -> Value {
        match self {
            Self::Text(s) => Value::Text(s.clone()),
            Self::Integer(n) => Value::Integer(*n),
            Self::Null => Value::Null,
        }
    }
}

/// Canonical field name → value. Field order comes from the [`TableSpec`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    values: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a text field. Surrounding whitespace is trimmed; blank text is NULL.
    pub fn text(mut self, field: impl Into<String>, value: impl AsRef<str>) -> Self {
        let trimmed = value.as_ref().trim();
        let v = if trimmed.is_empty() {
            FieldValue::Null
        } else {
            FieldValue::Text(trimmed.to_string())
        };
        self.values.insert(field.into(), v);
        self
    }

    /// Set an integer field; `None` is NULL.
    pub fn integer(mut self, field: impl Into<String>, value: Option<i64>) -> Self {
        let v = value.map_or(FieldValue::Null, FieldValue::Integer);
        self.values.insert(field.into(), v);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Absent or NULL.
    pub fn is_blank(&self, field: &str) -> bool {
        self.get(field).is_none_or(FieldValue::is_null)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Inserts records into one table, adapting to its live columns.
#[derive(Debug)]
pub struct SchemaAdaptiveWriter {
    storage: Storage,
    spec: TableSpec,
    schema: RwLock<Option<Arc<TableSchema>>>,
}

impl SchemaAdaptiveWriter {
    pub fn new(storage: Storage, spec: TableSpec) -> Self {
        Self {
            storage,
            spec,
            schema: RwLock::new(None),
        }
    }

    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    /// Cached schema, without touching the database.
    pub async fn cached_schema(&self) -> Option<Arc<TableSchema>> {
        self.schema.read().await.clone()
    }

    /// Current schema, resolved from live metadata on first use.
    pub async fn schema(&self) -> Result<Arc<TableSchema>> {
        if let Some(schema) = self.schema.read().await.as_ref() {
            return Ok(Arc::clone(schema));
        }

        let mut slot = self.schema.write().await;
        if let Some(schema) = slot.as_ref() {
            return Ok(Arc::clone(schema));
        }
        let schema = Arc::new(self.load().await?);
        *slot = Some(Arc::clone(&schema));
        Ok(schema)
    }

    /// Re-read live metadata and replace the cached schema.
    pub async fn refresh(&self) -> Result<Arc<TableSchema>> {
        let schema = Arc::new(self.load().await?);
        *self.schema.write().await = Some(Arc::clone(&schema));
        Ok(schema)
    }

    async fn load(&self) -> Result<TableSchema> {
        let columns = self.storage.table_columns(self.spec.table()).await?;
        let schema = TableSchema::resolve(&self.spec, columns);

        if !schema.exists() {
            warn!(table = schema.table(), "destination table not found");
        } else {
            let missing = schema.missing_fields();
            if !missing.is_empty() {
                warn!(
                    table = schema.table(),
                    missing = ?missing,
                    "fields without a matching column will not be persisted"
                );
            }
        }
        debug!(
            table = schema.table(),
            columns = schema.columns().len(),
            "schema resolved"
        );
        Ok(schema)
    }

    /// Insert `record` and return the new row id.
    ///
    /// Fails with a Validation error, before any database call, when the
    /// required field is blank. Fields with no column are dropped, and
    /// fields the [`TableSpec`] does not list are ignored.
    ///
    /// A failed write re-reads the live columns. When they differ from the
    /// cached schema the record is projected again and written once more.
    #[instrument(skip_all, fields(table = self.spec.table()))]
    pub async fn insert(&self, record: &Record) -> Result<i64> {
        if let Some(required) = self.spec.required() {
            if record.is_blank(required) {
                return Err(WelfareBridgeError::validation(format!(
                    "{required} is required"
                )));
            }
        }

        let schema = self.schema().await?;
        match self.write(&schema, record).await {
            Err(WelfareBridgeError::Storage(message)) => {
                let fresh = self.refresh().await?;
                if fresh.columns() == schema.columns() {
                    return Err(WelfareBridgeError::Storage(message));
                }
                warn!(%message, "table columns changed, retrying insert");
                self.write(&fresh, record).await
            }
            other => other,
        }
    }

    async fn write(&self, schema: &TableSchema, record: &Record) -> Result<i64> {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for binding in schema.bindings() {
            let value = record.get(binding.field);
            match (&binding.column, value) {
                (Some(column), Some(v)) => {
                    columns.push(quote_identifier(column));
                    values.push(v.to_sql());
                }
                (None, Some(v)) if !v.is_null() => {
                    warn!(field = binding.field, "dropping value with no column");
                }
                _ => {}
            }
        }

        if columns.is_empty() {
            return Err(WelfareBridgeError::Storage(format!(
                "table {} has no column for any field in the record",
                schema.table()
            )));
        }

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(schema.table()),
            columns.join(", "),
            placeholders.join(", ")
        );

        let id = self
            .storage
            .timed(async {
                let conn = self.storage.connect()?;
                let tx = conn
                    .transaction()
                    .await
                    .map_err(|e| WelfareBridgeError::Storage(e.to_string()))?;
                tx.execute(&sql, values)
                    .await
                    .map_err(|e| WelfareBridgeError::Storage(e.to_string()))?;
                let id = tx.last_insert_rowid();
                tx.commit()
                    .await
                    .map_err(|e| WelfareBridgeError::Storage(e.to_string()))?;
                Ok(id)
            })
            .await?;

        debug!(id, columns = columns.len(), "row inserted");
        Ok(id)
    }
}
