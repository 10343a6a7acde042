//! libSQL storage layer with schema-adaptive inserts.
//!
//! The library never creates or alters tables. Destination columns are
//! discovered from live metadata ([`Storage::table_columns`]) and every
//! insert is projected onto whatever exists ([`SchemaAdaptiveWriter`]).
//!
//! Each persistence call opens its own connection and transaction, so
//! concurrent callers never share state beyond the database file.

mod income;
mod schema;
mod welfare;
mod writer;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use libsql::{Connection, Database, params};
use welfarebridge_shared::{Result, StorageConfig, WelfareBridgeError, expand_home};

pub use income::{INCOME_REQUEST_FIELDS, INCOME_SNAPSHOT_FIELDS, IncomeStore, SavedEstimate};
pub use schema::{ColumnBinding, FieldSpec, TableSchema, TableSpec, quote_identifier};
pub use welfare::{WELFARE_FIELDS, WelfareStore, welfare_record};
pub use writer::{FieldValue, Record, SchemaAdaptiveWriter};

/// Default per-call timeout when none is configured.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to a local libSQL database.
///
/// Cheap to clone; clones share the underlying [`Database`].
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
    path: PathBuf,
    timeout: Duration,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.path)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Storage {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WelfareBridgeError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| WelfareBridgeError::Storage(e.to_string()))?;

        tracing::debug!(path = %path.display(), "database opened");
        Ok(Self {
            db: Arc::new(db),
            path: path.to_path_buf(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Open the database named by the `[storage]` section.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let path = expand_home(&config.path)?;
        Ok(Self::open(&path)
            .await?
            .with_timeout(Duration::from_secs(config.timeout_secs)))
    }

    /// Override the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Open a fresh connection. Callers own it and drop it when done.
    pub fn connect(&self) -> Result<Connection> {
        self.db
            .connect()
            .map_err(|e| WelfareBridgeError::Storage(e.to_string()))
    }

    /// Run `fut` under the per-call timeout.
    pub async fn timed<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| {
                WelfareBridgeError::Storage(format!(
                    "database call timed out after {:?}",
                    self.timeout
                ))
            })?
    }

    /// Round-trip `SELECT 1` on a new connection.
    pub async fn ping(&self) -> Result<()> {
        self.timed(async {
            let conn = self.connect()?;
            let mut rows = conn
                .query("SELECT 1", params![])
                .await
                .map_err(|e| WelfareBridgeError::Storage(e.to_string()))?;
            rows.next()
                .await
                .map_err(|e| WelfareBridgeError::Storage(e.to_string()))?
                .ok_or_else(|| WelfareBridgeError::Storage("SELECT 1 returned no row".into()))?;
            Ok(())
        })
        .await
    }

    /// Live column names of `table`, in declaration order.
    ///
    /// A table that does not exist yields an empty list.
    pub async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        self.timed(async {
            let conn = self.connect()?;
            let mut rows = conn
                .query(
                    "SELECT name FROM pragma_table_info(?1) ORDER BY cid",
                    params![table],
                )
                .await
                .map_err(|e| WelfareBridgeError::Storage(e.to_string()))?;

            let mut columns = Vec::new();
            while let Some(row) = rows
                .next()
                .await
                .map_err(|e| WelfareBridgeError::Storage(e.to_string()))?
            {
                columns.push(
                    row.get::<String>(0)
                        .map_err(|e| WelfareBridgeError::Storage(e.to_string()))?,
                );
            }
            Ok(columns)
        })
        .await
    }

    /// Release this handle. Other clones keep the database open.
    pub fn close(self) {
        tracing::debug!(path = %self.path.display(), "storage handle closed");
    }
}
