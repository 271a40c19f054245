//! Generic table persistence.
//!
//! Every persisted table is a list of JSON objects addressed by table name. The
//! typed mapping lives in [`crate::tables`]; stores only move rows.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use serde_json::Value;

pub use in_memory::InMemoryTableStore;
pub use postgres::PostgresTableStore;

/// One stored row.
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The backend rejected or failed the operation.
    #[error("persistence backend failed during {operation}: {message}")]
    Backend { operation: String, message: String },

    /// A stored row could not be turned back into its typed form.
    #[error("could not decode row of {table}: {message}")]
    Decode { table: String, message: String },

    /// A typed value could not be turned into a row.
    #[error("could not encode row for {table}: {message}")]
    Encode { table: String, message: String },
}

impl PersistenceError {
    pub fn backend(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

/// Which rows a delete applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteScope {
    All,
    /// Rows whose `column` equals `value`.
    Matching { column: String, value: Value },
}

/// Table-oriented persistence boundary.
///
/// Implementations do not retry. A failed call leaves no guarantee about partial
/// effects except where a method documents atomicity.
#[async_trait::async_trait]
pub trait TableStore: Send + Sync {
    /// All rows of `table` in insertion order; an unknown table is empty.
    async fn select(&self, table: &str) -> Result<Vec<Row>, PersistenceError>;

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<(), PersistenceError>;

    /// Merge `patch` into every row whose `key_column` equals `key`. Returns the
    /// number of rows updated.
    async fn update(&self, table: &str, key_column: &str, key: &Value, patch: Row) -> Result<u64, PersistenceError>;

    /// Returns the number of rows deleted.
    async fn delete(&self, table: &str, scope: DeleteScope) -> Result<u64, PersistenceError>;

    /// Replace the whole content of `table`.
    ///
    /// The default is delete-then-insert; backends with transactions override it to
    /// make the swap atomic.
    async fn replace(&self, table: &str, rows: Vec<Row>) -> Result<(), PersistenceError> {
        self.delete(table, DeleteScope::All).await?;
        self.insert(table, rows).await
    }
}

#[async_trait::async_trait]
impl<S> TableStore for Arc<S>
where
    S: TableStore + ?Sized,
{
    async fn select(&self, table: &str) -> Result<Vec<Row>, PersistenceError> {
        (**self).select(table).await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<(), PersistenceError> {
        (**self).insert(table, rows).await
    }

    async fn update(&self, table: &str, key_column: &str, key: &Value, patch: Row) -> Result<u64, PersistenceError> {
        (**self).update(table, key_column, key, patch).await
    }

    async fn delete(&self, table: &str, scope: DeleteScope) -> Result<u64, PersistenceError> {
        (**self).delete(table, scope).await
    }

    async fn replace(&self, table: &str, rows: Vec<Row>) -> Result<(), PersistenceError> {
        (**self).replace(table, rows).await
    }
}
