//! Postgres-backed table store.
//!
//! All logical tables share one physical table of JSONB rows keyed by
//! `table_name`, ordered by a serial column so `select` returns rows in insertion
//! order.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PersistenceError |
//! |------------|------------------|
//! | Database | `Backend` with the database message |
//! | PoolClosed | `Backend` ("connection pool closed") |
//! | Other | `Backend` with the error text |
//!
//! A row whose JSON is not an object maps to `Decode`.

use std::sync::Arc;

use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row as _};
use tracing::{Span, instrument};

use super::{DeleteScope, PersistenceError, Row, TableStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS stockpulse_rows (
    seq BIGSERIAL PRIMARY KEY,
    table_name TEXT NOT NULL,
    row JSONB NOT NULL,
    inserted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS stockpulse_rows_table_idx ON stockpulse_rows (table_name, seq);
"#;

/// Postgres-backed [`TableStore`].
///
/// Uses the SQLx connection pool, which is `Send + Sync`; `replace` runs in a
/// transaction.
#[derive(Debug, Clone)]
pub struct PostgresTableStore {
    pool: Arc<PgPool>,
}

impl PostgresTableStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect with a small pool.
    pub async fn connect(database_url: &str) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the backing table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

fn decode_row(table: &str, row: &sqlx::postgres::PgRow) -> Result<Row, PersistenceError> {
    let value: Value = row.try_get("row").map_err(|e| PersistenceError::Decode {
        table: table.to_string(),
        message: e.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(PersistenceError::Decode {
            table: table.to_string(),
            message: format!("expected a JSON object, found {other}"),
        }),
    }
}

#[async_trait::async_trait]
impl TableStore for PostgresTableStore {
    #[instrument(skip(self), fields(row_count), err)]
    async fn select(&self, table: &str) -> Result<Vec<Row>, PersistenceError> {
        let rows = sqlx::query("SELECT row FROM stockpulse_rows WHERE table_name = $1 ORDER BY seq ASC")
            .bind(table)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("select", e))?;

        let decoded = rows
            .iter()
            .map(|r| decode_row(table, r))
            .collect::<Result<Vec<_>, _>>()?;
        Span::current().record("row_count", decoded.len());
        Ok(decoded)
    }

    #[instrument(skip(self, rows), fields(row_count = rows.len()), err)]
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        for row in rows {
            sqlx::query("INSERT INTO stockpulse_rows (table_name, row) VALUES ($1, $2)")
                .bind(table)
                .bind(Value::Object(row))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert", e))?;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }

    #[instrument(skip(self, patch), err)]
    async fn update(&self, table: &str, key_column: &str, key: &Value, patch: Row) -> Result<u64, PersistenceError> {
        let result = sqlx::query(
            r#"
            UPDATE stockpulse_rows
            SET row = row || $4
            WHERE table_name = $1 AND row -> $2 = $3
            "#,
        )
        .bind(table)
        .bind(key_column)
        .bind(key)
        .bind(Value::Object(patch))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, table: &str, scope: DeleteScope) -> Result<u64, PersistenceError> {
        let result = match scope {
            DeleteScope::All => {
                sqlx::query("DELETE FROM stockpulse_rows WHERE table_name = $1")
                    .bind(table)
                    .execute(&*self.pool)
                    .await
            }
            DeleteScope::Matching { column, value } => {
                sqlx::query("DELETE FROM stockpulse_rows WHERE table_name = $1 AND row -> $2 = $3")
                    .bind(table)
                    .bind(column)
                    .bind(value)
                    .execute(&*self.pool)
                    .await
            }
        }
        .map_err(|e| map_sqlx_error("delete", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, rows), fields(row_count = rows.len()), err)]
    async fn replace(&self, table: &str, rows: Vec<Row>) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        sqlx::query("DELETE FROM stockpulse_rows WHERE table_name = $1")
            .bind(table)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("replace", e))?;
        for row in rows {
            sqlx::query("INSERT INTO stockpulse_rows (table_name, row) VALUES ($1, $2)")
                .bind(table)
                .bind(Value::Object(row))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("replace", e))?;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> PersistenceError {
    match err {
        sqlx::Error::Database(db_err) => PersistenceError::backend(operation, db_err.message()),
        sqlx::Error::PoolClosed => PersistenceError::backend(operation, "connection pool closed"),
        other => PersistenceError::backend(operation, other),
    }
}
