use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use super::{DeleteScope, PersistenceError, Row, TableStore};

/// In-memory table store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryTableStore {
    inner: RwLock<HashMap<String, Vec<Row>>>,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(operation: &str) -> PersistenceError {
    PersistenceError::backend(operation, "in-memory store lock poisoned")
}

fn matches(row: &Row, column: &str, value: &Value) -> bool {
    row.get(column) == Some(value)
}

#[async_trait::async_trait]
impl TableStore for InMemoryTableStore {
    async fn select(&self, table: &str) -> Result<Vec<Row>, PersistenceError> {
        let map = self.inner.read().map_err(|_| poisoned("select"))?;
        Ok(map.get(table).cloned().unwrap_or_default())
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<(), PersistenceError> {
        let mut map = self.inner.write().map_err(|_| poisoned("insert"))?;
        map.entry(table.to_string()).or_default().extend(rows);
        Ok(())
    }

    async fn update(&self, table: &str, key_column: &str, key: &Value, patch: Row) -> Result<u64, PersistenceError> {
        let mut map = self.inner.write().map_err(|_| poisoned("update"))?;
        let Some(rows) = map.get_mut(table) else {
            return Ok(0);
        };
        let mut updated = 0;
        for row in rows.iter_mut().filter(|r| matches(r, key_column, key)) {
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, scope: DeleteScope) -> Result<u64, PersistenceError> {
        let mut map = self.inner.write().map_err(|_| poisoned("delete"))?;
        let Some(rows) = map.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        match scope {
            DeleteScope::All => rows.clear(),
            DeleteScope::Matching { column, value } => rows.retain(|r| !matches(r, &column, &value)),
        }
        Ok((before - rows.len()) as u64)
    }

    async fn replace(&self, table: &str, rows: Vec<Row>) -> Result<(), PersistenceError> {
        let mut map = self.inner.write().map_err(|_| poisoned("replace"))?;
        map.insert(table.to_string(), rows);
        Ok(())
    }
}
