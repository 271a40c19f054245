//! Typed access to the persisted tables.
//!
//! | table | content |
//! |---|---|
//! | `replenishment_records` | latest report, one row per SKU |
//! | `stock_snapshot` | latest stock levels with activity state |
//! | `manual_overrides` | operator overrides per SKU |
//! | `sales_panel` | dense monthly sales panel |
//! | `forecast_records` | latest forecast run |

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use stockpulse_ai::ForecastRecord;
use stockpulse_core::{RunId, Sku};
use stockpulse_inventory::{ActivityFlag, ActivityState, ManualOverride, ReplenishmentRecord, StockSnapshot};
use stockpulse_sales::SalesPanelRow;

use crate::store::{DeleteScope, PersistenceError, Row, TableStore};

pub const REPLENISHMENT_RECORDS: &str = "replenishment_records";
pub const STOCK_SNAPSHOT: &str = "stock_snapshot";
pub const MANUAL_OVERRIDES: &str = "manual_overrides";
pub const SALES_PANEL: &str = "sales_panel";
pub const FORECAST_RECORDS: &str = "forecast_records";

const SKU_COLUMN: &str = "product_sku";

/// Stored stock level plus the activity state it ended the last run with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub product_sku: Sku,
    pub product_name: String,
    pub category: String,
    pub stock_level: i64,
    pub unchanged_counter: u32,
    pub flag: ActivityFlag,
    pub updated_at: DateTime<Utc>,
}

impl SnapshotRow {
    pub fn snapshot(&self) -> StockSnapshot {
        StockSnapshot {
            product_sku: self.product_sku.clone(),
            product_name: self.product_name.clone(),
            category: self.category.clone(),
            stock_level: self.stock_level,
        }
    }

    pub fn activity(&self) -> ActivityState {
        ActivityState {
            unchanged_counter: self.unchanged_counter,
            flag: self.flag,
        }
    }

    /// Snapshot row written after a report: current level with the record's new state.
    pub fn from_record(record: &ReplenishmentRecord, updated_at: DateTime<Utc>) -> Self {
        Self {
            product_sku: record.product_sku.clone(),
            product_name: record.product_name.clone(),
            category: record.category.clone(),
            stock_level: record.stock_level,
            unchanged_counter: record.unchanged_counter,
            flag: record.flag,
            updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRow {
    pub product_sku: Sku,
    pub min_stock: Option<i64>,
    pub buffer: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl OverrideRow {
    pub fn manual(&self) -> ManualOverride {
        ManualOverride {
            min_stock: self.min_stock,
            buffer: self.buffer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    #[serde(flatten)]
    pub record: ForecastRecord,
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
}

fn encode<T: Serialize>(table: &str, value: &T) -> Result<Row, PersistenceError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(PersistenceError::Encode {
            table: table.to_string(),
            message: format!("expected an object, got {other}"),
        }),
        Err(e) => Err(PersistenceError::Encode {
            table: table.to_string(),
            message: e.to_string(),
        }),
    }
}

fn encode_all<'a, T: Serialize + 'a>(
    table: &str,
    values: impl IntoIterator<Item = &'a T>,
) -> Result<Vec<Row>, PersistenceError> {
    values.into_iter().map(|v| encode(table, v)).collect()
}

fn decode<T: DeserializeOwned>(table: &str, row: Row) -> Result<T, PersistenceError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| PersistenceError::Decode {
        table: table.to_string(),
        message: e.to_string(),
    })
}

fn sku_key(sku: &Sku) -> Value {
    Value::String(sku.as_str().to_string())
}

/// Typed repository over a [`TableStore`].
#[derive(Debug, Clone)]
pub struct Tables<S> {
    store: S,
}

impl<S: TableStore> Tables<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn load<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, PersistenceError> {
        self.store
            .select(table)
            .await?
            .into_iter()
            .map(|row| decode(table, row))
            .collect()
    }

    // stock state

    pub async fn stock_snapshot(&self) -> Result<Vec<SnapshotRow>, PersistenceError> {
        self.load(STOCK_SNAPSHOT).await
    }

    pub async fn replenishment_records(&self) -> Result<Vec<ReplenishmentRecord>, PersistenceError> {
        self.load(REPLENISHMENT_RECORDS).await
    }

    /// Replace both the report and the snapshot it produced.
    ///
    /// Rows are encoded before the first write.
    pub async fn replace_stock_state(
        &self,
        records: &[ReplenishmentRecord],
        snapshot: &[SnapshotRow],
    ) -> Result<(), PersistenceError> {
        let record_rows = encode_all(REPLENISHMENT_RECORDS, records)?;
        let snapshot_rows = encode_all(STOCK_SNAPSHOT, snapshot)?;
        self.store.replace(REPLENISHMENT_RECORDS, record_rows).await?;
        self.store.replace(STOCK_SNAPSHOT, snapshot_rows).await
    }

    /// Overwrite the persisted record of one SKU. Returns `false` when none exists.
    pub async fn update_replenishment_record(&self, record: &ReplenishmentRecord) -> Result<bool, PersistenceError> {
        let patch = encode(REPLENISHMENT_RECORDS, record)?;
        let updated = self
            .store
            .update(REPLENISHMENT_RECORDS, SKU_COLUMN, &sku_key(&record.product_sku), patch)
            .await?;
        Ok(updated > 0)
    }

    pub async fn clear_stock_state(&self) -> Result<u64, PersistenceError> {
        let snapshots = self.store.delete(STOCK_SNAPSHOT, DeleteScope::All).await?;
        let records = self.store.delete(REPLENISHMENT_RECORDS, DeleteScope::All).await?;
        Ok(snapshots + records)
    }

    // overrides

    pub async fn overrides(&self) -> Result<HashMap<Sku, ManualOverride>, PersistenceError> {
        let rows: Vec<OverrideRow> = self.load(MANUAL_OVERRIDES).await?;
        Ok(rows.into_iter().map(|r| (r.product_sku.clone(), r.manual())).collect())
    }

    /// Merge `update` into the stored override of `sku` and return the result.
    ///
    /// Fields absent from `update` keep their stored value.
    pub async fn upsert_override(
        &self,
        sku: &Sku,
        update: ManualOverride,
        now: DateTime<Utc>,
    ) -> Result<ManualOverride, PersistenceError> {
        let stored = self.overrides().await?.get(sku).copied();
        let merged = stored.unwrap_or_default().merged_with(update);
        let row = OverrideRow {
            product_sku: sku.clone(),
            min_stock: merged.min_stock,
            buffer: merged.buffer,
            updated_at: now,
        };
        let encoded = encode(MANUAL_OVERRIDES, &row)?;

        if stored.is_some() {
            self.store
                .update(MANUAL_OVERRIDES, SKU_COLUMN, &sku_key(sku), encoded)
                .await?;
        } else {
            self.store.insert(MANUAL_OVERRIDES, vec![encoded]).await?;
        }
        Ok(merged)
    }

    // sales

    pub async fn sales_panel(&self) -> Result<Vec<SalesPanelRow>, PersistenceError> {
        self.load(SALES_PANEL).await
    }

    pub async fn replace_sales_panel(&self, panel: &[SalesPanelRow]) -> Result<(), PersistenceError> {
        let rows = encode_all(SALES_PANEL, panel)?;
        self.store.replace(SALES_PANEL, rows).await
    }

    // forecasts

    pub async fn forecasts(&self) -> Result<Vec<ForecastRow>, PersistenceError> {
        self.load(FORECAST_RECORDS).await
    }

    pub async fn replace_forecasts(
        &self,
        run_id: RunId,
        records: &[ForecastRecord],
        created_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let rows: Vec<ForecastRow> = records
            .iter()
            .map(|record| ForecastRow {
                record: record.clone(),
                run_id,
                created_at,
            })
            .collect();
        let encoded = encode_all(FORECAST_RECORDS, &rows)?;
        self.store.replace(FORECAST_RECORDS, encoded).await
    }

    pub async fn clear_forecasts(&self) -> Result<u64, PersistenceError> {
        self.store.delete(FORECAST_RECORDS, DeleteScope::All).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};

    use super::*;
    use crate::store::InMemoryTableStore;

    fn sku(s: &str) -> Sku {
        Sku::new(s).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn override_upsert_keeps_unspecified_fields() {
        let tables = Tables::new(InMemoryTableStore::new());
        let first = tables
            .upsert_override(&sku("A"), ManualOverride { min_stock: Some(30), buffer: None }, now())
            .await
            .unwrap();
        assert_eq!(first, ManualOverride { min_stock: Some(30), buffer: None });

        let second = tables
            .upsert_override(&sku("A"), ManualOverride { min_stock: None, buffer: Some(7) }, now())
            .await
            .unwrap();
        assert_eq!(second, ManualOverride { min_stock: Some(30), buffer: Some(7) });

        let all = tables.overrides().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[&sku("A")], second);
        assert_eq!(tables.store().select(MANUAL_OVERRIDES).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn forecast_rows_flatten_the_record() {
        let tables = Tables::new(InMemoryTableStore::new());
        let record = ForecastRecord {
            product_sku: sku("A"),
            forecast_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            predicted_sales: 12,
            current_sales: 10,
            current_date_col: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        let run_id = RunId::new();
        tables.replace_forecasts(run_id, &[record.clone()], now()).await.unwrap();

        let raw = tables.store().select(FORECAST_RECORDS).await.unwrap();
        assert_eq!(raw[0]["product_sku"], Value::String("A".to_string()));
        assert_eq!(raw[0]["forecast_date"], Value::String("2024-04-01".to_string()));

        let rows = tables.forecasts().await.unwrap();
        assert_eq!(rows[0].record, record);
        assert_eq!(rows[0].run_id, run_id);
    }

    #[tokio::test]
    async fn undecodable_rows_surface_as_decode_errors() {
        let tables = Tables::new(InMemoryTableStore::new());
        let mut bad = Row::new();
        bad.insert("product_sku".to_string(), Value::Bool(true));
        tables.store().insert(SALES_PANEL, vec![bad]).await.unwrap();
        let err = tables.sales_panel().await.unwrap_err();
        assert!(matches!(err, PersistenceError::Decode { .. }));
    }
}
