use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{Span, field, info, instrument, warn};

use stockpulse_core::{RunId, Sku};
use stockpulse_inventory::{
    ActivityFlag, ActivityState, ManualOverride, ReplenishmentRecord, StockSnapshot, StockStatus, apply_activity_flags,
    generate_report,
};

use super::{PipelineError, Pipelines};
use crate::store::TableStore;
use crate::tables::SnapshotRow;

#[derive(Debug, Clone, Serialize)]
pub struct StockReport {
    pub run_id: RunId,
    pub records: Vec<ReplenishmentRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverrideOutcome {
    pub product_sku: Sku,
    /// Override as stored after the merge.
    pub manual: ManualOverride,
    /// Re-evaluated record, when the SKU has one.
    pub record: Option<ReplenishmentRecord>,
}

/// Ordering of [`Pipelines::stock_levels`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockSort {
    /// As stored by the last report.
    #[default]
    Stored,
    QuantityAsc,
    QuantityDesc,
    NameAsc,
    NameDesc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockLevelFilter {
    pub category: Option<String>,
    pub flag: Option<ActivityFlag>,
    pub sort: StockSort,
}

impl StockLevelFilter {
    fn matches(&self, row: &SnapshotRow) -> bool {
        self.category.as_deref().is_none_or(|c| row.category == c) && self.flag.is_none_or(|f| row.flag == f)
    }
}

fn name_key(row: &SnapshotRow) -> (&str, &Sku) {
    (&row.product_name, &row.product_sku)
}

impl<S: TableStore> Pipelines<S> {
    /// Compare `current` against the previous snapshot and persist the report.
    ///
    /// The previous snapshot is the stored one; `previous` is only read when nothing
    /// is stored yet. Prior flag/counter state comes from the stored snapshot.
    #[instrument(name = "stock_report", skip_all, fields(run_id = field::Empty, skus = current.len()))]
    pub async fn stock_report(
        &self,
        current: Vec<StockSnapshot>,
        previous: Option<Vec<StockSnapshot>>,
    ) -> Result<StockReport, PipelineError> {
        let run_id = RunId::new();
        Span::current().record("run_id", field::display(run_id));

        if current.is_empty() {
            return Err(PipelineError::Validation("no current stock snapshot supplied".to_string()));
        }

        let stored = self.tables.stock_snapshot().await?;
        let previous: Vec<StockSnapshot> = if !stored.is_empty() {
            if previous.is_some() {
                warn!(stored = stored.len(), "stored snapshot exists; ignoring uploaded previous snapshot");
            }
            stored.iter().map(SnapshotRow::snapshot).collect()
        } else if let Some(rows) = previous {
            rows
        } else {
            return Err(PipelineError::Validation(
                "no stored stock snapshot; a previous snapshot must be supplied".to_string(),
            ));
        };
        let prior: HashMap<Sku, ActivityState> = stored
            .iter()
            .map(|row| (row.product_sku.clone(), row.activity()))
            .collect();
        let overrides = self.tables.overrides().await?;

        let mut records = generate_report(&previous, &current, &overrides, &self.settings.replenishment);
        apply_activity_flags(&mut records, &prior);

        let now = Utc::now();
        let snapshot: Vec<SnapshotRow> = records.iter().map(|r| SnapshotRow::from_record(r, now)).collect();
        self.tables.replace_stock_state(&records, &snapshot).await?;

        let count = |status: StockStatus| records.iter().filter(|r| r.status == status).count();
        info!(
            records = records.len(),
            red = count(StockStatus::Red),
            yellow = count(StockStatus::Yellow),
            green = count(StockStatus::Green),
            overrides = overrides.len(),
            "stock report stored"
        );
        Ok(StockReport { run_id, records })
    }

    /// Merge an override for `sku` and re-evaluate its stored record.
    #[instrument(skip(self, sku), fields(sku = %sku))]
    pub async fn set_override(&self, sku: &Sku, update: ManualOverride) -> Result<OverrideOutcome, PipelineError> {
        if update.is_empty() {
            return Err(PipelineError::Validation(
                "an override needs min_stock, buffer or both".to_string(),
            ));
        }

        let manual = self.tables.upsert_override(sku, update, Utc::now()).await?;

        let existing = self
            .tables
            .replenishment_records()
            .await?
            .into_iter()
            .find(|r| &r.product_sku == sku);
        let record = match existing {
            Some(record) => {
                let reevaluated = record.reevaluate(manual, &self.settings.replenishment);
                self.tables.update_replenishment_record(&reevaluated).await?;
                info!(
                    min_stock = reevaluated.min_stock,
                    buffer = reevaluated.buffer,
                    reorder_qty = reevaluated.reorder_qty,
                    status = %reevaluated.status,
                    "override applied to stored record"
                );
                Some(reevaluated)
            }
            None => {
                info!("override stored; no report row to update yet");
                None
            }
        };

        Ok(OverrideOutcome {
            product_sku: sku.clone(),
            manual,
            record,
        })
    }

    /// The stored report of the last run.
    pub async fn replenishment_records(&self) -> Result<Vec<ReplenishmentRecord>, PipelineError> {
        Ok(self.tables.replenishment_records().await?)
    }

    /// Stored stock levels, filtered by category and activity flag.
    ///
    /// Name ordering breaks ties by SKU; quantity ordering keeps stored order for ties.
    pub async fn stock_levels(&self, filter: &StockLevelFilter) -> Result<Vec<SnapshotRow>, PipelineError> {
        let mut rows: Vec<SnapshotRow> = self
            .tables
            .stock_snapshot()
            .await?
            .into_iter()
            .filter(|row| filter.matches(row))
            .collect();
        match filter.sort {
            StockSort::Stored => {}
            StockSort::QuantityAsc => rows.sort_by_key(|row| row.stock_level),
            StockSort::QuantityDesc => rows.sort_by_key(|row| std::cmp::Reverse(row.stock_level)),
            StockSort::NameAsc => rows.sort_by(|a, b| name_key(a).cmp(&name_key(b))),
            StockSort::NameDesc => rows.sort_by(|a, b| name_key(b).cmp(&name_key(a))),
        }
        Ok(rows)
    }

    /// Distinct categories of the stored snapshot, sorted.
    pub async fn stock_categories(&self) -> Result<Vec<String>, PipelineError> {
        let categories: BTreeSet<String> = self
            .tables
            .stock_snapshot()
            .await?
            .into_iter()
            .map(|row| row.category)
            .collect();
        Ok(categories.into_iter().collect())
    }

    /// Drop the stored snapshot and report; the next report needs a previous upload.
    #[instrument(skip(self))]
    pub async fn clear_stock(&self) -> Result<u64, PipelineError> {
        let removed = self.tables.clear_stock_state().await?;
        info!(removed, "stock state cleared");
        Ok(removed)
    }
}
