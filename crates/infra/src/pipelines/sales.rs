use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{Span, field, info, instrument};

use stockpulse_core::RunId;
use stockpulse_sales::{ProductMasterEntry, SalesTransaction, build_panel, merge_panels};

use super::{PipelineError, Pipelines};
use crate::store::TableStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesIngestSummary {
    pub run_id: RunId,
    /// Panel rows derived from this upload.
    pub uploaded_rows: usize,
    /// Panel rows stored after the merge.
    pub total_rows: usize,
    pub skus: usize,
    pub first_month: Option<NaiveDate>,
    pub last_month: Option<NaiveDate>,
}

impl<S: TableStore> Pipelines<S> {
    /// Aggregate an upload into the monthly panel and merge it over the stored one.
    ///
    /// Months present in the upload replace the stored rows for the same SKU.
    #[instrument(
        name = "ingest_sales",
        skip_all,
        fields(run_id = field::Empty, transactions = transactions.len(), products = master.len())
    )]
    pub async fn ingest_sales(
        &self,
        transactions: &[SalesTransaction],
        master: &[ProductMasterEntry],
    ) -> Result<SalesIngestSummary, PipelineError> {
        let run_id = RunId::new();
        Span::current().record("run_id", field::display(run_id));

        if transactions.is_empty() {
            return Err(PipelineError::Validation("no sales transactions supplied".to_string()));
        }
        if master.is_empty() {
            return Err(PipelineError::Validation("product master list is empty".to_string()));
        }

        let fresh = build_panel(transactions, master);
        let uploaded_rows = fresh.len();
        let stored = self.tables.sales_panel().await?;
        let merged = merge_panels(stored, fresh);
        self.tables.replace_sales_panel(&merged).await?;

        let skus = merged.iter().map(|row| &row.product_sku).collect::<BTreeSet<_>>().len();
        let summary = SalesIngestSummary {
            run_id,
            uploaded_rows,
            total_rows: merged.len(),
            skus,
            first_month: merged.iter().map(|row| row.sales_date).min(),
            last_month: merged.iter().map(|row| row.sales_date).max(),
        };
        info!(
            uploaded = summary.uploaded_rows,
            total = summary.total_rows,
            skus = summary.skus,
            "sales panel stored"
        );
        Ok(summary)
    }
}
