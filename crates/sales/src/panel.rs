//! Dense monthly sales panel.
//!
//! Aggregates raw transactions into one row per (SKU, month) and fills every gap
//! inside the observed month range with zero sales.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use stockpulse_core::Sku;
use stockpulse_core::calendar::{month_range, month_start};

use crate::transaction::{ProductMasterEntry, SalesTransaction};

/// Monthly sales total for one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesPanelRow {
    pub product_sku: Sku,
    pub product_name: Option<String>,
    /// Always the first day of the month.
    pub sales_date: NaiveDate,
    pub sales_year: i32,
    pub sales_month: u32,
    pub total_quantity: i64,
}

impl SalesPanelRow {
    pub fn new(product_sku: Sku, product_name: Option<String>, month: NaiveDate, total_quantity: i64) -> Self {
        let sales_date = month_start(month);
        Self {
            product_sku,
            product_name,
            sales_date,
            sales_year: sales_date.year(),
            sales_month: sales_date.month(),
            total_quantity,
        }
    }
}

/// Build the dense panel.
///
/// - Transactions are summed per (SKU, month).
/// - The month range is taken from the transactions, not the product master.
/// - Every SKU in the master gets a row for every month of that range (0 when absent).
/// - Transactions for SKUs missing from the master are dropped.
/// - Output is sorted by (SKU, month).
///
/// Empty transactions produce an empty panel.
pub fn build_panel(transactions: &[SalesTransaction], product_master: &[ProductMasterEntry]) -> Vec<SalesPanelRow> {
    let mut totals: BTreeMap<(&Sku, NaiveDate), i64> = BTreeMap::new();
    let mut extract_names: HashMap<&Sku, &str> = HashMap::new();

    for tx in transactions {
        *totals
            .entry((&tx.product_sku, month_start(tx.sales_date)))
            .or_insert(0) += tx.quantity;
        if let Some(name) = tx.product_name.as_deref() {
            extract_names.entry(&tx.product_sku).or_insert(name);
        }
    }

    let Some(first) = totals.keys().map(|(_, month)| *month).min() else {
        return Vec::new();
    };
    let last = totals
        .keys()
        .map(|(_, month)| *month)
        .max()
        .unwrap_or(first);
    let months = month_range(first, last);

    // First master entry per SKU wins; the master is the authoritative name source.
    let mut skus: BTreeMap<&Sku, Option<String>> = BTreeMap::new();
    for entry in product_master {
        skus.entry(&entry.product_sku).or_insert_with(|| {
            entry
                .product_name
                .clone()
                .or_else(|| extract_names.get(&entry.product_sku).map(|n| n.to_string()))
        });
    }

    let mut panel = Vec::with_capacity(skus.len() * months.len());
    for (sku, name) in &skus {
        for month in &months {
            let total = totals.get(&(*sku, *month)).copied().unwrap_or(0);
            panel.push(SalesPanelRow::new((*sku).clone(), name.clone(), *month, total));
        }
    }
    panel
}

/// Merge a freshly built panel into a stored one.
///
/// Rows of `fresh` replace stored rows with the same (SKU, month); other stored rows
/// are kept. Output is sorted by (SKU, month).
pub fn merge_panels(stored: Vec<SalesPanelRow>, fresh: Vec<SalesPanelRow>) -> Vec<SalesPanelRow> {
    let mut merged: BTreeMap<(Sku, NaiveDate), SalesPanelRow> = BTreeMap::new();
    for row in stored.into_iter().chain(fresh) {
        merged.insert((row.product_sku.clone(), row.sales_date), row);
    }
    merged.into_values().collect()
}
