use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use stockpulse_core::{DomainError, DomainResult, Sku};

/// One observed stock level for a SKU at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub product_sku: Sku,
    pub product_name: String,
    pub category: String,
    pub stock_level: i64,
}

impl StockSnapshot {
    pub fn new(
        product_sku: Sku,
        product_name: impl Into<String>,
        category: impl Into<String>,
        stock_level: i64,
    ) -> DomainResult<Self> {
        if stock_level < 0 {
            return Err(DomainError::validation(format!(
                "stock_level for {product_sku} cannot be negative (found {stock_level})"
            )));
        }
        Ok(Self {
            product_sku,
            product_name: product_name.into(),
            category: category.into(),
            stock_level,
        })
    }
}

/// Collapse duplicate SKUs, keeping the last-seen row.
///
/// Surviving rows keep the position of their last occurrence, so the output order
/// is stable with respect to the input.
pub fn dedupe_last(rows: &[StockSnapshot]) -> Vec<&StockSnapshot> {
    let mut last_index: HashMap<&Sku, usize> = HashMap::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        last_index.insert(&row.product_sku, idx);
    }

    rows.iter()
        .enumerate()
        .filter(|(idx, row)| last_index.get(&row.product_sku) == Some(idx))
        .map(|(_, row)| row)
        .collect()
}

/// Operator-supplied replacement for the formula-derived minimum stock and buffer.
///
/// A present field always wins over the formula; an absent field falls back to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualOverride {
    pub min_stock: Option<i64>,
    pub buffer: Option<i64>,
}

impl ManualOverride {
    pub fn new(min_stock: Option<i64>, buffer: Option<i64>) -> DomainResult<Self> {
        for (name, value) in [("min_stock", min_stock), ("buffer", buffer)] {
            if let Some(v) = value {
                if v < 0 {
                    return Err(DomainError::validation(format!("{name} cannot be negative (found {v})")));
                }
            }
        }
        Ok(Self { min_stock, buffer })
    }

    pub fn is_empty(&self) -> bool {
        self.min_stock.is_none() && self.buffer.is_none()
    }

    /// Apply a partial update: fields present in `update` replace ours.
    pub fn merged_with(self, update: ManualOverride) -> ManualOverride {
        ManualOverride {
            min_stock: update.min_stock.or(self.min_stock),
            buffer: update.buffer.or(self.buffer),
        }
    }
}
