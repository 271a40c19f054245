use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockpulse_core::{DomainError, DomainResult, Sku};

/// One normalized sales line: how many units of a SKU sold on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesTransaction {
    pub product_sku: Sku,
    pub sales_date: NaiveDate,
    pub quantity: i64,
    /// Name carried by the sales extract, if any. The product master wins over it.
    pub product_name: Option<String>,
}

impl SalesTransaction {
    pub fn new(product_sku: Sku, sales_date: NaiveDate, quantity: i64) -> DomainResult<Self> {
        if quantity < 0 {
            return Err(DomainError::validation(format!(
                "quantity for {product_sku} on {sales_date} cannot be negative (found {quantity})"
            )));
        }
        Ok(Self {
            product_sku,
            sales_date,
            quantity,
            product_name: None,
        })
    }

    pub fn with_product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = Some(name.into());
        self
    }
}

/// Product master entry: the authoritative list of SKUs and their names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMasterEntry {
    pub product_sku: Sku,
    pub product_name: Option<String>,
}

impl ProductMasterEntry {
    pub fn new(product_sku: Sku, product_name: Option<String>) -> Self {
        let product_name = product_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        Self { product_sku, product_name }
    }
}
