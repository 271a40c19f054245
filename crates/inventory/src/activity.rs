//! Activity flag with counter-based hysteresis.
//!
//! A SKU whose stock does not move across consecutive runs drifts to `inactive`
//! after [`INACTIVE_AFTER_UNCHANGED`] unchanged runs. Any movement resets the counter.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use stockpulse_core::Sku;

use crate::report::ReplenishmentRecord;

/// Consecutive unchanged runs after which a SKU is flagged inactive.
pub const INACTIVE_AFTER_UNCHANGED: u32 = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActivityFlag {
    /// No history yet.
    #[default]
    #[serde(rename = "stage")]
    Stage,
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "inactive")]
    Inactive,
    #[serde(rename = "just added stock")]
    JustAddedStock,
}

impl ActivityFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityFlag::Stage => "stage",
            ActivityFlag::Active => "active",
            ActivityFlag::Inactive => "inactive",
            ActivityFlag::JustAddedStock => "just added stock",
        }
    }
}

impl core::fmt::Display for ActivityFlag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted flag/counter pair for one SKU.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActivityState {
    pub unchanged_counter: u32,
    pub flag: ActivityFlag,
}

impl ActivityState {
    /// Transition given the stock movement observed in this run.
    ///
    /// `inactive` is sticky while the stock stays unchanged; only a movement clears it.
    pub fn next(self, last_stock: i64, current_stock: i64) -> ActivityState {
        if current_stock == last_stock {
            let unchanged_counter = self.unchanged_counter.saturating_add(1);
            let flag = if unchanged_counter >= INACTIVE_AFTER_UNCHANGED {
                ActivityFlag::Inactive
            } else {
                self.flag
            };
            ActivityState { unchanged_counter, flag }
        } else if current_stock < last_stock {
            ActivityState { unchanged_counter: 0, flag: ActivityFlag::Active }
        } else {
            ActivityState { unchanged_counter: 0, flag: ActivityFlag::JustAddedStock }
        }
    }
}

/// Update `unchanged_counter` and `flag` of every record from the prior persisted state.
///
/// SKUs without a prior row start from the default state (counter 0, `stage`).
pub fn apply_activity_flags(records: &mut [ReplenishmentRecord], prior: &HashMap<Sku, ActivityState>) {
    for record in records.iter_mut() {
        let before = prior.get(&record.product_sku).copied().unwrap_or_default();
        let after = before.next(record.last_stock, record.stock_level);
        record.unchanged_counter = after.unchanged_counter;
        record.flag = after.flag;
    }
}
