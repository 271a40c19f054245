//! Stock-delta analysis: previous vs current snapshot → reorder signal per SKU.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use stockpulse_core::{Sku, round_to};

use crate::activity::ActivityFlag;
use crate::policy::{MODERATE_DECREASE_PCT, RAPID_DECREASE_PCT, ReplenishmentPolicy};
use crate::snapshot::{ManualOverride, StockSnapshot, dedupe_last};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockStatus {
    Green,
    Yellow,
    Red,
}

impl StockStatus {
    /// Classify a SKU. Red wins over Yellow when both conditions hold.
    pub fn classify(stock_level: i64, min_stock: i64, decrease_rate_pct: f64) -> Self {
        let is_red = stock_level < min_stock || decrease_rate_pct > RAPID_DECREASE_PCT;
        if is_red {
            StockStatus::Red
        } else if decrease_rate_pct > MODERATE_DECREASE_PCT {
            StockStatus::Yellow
        } else {
            StockStatus::Green
        }
    }

    /// Operator-facing notification text.
    pub fn description(&self, reorder_qty: i64) -> String {
        match self {
            StockStatus::Red => format!(
                "Decreasing rapidly and nearly out of stock! Recommend restocking {reorder_qty} units"
            ),
            StockStatus::Yellow => format!(
                "Decreasing rapidly, should prepare to restock. Recommend restocking {reorder_qty} units"
            ),
            StockStatus::Green => "Stock is sufficient".to_string(),
        }
    }
}

impl core::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            StockStatus::Green => "Green",
            StockStatus::Yellow => "Yellow",
            StockStatus::Red => "Red",
        };
        f.write_str(s)
    }
}

/// Derived replenishment signal for one SKU in one report run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplenishmentRecord {
    pub product_sku: Sku,
    pub product_name: String,
    pub category: String,
    pub last_stock: i64,
    pub stock_level: i64,
    pub weekly_sale: i64,
    pub decrease_rate: f64,
    pub weeks_to_empty: f64,
    pub min_stock: i64,
    pub buffer: i64,
    pub reorder_qty: i64,
    pub status: StockStatus,
    pub description: String,
    pub unchanged_counter: u32,
    pub flag: ActivityFlag,
}

/// Numeric outcome of comparing two stock levels under a policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StockAssessment {
    pub weekly_sale: i64,
    pub decrease_rate: f64,
    pub weeks_to_empty: f64,
    pub min_stock: i64,
    pub buffer: i64,
    pub reorder_qty: i64,
    pub status: StockStatus,
}

impl StockAssessment {
    pub fn compute(
        last_stock: i64,
        stock_level: i64,
        manual: ManualOverride,
        policy: &ReplenishmentPolicy,
    ) -> Self {
        let change = last_stock - stock_level;

        // Clamped even when stock grew; the restock case reports a weekly sale of 1.
        let weekly_sale = change.max(1);

        let decrease_rate = if last_stock > 0 {
            round_to(change as f64 / last_stock as f64 * 100.0, 1)
        } else {
            0.0
        };

        let weeks_to_empty = round_to(stock_level as f64 / weekly_sale as f64, 2);

        let min_stock = manual
            .min_stock
            .unwrap_or_else(|| policy.default_min_stock(weekly_sale));
        let buffer = manual
            .buffer
            .unwrap_or_else(|| policy.dynamic_buffer(decrease_rate));

        let reorder_qty = (min_stock + buffer - stock_level).max(policy.reorder_floor(weekly_sale));
        let status = StockStatus::classify(stock_level, min_stock, decrease_rate);

        Self {
            weekly_sale,
            decrease_rate,
            weeks_to_empty,
            min_stock,
            buffer,
            reorder_qty,
            status,
        }
    }
}

impl ReplenishmentRecord {
    fn from_assessment(current: &StockSnapshot, last_stock: i64, a: StockAssessment) -> Self {
        Self {
            product_sku: current.product_sku.clone(),
            product_name: current.product_name.clone(),
            category: current.category.clone(),
            last_stock,
            stock_level: current.stock_level,
            weekly_sale: a.weekly_sale,
            decrease_rate: a.decrease_rate,
            weeks_to_empty: a.weeks_to_empty,
            min_stock: a.min_stock,
            buffer: a.buffer,
            reorder_qty: a.reorder_qty,
            status: a.status,
            description: a.status.description(a.reorder_qty),
            unchanged_counter: 0,
            flag: ActivityFlag::Stage,
        }
    }

    /// Recompute the derived fields after an override change.
    ///
    /// Stock levels, counter and flag are left as they are.
    pub fn reevaluate(&self, manual: ManualOverride, policy: &ReplenishmentPolicy) -> Self {
        let a = StockAssessment::compute(self.last_stock, self.stock_level, manual, policy);
        Self {
            weekly_sale: a.weekly_sale,
            decrease_rate: a.decrease_rate,
            weeks_to_empty: a.weeks_to_empty,
            min_stock: a.min_stock,
            buffer: a.buffer,
            reorder_qty: a.reorder_qty,
            status: a.status,
            description: a.status.description(a.reorder_qty),
            ..self.clone()
        }
    }
}

/// Compare two snapshots and derive one record per SKU of `current`.
///
/// - Both inputs are deduplicated by SKU (last occurrence wins).
/// - A SKU missing from `previous` is treated as unchanged (`last_stock = stock_level`).
/// - Counter and flag are left at their defaults; see
///   [`apply_activity_flags`](crate::activity::apply_activity_flags).
///
/// An empty `current` yields an empty report.
pub fn generate_report(
    previous: &[StockSnapshot],
    current: &[StockSnapshot],
    overrides: &HashMap<Sku, ManualOverride>,
    policy: &ReplenishmentPolicy,
) -> Vec<ReplenishmentRecord> {
    let previous_levels: HashMap<&Sku, i64> = dedupe_last(previous)
        .into_iter()
        .map(|row| (&row.product_sku, row.stock_level))
        .collect();

    dedupe_last(current)
        .into_iter()
        .map(|row| {
            let last_stock = previous_levels
                .get(&row.product_sku)
                .copied()
                .unwrap_or(row.stock_level);
            let manual = overrides.get(&row.product_sku).copied().unwrap_or_default();
            let assessment = StockAssessment::compute(last_stock, row.stock_level, manual, policy);
            ReplenishmentRecord::from_assessment(row, last_stock, assessment)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sku(s: &str) -> Sku {
        Sku::new(s).unwrap()
    }

    fn snap(s: &str, level: i64) -> StockSnapshot {
        StockSnapshot::new(sku(s), format!("Product {s}"), "General", level).unwrap()
    }

    fn report_one(last: i64, current: i64) -> ReplenishmentRecord {
        let records = generate_report(
            &[snap("X001", last)],
            &[snap("X001", current)],
            &HashMap::new(),
            &ReplenishmentPolicy::default(),
        );
        records.into_iter().next().unwrap()
    }

    #[test]
    fn sharp_drop_is_red() {
        let r = report_one(100, 40);
        assert_eq!(r.last_stock, 100);
        assert_eq!(r.weekly_sale, 60);
        assert_eq!(r.decrease_rate, 60.0);
        assert_eq!(r.weeks_to_empty, 0.67);
        assert_eq!(r.min_stock, 180);
        assert_eq!(r.buffer, 20);
        // max(180 + 20 - 40, 60 * 1.5)
        assert_eq!(r.reorder_qty, 160);
        assert_eq!(r.status, StockStatus::Red);
        assert_eq!(
            r.description,
            "Decreasing rapidly and nearly out of stock! Recommend restocking 160 units"
        );
        assert_eq!(r.unchanged_counter, 0);
        assert_eq!(r.flag, ActivityFlag::Stage);
    }

    #[test]
    fn moderate_drop_above_min_is_yellow() {
        // weekly_sale 30 → min 90; stock 95 is above it, rate 24%.
        let r = report_one(125, 95);
        assert_eq!(r.decrease_rate, 24.0);
        assert_eq!(r.min_stock, 90);
        assert_eq!(r.status, StockStatus::Yellow);
        assert_eq!(r.buffer, 10);
        // max(90 + 10 - 95, 45)
        assert_eq!(r.reorder_qty, 45);
        assert!(r.description.starts_with("Decreasing rapidly, should prepare to restock."));
    }

    #[test]
    fn stable_stock_is_green() {
        let r = report_one(50, 50);
        assert_eq!(r.weekly_sale, 1);
        assert_eq!(r.decrease_rate, 0.0);
        assert_eq!(r.weeks_to_empty, 50.0);
        assert_eq!(r.min_stock, 3);
        assert_eq!(r.buffer, 5);
        assert_eq!(r.reorder_qty, 1);
        assert_eq!(r.status, StockStatus::Green);
        assert_eq!(r.description, "Stock is sufficient");
    }

    #[test]
    fn restock_keeps_weekly_sale_clamped_to_one() {
        // Stock grew 10 → 30: weekly sale still reports 1 and the rate goes negative.
        let r = report_one(10, 30);
        assert_eq!(r.weekly_sale, 1);
        assert_eq!(r.decrease_rate, -200.0);
        assert_eq!(r.weeks_to_empty, 30.0);
        assert_eq!(r.status, StockStatus::Green);
    }

    #[test]
    fn zero_last_stock_has_zero_rate() {
        let r = report_one(0, 0);
        assert_eq!(r.decrease_rate, 0.0);
        assert_eq!(r.weeks_to_empty, 0.0);
        // 0 < min_stock 3
        assert_eq!(r.status, StockStatus::Red);
    }

    #[test]
    fn unknown_previous_sku_assumes_no_change() {
        let records = generate_report(
            &[snap("OTHER", 5)],
            &[snap("NEW", 12)],
            &HashMap::new(),
            &ReplenishmentPolicy::default(),
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].last_stock, 12);
        assert_eq!(records[0].weekly_sale, 1);
        assert_eq!(records[0].decrease_rate, 0.0);
    }

    #[test]
    fn red_takes_priority_when_below_min_and_falling_fast() {
        let r = report_one(10, 2);
        assert_eq!(r.decrease_rate, 80.0);
        assert!(r.stock_level < r.min_stock);
        assert_eq!(r.status, StockStatus::Red);
    }

    #[test]
    fn manual_override_replaces_formula() {
        let mut overrides = HashMap::new();
        overrides.insert(sku("X001"), ManualOverride { min_stock: Some(20), buffer: Some(4) });

        let records = generate_report(
            &[snap("X001", 100)],
            &[snap("X001", 90)],
            &overrides,
            &ReplenishmentPolicy::default(),
        );
        let r = &records[0];
        assert_eq!(r.min_stock, 20);
        assert_eq!(r.buffer, 4);
        // max(20 + 4 - 90, 10 * 1.5)
        assert_eq!(r.reorder_qty, 15);
        assert_eq!(r.status, StockStatus::Green);
    }

    #[test]
    fn partial_override_falls_back_per_field() {
        let mut overrides = HashMap::new();
        overrides.insert(sku("X001"), ManualOverride { min_stock: None, buffer: Some(0) });

        let records = generate_report(
            &[snap("X001", 100)],
            &[snap("X001", 40)],
            &overrides,
            &ReplenishmentPolicy::default(),
        );
        assert_eq!(records[0].min_stock, 180);
        assert_eq!(records[0].buffer, 0);
        assert_eq!(records[0].reorder_qty, 140);
    }

    #[test]
    fn duplicates_collapse_to_last_seen_value() {
        let records = generate_report(
            &[snap("A", 100), snap("A", 80)],
            &[snap("A", 70), snap("B", 5), snap("A", 60)],
            &HashMap::new(),
            &ReplenishmentPolicy::default(),
        );
        let summary: Vec<(String, i64, i64)> = records
            .iter()
            .map(|r| (r.product_sku.to_string(), r.last_stock, r.stock_level))
            .collect();
        assert_eq!(
            summary,
            vec![("B".to_string(), 5, 5), ("A".to_string(), 80, 60)]
        );
    }

    #[test]
    fn empty_current_yields_empty_report() {
        let records = generate_report(
            &[snap("A", 1)],
            &[],
            &HashMap::new(),
            &ReplenishmentPolicy::default(),
        );
        assert!(records.is_empty());
    }

    #[test]
    fn reevaluate_applies_new_override_and_keeps_flag() {
        let mut r = report_one(100, 40);
        r.flag = ActivityFlag::Active;
        let updated = r.reevaluate(
            ManualOverride { min_stock: Some(30), buffer: None },
            &ReplenishmentPolicy::default(),
        );
        assert_eq!(updated.min_stock, 30);
        assert_eq!(updated.buffer, 20);
        // max(30 + 20 - 40, 90)
        assert_eq!(updated.reorder_qty, 90);
        // Still red: the rate is above 50%.
        assert_eq!(updated.status, StockStatus::Red);
        assert_eq!(updated.flag, ActivityFlag::Active);
        assert!(updated.description.contains("90 units"));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        #[test]
        fn weekly_sale_is_at_least_one(last in 0i64..100_000, current in 0i64..100_000) {
            let r = report_one(last, current);
            prop_assert!(r.weekly_sale >= 1);
        }

        #[test]
        fn rate_is_zero_without_prior_stock(current in 0i64..100_000) {
            let r = report_one(0, current);
            prop_assert_eq!(r.decrease_rate, 0.0);
        }

        #[test]
        fn classification_matches_rules(last in 0i64..10_000, current in 0i64..10_000) {
            let r = report_one(last, current);
            let red = r.stock_level < r.min_stock || r.decrease_rate > 50.0;
            let yellow = !red && r.decrease_rate > 20.0;
            let expected = if red {
                StockStatus::Red
            } else if yellow {
                StockStatus::Yellow
            } else {
                StockStatus::Green
            };
            prop_assert_eq!(r.status, expected);
        }

        #[test]
        fn reorder_never_below_floor(last in 0i64..10_000, current in 0i64..10_000) {
            let r = report_one(last, current);
            prop_assert!(r.reorder_qty >= (r.weekly_sale as f64 * 1.5) as i64);
        }
    }
}
