//! Feature construction for the monthly sales regressor.
//!
//! Each panel row becomes a feature vector of lagged quantities, trailing means
//! (always excluding the row's own month) and a one-hot SKU indicator. The same
//! [`LagFeatures::from_history`] is used for training rows and for forecast steps, so
//! both sides see identical definitions.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockpulse_core::Sku;
use stockpulse_core::calendar::{add_months, months_between};
use stockpulse_sales::SalesPanelRow;

use crate::error::ForecastError;

/// Lag offsets, in months.
pub const LAGS: [usize; 2] = [1, 12];

/// Trailing mean windows, in months.
pub const ROLLING_WINDOWS: [usize; 2] = [3, 6];

/// Upper bound for `rolling_window_months`.
pub const MAX_WINDOW_MONTHS: u32 = 1200;

const SKU_COLUMN_PREFIX: &str = "product_sku_";

pub fn lag_column(lag: usize) -> String {
    format!("total_quantity_lag_{lag}")
}

pub fn rolling_column(window: usize) -> String {
    format!("total_quantity_roll_mean_{window}")
}

pub fn sku_column(sku: &Sku) -> String {
    format!("{SKU_COLUMN_PREFIX}{sku}")
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Trailing months kept for training, ending at the latest panel month.
    pub rolling_window_months: u32,
    /// Trailing months of the window held out for validation.
    pub test_months: u32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            rolling_window_months: 12,
            test_months: 6,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.rolling_window_months == 0 {
            return Err(ForecastError::Validation("rolling_window_months must be >= 1".to_string()));
        }
        if self.rolling_window_months > MAX_WINDOW_MONTHS {
            return Err(ForecastError::Validation(format!(
                "rolling_window_months must be <= {MAX_WINDOW_MONTHS}"
            )));
        }
        if self.test_months >= self.rolling_window_months {
            return Err(ForecastError::Validation(format!(
                "test_months ({}) must be smaller than rolling_window_months ({})",
                self.test_months, self.rolling_window_months
            )));
        }
        Ok(())
    }
}

/// Numeric features for one (SKU, month), derived from the quantities before that month.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LagFeatures {
    pub lag_1: f64,
    pub lag_12: f64,
    pub roll_mean_3: f64,
    pub roll_mean_6: f64,
}

impl LagFeatures {
    /// Features for the month right after `history` ends.
    ///
    /// `history` holds consecutive monthly quantities, oldest first. A lag or window
    /// reaching past the start of the history is zero.
    pub fn from_history(history: &[f64]) -> Self {
        let lag = |k: usize| {
            if history.len() >= k {
                history[history.len() - k]
            } else {
                0.0
            }
        };
        let trailing_mean = |w: usize| {
            if history.len() >= w {
                history[history.len() - w..].iter().sum::<f64>() / w as f64
            } else {
                0.0
            }
        };
        Self {
            lag_1: lag(LAGS[0]),
            lag_12: lag(LAGS[1]),
            roll_mean_3: trailing_mean(ROLLING_WINDOWS[0]),
            roll_mean_6: trailing_mean(ROLLING_WINDOWS[1]),
        }
    }

    fn named(&self) -> [(String, f64); 4] {
        [
            (lag_column(LAGS[0]), self.lag_1),
            (lag_column(LAGS[1]), self.lag_12),
            (rolling_column(ROLLING_WINDOWS[0]), self.roll_mean_3),
            (rolling_column(ROLLING_WINDOWS[1]), self.roll_mean_6),
        ]
    }
}

/// Column contract of a trained model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    /// Numeric columns followed by one indicator per SKU, dropping the first
    /// (lexicographically smallest) SKU as the reference level.
    pub fn for_skus<'a>(skus: impl IntoIterator<Item = &'a Sku>) -> Self {
        let sorted: BTreeSet<&Sku> = skus.into_iter().collect();
        let mut columns: Vec<String> = LagFeatures::default()
            .named()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        columns.extend(sorted.into_iter().skip(1).map(sku_column));
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Project named values onto the schema: missing columns become 0, unknown
    /// columns are dropped, order follows the schema.
    pub fn reconcile(&self, named: &HashMap<String, f64>) -> Vec<f64> {
        self.columns
            .iter()
            .map(|c| named.get(c).copied().unwrap_or(0.0))
            .collect()
    }

    /// Encode one (SKU, features) pair into a model input row.
    pub fn encode(&self, sku: &Sku, features: &LagFeatures) -> Vec<f64> {
        let mut named: HashMap<String, f64> = features.named().into_iter().collect();
        named.insert(sku_column(sku), 1.0);
        self.reconcile(&named)
    }
}

/// Feature rows with their regression targets, in time order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: Vec<f64>, target: f64) {
        self.rows.push(row);
        self.targets.push(target);
    }

    /// Contiguous sub-range, used by time-series cross-validation.
    pub fn slice(&self, range: std::ops::Range<usize>) -> Dataset {
        Dataset {
            rows: self.rows[range.clone()].to_vec(),
            targets: self.targets[range].to_vec(),
        }
    }
}

/// Latest actual month of one SKU, the seed of the forecast loop.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorRow {
    pub product_sku: Sku,
    pub sales_date: NaiveDate,
    pub total_quantity: i64,
    /// Monthly quantities inside the window, oldest first, ending at `sales_date`.
    pub history: Vec<f64>,
}

/// Last actual observation of a SKU in the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastActual {
    pub total_quantity: i64,
    pub sales_date: NaiveDate,
}

/// Output of [`build_features`].
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub schema: FeatureSchema,
    pub train: Dataset,
    pub test: Dataset,
    pub anchors: Vec<AnchorRow>,
    pub last_actuals: BTreeMap<Sku, LastActual>,
    pub latest_date: NaiveDate,
}

/// Build train/test features and forecast anchors from a sales panel.
///
/// - Only the trailing `rolling_window_months` months ending at the latest panel
///   month are used.
/// - Test rows are the last `test_months` months of that window; train rows are
///   everything strictly before.
/// - Rows are ordered by (month, SKU) so contiguous slices are time-ordered.
/// - Anchors are the rows at the latest panel month.
pub fn build_features(panel: &[SalesPanelRow], config: &FeatureConfig) -> Result<FeatureSet, ForecastError> {
    config.validate()?;

    let Some(latest_date) = panel.iter().map(|r| r.sales_date).max() else {
        return Err(ForecastError::Validation("sales panel is empty".to_string()));
    };
    let window_start = add_months(latest_date, 1 - config.rolling_window_months as i32)?;
    let test_start = add_months(latest_date, 1 - config.test_months as i32)?;

    let mut last_actuals: BTreeMap<Sku, LastActual> = BTreeMap::new();
    for row in panel {
        let entry = last_actuals.entry(row.product_sku.clone()).or_insert(LastActual {
            total_quantity: row.total_quantity,
            sales_date: row.sales_date,
        });
        if row.sales_date >= entry.sales_date {
            *entry = LastActual {
                total_quantity: row.total_quantity,
                sales_date: row.sales_date,
            };
        }
    }

    // Per-SKU month → quantity inside the window.
    let mut by_sku: BTreeMap<&Sku, BTreeMap<NaiveDate, i64>> = BTreeMap::new();
    for row in panel.iter().filter(|r| r.sales_date >= window_start) {
        by_sku
            .entry(&row.product_sku)
            .or_default()
            .insert(row.sales_date, row.total_quantity);
    }

    let schema = FeatureSchema::for_skus(by_sku.keys().copied());

    let mut keyed_rows: Vec<(NaiveDate, &Sku, Vec<f64>, f64)> = Vec::new();
    let mut anchors = Vec::new();

    for (sku, months) in &by_sku {
        let (Some(first), Some(last)) = (months.keys().next(), months.keys().next_back()) else {
            continue;
        };
        // Dense series from the SKU's first month in the window; gaps count as zero.
        let span = months_between(*first, *last);
        let mut series: Vec<f64> = Vec::with_capacity(span as usize + 1);
        for offset in 0..=span {
            let month = add_months(*first, offset)?;
            let quantity = months.get(&month).copied();
            if let Some(q) = quantity {
                let features = LagFeatures::from_history(&series);
                keyed_rows.push((month, *sku, schema.encode(sku, &features), q as f64));
            }
            series.push(quantity.unwrap_or(0) as f64);
        }

        if *last == latest_date {
            anchors.push(AnchorRow {
                product_sku: (*sku).clone(),
                sales_date: latest_date,
                total_quantity: months.get(last).copied().unwrap_or(0),
                history: series,
            });
        }
    }

    keyed_rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    let mut train = Dataset::default();
    let mut test = Dataset::default();
    for (month, _, row, target) in keyed_rows {
        if month < test_start {
            train.push(row, target);
        } else {
            test.push(row, target);
        }
    }

    Ok(FeatureSet {
        schema,
        train,
        test,
        anchors,
        last_actuals,
        latest_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sku(s: &str) -> Sku {
        Sku::new(s).unwrap()
    }

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    /// `months` consecutive rows starting Jan 2023 with quantities from `qty(i)`.
    fn series(s: &str, months: usize, qty: impl Fn(usize) -> i64) -> Vec<SalesPanelRow> {
        (0..months)
            .map(|i| {
                let month = add_months(d(2023, 1), i as i32).unwrap();
                SalesPanelRow::new(sku(s), None, month, qty(i))
            })
            .collect()
    }

    #[test]
    fn history_features_zero_fill_short_history() {
        let f = LagFeatures::from_history(&[4.0, 8.0]);
        assert_eq!(f.lag_1, 8.0);
        assert_eq!(f.lag_12, 0.0);
        assert_eq!(f.roll_mean_3, 0.0);
        assert_eq!(f.roll_mean_6, 0.0);

        let f = LagFeatures::from_history(&[1.0, 2.0, 3.0, 6.0]);
        assert_eq!(f.roll_mean_3, (2.0 + 3.0 + 6.0) / 3.0);
    }

    #[test]
    fn schema_drops_reference_sku() {
        let schema = FeatureSchema::for_skus([&sku("B"), &sku("A"), &sku("C")]);
        assert_eq!(
            schema.columns(),
            &[
                "total_quantity_lag_1".to_string(),
                "total_quantity_lag_12".to_string(),
                "total_quantity_roll_mean_3".to_string(),
                "total_quantity_roll_mean_6".to_string(),
                "product_sku_B".to_string(),
                "product_sku_C".to_string(),
            ]
        );
    }

    #[test]
    fn reconcile_zero_fills_and_drops_extras() {
        let schema = FeatureSchema::for_skus([&sku("A"), &sku("B")]);
        let mut named = HashMap::new();
        named.insert("total_quantity_lag_1".to_string(), 5.0);
        named.insert("sales_date".to_string(), 99.0);
        named.insert("product_sku_B".to_string(), 1.0);
        assert_eq!(schema.reconcile(&named), vec![5.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn reference_sku_encodes_as_all_zero_indicators() {
        let schema = FeatureSchema::for_skus([&sku("A"), &sku("B")]);
        let row = schema.encode(&sku("A"), &LagFeatures::default());
        assert_eq!(row, vec![0.0; 5]);
    }

    #[test]
    fn window_and_split_follow_config() {
        // 18 months of data for two SKUs; only the last 12 are used.
        let mut panel = series("A", 18, |i| i as i64);
        panel.extend(series("B", 18, |i| 100 + i as i64));

        let set = build_features(&panel, &FeatureConfig::default()).unwrap();
        assert_eq!(set.latest_date, d(2024, 6));
        assert_eq!(set.test.len(), 6 * 2);
        assert_eq!(set.train.len(), 6 * 2);
        assert_eq!(set.schema.width(), 5);

        // First training row: SKU A at the window start (Jul 2023) has no history.
        assert_eq!(set.train.rows[0], vec![0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(set.train.targets[0], 6.0);
        // Second row is SKU B for the same month.
        assert_eq!(set.train.rows[1], vec![0.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(set.train.targets[1], 106.0);

        // Fourth month of the window for A: lag-1 = 8, mean of (6, 7, 8) = 7.
        let row = &set.train.rows[6];
        assert_eq!(set.train.targets[6], 9.0);
        assert_eq!(row[0], 8.0);
        assert_eq!(row[1], 0.0);
        assert_eq!(row[2], 7.0);
        assert_eq!(row[3], 0.0);
    }

    #[test]
    fn anchors_carry_window_history() {
        let mut panel = series("A", 14, |i| i as i64);
        panel.extend(series("B", 13, |_| 3));
        let set = build_features(&panel, &FeatureConfig::default()).unwrap();

        // B ends one month before A, so only A is anchored at the latest month.
        assert_eq!(set.anchors.len(), 1);
        let anchor = &set.anchors[0];
        assert_eq!(anchor.product_sku, sku("A"));
        assert_eq!(anchor.sales_date, d(2024, 2));
        assert_eq!(anchor.total_quantity, 13);
        assert_eq!(anchor.history.len(), 12);
        assert_eq!(anchor.history.first(), Some(&2.0));
        assert_eq!(anchor.history.last(), Some(&13.0));

        assert_eq!(
            set.last_actuals.get(&sku("B")),
            Some(&LastActual { total_quantity: 3, sales_date: d(2024, 1) })
        );
    }

    #[test]
    fn empty_panel_is_rejected() {
        let err = build_features(&[], &FeatureConfig::default()).unwrap_err();
        assert!(matches!(err, ForecastError::Validation(_)));
    }

    #[test]
    fn test_window_must_fit_inside_rolling_window() {
        let config = FeatureConfig { rolling_window_months: 6, test_months: 6 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_rolling_window_is_rejected() {
        let config = FeatureConfig { rolling_window_months: u32::MAX, test_months: 6 };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ForecastError::Validation(msg) if msg.contains("rolling_window_months")));

        let config = FeatureConfig { rolling_window_months: MAX_WINDOW_MONTHS, test_months: 6 };
        assert!(config.validate().is_ok());
    }
}
