use serde::{Deserialize, Serialize};

use stockpulse_core::{DomainError, DomainResult};

/// Decrease rate (percent) above which a SKU is considered to be depleting fast.
pub const RAPID_DECREASE_PCT: f64 = 50.0;

/// Decrease rate (percent) above which a SKU should be prepared for restocking.
pub const MODERATE_DECREASE_PCT: f64 = 20.0;

/// Tunable constants of the reorder formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplenishmentPolicy {
    /// Multiplier applied to weekly sales for both min stock and the reorder floor.
    pub safety_factor: f64,
    /// Weeks of sales that the minimum stock level should cover.
    pub weeks_to_cover: f64,
    /// Upper bound for the dynamic buffer.
    pub max_buffer: i64,
}

impl Default for ReplenishmentPolicy {
    fn default() -> Self {
        Self {
            safety_factor: 1.5,
            weeks_to_cover: 2.0,
            max_buffer: 50,
        }
    }
}

impl ReplenishmentPolicy {
    pub fn validate(&self) -> DomainResult<()> {
        if !(self.safety_factor.is_finite() && self.safety_factor > 0.0) {
            return Err(DomainError::validation("safety_factor must be a finite positive number"));
        }
        if !(self.weeks_to_cover.is_finite() && self.weeks_to_cover > 0.0) {
            return Err(DomainError::validation("weeks_to_cover must be a finite positive number"));
        }
        if self.max_buffer < 0 {
            return Err(DomainError::validation("max_buffer cannot be negative"));
        }
        Ok(())
    }

    /// Formula minimum stock, truncated toward zero.
    pub fn default_min_stock(&self, weekly_sale: i64) -> i64 {
        (weekly_sale as f64 * self.weeks_to_cover * self.safety_factor) as i64
    }

    /// Buffer tiered by decrease rate, capped at `max_buffer`.
    pub fn dynamic_buffer(&self, decrease_rate_pct: f64) -> i64 {
        let tier = if decrease_rate_pct > RAPID_DECREASE_PCT {
            20
        } else if decrease_rate_pct > MODERATE_DECREASE_PCT {
            10
        } else {
            5
        };
        tier.min(self.max_buffer)
    }

    /// Lower bound for any reorder quantity.
    pub fn reorder_floor(&self, weekly_sale: i64) -> i64 {
        (weekly_sale as f64 * self.safety_factor) as i64
    }
}
