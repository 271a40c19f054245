//! Numeric helpers shared by the report and forecast calculations.

/// Round to `decimals` places using round-half-to-even.
///
/// Report percentages and forecast predictions are rounded this way so that
/// ties do not drift upward across many SKUs.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round_ties_even() / scale
}
