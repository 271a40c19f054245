//! Stock replenishment domain module.
//!
//! This crate contains the stock-delta analysis that turns two stock snapshots into
//! reorder signals, implemented purely as deterministic domain logic (no IO, no
//! storage). Manual overrides and prior flag/counter state are passed in by callers.

pub mod activity;
pub mod policy;
pub mod report;
pub mod snapshot;

pub use activity::{ActivityFlag, ActivityState, INACTIVE_AFTER_UNCHANGED, apply_activity_flags};
pub use policy::ReplenishmentPolicy;
pub use report::{ReplenishmentRecord, StockAssessment, StockStatus, generate_report};
pub use snapshot::{ManualOverride, StockSnapshot, dedupe_last};
