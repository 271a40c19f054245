//! `stockpulse-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the error model, and month arithmetic shared by the sales and
//! forecasting crates.

pub mod calendar;
pub mod error;
pub mod id;
pub mod numeric;

pub use error::{DomainError, DomainResult};
pub use id::{RunId, Sku};
pub use numeric::round_to;
