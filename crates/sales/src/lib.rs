//! Sales history domain module.
//!
//! Turns normalized sales transactions and the product master list into a dense
//! monthly panel, the input of the forecasting subsystem.

pub mod panel;
pub mod transaction;

pub use panel::{SalesPanelRow, build_panel, merge_panels};
pub use transaction::{ProductMasterEntry, SalesTransaction};
