//! Position ledger module.
//!
//! Tracks open lots per ticker, consumes them first-in-first-out on sells and
//! projects open positions and realized profit.

mod engine;
mod store;
mod summary;

pub use engine::Ledger;
pub use store::{LotStore, OpenLots};

/// Share quantities closer than this are treated as equal.
///
/// Only used to stop a FIFO walk on floating-point dust and to report
/// shortfalls; stored quantities are never rounded.
pub const QUANTITY_EPSILON: f64 = 1e-9;
