//! Shared types and forecasting core for the Pharmaceutical Inventory Tracker
//!
//! This crate holds the I/O-free half of the system: the snapshot and usage
//! models, the usage aggregator, the exponential-smoothing forecast engine,
//! the snapshot differ and the weekly report composer. The backend fetches
//! rows and hands them to these functions.

pub mod analysis;
pub mod error;
pub mod models;
pub mod numeric;
pub mod types;
pub mod validation;

pub use analysis::*;
pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
