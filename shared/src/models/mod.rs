//! Domain models for the Pharmaceutical Inventory Tracker

mod forecast;
mod report;
mod snapshot;
mod usage;

pub use forecast::*;
pub use report::*;
pub use snapshot::*;
pub use usage::*;
