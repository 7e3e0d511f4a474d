//! Business logic services for the Pharmaceutical Inventory Tracker

pub mod batch;
pub mod forecast;
pub mod narrative;
pub mod product;
pub mod reporting;
pub mod snapshot;
pub mod usage;

pub use batch::BatchService;
pub use forecast::ForecastService;
pub use narrative::NarrativeService;
pub use product::ProductService;
pub use reporting::ReportingService;
pub use snapshot::SnapshotService;
pub use usage::UsageService;
