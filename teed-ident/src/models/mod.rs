//! Persisted records

pub mod correction;
pub mod library_product;
pub mod telemetry;

pub use correction::{CorrectionRecord, CorrectionType};
pub use library_product::{LibraryProduct, ProductOrigin, SeedProduct};
pub use telemetry::{ApiUsageRecord, TelemetryRecord, UsageStatus};
