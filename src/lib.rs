// Hospital Revenue - Core Library
// Query and aggregation engine over monthly hospital revenue records.
// Exposes all modules for use in the import CLI, the API server, and tests.

pub mod aggregation;
pub mod config;
pub mod db;
pub mod deadline;
pub mod engine;
pub mod error;
pub mod filter;
pub mod health;
pub mod pagination;
pub mod record;
pub mod store;
pub mod trend;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use aggregation::{
    aggregate, aggregate_by_hospital, aggregate_by_month,
    AggregateStat, StatValue,
};
pub use config::Config;
pub use db::{load_csv, setup_database, insert_records, verify_count};
pub use deadline::Deadline;
pub use engine::RevenueEngine;
pub use error::{QueryError, QueryResult};
pub use filter::{Predicate, QueryFilter};
pub use health::HealthReport;
pub use pagination::{paginate, Page, QuerySettings};
pub use record::{RevenueRecord, YearMonth};
pub use store::{MemoryStore, RecordStore, SortOrder, SqliteStore};
pub use trend::TrendPoint;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
