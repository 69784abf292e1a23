pub mod analytics;
pub mod backfill;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod report;
pub mod source;
pub mod store;
pub mod window;

pub use analytics::Analytics;
pub use backfill::{BackfillGenerator, BackfillReport};
pub use config::Settings;
pub use error::{AnalyticsError, Result, SourceError, StoreError};
pub use store::{MemoryStore, ObservationStore, PgStore};
pub use window::{Granularity, Period};
