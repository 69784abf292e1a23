mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::StoreError;
use crate::models::{
    City, Extreme, GroupBy, NewCity, Observation, RainCount, RankingEntry, StatSummary,
};
use crate::window::{DateWindow, Granularity};

/// Substring a description must contain to count as a rain hour.
pub const RAIN_MARKER: &str = "rain";

#[async_trait]
pub trait ObservationStore: Send + Sync {
    async fn cities(&self) -> Result<Vec<City>, StoreError>;

    async fn insert_city(&self, city: &NewCity) -> Result<i32, StoreError>;

    async fn insert_observation(&self, observation: &Observation) -> Result<(), StoreError>;

    async fn earliest_observation(&self) -> Result<Option<NaiveDateTime>, StoreError>;

    async fn descriptions(&self) -> Result<Vec<String>, StoreError>;

    async fn countries(&self) -> Result<Vec<String>, StoreError>;

    /// Max, min and sample standard deviation of temperature for rows whose
    /// group column equals `key` and whose date falls inside `window`.
    async fn temperature_stats(
        &self,
        group: GroupBy,
        key: &str,
        window: DateWindow,
    ) -> Result<Vec<StatSummary>, StoreError>;

    /// Every observation reaching its bucket's extreme temperature, ties
    /// included, ordered by bucket start.
    async fn bucket_extremes(
        &self,
        granularity: Granularity,
        extreme: Extreme,
    ) -> Result<Vec<RankingEntry>, StoreError>;

    /// Rows per city whose description contains [`RAIN_MARKER`] inside
    /// `window`. Cities without a match are absent.
    async fn rain_counts(&self, window: DateWindow) -> Result<Vec<RainCount>, StoreError>;
}
