use std::sync::Arc;

use tracing::{debug, error};

use crate::error::{AnalyticsError, Result, StoreError};
use crate::models::{
    Extreme, GroupBy, RainCount, RainHours, RankingEntry, Rankings, StatSummary,
};
use crate::store::ObservationStore;
use crate::window::{Clock, DateWindow, Granularity, Period, SystemClock};

pub struct Analytics<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: ObservationStore> Analytics<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub async fn stats_by_city(&self, city: &str, period: &str) -> Result<Vec<StatSummary>> {
        let period: Period = period.parse()?;
        self.stats(GroupBy::City, city, period).await
    }

    pub async fn stats_by_country(&self, country: &str, period: &str) -> Result<Vec<StatSummary>> {
        let period: Period = period.parse()?;
        self.stats(GroupBy::Country, country, period).await
    }

    /// Statistics for an already validated period.
    pub async fn stats(
        &self,
        group: GroupBy,
        key: &str,
        period: Period,
    ) -> Result<Vec<StatSummary>> {
        let window = period.resolve(self.clock.today());
        debug!(?group, key, %period, ?window, "querying temperature stats");
        let stats = self
            .store
            .temperature_stats(group, key, window)
            .await
            .map_err(|err| logged("temperature stats", err))?;
        Ok(stats)
    }

    /// Distinct country codes of the known cities, in no guaranteed order.
    pub async fn list_countries(&self) -> Result<Vec<String>> {
        let countries = self
            .store
            .countries()
            .await
            .map_err(|err| logged("country list", err))?;
        Ok(countries)
    }

    pub async fn hottest_by(&self, granularity: Granularity) -> Result<Vec<RankingEntry>> {
        self.extremes(granularity, Extreme::Hottest).await
    }

    pub async fn coldest_by(&self, granularity: Granularity) -> Result<Vec<RankingEntry>> {
        self.extremes(granularity, Extreme::Coldest).await
    }

    async fn extremes(
        &self,
        granularity: Granularity,
        extreme: Extreme,
    ) -> Result<Vec<RankingEntry>> {
        let entries = self
            .store
            .bucket_extremes(granularity, extreme)
            .await
            .map_err(|err| logged(extreme.label(), err))?;
        Ok(entries)
    }

    /// Hourly, daily and weekly extremes. A failing granularity does not
    /// stop the others from being computed.
    pub async fn rankings(&self, extreme: Extreme) -> Rankings {
        Rankings {
            hourly: self.ranking(Granularity::Hour, extreme).await,
            daily: self.ranking(Granularity::Day, extreme).await,
            weekly: self.ranking(Granularity::Week, extreme).await,
        }
    }

    async fn ranking(
        &self,
        granularity: Granularity,
        extreme: Extreme,
    ) -> std::result::Result<Vec<RankingEntry>, StoreError> {
        self.store
            .bucket_extremes(granularity, extreme)
            .await
            .inspect_err(|err| {
                error!(
                    error = %err,
                    granularity = granularity.unit(),
                    "{} ranking failed",
                    extreme.label()
                )
            })
    }

    /// Rain hours per city yesterday and over the previous calendar week.
    /// Either grouping may fail without losing the other.
    pub async fn rain_hours(&self) -> RainHours {
        let today = self.clock.today();
        RainHours {
            yesterday: self
                .rain_counts("yesterday", Period::Yesterday.resolve(today))
                .await,
            last_week: self
                .rain_counts("last week", DateWindow::previous_week(today))
                .await,
        }
    }

    async fn rain_counts(
        &self,
        label: &str,
        window: DateWindow,
    ) -> std::result::Result<Vec<RainCount>, StoreError> {
        self.store
            .rain_counts(window)
            .await
            .inspect_err(|err| error!(error = %err, "rain hours ({label}) query failed"))
    }
}

fn logged(operation: &str, err: StoreError) -> AnalyticsError {
    error!(error = %err, "{operation} query failed");
    AnalyticsError::Store(err)
}
