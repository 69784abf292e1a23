use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use weather_window_analytics::models::{
    City, Extreme, GroupBy, NewCity, Observation, RainCount, RankingEntry, StatSummary,
};
use weather_window_analytics::window::{DateWindow, FixedClock};
use weather_window_analytics::{
    Analytics, AnalyticsError, Granularity, MemoryStore, ObservationStore, StoreError,
};

/// Which queries a `FlakyStore` answers with an outage.
#[derive(Default)]
struct Faults {
    stats: bool,
    ranking: Option<(Granularity, Extreme)>,
    rain_window: Option<DateWindow>,
}

/// Delegates to an in-memory store except for the queries named in `faults`.
struct FlakyStore {
    inner: MemoryStore,
    faults: Faults,
}

fn outage() -> StoreError {
    StoreError::Unavailable("connection reset".to_string())
}

#[async_trait]
impl ObservationStore for FlakyStore {
    async fn cities(&self) -> Result<Vec<City>, StoreError> {
        self.inner.cities().await
    }

    async fn insert_city(&self, city: &NewCity) -> Result<i32, StoreError> {
        self.inner.insert_city(city).await
    }

    async fn insert_observation(&self, observation: &Observation) -> Result<(), StoreError> {
        self.inner.insert_observation(observation).await
    }

    async fn earliest_observation(&self) -> Result<Option<NaiveDateTime>, StoreError> {
        self.inner.earliest_observation().await
    }

    async fn descriptions(&self) -> Result<Vec<String>, StoreError> {
        self.inner.descriptions().await
    }

    async fn countries(&self) -> Result<Vec<String>, StoreError> {
        self.inner.countries().await
    }

    async fn temperature_stats(
        &self,
        group: GroupBy,
        key: &str,
        window: DateWindow,
    ) -> Result<Vec<StatSummary>, StoreError> {
        if self.faults.stats {
            return Err(outage());
        }
        self.inner.temperature_stats(group, key, window).await
    }

    async fn bucket_extremes(
        &self,
        granularity: Granularity,
        extreme: Extreme,
    ) -> Result<Vec<RankingEntry>, StoreError> {
        if self.faults.ranking == Some((granularity, extreme)) {
            return Err(outage());
        }
        self.inner.bucket_extremes(granularity, extreme).await
    }

    async fn rain_counts(&self, window: DateWindow) -> Result<Vec<RainCount>, StoreError> {
        if self.faults.rain_window == Some(window) {
            return Err(outage());
        }
        self.inner.rain_counts(window).await
    }
}

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 15)
        .unwrap()
        .and_hms_opt(18, 0, 0)
        .unwrap()
}

async fn flaky_with(faults: Faults, history: &[(NaiveDateTime, &str)]) -> Analytics<FlakyStore> {
    let inner = MemoryStore::new();
    let id = inner
        .insert_city(&NewCity {
            name: "Paris".to_string(),
            country: "FR".to_string(),
            latitude: 48.85,
            longitude: 2.35,
        })
        .await
        .unwrap();
    let current = (now() - chrono::Duration::hours(3), "broken clouds");
    for (time, description) in history.iter().copied().chain([current]) {
        inner
            .insert_observation(&Observation {
                city_id: id,
                time,
                temperature: 16.5,
                description: description.to_string(),
            })
            .await
            .unwrap();
    }
    Analytics::with_clock(FlakyStore { inner, faults }, Arc::new(FixedClock(now())))
}

async fn flaky(faults: Faults) -> Analytics<FlakyStore> {
    flaky_with(faults, &[]).await
}

fn stats_down() -> Faults {
    Faults {
        stats: true,
        ..Faults::default()
    }
}

#[tokio::test]
async fn failing_granularity_does_not_block_the_others() {
    let analytics = flaky(Faults {
        ranking: Some((Granularity::Hour, Extreme::Hottest)),
        ..Faults::default()
    })
    .await;
    let rankings = analytics.rankings(Extreme::Hottest).await;
    assert!(matches!(rankings.hourly, Err(StoreError::Unavailable(_))));
    assert_eq!(rankings.daily.unwrap().len(), 1);
    assert_eq!(rankings.weekly.unwrap()[0].city_name, "Paris");
}

#[tokio::test]
async fn outage_is_distinguishable_from_no_data() {
    let healthy = flaky(Faults::default()).await;
    assert!(healthy
        .stats_by_city("Paris", "yesterday")
        .await
        .unwrap()
        .is_empty());

    let broken = flaky(stats_down()).await;
    let err = broken.stats_by_city("Paris", "yesterday").await.unwrap_err();
    assert!(matches!(err, AnalyticsError::Store(StoreError::Unavailable(_))));
}

#[tokio::test]
async fn invalid_period_fails_before_the_store_is_asked() {
    // a store that is down would answer with Store errors; the token check wins
    let broken = flaky(stats_down()).await;
    let err = broken.stats_by_country("FR", "next_week").await.unwrap_err();
    assert!(matches!(err, AnalyticsError::InvalidPeriod(_)));
}

#[tokio::test]
async fn backfill_skips_cities_whose_seed_lookup_fails() {
    use rand::SeedableRng;
    use std::sync::atomic::AtomicBool;
    use weather_window_analytics::config::BackfillSettings;
    use weather_window_analytics::BackfillGenerator;

    let broken = flaky(stats_down()).await;
    let mut generator = BackfillGenerator::new(
        &broken,
        BackfillSettings {
            horizon_weeks: 1,
            ..BackfillSettings::default()
        },
        rand::rngs::StdRng::seed_from_u64(5),
    );
    let report = generator.run(&AtomicBool::new(false)).await.unwrap();
    assert!(report.steps > 0);
    assert_eq!(report.rows_written, 0);
    assert_eq!(report.cities_skipped, report.steps);
}

#[tokio::test]
async fn failing_last_week_keeps_yesterdays_rain() {
    let today = now().date();
    let yesterday = today.pred_opt().unwrap().and_hms_opt(9, 0, 0).unwrap();
    let last_week = DateWindow::previous_week(today);
    let in_last_week = last_week.start.and_hms_opt(12, 0, 0).unwrap();

    let analytics = flaky_with(
        Faults {
            rain_window: Some(last_week),
            ..Faults::default()
        },
        &[(yesterday, "light rain"), (in_last_week, "moderate rain")],
    )
    .await;

    let rain = analytics.rain_hours().await;
    assert!(matches!(rain.last_week, Err(StoreError::Unavailable(_))));
    assert_eq!(
        rain.yesterday.unwrap(),
        vec![RainCount {
            city_name: "Paris".to_string(),
            rain_hours: 1
        }]
    );
}

#[tokio::test]
async fn report_renders_around_a_failing_section() {
    use weather_window_analytics::report;
    use weather_window_analytics::Period;

    let analytics = flaky(Faults {
        ranking: Some((Granularity::Day, Extreme::Coldest)),
        ..Faults::default()
    })
    .await;

    let data = report::gather(&analytics, Period::Today).await;
    assert!(matches!(data.coldest_daily, Err(AnalyticsError::Store(_))));
    assert_eq!(data.hottest_daily.as_ref().unwrap().len(), 1);
    assert!(data.rain.yesterday.is_ok());

    let rendered = report::build_report(&data);
    assert!(rendered.contains("## Coldest Cities by Day\nQuery failed."));
    assert!(rendered.contains("- FR: max 16.5°C, min 16.5°C, std dev n/a"));
    assert!(rendered.contains("Paris at 16.5°C"));
}
