use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::models::Observation;
use crate::source::WeatherSource;
use crate::store::ObservationStore;

pub const DEFAULT_CITIES: [&str; 19] = [
    "Istanbul",
    "London",
    "Saint Petersburg",
    "Berlin",
    "Madrid",
    "Kyiv",
    "Rome",
    "Bucharest",
    "Paris",
    "Minsk",
    "Vienna",
    "Warsaw",
    "Hamburg",
    "Budapest",
    "Belgrade",
    "Barcelona",
    "Munich",
    "Kharkiv",
    "Milan",
];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub stored: usize,
    pub failed: usize,
}

/// Stores the current reading of every known city. A city whose fetch or
/// insert fails is logged and counted, the rest still go through.
pub async fn ingest_current(
    store: &impl ObservationStore,
    source: &impl WeatherSource,
) -> Result<IngestReport, StoreError> {
    let mut report = IngestReport::default();

    for city in store.cities().await? {
        let reading = match source.current(city.latitude, city.longitude).await {
            Ok(reading) => reading,
            Err(err) => {
                warn!(error = %err, city = %city.name, "failed to fetch current weather");
                report.failed += 1;
                continue;
            }
        };

        let observation = Observation {
            city_id: city.id,
            time: reading.observed_at,
            temperature: reading.temperature,
            description: reading.description,
        };
        match store.insert_observation(&observation).await {
            Ok(()) => report.stored += 1,
            Err(err) => {
                warn!(error = %err, city = %city.name, "failed to store reading");
                report.failed += 1;
            }
        }
    }

    info!(stored = report.stored, failed = report.failed, "ingest finished");
    Ok(report)
}

/// Geocodes each name and stores the resulting city. Lookup and insert
/// failures are counted per name, like `ingest_current` does.
pub async fn locate_cities(
    store: &impl ObservationStore,
    source: &impl WeatherSource,
    names: &[String],
) -> IngestReport {
    let mut report = IngestReport::default();

    for name in names {
        let city = match source.locate(name).await {
            Ok(city) => city,
            Err(err) => {
                warn!(error = %err, city = %name, "geocoding failed");
                report.failed += 1;
                continue;
            }
        };
        match store.insert_city(&city).await {
            Ok(id) => {
                info!(id, city = %city.name, country = %city.country, "city stored");
                report.stored += 1;
            }
            Err(err) => {
                warn!(error = %err, city = %city.name, "failed to store city");
                report.failed += 1;
            }
        }
    }

    info!(stored = report.stored, failed = report.failed, "locate finished");
    report
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    city: String,
    time: NaiveDateTime,
    temperature: f64,
    description: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub unknown_city: usize,
}

/// Loads `city,time,temperature,description` rows, resolving cities by
/// name. Rows naming an unknown city are skipped.
pub async fn import_csv(
    store: &impl ObservationStore,
    csv_path: &Path,
) -> anyhow::Result<ImportReport> {
    let city_ids: HashMap<String, i32> = store
        .cities()
        .await?
        .into_iter()
        .map(|c| (c.name, c.id))
        .collect();

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut report = ImportReport::default();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid row {}", line + 1))?;
        let Some(&city_id) = city_ids.get(&row.city) else {
            warn!(city = %row.city, row = line + 1, "unknown city, row skipped");
            report.unknown_city += 1;
            continue;
        };

        store
            .insert_observation(&Observation {
                city_id,
                time: row.time,
                temperature: row.temperature,
                description: row.description,
            })
            .await?;
        report.inserted += 1;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::models::{City, Extreme, GroupBy, NewCity, RainCount, RankingEntry, StatSummary};
    use crate::source::Reading;
    use crate::store::MemoryStore;
    use crate::window::{DateWindow, Granularity};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::io::Write;

    struct StubSource;

    #[async_trait]
    impl WeatherSource for StubSource {
        async fn current(&self, latitude: f64, _longitude: f64) -> Result<Reading, SourceError> {
            if latitude < 0.0 {
                return Err(SourceError::Malformed("no reading".to_string()));
            }
            Ok(Reading {
                observed_at: NaiveDate::from_ymd_opt(2026, 10, 15)
                    .unwrap()
                    .and_hms_opt(9, 30, 0)
                    .unwrap(),
                temperature: latitude / 10.0,
                description: "scattered clouds".to_string(),
            })
        }

        async fn locate(&self, city_name: &str) -> Result<NewCity, SourceError> {
            if city_name == "Atlantis" {
                return Err(SourceError::NotFound(city_name.to_string()));
            }
            Ok(NewCity {
                name: city_name.to_string(),
                country: "XX".to_string(),
                latitude: 45.0,
                longitude: 10.0,
            })
        }
    }

    /// Refuses to insert one named city and delegates everything else.
    struct RejectingStore {
        inner: MemoryStore,
        rejected: &'static str,
    }

    #[async_trait]
    impl ObservationStore for RejectingStore {
        async fn cities(&self) -> Result<Vec<City>, StoreError> {
            self.inner.cities().await
        }

        async fn insert_city(&self, city: &NewCity) -> Result<i32, StoreError> {
            if city.name == self.rejected {
                return Err(StoreError::Unavailable("duplicate key".to_string()));
            }
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
            self.inner.temperature_stats(group, key, window).await
        }

        async fn bucket_extremes(
            &self,
            granularity: Granularity,
            extreme: Extreme,
        ) -> Result<Vec<RankingEntry>, StoreError> {
            self.inner.bucket_extremes(granularity, extreme).await
        }

        async fn rain_counts(&self, window: DateWindow) -> Result<Vec<RainCount>, StoreError> {
            self.inner.rain_counts(window).await
        }
    }

    #[tokio::test]
    async fn failed_fetch_does_not_stop_other_cities() {
        let store = MemoryStore::new();
        for (name, lat) in [("Warsaw", 52.2), ("Nowhere", -1.0), ("Minsk", 53.9)] {
            store
                .insert_city(&NewCity {
                    name: name.to_string(),
                    country: "XX".to_string(),
                    latitude: lat,
                    longitude: 20.0,
                })
                .await
                .unwrap();
        }

        let report = ingest_current(&store, &StubSource).await.unwrap();
        assert_eq!(report, IngestReport { stored: 2, failed: 1 });
        assert_eq!(store.observations().len(), 2);
    }

    #[tokio::test]
    async fn locate_stores_found_cities_only() {
        let store = MemoryStore::new();
        let names = vec!["Belgrade".to_string(), "Atlantis".to_string()];
        let report = locate_cities(&store, &StubSource, &names).await;
        assert_eq!(report, IngestReport { stored: 1, failed: 1 });
        let cities = store.cities().await.unwrap();
        assert_eq!(cities.len(), 1);
        assert_eq!(cities[0].name, "Belgrade");
    }

    #[tokio::test]
    async fn failed_city_insert_is_counted_and_the_rest_continue() {
        let store = RejectingStore {
            inner: MemoryStore::new(),
            rejected: "Kyiv",
        };
        let names = vec![
            "Kyiv".to_string(),
            "Atlantis".to_string(),
            "Vienna".to_string(),
        ];
        let report = locate_cities(&store, &StubSource, &names).await;
        assert_eq!(report, IngestReport { stored: 1, failed: 2 });
        let cities = store.cities().await.unwrap();
        assert_eq!(cities.len(), 1);
        assert_eq!(cities[0].name, "Vienna");
    }

    #[tokio::test]
    async fn import_skips_unknown_cities() {
        let store = MemoryStore::new();
        store
            .insert_city(&NewCity {
                name: "Budapest".to_string(),
                country: "HU".to_string(),
                latitude: 47.5,
                longitude: 19.04,
            })
            .await
            .unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "city,time,temperature,description\n\
             Budapest,2026-10-14T08:00:00,9.5,light rain\n\
             Atlantis,2026-10-14T08:00:00,20.0,clear sky\n\
             Budapest,2026-10-14T09:00:00,10.25,overcast clouds"
        )
        .unwrap();

        let report = import_csv(&store, file.path()).await.unwrap();
        assert_eq!(
            report,
            ImportReport {
                inserted: 2,
                unknown_city: 1
            }
        );
        assert_eq!(store.observations()[1].temperature, 10.25);
    }
}
