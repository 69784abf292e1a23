use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::{ObservationStore, RAIN_MARKER};
use crate::error::StoreError;
use crate::models::{
    City, Extreme, GroupBy, NewCity, Observation, RainCount, RankingEntry, StatSummary,
};
use crate::window::{DateWindow, Granularity};

#[derive(Default)]
struct Tables {
    cities: Vec<City>,
    weather: Vec<Observation>,
}

/// In-process store with the same query semantics as [`super::PgStore`].
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.lock().map(|t| t.weather.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

fn group_value(city: &City, group: GroupBy) -> &str {
    match group {
        GroupBy::City => &city.name,
        GroupBy::Country => &city.country,
    }
}

fn summarize(group_key: &str, temperatures: &[f64]) -> Option<StatSummary> {
    let count = temperatures.len();
    if count == 0 {
        return None;
    }

    let max_temp = temperatures.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_temp = temperatures.iter().copied().fold(f64::INFINITY, f64::min);
    let stddev_temp = if count < 2 {
        None
    } else {
        let mean = temperatures.iter().sum::<f64>() / count as f64;
        let variance = temperatures
            .iter()
            .map(|t| (t - mean).powi(2))
            .sum::<f64>()
            / (count - 1) as f64;
        Some(variance.sqrt())
    };

    Some(StatSummary {
        group_key: group_key.to_string(),
        max_temp,
        min_temp,
        stddev_temp,
    })
}

#[async_trait]
impl ObservationStore for MemoryStore {
    async fn cities(&self) -> Result<Vec<City>, StoreError> {
        Ok(self.lock()?.cities.clone())
    }

    async fn insert_city(&self, city: &NewCity) -> Result<i32, StoreError> {
        let mut tables = self.lock()?;
        let id = tables.cities.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        tables.cities.push(City {
            id,
            name: city.name.clone(),
            country: city.country.clone(),
            latitude: city.latitude,
            longitude: city.longitude,
        });
        Ok(id)
    }

    async fn insert_observation(&self, observation: &Observation) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        if !tables.cities.iter().any(|c| c.id == observation.city_id) {
            return Err(StoreError::Unavailable(format!(
                "foreign key violation: city {} does not exist",
                observation.city_id
            )));
        }
        tables.weather.push(observation.clone());
        Ok(())
    }

    async fn earliest_observation(&self) -> Result<Option<NaiveDateTime>, StoreError> {
        Ok(self.lock()?.weather.iter().map(|o| o.time).min())
    }

    async fn descriptions(&self) -> Result<Vec<String>, StoreError> {
        let tables = self.lock()?;
        let distinct: BTreeSet<&String> = tables.weather.iter().map(|o| &o.description).collect();
        Ok(distinct.into_iter().cloned().collect())
    }

    async fn countries(&self) -> Result<Vec<String>, StoreError> {
        let tables = self.lock()?;
        let distinct: BTreeSet<&String> = tables.cities.iter().map(|c| &c.country).collect();
        Ok(distinct.into_iter().cloned().collect())
    }

    async fn temperature_stats(
        &self,
        group: GroupBy,
        key: &str,
        window: DateWindow,
    ) -> Result<Vec<StatSummary>, StoreError> {
        let tables = self.lock()?;
        let temperatures: Vec<f64> = tables
            .weather
            .iter()
            .filter(|o| window.contains(o.time.date()))
            .filter(|o| {
                tables
                    .cities
                    .iter()
                    .any(|c| c.id == o.city_id && group_value(c, group) == key)
            })
            .map(|o| o.temperature)
            .collect();

        Ok(summarize(key, &temperatures).into_iter().collect())
    }

    async fn bucket_extremes(
        &self,
        granularity: Granularity,
        extreme: Extreme,
    ) -> Result<Vec<RankingEntry>, StoreError> {
        let tables = self.lock()?;

        let mut extremes: BTreeMap<NaiveDateTime, f64> = BTreeMap::new();
        for observation in &tables.weather {
            let bucket = granularity.truncate(observation.time);
            extremes
                .entry(bucket)
                .and_modify(|current| {
                    *current = match extreme {
                        Extreme::Hottest => current.max(observation.temperature),
                        Extreme::Coldest => current.min(observation.temperature),
                    }
                })
                .or_insert(observation.temperature);
        }

        let mut entries = Vec::new();
        for observation in &tables.weather {
            let bucket = granularity.truncate(observation.time);
            if extremes.get(&bucket) != Some(&observation.temperature) {
                continue;
            }
            if let Some(city) = tables.cities.iter().find(|c| c.id == observation.city_id) {
                entries.push(RankingEntry {
                    bucket_start: bucket,
                    extreme_temp: observation.temperature,
                    city_name: city.name.clone(),
                });
            }
        }

        entries.sort_by(|a, b| {
            a.bucket_start
                .cmp(&b.bucket_start)
                .then_with(|| a.city_name.cmp(&b.city_name))
        });
        Ok(entries)
    }

    async fn rain_counts(&self, window: DateWindow) -> Result<Vec<RainCount>, StoreError> {
        let tables = self.lock()?;
        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();

        for observation in &tables.weather {
            if !observation.description.contains(RAIN_MARKER)
                || !window.contains(observation.time.date())
            {
                continue;
            }
            if let Some(city) = tables.cities.iter().find(|c| c.id == observation.city_id) {
                *counts.entry(city.name.as_str()).or_insert(0) += 1;
            }
        }

        Ok(counts
            .into_iter()
            .map(|(city_name, rain_hours)| RainCount {
                city_name: city_name.to_string(),
                rain_hours,
            })
            .collect())
    }
}
