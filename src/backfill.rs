//! Only one generator may run against a store at a time: two concurrent
//! runs would each read the same earliest timestamp and interleave writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Duration, NaiveDateTime};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::analytics::Analytics;
use crate::config::BackfillSettings;
use crate::error::{AnalyticsError, Result};
use crate::models::{City, GroupBy, Observation, StatSummary};
use crate::store::ObservationStore;
use crate::window::Period;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Seed {
    max_temp: f64,
    min_temp: f64,
}

impl From<&StatSummary> for Seed {
    fn from(stats: &StatSummary) -> Self {
        Self {
            max_temp: stats.max_temp,
            min_temp: stats.min_temp,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackfillReport {
    pub earliest: NaiveDateTime,
    pub horizon: NaiveDateTime,
    pub steps: usize,
    pub rows_written: usize,
    pub cities_skipped: usize,
    pub failed_writes: usize,
    pub interrupted: bool,
}

pub struct BackfillGenerator<'a, S, R> {
    analytics: &'a Analytics<S>,
    settings: BackfillSettings,
    rng: R,
    seeds: HashMap<i32, Seed>,
}

impl<'a, S: ObservationStore, R: Rng> BackfillGenerator<'a, S, R> {
    pub fn new(analytics: &'a Analytics<S>, settings: BackfillSettings, rng: R) -> Self {
        Self {
            analytics,
            settings,
            rng,
            seeds: HashMap::new(),
        }
    }

    /// Runs until the cursor passes the horizon or `stop` is raised.
    ///
    /// `stop` is only checked between steps, so an interrupted run never
    /// leaves a step half written.
    pub async fn run(&mut self, stop: &AtomicBool) -> Result<BackfillReport> {
        self.settings
            .validate()
            .map_err(|err| AnalyticsError::InvalidSettings(err.to_string()))?;
        let store = self.analytics.store();

        let earliest = store
            .earliest_observation()
            .await?
            .ok_or(AnalyticsError::NoData)?;
        let horizon = earliest - self.settings.horizon();
        let cities = store.cities().await?;
        let descriptions = store.descriptions().await?;
        if descriptions.is_empty() {
            return Err(AnalyticsError::EmptyVocabulary);
        }

        info!(%earliest, %horizon, cities = cities.len(), "starting backfill");

        let mut report = BackfillReport {
            earliest,
            horizon,
            steps: 0,
            rows_written: 0,
            cities_skipped: 0,
            failed_writes: 0,
            interrupted: false,
        };

        let mut cursor = earliest - self.settings.step();
        while cursor >= horizon {
            if stop.load(Ordering::Relaxed) {
                report.interrupted = true;
                warn!(%cursor, steps = report.steps, "backfill interrupted");
                break;
            }

            debug!(%cursor, step = report.steps, "synthesizing step");
            cursor = self
                .synthesize_step(cursor, &cities, &descriptions, &mut report)
                .await;
            cursor -= self.settings.step();
            report.steps += 1;
        }

        info!(
            steps = report.steps,
            rows = report.rows_written,
            skipped = report.cities_skipped,
            failed = report.failed_writes,
            "backfill finished"
        );
        Ok(report)
    }

    /// Writes one row per city and returns the cursor after the per-city
    /// time jitter has been applied to it.
    async fn synthesize_step(
        &mut self,
        mut cursor: NaiveDateTime,
        cities: &[City],
        descriptions: &[String],
        report: &mut BackfillReport,
    ) -> NaiveDateTime {
        for city in cities {
            let Some(seed) = self.seed_for(city).await else {
                report.cities_skipped += 1;
                continue;
            };

            let temperature = self.synthetic_temperature(seed);
            // jitter shifts the shared cursor, so it accumulates across rows
            cursor += self.time_jitter();
            // synthetic rows must stay strictly before the real history
            cursor = cursor.min(report.earliest - Duration::seconds(1));
            let description = descriptions[self.rng.random_range(0..descriptions.len())].clone();

            let observation = Observation {
                city_id: city.id,
                time: cursor,
                temperature,
                description,
            };
            match self.analytics.store().insert_observation(&observation).await {
                Ok(()) => report.rows_written += 1,
                Err(err) => {
                    warn!(error = %err, city = %city.name, time = %cursor, "failed to write synthetic row");
                    report.failed_writes += 1;
                }
            }
        }
        cursor
    }

    /// Today's real spread for the city, looked up once and then reused so
    /// that rows synthesized onto today never feed back into the seed.
    async fn seed_for(&mut self, city: &City) -> Option<Seed> {
        if let Some(seed) = self.seeds.get(&city.id) {
            return Some(*seed);
        }

        match self
            .analytics
            .stats(GroupBy::City, &city.name, Period::Today)
            .await
        {
            Ok(stats) => match stats.first() {
                Some(stats) => {
                    let seed = Seed::from(stats);
                    self.seeds.insert(city.id, seed);
                    Some(seed)
                }
                None => {
                    debug!(city = %city.name, "no observations today, skipping");
                    None
                }
            },
            Err(err) => {
                warn!(error = %err, city = %city.name, "seed lookup failed, skipping");
                None
            }
        }
    }

    fn synthetic_temperature(&mut self, seed: Seed) -> f64 {
        let range = self.settings.temperature_jitter_centi();
        let jitter = self.rng.random_range(-range..=range) as f64 / 100.0;
        (seed.max_temp + seed.min_temp) / 2.0 + jitter
    }

    fn time_jitter(&mut self) -> Duration {
        let range = self.settings.time_jitter_secs;
        Duration::seconds(self.rng.random_range(-range..=range))
    }
}
