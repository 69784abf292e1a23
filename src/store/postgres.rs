use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use super::{ObservationStore, RAIN_MARKER};
use crate::config::DatabaseSettings;
use crate::error::StoreError;
use crate::models::{
    City, Extreme, GroupBy, NewCity, Observation, RainCount, RankingEntry, StatSummary,
};
use crate::window::{DateWindow, Granularity};

/// Postgres-backed store. Every query checks a connection out of the pool
/// and hands it back when the future completes or is dropped.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&settings.url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn init_db(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ObservationStore for PgStore {
    async fn cities(&self) -> Result<Vec<City>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, country, latitude, longitude FROM cities ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut cities = Vec::with_capacity(rows.len());
        for row in rows {
            cities.push(City {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                country: row.try_get("country")?,
                latitude: row.try_get("latitude")?,
                longitude: row.try_get("longitude")?,
            });
        }

        Ok(cities)
    }

    async fn insert_city(&self, city: &NewCity) -> Result<i32, StoreError> {
        let id: i32 = sqlx::query(
            r#"
            INSERT INTO cities (name, country, latitude, longitude)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&city.name)
        .bind(&city.country)
        .bind(city.latitude)
        .bind(city.longitude)
        .fetch_one(&self.pool)
        .await?
        .try_get("id")?;

        Ok(id)
    }

    async fn insert_observation(&self, observation: &Observation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO weather (city_id, time, temperature, description)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(observation.city_id)
        .bind(observation.time)
        .bind(observation.temperature)
        .bind(&observation.description)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn earliest_observation(&self) -> Result<Option<NaiveDateTime>, StoreError> {
        let earliest: Option<NaiveDateTime> = sqlx::query("SELECT MIN(time) AS earliest FROM weather")
            .fetch_one(&self.pool)
            .await?
            .try_get("earliest")?;
        Ok(earliest)
    }

    async fn descriptions(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT DISTINCT description FROM weather ORDER BY description")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get("description").map_err(StoreError::from))
            .collect()
    }

    async fn countries(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT DISTINCT country FROM cities ORDER BY country")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get("country").map_err(StoreError::from))
            .collect()
    }

    async fn temperature_stats(
        &self,
        group: GroupBy,
        key: &str,
        window: DateWindow,
    ) -> Result<Vec<StatSummary>, StoreError> {
        let column = group.column();
        let query = format!(
            "SELECT {column} AS group_key, MAX(w.temperature) AS max_temp, \
             MIN(w.temperature) AS min_temp, STDDEV_SAMP(w.temperature) AS stddev_temp \
             FROM weather w JOIN cities c ON w.city_id = c.id \
             WHERE {column} = $1 AND w.time::date >= $2 AND w.time::date < $3 \
             GROUP BY {column}"
        );

        let rows = sqlx::query(&query)
            .bind(key)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await?;

        let mut stats = Vec::with_capacity(rows.len());
        for row in rows {
            stats.push(StatSummary {
                group_key: row.try_get("group_key")?,
                max_temp: row.try_get("max_temp")?,
                min_temp: row.try_get("min_temp")?,
                stddev_temp: row.try_get("stddev_temp")?,
            });
        }

        Ok(stats)
    }

    async fn bucket_extremes(
        &self,
        granularity: Granularity,
        extreme: Extreme,
    ) -> Result<Vec<RankingEntry>, StoreError> {
        // join back on equality so every tied observation is returned
        let unit = granularity.unit();
        let aggregate = extreme.aggregate();
        let query = format!(
            "SELECT b.bucket, b.extreme_temp, c.name \
             FROM (SELECT date_trunc('{unit}', time) AS bucket, {aggregate}(temperature) AS extreme_temp \
                   FROM weather GROUP BY 1) b \
             JOIN weather w ON b.bucket = date_trunc('{unit}', w.time) AND b.extreme_temp = w.temperature \
             JOIN cities c ON c.id = w.city_id \
             ORDER BY b.bucket ASC, c.name ASC"
        );

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(RankingEntry {
                bucket_start: row.try_get("bucket")?,
                extreme_temp: row.try_get("extreme_temp")?,
                city_name: row.try_get("name")?,
            });
        }

        Ok(entries)
    }

    async fn rain_counts(&self, window: DateWindow) -> Result<Vec<RainCount>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT c.name, COUNT(*) AS rain_hours
            FROM weather w
            JOIN cities c ON w.city_id = c.id
            WHERE w.description LIKE '%' || $1 || '%'
              AND w.time::date >= $2
              AND w.time::date < $3
            GROUP BY c.name
            ORDER BY c.name
            "#,
        )
        .bind(RAIN_MARKER)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            counts.push(RainCount {
                city_name: row.try_get("name")?,
                rain_hours: row.try_get("rain_hours")?,
            });
        }

        Ok(counts)
    }
}
