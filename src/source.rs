use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime};
use reqwest::Client;
use serde::Deserialize;

use crate::config::OpenWeatherSettings;
use crate::error::SourceError;
use crate::models::NewCity;

/// A reading as reported by the live source.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub observed_at: NaiveDateTime,
    pub temperature: f64,
    pub description: String,
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current(&self, latitude: f64, longitude: f64) -> Result<Reading, SourceError>;

    async fn locate(&self, city_name: &str) -> Result<NewCity, SourceError>;
}

#[derive(Debug, Deserialize)]
struct CurrentPayload {
    dt: i64,
    main: MainBlock,
    weather: Vec<ConditionBlock>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionBlock {
    description: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeEntry {
    name: String,
    lat: f64,
    lon: f64,
    country: String,
}

pub fn parse_current(body: &str) -> Result<Reading, SourceError> {
    let payload: CurrentPayload = serde_json::from_str(body)?;
    let description = payload
        .weather
        .into_iter()
        .next()
        .map(|w| w.description)
        .ok_or_else(|| SourceError::Malformed("empty weather list".to_string()))?;
    let observed_at = DateTime::from_timestamp(payload.dt, 0)
        .ok_or_else(|| SourceError::Malformed(format!("timestamp {} out of range", payload.dt)))?
        .with_timezone(&Local)
        .naive_local();

    Ok(Reading {
        observed_at,
        temperature: payload.main.temp,
        description,
    })
}

pub fn parse_geocode(city_name: &str, body: &str) -> Result<NewCity, SourceError> {
    let entries: Vec<GeocodeEntry> = serde_json::from_str(body)?;
    let entry = entries
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::NotFound(city_name.to_string()))?;

    Ok(NewCity {
        name: entry.name,
        country: entry.country,
        latitude: entry.lat,
        longitude: entry.lon,
    })
}

pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(settings: &OpenWeatherSettings) -> Result<Self, SourceError> {
        let base_url = settings.base_url.trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|source| SourceError::Request {
                url: base_url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key.clone(),
        })
    }

    /// Fetches `path` with the api key appended. Errors carry the url
    /// without the query string so the key never reaches the logs.
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String, SourceError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|source| SourceError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status { url, status });
        }

        response
            .text()
            .await
            .map_err(|source| SourceError::Request { url, source })
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn current(&self, latitude: f64, longitude: f64) -> Result<Reading, SourceError> {
        let body = self
            .get(
                "/data/2.5/weather",
                &[
                    ("lat", latitude.to_string()),
                    ("lon", longitude.to_string()),
                    ("units", "metric".to_string()),
                ],
            )
            .await?;
        parse_current(&body)
    }

    async fn locate(&self, city_name: &str) -> Result<NewCity, SourceError> {
        let body = self
            .get(
                "/geo/1.0/direct",
                &[("q", city_name.to_string()), ("limit", "1".to_string())],
            )
            .await?;
        parse_geocode(city_name, &body)
    }
}
