use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: i32,
    pub name: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCity {
    pub name: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub city_id: i32,
    pub time: NaiveDateTime,
    pub temperature: f64,
    pub description: String,
}

/// Temperature spread of one group over a window.
///
/// `stddev_temp` is the sample standard deviation and is `None` when the
/// window holds a single observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatSummary {
    pub group_key: String,
    pub max_temp: f64,
    pub min_temp: f64,
    pub stddev_temp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub bucket_start: NaiveDateTime,
    pub extreme_temp: f64,
    pub city_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RainCount {
    pub city_name: String,
    pub rain_hours: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupBy {
    City,
    Country,
}

impl GroupBy {
    pub fn column(self) -> &'static str {
        match self {
            GroupBy::City => "c.name",
            GroupBy::Country => "c.country",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extreme {
    Hottest,
    Coldest,
}

impl Extreme {
    pub fn aggregate(self) -> &'static str {
        match self {
            Extreme::Hottest => "MAX",
            Extreme::Coldest => "MIN",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Extreme::Hottest => "hottest",
            Extreme::Coldest => "coldest",
        }
    }
}

/// Hourly, daily and weekly extremes, each computed independently.
#[derive(Debug)]
pub struct Rankings {
    pub hourly: Result<Vec<RankingEntry>, StoreError>,
    pub daily: Result<Vec<RankingEntry>, StoreError>,
    pub weekly: Result<Vec<RankingEntry>, StoreError>,
}

/// Rain hours yesterday and over the previous calendar week, each
/// queried on its own.
#[derive(Debug)]
pub struct RainHours {
    pub yesterday: Result<Vec<RainCount>, StoreError>,
    pub last_week: Result<Vec<RainCount>, StoreError>,
}
