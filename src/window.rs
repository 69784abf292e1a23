use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::AnalyticsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Period {
    #[default]
    Today,
    Yesterday,
    CurrentWeek,
    Last7Days,
}

impl Period {
    pub const ALL: [Period; 4] = [
        Period::Today,
        Period::Yesterday,
        Period::CurrentWeek,
        Period::Last7Days,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::Yesterday => "yesterday",
            Period::CurrentWeek => "current_week",
            Period::Last7Days => "last_7_days",
        }
    }

    /// Resolves the period to the dates it covers, anchored on `today`.
    pub fn resolve(self, today: NaiveDate) -> DateWindow {
        match self {
            Period::Today => DateWindow::single_day(today),
            Period::Yesterday => DateWindow::single_day(today - Duration::days(1)),
            Period::CurrentWeek => DateWindow {
                start: week_start(today),
                end: today + Duration::days(1),
            },
            // strictly after today - 7, so the eighth day back is excluded
            Period::Last7Days => DateWindow {
                start: today - Duration::days(6),
                end: today + Duration::days(1),
            },
        }
    }
}

impl FromStr for Period {
    type Err = AnalyticsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "today" => Ok(Period::Today),
            "yesterday" => Ok(Period::Yesterday),
            "current_week" => Ok(Period::CurrentWeek),
            "last_7_days" => Ok(Period::Last7Days),
            other => Err(AnalyticsError::InvalidPeriod(other.to_string())),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open range of calendar dates, `start <= date < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day + Duration::days(1),
        }
    }

    /// The full calendar week before the one containing `today`.
    pub fn previous_week(today: NaiveDate) -> Self {
        let start_of_this_week = week_start(today);
        Self {
            start: start_of_this_week - Duration::days(7),
            end: start_of_this_week,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    pub fn covers(&self, other: &DateWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Monday of the week containing `day`, the same boundary Postgres uses
/// for `date_trunc('week', ..)`.
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Hour,
    Day,
    Week,
}

impl Granularity {
    /// Unit name understood by `date_trunc`.
    pub fn unit(self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Week => "week",
        }
    }

    pub fn truncate(self, time: NaiveDateTime) -> NaiveDateTime {
        match self {
            Granularity::Hour => time
                .date()
                .and_time(NaiveTime::MIN)
                .with_hour(time.hour())
                .unwrap_or(time),
            Granularity::Day => time.date().and_time(NaiveTime::MIN),
            Granularity::Week => week_start(time.date()).and_time(NaiveTime::MIN),
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "hour" => Ok(Granularity::Hour),
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            other => Err(format!("unknown granularity '{other}'")),
        }
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Local wall clock, matching the naive timestamps stored in `weather.time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
