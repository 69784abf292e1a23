use std::fmt::Write;

use chrono::NaiveDate;

use crate::analytics::Analytics;
use crate::error::AnalyticsError;
use crate::models::{GroupBy, RainCount, RainHours, RankingEntry, StatSummary};
use crate::store::ObservationStore;
use crate::window::{Granularity, Period};

const QUERY_FAILED: &str = "Query failed.";

/// Statistics for one country, or the error its query returned.
#[derive(Debug)]
pub struct CountryStats {
    pub country: String,
    pub stats: Result<Vec<StatSummary>, AnalyticsError>,
}

/// Everything a report renders. Each section carries its own result so a
/// failing query only blanks out that section.
#[derive(Debug)]
pub struct ReportData {
    pub generated_on: NaiveDate,
    pub period: Period,
    pub country_stats: Result<Vec<CountryStats>, AnalyticsError>,
    pub hottest_daily: Result<Vec<RankingEntry>, AnalyticsError>,
    pub coldest_daily: Result<Vec<RankingEntry>, AnalyticsError>,
    pub rain: RainHours,
}

pub async fn gather<S: ObservationStore>(analytics: &Analytics<S>, period: Period) -> ReportData {
    let country_stats = match analytics.list_countries().await {
        Ok(mut countries) => {
            countries.sort();
            let mut sections = Vec::with_capacity(countries.len());
            for country in countries {
                let stats = analytics.stats(GroupBy::Country, &country, period).await;
                sections.push(CountryStats { country, stats });
            }
            Ok(sections)
        }
        Err(err) => Err(err),
    };

    ReportData {
        generated_on: analytics.clock().today(),
        period,
        country_stats,
        hottest_daily: analytics.hottest_by(Granularity::Day).await,
        coldest_daily: analytics.coldest_by(Granularity::Day).await,
        rain: analytics.rain_hours().await,
    }
}

fn write_section<T, E>(
    output: &mut String,
    section: &Result<Vec<T>, E>,
    empty: &str,
    line: impl Fn(&T) -> String,
) {
    match section {
        Err(_) => {
            let _ = writeln!(output, "{QUERY_FAILED}");
        }
        Ok(items) if items.is_empty() => {
            let _ = writeln!(output, "{empty}");
        }
        Ok(items) => {
            for item in items {
                let _ = writeln!(output, "{}", line(item));
            }
        }
    }
}

fn ranking_line(entry: &RankingEntry) -> String {
    format!(
        "- {}: {} at {:.1}°C",
        entry.bucket_start.date(),
        entry.city_name,
        entry.extreme_temp
    )
}

fn rain_line(count: &RainCount) -> String {
    format!("- {}: {} rainy hours", count.city_name, count.rain_hours)
}

fn write_country_stats(output: &mut String, section: &Result<Vec<CountryStats>, AnalyticsError>) {
    let countries = match section {
        Ok(countries) => countries,
        Err(_) => {
            let _ = writeln!(output, "{QUERY_FAILED}");
            return;
        }
    };

    let nothing_to_show = countries
        .iter()
        .all(|c| matches!(&c.stats, Ok(stats) if stats.is_empty()));
    if nothing_to_show {
        let _ = writeln!(output, "No observations recorded for this window.");
        return;
    }

    for country in countries {
        match &country.stats {
            Ok(stats) => {
                for s in stats {
                    let spread = s
                        .stddev_temp
                        .map(|v| format!("{v:.2}"))
                        .unwrap_or_else(|| "n/a".to_string());
                    let _ = writeln!(
                        output,
                        "- {}: max {:.1}°C, min {:.1}°C, std dev {}",
                        s.group_key, s.max_temp, s.min_temp, spread
                    );
                }
            }
            Err(_) => {
                let _ = writeln!(output, "- {}: query failed", country.country);
            }
        }
    }
}

pub fn build_report(data: &ReportData) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Weather Window Report");
    let _ = writeln!(
        output,
        "Generated on {} (statistics for {})",
        data.generated_on, data.period
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Temperatures by Country");
    write_country_stats(&mut output, &data.country_stats);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Hottest Cities by Day");
    write_section(&mut output, &data.hottest_daily, "No observations recorded.", ranking_line);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Coldest Cities by Day");
    write_section(&mut output, &data.coldest_daily, "No observations recorded.", ranking_line);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Rain Yesterday");
    write_section(&mut output, &data.rain.yesterday, "No rain recorded.", rain_line);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Rain Last Week");
    write_section(&mut output, &data.rain.last_week, "No rain recorded.", rain_line);

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn empty_data() -> ReportData {
        ReportData {
            generated_on: NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            period: Period::Today,
            country_stats: Ok(Vec::new()),
            hottest_daily: Ok(Vec::new()),
            coldest_daily: Ok(Vec::new()),
            rain: RainHours {
                yesterday: Ok(Vec::new()),
                last_week: Ok(Vec::new()),
            },
        }
    }

    fn outage() -> StoreError {
        StoreError::Unavailable("connection reset".to_string())
    }

    #[test]
    fn empty_report_says_so() {
        let report = build_report(&empty_data());
        assert!(report.starts_with("# Weather Window Report"));
        assert!(report.contains("statistics for today"));
        assert!(report.contains("No observations recorded for this window."));
        assert_eq!(report.matches("No rain recorded.").count(), 2);
        assert!(!report.contains(QUERY_FAILED));
    }

    #[test]
    fn lists_stats_rankings_and_rain() {
        let mut data = empty_data();
        data.country_stats = Ok(vec![CountryStats {
            country: "PL".to_string(),
            stats: Ok(vec![StatSummary {
                group_key: "PL".to_string(),
                max_temp: 12.0,
                min_temp: 4.5,
                stddev_temp: None,
            }]),
        }]);
        data.hottest_daily = Ok(vec![RankingEntry {
            bucket_start: NaiveDate::from_ymd_opt(2026, 10, 14)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            extreme_temp: 21.04,
            city_name: "Madrid".to_string(),
        }]);
        data.rain.last_week = Ok(vec![RainCount {
            city_name: "Hamburg".to_string(),
            rain_hours: 17,
        }]);

        let report = build_report(&data);
        assert!(report.contains("- PL: max 12.0°C, min 4.5°C, std dev n/a"));
        assert!(report.contains("- 2026-10-14: Madrid at 21.0°C"));
        assert!(report.contains("- Hamburg: 17 rainy hours"));
        assert!(report.contains("## Coldest Cities by Day\nNo observations recorded."));
    }

    #[test]
    fn failed_sections_are_marked_without_hiding_the_rest() {
        let mut data = empty_data();
        data.coldest_daily = Err(AnalyticsError::Store(outage()));
        data.rain.yesterday = Err(outage());
        data.rain.last_week = Ok(vec![RainCount {
            city_name: "Oslo".to_string(),
            rain_hours: 3,
        }]);

        let report = build_report(&data);
        assert!(report.contains("## Coldest Cities by Day\nQuery failed."));
        assert!(report.contains("## Hottest Cities by Day\nNo observations recorded."));
        assert!(report.contains("## Rain Yesterday\nQuery failed."));
        assert!(report.contains("## Rain Last Week\n- Oslo: 3 rainy hours"));
    }

    #[test]
    fn failed_country_is_listed_next_to_the_others() {
        let mut data = empty_data();
        data.country_stats = Ok(vec![
            CountryStats {
                country: "DE".to_string(),
                stats: Err(AnalyticsError::Store(outage())),
            },
            CountryStats {
                country: "FR".to_string(),
                stats: Ok(vec![StatSummary {
                    group_key: "FR".to_string(),
                    max_temp: 18.0,
                    min_temp: 9.0,
                    stddev_temp: Some(2.5),
                }]),
            },
        ]);

        let report = build_report(&data);
        assert!(report.contains("- DE: query failed"));
        assert!(report.contains("- FR: max 18.0°C, min 9.0°C, std dev 2.50"));
        assert!(!report.contains("No observations recorded for this window."));

        data.country_stats = Err(AnalyticsError::Store(outage()));
        let report = build_report(&data);
        assert!(report.contains("## Temperatures by Country\nQuery failed."));
    }
}
