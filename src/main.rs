use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;

use weather_window_analytics::models::{Extreme, RainCount, RankingEntry};
use weather_window_analytics::source::OpenWeatherClient;
use weather_window_analytics::{
    ingest, report, Analytics, BackfillGenerator, Granularity, PgStore, Settings, StoreError,
};

#[derive(Parser)]
#[command(name = "weather-analytics")]
#[command(about = "Time-windowed analytics over stored city weather observations", long_about = None)]
struct Cli {
    /// Configuration file (defaults to weather-analytics.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Geocode cities and store their locations
    Locate {
        /// City names; the default European set when omitted
        names: Vec<String>,
    },
    /// Store the current weather of every known city
    Ingest,
    /// Import observations from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Temperature statistics for a city or a country
    #[command(group(
        ArgGroup::new("scope")
            .args(["city", "country"])
            .required(true)
            .multiple(false)
    ))]
    Stats {
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        country: Option<String>,
        #[arg(long, default_value = "today")]
        period: String,
    },
    /// List the countries of the known cities
    Countries,
    /// Hottest or coldest cities per hour, day or week
    Rank {
        #[arg(long, default_value = "day")]
        by: Granularity,
        #[arg(long)]
        coldest: bool,
    },
    /// Rainy hours per city yesterday and last week
    Rain,
    /// Synthesize history behind the earliest observation
    Backfill {
        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "today")]
        period: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn print_ranking(entries: &[RankingEntry]) {
    if entries.is_empty() {
        println!("No observations recorded.");
        return;
    }
    for entry in entries {
        println!(
            "{}  {:>6.2}°C  {}",
            entry.bucket_start, entry.extreme_temp, entry.city_name
        );
    }
}

fn print_rain(counts: &Result<Vec<RainCount>, StoreError>) {
    match counts {
        Ok(counts) if counts.is_empty() => println!("No rain recorded."),
        Ok(counts) => {
            for count in counts {
                println!("- {}: {}", count.city_name, count.rain_hours);
            }
        }
        Err(err) => println!("Query failed: {err}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("failed to load configuration")?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    anyhow::ensure!(
        !settings.database.url.is_empty(),
        "DATABASE_URL must be set to a Postgres instance"
    );
    let store = PgStore::connect(&settings.database)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            store.init_db().await?;
            println!("Schema ready.");
        }
        Commands::Locate { names } => {
            let names = if names.is_empty() {
                ingest::DEFAULT_CITIES.iter().map(|n| n.to_string()).collect()
            } else {
                names
            };
            let client = OpenWeatherClient::new(&settings.openweather)?;
            let result = ingest::locate_cities(&store, &client, &names).await;
            println!("Stored {} cities, {} failed.", result.stored, result.failed);
        }
        Commands::Ingest => {
            let client = OpenWeatherClient::new(&settings.openweather)?;
            let result = ingest::ingest_current(&store, &client).await?;
            println!("Stored {} readings, {} failed.", result.stored, result.failed);
        }
        Commands::Import { csv } => {
            let result = ingest::import_csv(&store, &csv).await?;
            println!(
                "Inserted {} observations from {} ({} rows for unknown cities).",
                result.inserted,
                csv.display(),
                result.unknown_city
            );
        }
        Commands::Stats {
            city,
            country,
            period,
        } => {
            let analytics = Analytics::new(store);
            let stats = match (city, country) {
                (Some(city), _) => analytics.stats_by_city(&city, &period).await?,
                (None, Some(country)) => analytics.stats_by_country(&country, &period).await?,
                (None, None) => anyhow::bail!("either --city or --country is required"),
            };

            if stats.is_empty() {
                println!("No observations found for this window.");
                return Ok(());
            }
            for s in stats {
                let spread = s
                    .stddev_temp
                    .map(|v| format!("{v:.2}"))
                    .unwrap_or_else(|| "n/a".to_string());
                println!(
                    "{}: max {:.2}°C, min {:.2}°C, std dev {}",
                    s.group_key, s.max_temp, s.min_temp, spread
                );
            }
        }
        Commands::Countries => {
            let analytics = Analytics::new(store);
            for country in analytics.list_countries().await? {
                println!("{country}");
            }
        }
        Commands::Rank { by, coldest } => {
            let analytics = Analytics::new(store);
            let extreme = if coldest {
                Extreme::Coldest
            } else {
                Extreme::Hottest
            };
            let entries = match extreme {
                Extreme::Hottest => analytics.hottest_by(by).await?,
                Extreme::Coldest => analytics.coldest_by(by).await?,
            };
            println!("{} cities by {}:", extreme.label(), by.unit());
            print_ranking(&entries);
        }
        Commands::Rain => {
            let analytics = Analytics::new(store);
            let rain = analytics.rain_hours().await;
            println!("Yesterday:");
            print_rain(&rain.yesterday);
            println!("Last week:");
            print_rain(&rain.last_week);
            anyhow::ensure!(
                rain.yesterday.is_ok() && rain.last_week.is_ok(),
                "rain hours query failed"
            );
        }
        Commands::Backfill { seed } => {
            let stop = Arc::new(AtomicBool::new(false));
            let signal_stop = Arc::clone(&stop);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    signal_stop.store(true, Ordering::Relaxed);
                }
            });

            let rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let analytics = Analytics::new(store);
            let mut generator = BackfillGenerator::new(&analytics, settings.backfill.clone(), rng);
            let result = generator.run(&stop).await?;
            println!(
                "Backfilled {} rows over {} steps from {} back to {}{}.",
                result.rows_written,
                result.steps,
                result.earliest,
                result.horizon,
                if result.interrupted { " (interrupted)" } else { "" }
            );
        }
        Commands::Report { period, out } => {
            let period = period.parse()?;
            let analytics = Analytics::new(store);
            let data = report::gather(&analytics, period).await;
            std::fs::write(&out, report::build_report(&data))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
