//! Command-line interface to the earnings planner.
//!
//! Builds (or loads) the mobility graphs, then runs one analysis per
//! invocation: a single-zone solve, a best-starting-zones ranking, an
//! hourly-rate check, a path replay, or one of the batch analyses.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::warn;

use shift_planner::analysis;
use shift_planner::cache::{RedisHttpCache, RedisHttpConfig};
use shift_planner::graph::CityId;
use shift_planner::snapshot::{load_or_build, FileSnapshotStore};
use shift_planner::solver::{Planner, PlannerConfig};
use shift_planner::weather::WeatherTable;

#[derive(Parser)]
#[command(name = "shift", about = "Earnings planner for ride-sharing drivers")]
struct Cli {
    /// Historical trips CSV.
    #[arg(long, default_value = "data/trips.csv")]
    trips: PathBuf,

    /// Hourly surge multipliers CSV.
    #[arg(long, default_value = "data/surge_by_hour.csv")]
    surge: PathBuf,

    /// Optional daily weather conditions CSV.
    #[arg(long)]
    weather: Option<PathBuf>,

    /// Graph snapshot file; skips ingestion when present and readable.
    #[arg(long, default_value = "data/cache/graphs.bin")]
    snapshot: PathBuf,

    /// Ignore any existing snapshot and rebuild from the CSVs.
    #[arg(long)]
    force_rebuild: bool,

    /// Webdis endpoint for the shared solved-query cache.
    #[arg(long)]
    cache_url: Option<String>,

    /// Laplace smoothing parameter.
    #[arg(long, default_value_t = 0.1)]
    epsilon: f64,

    /// Discount factor for future earnings.
    #[arg(long, default_value_t = 0.95)]
    gamma: f64,

    /// Minimum demand rate for wait-time estimation.
    #[arg(long, default_value_t = 0.5)]
    lambda_floor: f64,

    /// Value-function time bucket, in minutes.
    #[arg(long, default_value_t = 5)]
    bucket_minutes: u32,

    /// Write the results as JSON to this file as well.
    #[arg(long)]
    json: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Optimal strategy for one starting zone.
    Solve {
        #[arg(long)]
        city: CityId,
        #[arg(long)]
        zone: String,
        #[arg(long, default_value_t = 8)]
        hour: u8,
        #[arg(long, default_value_t = 8)]
        duration: u32,
        #[arg(long)]
        date: NaiveDate,
        /// Also print the step-by-step timing breakdown.
        #[arg(long)]
        verbose: bool,
    },
    /// Rank starting zones by expected earnings.
    BestPositions {
        #[arg(long)]
        city: CityId,
        #[arg(long, default_value_t = 8)]
        hour: u8,
        #[arg(long, default_value_t = 8)]
        duration: u32,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// Closed-form hourly earning rate for a zone.
    Rate {
        #[arg(long)]
        city: CityId,
        #[arg(long)]
        zone: String,
        #[arg(long, default_value_t = 8)]
        hour: u8,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Replay a path with per-step fares and timings.
    Timing {
        #[arg(long)]
        city: CityId,
        /// Zones of the path, in visit order.
        #[arg(long, required = true, num_args = 2..)]
        zones: Vec<String>,
        #[arg(long, default_value_t = 8)]
        hour: u8,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Compare standard work schedules from one zone.
    Schedules {
        #[arg(long)]
        city: CityId,
        #[arg(long)]
        zone: String,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Same shift across seven consecutive days.
    Weekly {
        #[arg(long)]
        city: CityId,
        #[arg(long)]
        zone: String,
        #[arg(long, default_value_t = 8)]
        hour: u8,
        #[arg(long, default_value_t = 8)]
        duration: u32,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Zone demand flows and earning rates at one hour.
    Popularity {
        #[arg(long)]
        city: CityId,
        #[arg(long, default_value_t = 8)]
        hour: u8,
        #[arg(long)]
        date: NaiveDate,
    },
}

fn validate(hour: u8, duration: Option<u32>) -> Result<(), String> {
    if hour > 23 {
        return Err(format!("hour must be 0-23, got {hour}"));
    }
    if let Some(duration) = duration {
        if !(1..=24).contains(&duration) {
            return Err(format!("duration must be 1-24 hours, got {duration}"));
        }
    }
    Ok(())
}

fn export_json(path: &PathBuf, value: &serde_json::Value) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(serde_json::to_string_pretty(value)?.as_bytes())?;
    Ok(())
}

fn run(cli: Cli) -> Result<(), String> {
    let snapshot_store = FileSnapshotStore::new(&cli.snapshot);
    let (graphs, surge) = load_or_build(
        &cli.trips,
        &cli.surge,
        Some(&snapshot_store),
        cli.force_rebuild,
    )
    .map_err(|err| err.to_string())?;

    let config = PlannerConfig {
        epsilon: cli.epsilon,
        gamma: cli.gamma,
        lambda_floor: cli.lambda_floor,
        bucket_minutes: cli.bucket_minutes,
        use_cache: true,
    };
    let mut planner = Planner::new(Arc::new(graphs), config).with_surge(Arc::new(surge));

    if let Some(weather_path) = &cli.weather {
        let table = WeatherTable::from_csv_path(weather_path).map_err(|err| err.to_string())?;
        planner = planner.with_weather(Arc::new(table));
    }
    if let Some(cache_url) = &cli.cache_url {
        match RedisHttpCache::new(RedisHttpConfig {
            base_url: cache_url.clone(),
            ..RedisHttpConfig::default()
        }) {
            Ok(cache) => planner = planner.with_remote_cache(Arc::new(cache)),
            Err(err) => warn!(%err, "shared cache unavailable, continuing without it"),
        }
    }

    let results = match &cli.command {
        Command::Solve {
            city,
            zone,
            hour,
            duration,
            date,
            verbose,
        } => {
            validate(*hour, Some(*duration))?;
            let solution = planner
                .solve(*city, zone, *hour, *duration, *date)
                .map_err(|err| err.to_string())?;

            println!("Expected total earnings: {:.2}", solution.earnings);
            println!(
                "Expected hourly rate: {:.2}/hour",
                solution.earnings / *duration as f64
            );
            println!("Optimal path: {}", solution.path.join(" -> "));

            if *verbose {
                let steps = planner
                    .path_timing(*city, &solution.path, *hour, *date)
                    .map_err(|err| err.to_string())?;
                println!(
                    "\n{:<4} {:<10} {:<10} {:<5} {:>8} {:>8} {:>7} {:>9} {:>9}",
                    "Step", "From", "To", "Hour", "Fare", "Travel", "Wait", "Cum.min", "Rate/h"
                );
                for step in &steps {
                    println!(
                        "{:<4} {:<10} {:<10} {:02}:00 {:>8.2} {:>7.1}m {:>6.1}m {:>9} {:>9.2}",
                        step.step,
                        step.from,
                        step.to,
                        step.hour,
                        step.fare,
                        step.travel_minutes,
                        step.wait_minutes,
                        step.cumulative_minutes,
                        step.hourly_rate
                    );
                }
            }
            serde_json::json!({ "solve": solution })
        }
        Command::BestPositions {
            city,
            hour,
            duration,
            date,
            top_k,
        } => {
            validate(*hour, Some(*duration))?;
            let ranked = planner
                .best_starting_zones(*city, *hour, *duration, *date, *top_k)
                .map_err(|err| err.to_string())?;

            for (rank, entry) in ranked.iter().enumerate() {
                println!(
                    "{:2}. {}: {:.2} ({:.2}/h)",
                    rank + 1,
                    entry.zone,
                    entry.earnings,
                    entry.earnings / *duration as f64
                );
            }
            serde_json::json!({ "best_positions": ranked })
        }
        Command::Rate {
            city,
            zone,
            hour,
            date,
        } => {
            validate(*hour, None)?;
            let rate = planner
                .earning_rate(*city, zone, *hour, *date)
                .map_err(|err| err.to_string())?;
            println!("Earning rate at {zone}, {hour:02}:00: {rate:.2}/hour");
            println!(
                "Surge: {:.2}x, Weather: {:.2}x",
                planner.surge_multiplier(*city, *hour),
                planner.weather_multiplier(*city, *date)
            );
            serde_json::json!({ "earning_rate": rate })
        }
        Command::Timing {
            city,
            zones,
            hour,
            date,
        } => {
            validate(*hour, None)?;
            let steps = planner
                .path_timing(*city, zones, *hour, *date)
                .map_err(|err| err.to_string())?;
            for step in &steps {
                println!(
                    "{:2}. {} -> {} at {:02}:00: fare {:.2}, {:.1}m travel, {:.1}m wait, total {:.2} earned",
                    step.step,
                    step.from,
                    step.to,
                    step.hour,
                    step.fare,
                    step.travel_minutes,
                    step.wait_minutes,
                    step.cumulative_earnings
                );
            }
            serde_json::json!({ "timing": steps })
        }
        Command::Schedules { city, zone, date } => {
            let schedules = [
                (6, 8),
                (8, 8),
                (10, 8),
                (14, 8),
                (18, 8),
                (22, 8),
                (8, 4),
                (8, 6),
                (8, 10),
                (8, 12),
            ];
            let rows = analysis::compare_work_schedules(&planner, *city, zone, *date, &schedules)
                .map_err(|err| err.to_string())?;
            for row in &rows {
                println!(
                    "{}: {:.2} total, {:.2}/h",
                    row.schedule, row.earnings, row.hourly_rate
                );
            }
            serde_json::json!({ "schedules": rows })
        }
        Command::Weekly {
            city,
            zone,
            hour,
            duration,
            date,
        } => {
            validate(*hour, Some(*duration))?;
            let rows =
                analysis::weekly_analysis(&planner, *city, zone, *hour, *duration, *date)
                    .map_err(|err| err.to_string())?;
            for row in &rows {
                println!(
                    "{} {}: {:.2} total, {:.2}/h, weather {:.2}x, {} distinct zones",
                    row.date,
                    row.weekday,
                    row.earnings,
                    row.hourly_rate,
                    row.weather_multiplier,
                    row.path_diversity
                );
            }
            let total: f64 = rows.iter().map(|row| row.earnings).sum();
            println!("Weekly total: {:.2}", total);
            serde_json::json!({ "weekly": rows })
        }
        Command::Popularity { city, hour, date } => {
            validate(*hour, None)?;
            let rows = analysis::zone_popularity(&planner, *city, *hour, *date)
                .map_err(|err| err.to_string())?;
            println!(
                "{:<10} {:>8} {:>8} {:>8} {:>10}",
                "Zone", "In", "Out", "Net", "Rate/h"
            );
            for row in &rows {
                println!(
                    "{:<10} {:>8} {:>8} {:>8} {:>10.2}",
                    row.zone, row.incoming_trips, row.outgoing_trips, row.net_flow, row.earning_rate
                );
            }
            serde_json::json!({ "popularity": rows })
        }
    };

    if let Some(json_path) = &cli.json {
        export_json(json_path, &results).map_err(|err| err.to_string())?;
        println!("Results written to {}", json_path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
