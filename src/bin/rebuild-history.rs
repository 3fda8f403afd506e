//! Windowed history rebuild job: regenerates the hourly per-company score
//! table as a sliding-window average over raw sentiment events.
//!
//! Run with: `cargo run --bin rebuild-history`
//!
//! Configuration comes from environment variables:
//!   DATABASE_PATH       SQLite database file (default: senti_trend.db)
//!   WINDOW_HOURS        sliding-window width (default: 1)
//!   MIN_COUNT           minimum events per company per window (default: 1)
//!   TRUNCATE_BEFORE     rebuild from scratch when "true" (default: true)
//!   COMMIT_EVERY_HOURS  hour-ticks per commit (default: 6)

use senti_trend::{rebuild_score_history, HistoryRebuildConfig, SqliteStore};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| "senti_trend.db".to_string());
    let defaults = HistoryRebuildConfig::default();
    let config = HistoryRebuildConfig {
        window_hours: env_parse("WINDOW_HOURS", defaults.window_hours),
        min_count: env_parse("MIN_COUNT", defaults.min_count),
        truncate_before: env_parse("TRUNCATE_BEFORE", defaults.truncate_before),
        commit_every_hours: env_parse("COMMIT_EVERY_HOURS", defaults.commit_every_hours),
    };

    let store = SqliteStore::open(&database_path)?;
    let report = rebuild_score_history(&store, &config)?;

    println!(
        "history rebuild finished: {} hour ticks, {} upserts",
        report.hours, report.upserts
    );
    Ok(())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
