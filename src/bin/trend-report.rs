//! Trend report job: one price-vs-sentiment chart per company plus a
//! combined grid.
//!
//! Run with: `cargo run --bin trend-report`
//!
//! Configuration comes from environment variables:
//!   DATABASE_PATH  SQLite database file (default: senti_trend.db)
//!   OUTPUT_DIR     artifact directory, created if absent (default: trend_out)
//!   COMPANIES      comma-separated company ids (default: all companies)
//!   FONT_FAMILY    preferred label font, applied best-effort

use senti_trend::{run_trend_report, JsonChartSink, RenderPrefs, SqliteStore, TrendConfig};
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| "senti_trend.db".to_string());
    let output_dir = std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "trend_out".to_string());
    let companies: Vec<String> = std::env::var("COMPANIES")
        .map(|raw| {
            raw.split(',')
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let config = TrendConfig {
        output_dir: PathBuf::from(output_dir),
        companies,
        prefs: RenderPrefs {
            font_family: std::env::var("FONT_FAMILY").ok(),
            ..RenderPrefs::default()
        },
    };

    let store = SqliteStore::open(&database_path)?;
    let mut sink = JsonChartSink::new();
    let report = run_trend_report(&store, &mut sink, &config)?;

    println!(
        "trend report finished: {} rendered, {} skipped, combined={}",
        report.rendered, report.skipped, report.combined
    );
    Ok(())
}
