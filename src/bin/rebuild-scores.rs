//! Flat score rebuild job: recomputes the composite score of every raw
//! sentiment event from its probability triple.
//!
//! Run with: `cargo run --bin rebuild-scores`
//!
//! Configuration comes from environment variables:
//!   DATABASE_PATH  SQLite database file (default: senti_trend.db)
//!   BATCH_SIZE     rows per write batch/commit (default: 2000)

use senti_trend::{rebuild_event_scores, ScoreRebuildConfig, SqliteStore};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| "senti_trend.db".to_string());
    let batch_size = std::env::var("BATCH_SIZE")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(2000);

    let store = SqliteStore::open(&database_path)?;
    let report = rebuild_event_scores(&store, &ScoreRebuildConfig { batch_size })?;

    println!(
        "score rebuild finished: {}/{} rows in {} batches",
        report.updated, report.total, report.batches
    );
    Ok(())
}
