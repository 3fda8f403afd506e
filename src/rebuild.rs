//! The two score-rebuild batch jobs.
//!
//! Both jobs regenerate derived data wholesale from the raw sentiment event
//! table: the flat rebuild recomputes each event's composite score from its
//! probability triple, and the windowed rebuild regenerates the hourly
//! per-company score history via a sliding-window average. Writes are
//! grouped under commit batches; already-committed batches stay durable if
//! a later batch fails.

use crate::hour::floor_to_hour;
use crate::score::composite_score;
use crate::store::{SqliteStore, StoreError};
use chrono::Duration;
use tracing::info;

/// Configuration for the flat score rebuild.
#[derive(Debug, Clone)]
pub struct ScoreRebuildConfig {
    /// Rows accumulated per bulk update/commit (default: 2000).
    pub batch_size: usize,
}

impl Default for ScoreRebuildConfig {
    fn default() -> Self {
        ScoreRebuildConfig { batch_size: 2000 }
    }
}

/// Summary of a flat score rebuild run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRebuildReport {
    pub total: usize,
    pub updated: usize,
    pub batches: usize,
}

/// Recomputes the composite score for every raw sentiment event.
///
/// Scores are derived from each event's probability triple and written back
/// in batches of `batch_size` rows, each batch committed before the next
/// begins; a final partial batch is flushed even if smaller. An empty event
/// table is a no-op, reported informationally.
///
/// # Errors
/// Propagates store failures; rows committed before the failure remain.
pub fn rebuild_event_scores(
    store: &SqliteStore,
    config: &ScoreRebuildConfig,
) -> Result<ScoreRebuildReport, StoreError> {
    let events = store.raw_events()?;
    let total = events.len();
    if total == 0 {
        info!("no raw sentiment events; nothing to rebuild");
        return Ok(ScoreRebuildReport {
            total: 0,
            updated: 0,
            batches: 0,
        });
    }

    let batch_size = config.batch_size.max(1);
    let mut report = ScoreRebuildReport {
        total,
        updated: 0,
        batches: 0,
    };
    let mut batch: Vec<(f64, i64)> = Vec::with_capacity(batch_size);

    for event in &events {
        let score = composite_score(event.prob_pos, event.prob_neu, event.prob_neg);
        batch.push((score, event.id));

        if batch.len() >= batch_size {
            store.update_event_scores(&batch)?;
            report.updated += batch.len();
            report.batches += 1;
            info!("score update progress: {}/{}", report.updated, total);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        store.update_event_scores(&batch)?;
        report.updated += batch.len();
        report.batches += 1;
    }

    info!("event score rebuild done: {}/{}", report.updated, total);
    Ok(report)
}

/// Configuration for the windowed history rebuild.
#[derive(Debug, Clone)]
pub struct HistoryRebuildConfig {
    /// Sliding-window width in hours (default: 1).
    pub window_hours: i64,
    /// Minimum events per company per window; below this no row is written
    /// (default: 1).
    pub min_count: i64,
    /// Delete the whole history table before rebuilding (default: true).
    pub truncate_before: bool,
    /// Hour-ticks grouped under one commit (default: 6).
    pub commit_every_hours: u32,
}

impl Default for HistoryRebuildConfig {
    fn default() -> Self {
        HistoryRebuildConfig {
            window_hours: 1,
            min_count: 1,
            truncate_before: true,
            commit_every_hours: 6,
        }
    }
}

/// Summary of a windowed history rebuild run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRebuildReport {
    pub hours: u64,
    pub upserts: u64,
}

/// Rebuilds the hourly per-company score history from raw events.
///
/// Walks one hour tick at a time from the earliest to the latest event hour.
/// The value at tick `t` covers the window `[t + 1h - window_hours, t + 1h)`,
/// the window ending with the hour that `t` labels. For each company with
/// at least `min_count` events in the window, `(company, t, avg_score)` is
/// upserted; companies below the threshold get no row, not a zero.
///
/// Commits are issued every `commit_every_hours` ticks rather than every
/// tick; a final commit flushes the remainder. Progress is logged every 24
/// processed ticks.
///
/// # Errors
/// Propagates store failures; ticks committed before the failure remain.
pub fn rebuild_score_history(
    store: &SqliteStore,
    config: &HistoryRebuildConfig,
) -> Result<HistoryRebuildReport, StoreError> {
    let (min_dt, max_dt) = match store.event_range()? {
        Some(range) => range,
        None => {
            info!("no raw sentiment events; history rebuild skipped");
            return Ok(HistoryRebuildReport {
                hours: 0,
                upserts: 0,
            });
        }
    };

    let min_dt = floor_to_hour(min_dt);
    let max_dt = floor_to_hour(max_dt);

    if config.truncate_before {
        store.clear_score_history()?;
        info!("score history truncated");
    }

    let bucket = Duration::hours(1);
    let window = Duration::hours(config.window_hours.max(1));
    let commit_every = config.commit_every_hours.max(1);

    let mut report = HistoryRebuildReport {
        hours: 0,
        upserts: 0,
    };
    let mut pending_hours: u32 = 0;
    let mut t = min_dt;

    store.begin_batch()?;
    while t <= max_dt {
        // Tick t labels the hour ending at t + 1h; the window runs back
        // from that end.
        let window_end = t + bucket;
        let window_start = window_end - window;

        let stats = store.window_company_stats(&window_start, &window_end)?;
        let rows: Vec<(String, f64, chrono::NaiveDateTime)> = stats
            .into_iter()
            .filter(|stat| stat.count >= config.min_count)
            .filter_map(|stat| stat.avg_score.map(|avg| (stat.company_id, avg, t)))
            .collect();

        if !rows.is_empty() {
            store.upsert_hour_scores(&rows)?;
            report.upserts += rows.len() as u64;
        }

        report.hours += 1;
        pending_hours += 1;

        if pending_hours >= commit_every {
            store.commit_batch()?;
            store.begin_batch()?;
            pending_hours = 0;
            if report.hours % 24 == 0 {
                info!(
                    "history rebuild progress: hours={}, upserts={}, now={}",
                    report.hours, report.upserts, t
                );
            }
        }

        t += bucket;
    }
    store.commit_batch()?;

    info!(
        "history rebuild done: window_hours={}, hours={}, upserts={}",
        config.window_hours, report.hours, report.upserts
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Company, RawSentimentEvent, SentimentHourScore};
    use chrono::{NaiveDate, NaiveDateTime};

    fn dt(d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn event(id: i64, news_id: i64, ts: NaiveDateTime, probs: (f64, f64, f64)) -> RawSentimentEvent {
        RawSentimentEvent {
            id,
            news_id,
            timestamp: ts,
            prob_pos: probs.0,
            prob_neu: probs.1,
            prob_neg: probs.2,
            score: None,
        }
    }

    fn store_with_company() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_company(&Company::new("A", "Alpha")).unwrap();
        store.insert_news(1, "A").unwrap();
        store
    }

    #[test]
    fn flat_rebuild_writes_expected_scores() {
        let store = store_with_company();
        store
            .insert_event(&event(1, 1, dt(2, 9, 0), (0.8, 0.1, 0.1)))
            .unwrap();
        store
            .insert_event(&event(2, 1, dt(2, 10, 0), (0.0, 1.0, 0.0)))
            .unwrap();

        let report = rebuild_event_scores(&store, &ScoreRebuildConfig::default()).unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.updated, 2);
        assert_eq!(report.batches, 1);

        let scores: Vec<Option<f64>> = store
            .raw_events()
            .unwrap()
            .into_iter()
            .map(|e| e.score)
            .collect();
        assert_eq!(scores, vec![Some(81.5), Some(50.0)]);
    }

    #[test]
    fn flat_rebuild_batches_split_and_flush() {
        let store = store_with_company();
        for id in 0..45 {
            store
                .insert_event(&event(id, 1, dt(2, 9, 0), (0.5, 0.3, 0.2)))
                .unwrap();
        }

        let config = ScoreRebuildConfig { batch_size: 20 };
        let report = rebuild_event_scores(&store, &config).unwrap();
        // 20 + 20 + 5
        assert_eq!(report.batches, 3);
        assert_eq!(report.updated, 45);
        assert_eq!(report.updated, report.total);
    }

    #[test]
    fn flat_rebuild_empty_table_is_noop() {
        let store = store_with_company();
        let report = rebuild_event_scores(&store, &ScoreRebuildConfig::default()).unwrap();
        assert_eq!(report.total, 0);
        assert_eq!(report.batches, 0);
    }

    #[test]
    fn windowed_rebuild_averages_per_hour() {
        let store = store_with_company();
        // two events in the 09:00 hour, one in the 11:00 hour
        store
            .insert_event(&event(1, 1, dt(2, 9, 5), (0.0, 0.0, 0.0)))
            .unwrap();
        store
            .insert_event(&event(2, 1, dt(2, 9, 45), (0.0, 0.0, 0.0)))
            .unwrap();
        store
            .insert_event(&event(3, 1, dt(2, 11, 30), (0.0, 0.0, 0.0)))
            .unwrap();
        store
            .connection()
            .execute("UPDATE sentiment_events SET score = id * 10.0", [])
            .unwrap();

        let report =
            rebuild_score_history(&store, &HistoryRebuildConfig::default()).unwrap();
        // hour grid 09:00..=11:00
        assert_eq!(report.hours, 3);
        assert_eq!(report.upserts, 2);

        let rows = store
            .hourly_sentiment("A", &dt(2, 9, 0), &dt(2, 12, 0))
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].hour, dt(2, 9, 0));
        assert_eq!(rows[0].value, Some(15.0)); // avg(10, 20)
        assert_eq!(rows[1].hour, dt(2, 11, 0));
        assert_eq!(rows[1].value, Some(30.0));
    }

    #[test]
    fn windowed_rebuild_skips_companies_below_min_count() {
        let store = store_with_company();
        store
            .insert_event(&event(1, 1, dt(2, 9, 5), (0.0, 0.0, 0.0)))
            .unwrap();
        store
            .connection()
            .execute("UPDATE sentiment_events SET score = 42.0", [])
            .unwrap();

        let config = HistoryRebuildConfig {
            min_count: 2,
            ..HistoryRebuildConfig::default()
        };
        let report = rebuild_score_history(&store, &config).unwrap();
        assert_eq!(report.hours, 1);
        // below the threshold: no row, not a zero
        assert_eq!(report.upserts, 0);
        let rows = store
            .hourly_sentiment("A", &dt(2, 9, 0), &dt(2, 10, 0))
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn windowed_rebuild_truncates_stale_history() {
        let store = store_with_company();
        store
            .insert_hour_score(&SentimentHourScore {
                company_id: "A".to_string(),
                hour: dt(1, 9, 0),
                score: 99.0,
            })
            .unwrap();
        store
            .insert_event(&event(1, 1, dt(2, 9, 5), (0.0, 0.0, 0.0)))
            .unwrap();
        store
            .connection()
            .execute("UPDATE sentiment_events SET score = 10.0", [])
            .unwrap();

        rebuild_score_history(&store, &HistoryRebuildConfig::default()).unwrap();

        // stale row from the day before is gone
        let stale = store
            .hourly_sentiment("A", &dt(1, 0, 0), &dt(2, 0, 0))
            .unwrap();
        assert!(stale.is_empty());
    }

    #[test]
    fn windowed_rebuild_wider_window_reaches_back() {
        let store = store_with_company();
        store
            .insert_event(&event(1, 1, dt(2, 9, 30), (0.0, 0.0, 0.0)))
            .unwrap();
        store
            .insert_event(&event(2, 1, dt(2, 10, 30), (0.0, 0.0, 0.0)))
            .unwrap();
        store
            .connection()
            .execute("UPDATE sentiment_events SET score = id * 10.0", [])
            .unwrap();

        let config = HistoryRebuildConfig {
            window_hours: 2,
            ..HistoryRebuildConfig::default()
        };
        rebuild_score_history(&store, &config).unwrap();

        let rows = store
            .hourly_sentiment("A", &dt(2, 9, 0), &dt(2, 11, 0))
            .unwrap();
        // tick 10:00 covers [09:00, 11:00) and averages both events
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, Some(10.0));
        assert_eq!(rows[1].value, Some(15.0));
    }

    #[test]
    fn windowed_rebuild_empty_events_is_noop() {
        let store = store_with_company();
        store
            .insert_hour_score(&SentimentHourScore {
                company_id: "A".to_string(),
                hour: dt(1, 9, 0),
                score: 99.0,
            })
            .unwrap();

        let report =
            rebuild_score_history(&store, &HistoryRebuildConfig::default()).unwrap();
        assert_eq!(report.hours, 0);
        // no events: nothing truncated, nothing written
        let rows = store
            .hourly_sentiment("A", &dt(1, 0, 0), &dt(2, 0, 0))
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
