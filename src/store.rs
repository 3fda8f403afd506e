//! SQLite-backed data source for price, news and sentiment tables.
//!
//! Owns the schema and every SQL operation the batch jobs need. Rows are
//! converted into typed records (see `model`) before they leave this module.
//! Each job holds one store (one connection) for its full duration; the
//! connection closes when the store is dropped, whether the job succeeded or
//! not.

use crate::hour::{self, HourParseError};
use crate::model::{Company, HourValueRow, PriceTick, RawSentimentEvent, SentimentHourScore};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::path::Path;

/// Errors raised by store operations.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Underlying SQL or connection failure.
    Sql(String),
    /// A stored timestamp matched none of the recognized encodings.
    Timestamp(HourParseError),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Sql(msg) => write!(f, "SQL error: {}", msg),
            StoreError::Timestamp(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Sql(err.to_string())
    }
}

impl From<HourParseError> for StoreError {
    fn from(err: HourParseError) -> Self {
        StoreError::Timestamp(err)
    }
}

/// Per-company aggregate over one sliding window of raw sentiment events.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyWindowStat {
    pub company_id: String,
    /// `None` when the window holds events but none of them carry a score.
    pub avg_score: Option<f64>,
    pub count: i64,
}

/// SQLite-backed store for all four logical tables.
///
/// Schema is created automatically on open. Timestamps are stored as TEXT in
/// the canonical `YYYY-MM-DD HH:MM:SS` form, which compares correctly both
/// lexicographically and through SQLite's datetime functions.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a file-based database.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established or the
    /// schema cannot be created.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        let store = SqliteStore { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Opens an in-memory database. Useful for testing.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS companies (
                id   TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT ''
            );
            CREATE TABLE IF NOT EXISTS price_ticks (
                company_id  TEXT NOT NULL,
                date        TEXT NOT NULL,
                close_price REAL,
                PRIMARY KEY (company_id, date)
            );
            CREATE INDEX IF NOT EXISTS idx_price_ticks_date ON price_ticks(date);
            CREATE TABLE IF NOT EXISTS sentiment_scores (
                company_id TEXT NOT NULL,
                date       TEXT NOT NULL,
                score      REAL,
                PRIMARY KEY (company_id, date)
            );
            CREATE TABLE IF NOT EXISTS news (
                id         INTEGER PRIMARY KEY,
                company_id TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS sentiment_events (
                id       INTEGER PRIMARY KEY,
                news_id  INTEGER NOT NULL,
                date     TEXT NOT NULL,
                prob_pos REAL,
                prob_neu REAL,
                prob_neg REAL,
                score    REAL
            );
            CREATE INDEX IF NOT EXISTS idx_sentiment_events_date ON sentiment_events(date);",
        )?;
        Ok(())
    }

    /// Returns a reference to the underlying SQLite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Fetches the company reference table, ordered by id.
    pub fn companies(&self) -> Result<Vec<Company>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM companies ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Company {
                id: row.get(0)?,
                name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    /// Resolves the period where both price and sentiment data exist for a
    /// company: `[max(price_min, sentiment_min), min(price_max, sentiment_max)]`.
    ///
    /// Returns `Ok(None)` when either table has no rows for the company or
    /// the overlap is empty (`start >= end`). That is the normal "no data"
    /// outcome, not an error.
    pub fn common_range(
        &self,
        company_id: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT
                (SELECT MIN(date) FROM price_ticks WHERE company_id = ?1),
                (SELECT MAX(date) FROM price_ticks WHERE company_id = ?1),
                (SELECT MIN(date) FROM sentiment_scores WHERE company_id = ?1),
                (SELECT MAX(date) FROM sentiment_scores WHERE company_id = ?1)",
        )?;
        let bounds: (
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
        ) = stmt.query_row(params![company_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?;

        let (p_min, p_max, s_min, s_max) = match bounds {
            (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
            _ => return Ok(None),
        };

        let p_min = hour::parse_timestamp(&p_min)?;
        let p_max = hour::parse_timestamp(&p_max)?;
        let s_min = hour::parse_timestamp(&s_min)?;
        let s_max = hour::parse_timestamp(&s_max)?;

        let start = p_min.max(s_min);
        let end = p_max.min(s_max);
        if start >= end {
            return Ok(None);
        }
        Ok(Some((start, end)))
    }

    /// Samples the irregular price ticks once per hour: for each hour bucket
    /// in `[start, end)` the last tick within that bucket supplies the close
    /// price. Hours with no tick are simply absent.
    pub fn hourly_price_close(
        &self,
        company_id: &str,
        start: &NaiveDateTime,
        end: &NaiveDateTime,
    ) -> Result<Vec<HourValueRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT t.hour_bucket, p.close_price
             FROM (
                 SELECT
                     strftime('%Y-%m-%d %H:00:00', date) AS hour_bucket,
                     MAX(date) AS max_date
                 FROM price_ticks
                 WHERE company_id = ?1
                   AND date >= ?2 AND date < ?3
                 GROUP BY hour_bucket
             ) t
             JOIN price_ticks p
               ON p.company_id = ?1
              AND p.date = t.max_date
             ORDER BY t.hour_bucket ASC",
        )?;
        let raw: Vec<(String, Option<f64>)> = stmt
            .query_map(
                params![
                    company_id,
                    hour::format_timestamp(start),
                    hour::format_timestamp(end)
                ],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Self::into_hour_rows(raw)
    }

    /// Fetches the already-hourly sentiment scores in `[start, end)`.
    pub fn hourly_sentiment(
        &self,
        company_id: &str,
        start: &NaiveDateTime,
        end: &NaiveDateTime,
    ) -> Result<Vec<HourValueRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT date, score
             FROM sentiment_scores
             WHERE company_id = ?1
               AND date >= ?2 AND date < ?3
             ORDER BY date ASC",
        )?;
        let raw: Vec<(String, Option<f64>)> = stmt
            .query_map(
                params![
                    company_id,
                    hour::format_timestamp(start),
                    hour::format_timestamp(end)
                ],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Self::into_hour_rows(raw)
    }

    fn into_hour_rows(raw: Vec<(String, Option<f64>)>) -> Result<Vec<HourValueRow>, StoreError> {
        raw.into_iter()
            .map(|(stamp, value)| {
                Ok(HourValueRow {
                    hour: hour::parse_hour(&stamp)?,
                    value,
                })
            })
            .collect()
    }

    /// Scans the full raw sentiment event table. Null probabilities are read
    /// as 0.0 at this boundary.
    pub fn raw_events(&self) -> Result<Vec<RawSentimentEvent>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, news_id, date, prob_pos, prob_neu, prob_neg, score
             FROM sentiment_events
             ORDER BY id",
        )?;
        let raw: Vec<(i64, i64, String, Option<f64>, Option<f64>, Option<f64>, Option<f64>)> =
            stmt.query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(id, news_id, stamp, pos, neu, neg, score)| {
                Ok(RawSentimentEvent {
                    id,
                    news_id,
                    timestamp: hour::parse_timestamp(&stamp)?,
                    prob_pos: pos.unwrap_or(0.0),
                    prob_neu: neu.unwrap_or(0.0),
                    prob_neg: neg.unwrap_or(0.0),
                    score,
                })
            })
            .collect()
    }

    /// Global min/max timestamp across all raw sentiment events, or `None`
    /// when the table is empty.
    pub fn event_range(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT MIN(date), MAX(date) FROM sentiment_events")?;
        let bounds: (Option<String>, Option<String>) =
            stmt.query_row([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        match bounds {
            (Some(min), Some(max)) => Ok(Some((
                hour::parse_timestamp(&min)?,
                hour::parse_timestamp(&max)?,
            ))),
            _ => Ok(None),
        }
    }

    /// Applies one batch of `(score, event_id)` updates under a single
    /// transaction; the batch is durable once this returns.
    pub fn update_event_scores(&self, batch: &[(f64, i64)]) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt =
                tx.prepare("UPDATE sentiment_events SET score = ?1 WHERE id = ?2")?;
            for (score, id) in batch {
                stmt.execute(params![score, id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Deletes every row of the hourly score history. Runs in autocommit
    /// mode, so the truncation is durable immediately.
    pub fn clear_score_history(&self) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM sentiment_scores", [])?;
        Ok(())
    }

    /// Per-company AVG(score) and COUNT(*) over raw events in
    /// `[start, end)`, joined through each event's article to its company.
    pub fn window_company_stats(
        &self,
        start: &NaiveDateTime,
        end: &NaiveDateTime,
    ) -> Result<Vec<CompanyWindowStat>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, AVG(e.score), COUNT(*)
             FROM sentiment_events e
             JOIN news n ON e.news_id = n.id
             JOIN companies c ON n.company_id = c.id
             WHERE e.date >= ?1 AND e.date < ?2
             GROUP BY c.id",
        )?;
        let rows = stmt.query_map(
            params![hour::format_timestamp(start), hour::format_timestamp(end)],
            |row| {
                Ok(CompanyWindowStat {
                    company_id: row.get(0)?,
                    avg_score: row.get(1)?,
                    count: row.get(2)?,
                })
            },
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    /// Upserts `(company_id, score, hour)` rows into the hourly score
    /// history, overwriting the score on a `(company_id, date)` conflict.
    ///
    /// Runs inside whatever transaction is currently open, so callers
    /// control durability via `begin_batch`/`commit_batch`.
    pub fn upsert_hour_scores(
        &self,
        rows: &[(String, f64, NaiveDateTime)],
    ) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO sentiment_scores (company_id, score, date)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(company_id, date) DO UPDATE SET score = excluded.score",
        )?;
        for (company_id, score, hour_ts) in rows {
            stmt.execute(params![company_id, score, hour::format_timestamp(hour_ts)])?;
        }
        Ok(())
    }

    /// Opens an explicit transaction for commit batching.
    pub fn begin_batch(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    /// Commits the currently open batch transaction.
    pub fn commit_batch(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Inserts a company reference row.
    pub fn insert_company(&self, company: &Company) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO companies (id, name) VALUES (?1, ?2)",
            params![company.id, company.name],
        )?;
        Ok(())
    }

    /// Inserts one price tick.
    pub fn insert_price_tick(&self, tick: &PriceTick) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO price_ticks (company_id, date, close_price) VALUES (?1, ?2, ?3)",
            params![
                tick.company_id,
                hour::format_timestamp(&tick.timestamp),
                tick.close_price
            ],
        )?;
        Ok(())
    }

    /// Inserts one article row relating a news id to a company.
    pub fn insert_news(&self, news_id: i64, company_id: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO news (id, company_id) VALUES (?1, ?2)",
            params![news_id, company_id],
        )?;
        Ok(())
    }

    /// Inserts one raw sentiment event.
    pub fn insert_event(&self, event: &RawSentimentEvent) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO sentiment_events (id, news_id, date, prob_pos, prob_neu, prob_neg, score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.id,
                event.news_id,
                hour::format_timestamp(&event.timestamp),
                event.prob_pos,
                event.prob_neu,
                event.prob_neg,
                event.score,
            ],
        )?;
        Ok(())
    }

    /// Inserts one hourly sentiment score row directly (primarily for
    /// seeding; the windowed rebuild owns this table in production).
    pub fn insert_hour_score(&self, row: &SentimentHourScore) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO sentiment_scores (company_id, date, score) VALUES (?1, ?2, ?3)",
            params![
                row.company_id,
                hour::format_timestamp(&row.hour),
                row.score
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn seeded_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_company(&Company::new("A", "Alpha Corp"))
            .unwrap();
        store.insert_company(&Company::new("B", "")).unwrap();
        store
    }

    fn insert_tick(store: &SqliteStore, id: &str, ts: NaiveDateTime, price: f64) {
        store
            .insert_price_tick(&PriceTick {
                company_id: id.to_string(),
                timestamp: ts,
                close_price: price,
            })
            .unwrap();
    }

    fn insert_score(store: &SqliteStore, id: &str, ts: NaiveDateTime, score: f64) {
        store
            .insert_hour_score(&SentimentHourScore {
                company_id: id.to_string(),
                hour: ts,
                score,
            })
            .unwrap();
    }

    #[test]
    fn schema_is_created_on_open() {
        let store = SqliteStore::open_in_memory().unwrap();
        for table in [
            "companies",
            "price_ticks",
            "sentiment_scores",
            "news",
            "sentiment_events",
        ] {
            let mut stmt = store
                .connection()
                .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")
                .unwrap();
            assert!(stmt.exists([table]).unwrap(), "missing table {}", table);
        }
    }

    #[test]
    fn companies_ordered_by_id() {
        let store = seeded_store();
        let companies = store.companies().unwrap();
        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0].id, "A");
        assert_eq!(companies[0].name, "Alpha Corp");
        assert_eq!(companies[1].display_name(), "B");
    }

    #[test]
    fn common_range_is_overlap_of_both_tables() {
        let store = seeded_store();
        insert_tick(&store, "A", dt(2, 9, 5), 100.0);
        insert_tick(&store, "A", dt(4, 15, 30), 104.0);
        insert_score(&store, "A", dt(3, 9, 0), 55.0);
        insert_score(&store, "A", dt(5, 16, 0), 60.0);

        let (start, end) = store.common_range("A").unwrap().unwrap();
        assert_eq!(start, dt(3, 9, 0));
        assert_eq!(end, dt(4, 15, 30));
    }

    #[test]
    fn common_range_empty_when_one_side_missing() {
        let store = seeded_store();
        insert_tick(&store, "A", dt(2, 9, 5), 100.0);
        assert_eq!(store.common_range("A").unwrap(), None);
        assert_eq!(store.common_range("B").unwrap(), None);
    }

    #[test]
    fn common_range_empty_when_start_not_before_end() {
        let store = seeded_store();
        // Price ends before sentiment begins
        insert_tick(&store, "A", dt(2, 9, 0), 100.0);
        insert_tick(&store, "A", dt(2, 16, 0), 101.0);
        insert_score(&store, "A", dt(3, 9, 0), 50.0);
        insert_score(&store, "A", dt(3, 16, 0), 51.0);
        assert_eq!(store.common_range("A").unwrap(), None);
    }

    #[test]
    fn hourly_price_takes_last_tick_in_bucket() {
        let store = seeded_store();
        insert_tick(&store, "A", dt(2, 9, 5), 100.0);
        insert_tick(&store, "A", dt(2, 9, 55), 101.0);
        insert_tick(&store, "A", dt(2, 11, 10), 103.0);

        let rows = store
            .hourly_price_close("A", &dt(2, 9, 0), &dt(2, 16, 0))
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].hour, dt(2, 9, 0));
        assert_eq!(rows[0].value, Some(101.0));
        // 10:00 bucket absent, not null-filled
        assert_eq!(rows[1].hour, dt(2, 11, 0));
        assert_eq!(rows[1].value, Some(103.0));
    }

    #[test]
    fn hourly_price_range_is_half_open() {
        let store = seeded_store();
        insert_tick(&store, "A", dt(2, 9, 0), 100.0);
        insert_tick(&store, "A", dt(2, 16, 0), 108.0);

        let rows = store
            .hourly_price_close("A", &dt(2, 9, 0), &dt(2, 16, 0))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].hour, dt(2, 9, 0));
    }

    #[test]
    fn window_stats_join_events_to_companies() {
        let store = seeded_store();
        store.insert_news(1, "A").unwrap();
        store.insert_news(2, "B").unwrap();
        for (id, news_id, minute, score) in
            [(1, 1, 5, 80.0), (2, 1, 30, 60.0), (3, 2, 45, 40.0)]
        {
            store
                .insert_event(&RawSentimentEvent {
                    id,
                    news_id,
                    timestamp: dt(2, 9, minute),
                    prob_pos: 0.5,
                    prob_neu: 0.3,
                    prob_neg: 0.2,
                    score: Some(score),
                })
                .unwrap();
        }

        let mut stats = store
            .window_company_stats(&dt(2, 9, 0), &dt(2, 10, 0))
            .unwrap();
        stats.sort_by(|a, b| a.company_id.cmp(&b.company_id));
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].company_id, "A");
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[0].avg_score, Some(70.0));
        assert_eq!(stats[1].company_id, "B");
        assert_eq!(stats[1].count, 1);
    }

    #[test]
    fn upsert_overwrites_on_conflict() {
        let store = seeded_store();
        store.begin_batch().unwrap();
        store
            .upsert_hour_scores(&[("A".to_string(), 50.0, dt(2, 9, 0))])
            .unwrap();
        store
            .upsert_hour_scores(&[("A".to_string(), 75.0, dt(2, 9, 0))])
            .unwrap();
        store.commit_batch().unwrap();

        let rows = store
            .hourly_sentiment("A", &dt(2, 9, 0), &dt(2, 10, 0))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, Some(75.0));
    }

    #[test]
    fn raw_events_read_null_probabilities_as_zero() {
        let store = seeded_store();
        store.insert_news(1, "A").unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO sentiment_events (id, news_id, date) VALUES (1, 1, '2024-01-02 09:00:00')",
                [],
            )
            .unwrap();

        let events = store.raw_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].prob_pos, 0.0);
        assert_eq!(events[0].prob_neu, 0.0);
        assert_eq!(events[0].prob_neg, 0.0);
        assert_eq!(events[0].score, None);
    }

    #[test]
    fn event_range_none_on_empty_table() {
        let store = seeded_store();
        assert_eq!(store.event_range().unwrap(), None);
    }

    #[test]
    fn malformed_stored_timestamp_is_fatal() {
        let store = seeded_store();
        insert_tick(&store, "A", dt(2, 9, 0), 100.0);
        insert_tick(&store, "A", dt(4, 16, 0), 104.0);
        store
            .connection()
            .execute(
                "INSERT INTO sentiment_scores (company_id, date, score) VALUES ('A', 'bogus', 1.0)",
                [],
            )
            .unwrap();
        let result = store.common_range("A");
        assert!(matches!(result, Err(StoreError::Timestamp(_))));
    }
}
