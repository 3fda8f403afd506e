//! Trend alignment: reconciles price and sentiment onto a common hourly grid.
//!
//! Price ticks and sentiment scores are sampled independently, so the two
//! series rarely share raw timestamps. Both sides are bucketed to the hour
//! and only hours present on both sides survive into the aligned output.

use crate::hour;
use crate::model::{AlignedSeries, HourValueRow};
use crate::store::{SqliteStore, StoreError};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::info;

/// Produces the aligned price/sentiment series for one company.
///
/// Resolves the overlap period where both tables have data, widens it to
/// whole hour buckets, fetches the hourly rows from each side and intersects
/// them on exact hour keys. An empty series is the normal outcome when there
/// is no overlap or no common hour; it is reported informationally, never as
/// an error.
///
/// # Errors
/// Propagates store failures and malformed stored timestamps.
pub fn align_company(store: &SqliteStore, company_id: &str) -> Result<AlignedSeries, StoreError> {
    let (start, end) = match store.common_range(company_id)? {
        Some(range) => range,
        None => {
            info!("company {}: no overlapping price/sentiment period", company_id);
            return Ok(AlignedSeries::empty());
        }
    };

    // Widen to full hour buckets so rows sitting on either boundary hour
    // are not lost to the half-open fetch.
    let start = hour::floor_to_hour(start);
    let end = hour::floor_to_hour(end) + Duration::hours(1);

    let price_rows = store.hourly_price_close(company_id, &start, &end)?;
    let sentiment_rows = store.hourly_sentiment(company_id, &start, &end)?;

    Ok(merge_by_hour(&price_rows, &sentiment_rows))
}

/// Intersects hourly price and sentiment rows on exact hour keys.
///
/// Rows with a null value are dropped from their side before intersection.
/// Output vectors are index-aligned and sorted ascending by hour; hours
/// present on only one side are absent, never null-filled.
pub fn merge_by_hour(price_rows: &[HourValueRow], sentiment_rows: &[HourValueRow]) -> AlignedSeries {
    let price_map = to_hour_map(price_rows);
    let sentiment_map = to_hour_map(sentiment_rows);

    let mut series = AlignedSeries::empty();
    for (hour_ts, price) in &price_map {
        if let Some(sentiment) = sentiment_map.get(hour_ts) {
            series.keys.push(hour::hour_key(*hour_ts));
            series.hours.push(*hour_ts);
            series.prices.push(*price);
            series.sentiments.push(*sentiment);
        }
    }
    series
}

fn to_hour_map(rows: &[HourValueRow]) -> BTreeMap<NaiveDateTime, f64> {
    rows.iter()
        .filter_map(|row| {
            row.value
                .map(|value| (hour::floor_to_hour(row.hour), value))
        })
        .collect()
}
