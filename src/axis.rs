//! Trading-hour axis compression.
//!
//! Only trading hours (09:00-16:00) exist in the aligned series, so plotting
//! against wall-clock time would leave large gaps overnight and across
//! weekends. Each calendar date is packed into a fixed-width block of slots
//! instead, with consecutive days back-to-back: coordinate =
//! day_index * day_width + (hour - 9).

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use std::collections::HashMap;

/// First trading hour of the day; maps to slot 0 within a day block.
pub const TRADING_DAY_START_HOUR: u32 = 9;

/// Day-block width for the daily-tick mode (hours 09-15).
pub const DAILY_SLOTS: i64 = 7;

/// Day-block width for the hourly-tick mode (hours 09-16 inclusive).
pub const HOURLY_SLOTS: i64 = 8;

/// Compressed x-axis: coordinates for the input timestamps plus tick marks
/// for rendering. All three vectors are empty for empty input.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CompressedAxis {
    /// One coordinate per input timestamp, parallel to the input.
    pub coords: Vec<f64>,
    pub tick_positions: Vec<f64>,
    pub tick_labels: Vec<String>,
}

impl CompressedAxis {
    /// 7-slot-per-day compression with one tick per distinct date, placed at
    /// the start of the day block and labeled `MM-DD`.
    pub fn daily(hours: &[NaiveDateTime]) -> Self {
        let (dates, coords) = compress(hours, DAILY_SLOTS);

        let mut axis = CompressedAxis {
            coords,
            ..CompressedAxis::default()
        };
        for (day_idx, date) in dates.iter().enumerate() {
            axis.tick_positions.push((day_idx as i64 * DAILY_SLOTS) as f64);
            axis.tick_labels.push(date.format("%m-%d").to_string());
        }
        axis
    }

    /// 8-slot-per-day compression with one tick per trading hour: exactly 8
    /// ticks per distinct date at positions day_index*8+0 ... day_index*8+7.
    /// The 09:00 tick carries the date (`MM-DD\n09`); the rest are bare
    /// zero-padded hours.
    pub fn hourly_ticks(hours: &[NaiveDateTime]) -> Self {
        let (dates, coords) = compress(hours, HOURLY_SLOTS);

        let mut axis = CompressedAxis {
            coords,
            ..CompressedAxis::default()
        };
        for (day_idx, date) in dates.iter().enumerate() {
            for h in TRADING_DAY_START_HOUR..=16 {
                let slot = h as i64 - TRADING_DAY_START_HOUR as i64;
                axis.tick_positions
                    .push((day_idx as i64 * HOURLY_SLOTS + slot) as f64);
                if h == TRADING_DAY_START_HOUR {
                    axis.tick_labels
                        .push(format!("{}\n{:02}", date.format("%m-%d"), h));
                } else {
                    axis.tick_labels.push(format!("{:02}", h));
                }
            }
        }
        axis
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}

/// Assigns each distinct calendar date a zero-based index in order of first
/// appearance and computes one coordinate per timestamp. Hours outside 9-16
/// are not expected, but still compute through the same formula without
/// clamping.
fn compress(hours: &[NaiveDateTime], day_width: i64) -> (Vec<NaiveDate>, Vec<f64>) {
    let mut dates: Vec<NaiveDate> = Vec::new();
    let mut date_index: HashMap<NaiveDate, usize> = HashMap::new();
    for dt in hours {
        let date = dt.date();
        if !date_index.contains_key(&date) {
            date_index.insert(date, dates.len());
            dates.push(date);
        }
    }

    let coords = hours
        .iter()
        .map(|dt| {
            let day_idx = date_index[&dt.date()] as i64;
            let hour_offset = dt.hour() as i64 - TRADING_DAY_START_HOUR as i64;
            (day_idx * day_width + hour_offset) as f64
        })
        .collect();

    (dates, coords)
}
