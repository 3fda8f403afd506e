//! Typed records for the rows crossing the data-source boundary.
//!
//! Rows are converted into these records as soon as they leave the store so
//! that the alignment and rebuild logic never handles loosely-typed key/value
//! rows.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Static company reference row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
}

impl Company {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Company {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Display name for chart titles; falls back to the id when the
    /// reference table carries no name.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// A single intraday price observation; irregular sampling within trading
/// hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub company_id: String,
    pub timestamp: NaiveDateTime,
    pub close_price: f64,
}

/// One derived sentiment score per company per hour bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentHourScore {
    pub company_id: String,
    /// Hour-truncated timestamp keying the row.
    pub hour: NaiveDateTime,
    pub score: f64,
}

/// One scored news article with its raw classifier probabilities.
///
/// The probabilities sum to roughly 1 and each lie in `[0, 1]`. Null
/// probabilities in the store are read as 0.0 at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSentimentEvent {
    pub id: i64,
    pub news_id: i64,
    pub timestamp: NaiveDateTime,
    pub prob_pos: f64,
    pub prob_neu: f64,
    pub prob_neg: f64,
    /// Derived composite score; absent until the flat rebuild has run.
    pub score: Option<f64>,
}

/// One hour-bucketed observation from either the price or the sentiment
/// side, before the two sides are merged.
///
/// `value` is `None` when the underlying column was null; such rows are
/// dropped before intersection.
#[derive(Debug, Clone, PartialEq)]
pub struct HourValueRow {
    pub hour: NaiveDateTime,
    pub value: Option<f64>,
}

/// Price and sentiment reconciled onto a common hourly grid.
///
/// All four vectors are index-aligned. Timestamps are strictly increasing
/// and hold exactly the hours present on both sides; missing hours are
/// absent, never null-filled.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AlignedSeries {
    /// Canonical hour-key strings, parallel to `hours`.
    pub keys: Vec<String>,
    pub hours: Vec<NaiveDateTime>,
    pub prices: Vec<f64>,
    pub sentiments: Vec<f64>,
}

impl AlignedSeries {
    /// An aligned series with no common hours, the normal "no data" case.
    pub fn empty() -> Self {
        AlignedSeries::default()
    }

    pub fn len(&self) -> usize {
        self.hours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }
}
