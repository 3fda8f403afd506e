pub mod align;
pub mod axis;
pub mod hour;
pub mod model;
pub mod rebuild;
pub mod render;
pub mod score;
pub mod store;
pub mod trend;


pub use align::{align_company, merge_by_hour};
pub use axis::CompressedAxis;
pub use hour::{floor_to_hour, hour_key, parse_hour, parse_timestamp, HourParseError};
pub use model::{
    AlignedSeries, Company, HourValueRow, PriceTick, RawSentimentEvent, SentimentHourScore,
};
pub use rebuild::{
    rebuild_event_scores, rebuild_score_history, HistoryRebuildConfig, HistoryRebuildReport,
    ScoreRebuildConfig, ScoreRebuildReport,
};
pub use render::{
    ChartSpec, GridLayout, JsonChartSink, RecordingSink, RenderError, RenderPrefs, RenderSink,
};
pub use score::composite_score;
pub use store::{CompanyWindowStat, SqliteStore, StoreError};
pub use trend::{run_trend_report, TrendConfig, TrendError, TrendReport};
