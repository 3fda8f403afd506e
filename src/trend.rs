//! Trend pipeline: align each company, compress the axis, hand charts to
//! the rendering sink.
//!
//! Companies are processed one at a time in input order. A company with no
//! common price/sentiment hours is skipped with a log line and leaves no
//! per-company artifact and no cell in the combined grid.

use crate::align::align_company;
use crate::axis::CompressedAxis;
use crate::render::{ChartSpec, GridLayout, RenderError, RenderPrefs, RenderSink};
use crate::store::{SqliteStore, StoreError};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

/// Configuration for one trend-report run.
#[derive(Debug, Clone)]
pub struct TrendConfig {
    /// Directory receiving the artifacts; created if absent.
    pub output_dir: PathBuf,
    /// Companies to process, in order. Empty means every company in the
    /// reference table.
    pub companies: Vec<String>,
    pub prefs: RenderPrefs,
}

impl Default for TrendConfig {
    fn default() -> Self {
        TrendConfig {
            output_dir: PathBuf::from("trend_out"),
            companies: Vec::new(),
            prefs: RenderPrefs::default(),
        }
    }
}

/// Summary of a trend-report run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendReport {
    /// Companies with a per-company chart artifact.
    pub rendered: usize,
    /// Companies skipped for lack of common hours.
    pub skipped: usize,
    /// Whether the combined grid artifact was produced.
    pub combined: bool,
}

/// Errors raised by the trend pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TrendError {
    Store(StoreError),
    Render(RenderError),
    /// Output directory could not be created.
    OutputDir(String),
}

impl std::fmt::Display for TrendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendError::Store(err) => write!(f, "store error: {}", err),
            TrendError::Render(err) => write!(f, "render error: {}", err),
            TrendError::OutputDir(msg) => write!(f, "output directory error: {}", msg),
        }
    }
}

impl std::error::Error for TrendError {}

impl From<StoreError> for TrendError {
    fn from(err: StoreError) -> Self {
        TrendError::Store(err)
    }
}

impl From<RenderError> for TrendError {
    fn from(err: RenderError) -> Self {
        TrendError::Render(err)
    }
}

/// Runs the full trend pipeline: one chart per company with data, plus one
/// combined grid over the non-empty companies.
///
/// # Errors
/// Store, render and filesystem failures abort the run; artifacts already
/// written stay on disk.
pub fn run_trend_report(
    store: &SqliteStore,
    sink: &mut dyn RenderSink,
    config: &TrendConfig,
) -> Result<TrendReport, TrendError> {
    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| TrendError::OutputDir(e.to_string()))?;

    sink.apply_prefs(&config.prefs);

    let reference = store.companies()?;
    let names: HashMap<&str, &str> = reference
        .iter()
        .map(|c| (c.id.as_str(), c.display_name()))
        .collect();
    let ids: Vec<String> = if config.companies.is_empty() {
        reference.iter().map(|c| c.id.clone()).collect()
    } else {
        config.companies.clone()
    };

    let mut report = TrendReport {
        rendered: 0,
        skipped: 0,
        combined: false,
    };
    let mut charts: Vec<ChartSpec> = Vec::new();

    for id in &ids {
        let name = names.get(id.as_str()).copied().unwrap_or(id.as_str());
        let series = align_company(store, id)?;
        if series.is_empty() {
            info!("skip {} ({}): no common trading hours", id, name);
            report.skipped += 1;
            continue;
        }

        let axis = CompressedAxis::hourly_ticks(&series.hours);
        let chart = ChartSpec::new(id.clone(), name, &series, axis);
        let out_path = config
            .output_dir
            .join(format!("{}.{}", id, sink.extension()));
        sink.render_chart(&chart, &out_path)?;
        info!("saved {}", out_path.display());
        report.rendered += 1;
        charts.push(chart);
    }

    if charts.is_empty() {
        info!("combined chart skipped: no company has data");
    } else {
        let layout = GridLayout::for_charts(charts.len());
        let out_path = config
            .output_dir
            .join(format!("combined.{}", sink.extension()));
        sink.render_grid(&charts, layout, &out_path)?;
        info!("saved {}", out_path.display());
        report.combined = true;
    }

    Ok(report)
}
