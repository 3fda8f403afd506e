//! Rendering sink seam.
//!
//! Raster chart rendering lives outside this crate; the trend pipeline only
//! hands a fully-prepared `ChartSpec` (compressed coordinates, both y-series
//! and the tick marks) to a `RenderSink`. The bundled `JsonChartSink` writes
//! the specs as JSON artifacts so a run always produces inspectable output;
//! an image-producing sink can be slotted in without touching the pipeline.

use crate::axis::CompressedAxis;
use crate::model::AlignedSeries;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::warn;

/// Everything a sink needs to draw one price-vs-sentiment chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub company_id: String,
    pub company_name: String,
    pub title: String,
    /// Compressed x-coordinates, parallel to both y-series.
    pub coords: Vec<f64>,
    pub prices: Vec<f64>,
    pub sentiments: Vec<f64>,
    pub tick_positions: Vec<f64>,
    pub tick_labels: Vec<String>,
}

impl ChartSpec {
    /// Builds a chart spec from an aligned series and its compressed axis.
    pub fn new(
        company_id: impl Into<String>,
        company_name: impl Into<String>,
        series: &AlignedSeries,
        axis: CompressedAxis,
    ) -> Self {
        let company_id = company_id.into();
        let company_name = company_name.into();
        let title = format!(
            "{} ({}) - Price vs Sentiment (Trading Hours)",
            company_name, company_id
        );
        ChartSpec {
            company_id,
            company_name,
            title,
            coords: axis.coords,
            prices: series.prices.clone(),
            sentiments: series.sentiments.clone(),
            tick_positions: axis.tick_positions,
            tick_labels: axis.tick_labels,
        }
    }
}

/// Grid geometry for the combined artifact. Cells past `charts` are left
/// unused by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridLayout {
    pub rows: usize,
    pub cols: usize,
}

impl GridLayout {
    /// Two-column layout with as many rows as the chart count needs.
    pub fn for_charts(count: usize) -> Self {
        let cols = 2;
        GridLayout {
            rows: count.div_ceil(cols),
            cols,
        }
    }
}

/// Presentation preferences applied best-effort: a sink that cannot honor a
/// preference logs and carries on, never fails.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPrefs {
    /// Preferred font family for axis labels, if the sink draws text.
    pub font_family: Option<String>,
    /// Raster resolution for image-producing sinks.
    pub dpi: u32,
}

impl Default for RenderPrefs {
    fn default() -> Self {
        RenderPrefs {
            font_family: None,
            dpi: 150,
        }
    }
}

/// Errors raised by a rendering sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Filesystem failure writing the artifact.
    Io(String),
    /// Chart spec could not be serialized.
    Serialize(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Io(msg) => write!(f, "I/O error: {}", msg),
            RenderError::Serialize(msg) => write!(f, "serialization error: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {}

/// Sink accepting prepared chart specs and producing file artifacts.
pub trait RenderSink {
    /// File extension of the artifacts this sink produces (no dot).
    fn extension(&self) -> &'static str;

    /// Applies presentation preferences best-effort. Must never fail; a
    /// preference the sink cannot honor is logged and skipped.
    fn apply_prefs(&mut self, _prefs: &RenderPrefs) {}

    /// Renders one company chart to `out_path`.
    fn render_chart(&mut self, chart: &ChartSpec, out_path: &Path) -> Result<(), RenderError>;

    /// Renders several charts laid out on a grid, skipping unused cells.
    fn render_grid(
        &mut self,
        charts: &[ChartSpec],
        layout: GridLayout,
        out_path: &Path,
    ) -> Result<(), RenderError>;
}

#[derive(Serialize)]
struct GridDocument<'a> {
    layout: GridLayout,
    charts: &'a [ChartSpec],
}

/// Sink that serializes chart specs to pretty-printed JSON files.
#[derive(Debug, Default)]
pub struct JsonChartSink;

impl JsonChartSink {
    pub fn new() -> Self {
        JsonChartSink
    }

    fn write<T: Serialize>(&self, value: &T, out_path: &Path) -> Result<(), RenderError> {
        let file = File::create(out_path).map_err(|e| RenderError::Io(e.to_string()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), value)
            .map_err(|e| RenderError::Serialize(e.to_string()))
    }
}

impl RenderSink for JsonChartSink {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn apply_prefs(&mut self, prefs: &RenderPrefs) {
        if let Some(font) = &prefs.font_family {
            warn!("font preference {:?} not applicable to JSON artifacts", font);
        }
    }

    fn render_chart(&mut self, chart: &ChartSpec, out_path: &Path) -> Result<(), RenderError> {
        self.write(chart, out_path)
    }

    fn render_grid(
        &mut self,
        charts: &[ChartSpec],
        layout: GridLayout,
        out_path: &Path,
    ) -> Result<(), RenderError> {
        self.write(&GridDocument { layout, charts }, out_path)
    }
}

/// Test sink recording what was rendered instead of writing files.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub charts: Vec<(String, ChartSpec)>,
    pub grids: Vec<(String, GridLayout, usize)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        RecordingSink::default()
    }
}

impl RenderSink for RecordingSink {
    fn extension(&self) -> &'static str {
        "png"
    }

    fn render_chart(&mut self, chart: &ChartSpec, out_path: &Path) -> Result<(), RenderError> {
        self.charts
            .push((out_path.display().to_string(), chart.clone()));
        Ok(())
    }

    fn render_grid(
        &mut self,
        charts: &[ChartSpec],
        layout: GridLayout,
        out_path: &Path,
    ) -> Result<(), RenderError> {
        self.grids
            .push((out_path.display().to_string(), layout, charts.len()));
        Ok(())
    }
}
