//! Core data model of the extraction engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::TimeWindow;

/// Which strategy the caller wants, or which one actually produced data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Try the graph protocol first, fall back to rendered tables.
    Auto,
    /// Graph protocol only; no fallback.
    Graph,
    /// Rendered tables only; statistics without a time series.
    Table,
}

impl Default for ExtractionMethod {
    fn default() -> Self {
        ExtractionMethod::Auto
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMethod::Auto => write!(f, "auto"),
            ExtractionMethod::Graph => write!(f, "graph"),
            ExtractionMethod::Table => write!(f, "table"),
        }
    }
}

/// The time range a graph covers: epoch seconds plus a sampling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRange {
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

/// Parameters of the internal rendering call, recovered from page scripts.
///
/// Immutable once extracted; scoped to a single extraction attempt. The
/// `recipe` and `render_config` are kept as raw JSON values — the engine
/// replays them verbatim and never interprets their contents.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphParameters {
    pub recipe: serde_json::Value,
    pub data_range: DataRange,
    pub render_config: serde_json::Value,
    pub display_id: String,
}

/// A single raw series sample: array index plus an optional value.
/// `None` is a gap in the underlying storage — data, not noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub index: usize,
    pub value: Option<f64>,
}

/// A sparse `(position, display text)` pair on the rendered time axis.
/// Used only to validate reconstructed timestamps, never as their source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeAxisLabel {
    pub position: usize,
    pub text: String,
}

/// A point value in the final result. The graph path only ever emits
/// numbers; `Text` exists for callers that feed non-numeric readings
/// through the same shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PointValue {
    Number(f64),
    Text(String),
}

impl PointValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PointValue::Number(n) => Some(*n),
            PointValue::Text(_) => None,
        }
    }
}

impl From<f64> for PointValue {
    fn from(v: f64) -> Self {
        PointValue::Number(v)
    }
}

/// A fully reconstructed sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalDataPoint {
    pub timestamp: DateTime<Utc>,
    pub value: PointValue,
    pub metric_name: String,
    pub unit: Option<String>,
}

/// Provenance attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultMetadata {
    /// Where the data came from (the scraped dashboard page URL).
    pub source: String,
    pub time_range: TimeWindow,
    /// Strategy that actually produced the data. `Table` explicitly
    /// signals degraded data: statistics only, no time series.
    pub extraction_method: ExtractionMethod,
}

/// The consolidated result returned to the caller.
///
/// `data_points` is time-ordered with strictly increasing timestamps and
/// no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalDataResult {
    pub data_points: Vec<HistoricalDataPoint>,
    pub summary_stats: BTreeMap<String, f64>,
    pub metadata: ResultMetadata,
    /// Duplicate of `metadata.extraction_method`, for callers that strip
    /// metadata before handing results on.
    pub source: ExtractionMethod,
}
