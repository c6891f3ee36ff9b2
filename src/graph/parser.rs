//! Parse the rendering endpoint's response into points and statistics.
//!
//! The endpoint returns a rendering-ready script document, not data: the
//! numeric payload is embedded as the first argument of a `drawChart(…)`
//! call. Locating it reuses the same tolerant call-extraction technique
//! as the parameter extractor, one protocol layer deeper.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::ExtractError;
use crate::extract::jslit;
use crate::graph::client::{RawGraphResponse, CHART_CALL};
use crate::graph::timeline::Timeline;
use crate::htmlutil;
use crate::model::{
    GraphParameters, HistoricalDataPoint, PointValue, SeriesPoint, TimeAxisLabel,
};

/// One series as it appears in the payload.
#[derive(Debug, Clone)]
struct RawSeries {
    name: String,
    unit: Option<String>,
    points: Vec<SeriesPoint>,
    scalars: BTreeMap<String, f64>,
}

pub struct GraphResponseParser;

impl GraphResponseParser {
    /// Full parse: locate the payload, pick the series for `target`,
    /// reconstruct and cross-validate timestamps, drop gaps, filter
    /// implausible values, and return the points plus summary scalars.
    pub fn parse(
        raw: &RawGraphResponse,
        params: &GraphParameters,
        target: &str,
    ) -> Result<(Vec<HistoricalDataPoint>, BTreeMap<String, f64>), ExtractError> {
        let payload = locate_payload(&raw.body, raw.status)?;
        let series = select_series(&payload, target, raw.status)?;
        let labels = read_axis_labels(&payload);

        let timeline = Timeline::from_range(&params.data_range)?;
        timeline.cross_validate(&labels)?;

        let points = materialize_points(&series, &timeline)?;
        let scalars = consistent_scalars(series.scalars, &points);

        if points.is_empty() && scalars.is_empty() {
            return Err(ExtractError::Protocol {
                status: Some(raw.status),
                snippet: "payload contained no usable points or scalars".to_string(),
            });
        }
        Ok((points, scalars))
    }
}

/// Locate the first parseable chart payload in the response body.
fn locate_payload(body: &str, status: u16) -> Result<Value, ExtractError> {
    let needle = format!("{CHART_CALL}(");
    let mut offset = 0usize;
    while let Some(pos) = body[offset..].find(&needle) {
        let after = offset + pos + needle.len();
        if let Some((args, _)) = jslit::split_call_args(&body[after..]) {
            if let Some(first) = args.first() {
                if let Some(value) = jslit::parse(first) {
                    if value.is_object() {
                        return Ok(value);
                    }
                }
            }
        }
        offset = after;
    }
    Err(ExtractError::Protocol {
        status: Some(status),
        snippet: "no parseable chart payload in response".to_string(),
    })
}

/// Pick the series that feeds the result: the one whose name matches the
/// requested target, else the first. Only one series may feed the result —
/// mixing series would break both the strictly-increasing-timestamp and
/// the stat-bound invariants.
fn select_series(payload: &Value, target: &str, status: u16) -> Result<RawSeries, ExtractError> {
    let entries = payload
        .get("series")
        .and_then(Value::as_array)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ExtractError::Protocol {
            status: Some(status),
            snippet: "payload has no series".to_string(),
        })?;

    let all: Vec<RawSeries> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| read_series(entry, i))
        .collect();

    if let Some(matching) = all
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(target))
        .cloned()
    {
        return Ok(matching);
    }
    if all.len() > 1 {
        tracing::warn!(
            target,
            count = all.len(),
            first = %all[0].name,
            "no series matches target, using the first"
        );
    }
    Ok(all.into_iter().next().expect("at least one series"))
}

fn read_series(entry: &Value, index: usize) -> RawSeries {
    let name = entry
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("series{index}"));
    let unit = entry
        .get("unit")
        .and_then(Value::as_str)
        .map(str::to_string);
    let points = entry
        .get("points")
        .and_then(Value::as_array)
        .map(|arr| read_points(arr))
        .unwrap_or_default();
    let scalars = entry
        .get("scalars")
        .and_then(Value::as_object)
        .map(read_scalars)
        .unwrap_or_default();
    RawSeries {
        name,
        unit,
        points,
        scalars,
    }
}

/// Points arrive either as a plain value array (`[65.2, null, …]`, index
/// implied by position) or as `[index, value]` pairs.
fn read_points(arr: &[Value]) -> Vec<SeriesPoint> {
    arr.iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Array(pair) if pair.len() == 2 => {
                let index = pair[0].as_u64().map(|v| v as usize).unwrap_or(i);
                SeriesPoint {
                    index,
                    value: pair[1].as_f64(),
                }
            }
            other => SeriesPoint {
                index: i,
                value: other.as_f64(),
            },
        })
        .collect()
}

/// Scalars arrive as bare numbers or `{raw, text}` objects; the formatted
/// `text` is display sugar and is discarded in favor of the raw value.
fn read_scalars(obj: &serde_json::Map<String, Value>) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    for (name, value) in obj {
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::Object(fields) => fields.get("raw").and_then(Value::as_f64),
            Value::String(s) => htmlutil::parse_number(s),
            _ => None,
        };
        match number {
            Some(v) if v.is_finite() => {
                out.insert(name.to_ascii_lowercase(), v);
            }
            _ => tracing::debug!(scalar = %name, "dropping non-numeric scalar"),
        }
    }
    out
}

/// Sparse axis labels: `[position, text]` pairs or `{position, text}`
/// objects under `time_axis.labels`.
fn read_axis_labels(payload: &Value) -> Vec<TimeAxisLabel> {
    let Some(entries) = payload
        .pointer("/time_axis/labels")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::Array(pair) if pair.len() == 2 => Some(TimeAxisLabel {
                position: pair[0].as_u64()? as usize,
                text: pair[1].as_str()?.to_string(),
            }),
            Value::Object(fields) => Some(TimeAxisLabel {
                position: fields.get("position")?.as_u64()? as usize,
                text: fields.get("text")?.as_str()?.to_string(),
            }),
            _ => None,
        })
        .collect()
}

/// Physically plausible value bands keyed by unit. A reading outside the
/// band is a decode artifact, not data.
fn sane_band(unit: Option<&str>) -> (f64, f64) {
    match unit.map(str::trim) {
        Some("%") => (0.0, 100.0),
        Some("°C") | Some("C") => (-100.0, 150.0),
        Some("ms") => (0.0, 1.0e7),
        _ => (-1.0e12, 1.0e12),
    }
}

fn materialize_points(
    series: &RawSeries,
    timeline: &Timeline,
) -> Result<Vec<HistoricalDataPoint>, ExtractError> {
    let (lo, hi) = sane_band(series.unit.as_deref());
    let mut out: Vec<HistoricalDataPoint> = Vec::with_capacity(series.points.len());

    for point in &series.points {
        // Gaps are data, not noise — dropped, never interpolated.
        let Some(value) = point.value else { continue };
        if !value.is_finite() || value < lo || value > hi {
            tracing::warn!(
                index = point.index,
                value,
                unit = series.unit.as_deref().unwrap_or(""),
                "excluding out-of-band value"
            );
            continue;
        }
        // Pair indices come straight from the payload; one outside the
        // data range means the reconstruction cannot be trusted.
        let timestamp =
            timeline
                .timestamp(point.index)
                .ok_or_else(|| ExtractError::TimeReconstruction {
                    index: point.index,
                    detail: "point index lies outside the data range".to_string(),
                })?;
        out.push(HistoricalDataPoint {
            timestamp,
            value: PointValue::Number(value),
            metric_name: series.name.clone(),
            unit: series.unit.clone(),
        });
    }

    // Strictly increasing timestamps, no duplicates.
    out.sort_by_key(|p| p.timestamp);
    out.dedup_by_key(|p| p.timestamp);
    Ok(out)
}

/// Drop scalars that contradict the observed point envelope. The server
/// computed them over raw storage; after gap and sanity filtering they can
/// disagree with what we kept, and an inconsistent result is worse than a
/// smaller one.
fn consistent_scalars(
    scalars: BTreeMap<String, f64>,
    points: &[HistoricalDataPoint],
) -> BTreeMap<String, f64> {
    let values: Vec<f64> = points.iter().filter_map(|p| p.value.as_f64()).collect();
    if values.is_empty() {
        return scalars;
    }
    let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    scalars
        .into_iter()
        .filter(|(name, value)| {
            let tolerance = f64::max(0.05, 1e-3 * value.abs());
            let ok = *value >= lo - tolerance && *value <= hi + tolerance;
            if !ok {
                tracing::warn!(
                    scalar = %name,
                    value,
                    envelope_min = lo,
                    envelope_max = hi,
                    "dropping scalar outside observed point envelope"
                );
            }
            ok
        })
        .collect()
}
