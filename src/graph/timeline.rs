//! Timestamp reconstruction from the request's data range.
//!
//! The AJAX payload carries point values by array index; absolute time
//! exists only as `start + index · step` from the recovered data range,
//! cross-validated against the sparse labels the dashboard rendered on
//! the time axis. The axis is calibration, never the timestamp source —
//! its labels are human-formatted and too coarse to be authoritative.

use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::error::ExtractError;
use crate::htmlutil;
use crate::model::{DataRange, TimeAxisLabel};

/// Maximum disagreement between a reconstructed timestamp and a parsed
/// axis anchor. Axis labels are rounded to the rendered tick, so a little
/// slack is expected; more than this means the reconstruction is wrong.
const ANCHOR_TOLERANCE_SECS: i64 = 90;

/// Reconstructed clock for a data range: `timestamp(i) = start + i·step`.
#[derive(Debug, Clone, Copy)]
pub struct Timeline {
    start: DateTime<Utc>,
    step_secs: i64,
    /// Highest index the range covers. Indices and positions arrive from
    /// the payload and are untrusted; anything past this is rejected, not
    /// multiplied.
    max_index: i64,
}

impl Timeline {
    pub fn from_range(range: &DataRange) -> Result<Self, ExtractError> {
        if range.step <= 0 {
            return Err(ExtractError::TimeReconstruction {
                index: 0,
                detail: format!("non-positive step {}", range.step),
            });
        }
        if range.end < range.start {
            return Err(ExtractError::TimeReconstruction {
                index: 0,
                detail: format!("range ends ({}) before it starts ({})", range.end, range.start),
            });
        }
        let start = DateTime::<Utc>::from_timestamp(range.start, 0).ok_or_else(|| {
            ExtractError::TimeReconstruction {
                index: 0,
                detail: format!("start {} is not a valid epoch timestamp", range.start),
            }
        })?;
        Ok(Self {
            start,
            step_secs: range.step,
            max_index: (range.end - range.start) / range.step,
        })
    }

    /// Absolute timestamp of point index `i`, or `None` when the index
    /// lies outside the data range.
    pub fn timestamp(&self, index: usize) -> Option<DateTime<Utc>> {
        let index = i64::try_from(index).ok().filter(|i| *i <= self.max_index)?;
        let offset = self.step_secs.checked_mul(index)?;
        self.start.checked_add_signed(Duration::try_seconds(offset)?)
    }

    /// Validate the reconstruction against rendered axis anchors.
    ///
    /// Every anchor whose display text parses is checked. Any parsed
    /// anchor disagreeing beyond the tolerance rejects the whole
    /// reconstruction — silently emitting wrong timestamps is worse than
    /// failing. Anchors that do not parse are skipped: formats vary by
    /// dashboard locale and the axis is only corroboration.
    pub fn cross_validate(&self, labels: &[TimeAxisLabel]) -> Result<(), ExtractError> {
        let mut checked = 0usize;
        for label in labels {
            let Some(expected) = self.timestamp(label.position) else {
                tracing::debug!(
                    position = label.position,
                    text = %label.text,
                    "skipping axis anchor outside the data range"
                );
                continue;
            };
            let Some(anchor) = parse_anchor(&label.text, expected) else {
                tracing::debug!(text = %label.text, "skipping unparseable axis anchor");
                continue;
            };
            let delta = (anchor - expected).num_seconds().abs();
            if delta > ANCHOR_TOLERANCE_SECS {
                return Err(ExtractError::TimeReconstruction {
                    index: label.position,
                    detail: format!(
                        "axis anchor '{}' is {}s away from reconstructed {}",
                        label.text,
                        delta,
                        expected.to_rfc3339()
                    ),
                });
            }
            checked += 1;
        }
        if checked == 0 && !labels.is_empty() {
            tracing::warn!("no axis anchor parsed; reconstructed timestamps are uncorroborated");
        }
        Ok(())
    }
}

/// Parse an anchor's display text into an absolute timestamp, using the
/// reconstructed timestamp's calendar date for time-of-day-only labels.
fn parse_anchor(text: &str, expected: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let t = htmlutil::normalize_text(text);

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%d.%m.%Y %H:%M"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(&t, fmt) {
            return Some(dt.and_utc());
        }
    }

    for fmt in ["%H:%M:%S", "%H:%M"] {
        if let Ok(time) = NaiveTime::parse_from_str(&t, fmt) {
            // Time-of-day only: pick the adjacent calendar day closest to
            // the reconstructed timestamp (handles the midnight wrap).
            let date = expected.date_naive();
            let mut best: Option<DateTime<Utc>> = None;
            for offset in [-1i64, 0, 1] {
                let Some(day) = date.checked_add_signed(Duration::days(offset)) else {
                    continue;
                };
                let candidate = day.and_time(time).and_utc();
                let better = match best {
                    Some(b) => {
                        (candidate - expected).num_seconds().abs()
                            < (b - expected).num_seconds().abs()
                    }
                    None => true,
                };
                if better {
                    best = Some(candidate);
                }
            }
            return best;
        }
    }

    // Date-only labels mark day boundaries, not clock positions; they
    // cannot corroborate a timestamp to within the tolerance.
    None
}
