//! The three table heuristics.
//!
//! Each proposes `StatCandidate`s independently; the merge in the parent
//! module arbitrates. Header matching is strict (a cell that IS a known
//! label), positional matching relies on the conventional
//! minimum/maximum/average/last column order, and proximity matching is
//! the loose net for free-form layouts.

use scraper::{ElementRef, Html, Selector};

use crate::htmlutil::{is_numeric_text, normalize_text, parse_number, text_of};

/// Which heuristic produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heuristic {
    Header,
    Position,
    Proximity,
}

/// A proposed `{statistic: value}` with the proposing heuristic's
/// confidence.
#[derive(Debug, Clone)]
pub struct StatCandidate {
    pub name: &'static str,
    pub value: f64,
    pub confidence: f32,
    pub source: Heuristic,
}

const HEADER_CONFIDENCE: f32 = 0.90;
const POSITION_CONFIDENCE: f32 = 0.55;
const PROXIMITY_CONFIDENCE: f32 = 0.45;

/// Conventional column order for an unlabeled four-value summary row.
const POSITIONAL_ORDER: [&str; 4] = ["minimum", "maximum", "average", "last"];

/// Strict label match: the whole cell, minus a trailing colon, is a
/// known statistic name.
fn canonical_stat(label: &str) -> Option<&'static str> {
    let cleaned = normalize_text(label);
    let cleaned = cleaned.trim_end_matches(':').trim().to_ascii_lowercase();
    match cleaned.as_str() {
        "min" | "minimum" => Some("minimum"),
        "max" | "maximum" => Some("maximum"),
        "avg" | "average" | "mean" => Some("average"),
        "last" | "latest" | "current" => Some("last"),
        "first" => Some("first"),
        _ => None,
    }
}

/// Loose label match: any word of the chunk is a known statistic name.
/// `Observed Max` qualifies here but not for `canonical_stat`.
fn fuzzy_stat(label: &str) -> Option<&'static str> {
    normalize_text(label)
        .split(|c: char| !c.is_ascii_alphanumeric())
        .find_map(canonical_stat)
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

fn tables(doc: &Html) -> Vec<ElementRef<'_>> {
    doc.select(&selector("table")).collect()
}

fn rows<'a>(table: &ElementRef<'a>) -> Vec<Vec<String>> {
    let row_sel = selector("tr");
    let cell_sel = selector("th, td");
    table
        .select(&row_sel)
        .map(|row| row.select(&cell_sel).map(|c| text_of(&c)).collect())
        .collect()
}

/// Header heuristic: labeled columns or labeled rows, strict label match.
pub fn by_header(doc: &Html) -> Vec<StatCandidate> {
    let mut out = Vec::new();
    for table in tables(doc) {
        let rows = rows(&table);

        // Column layout: a header row of labels, data rows underneath.
        if let Some((header, data)) = rows.split_first() {
            let columns: Vec<Option<&'static str>> =
                header.iter().map(|c| canonical_stat(c)).collect();
            if columns.iter().any(Option::is_some) {
                if let Some(values) = data
                    .iter()
                    .find(|row| row.iter().any(|c| is_numeric_text(c)))
                {
                    for (stat, cell) in columns.iter().zip(values) {
                        if let (Some(name), Some(value)) = (stat, parse_number(cell)) {
                            out.push(StatCandidate {
                                name,
                                value,
                                confidence: HEADER_CONFIDENCE,
                                source: Heuristic::Header,
                            });
                        }
                    }
                }
            }
        }

        // Row layout: `Maximum | 74.9` pairs.
        for row in &rows {
            if row.len() < 2 {
                continue;
            }
            if let Some(name) = canonical_stat(&row[0]) {
                if let Some(value) = row[1..].iter().find_map(|c| parse_number(c)) {
                    out.push(StatCandidate {
                        name,
                        value,
                        confidence: HEADER_CONFIDENCE,
                        source: Heuristic::Header,
                    });
                }
            }
        }
    }
    out
}

/// Positional heuristic: an unlabeled row of exactly four numeric cells
/// is read in the conventional minimum/maximum/average/last order.
pub fn by_position(doc: &Html) -> Vec<StatCandidate> {
    let mut out = Vec::new();
    for table in tables(doc) {
        let Some(values) = rows(&table).into_iter().find(|row| {
            row.len() == 4 && row.iter().all(|c| is_numeric_text(c))
        }) else {
            continue;
        };
        for (name, cell) in POSITIONAL_ORDER.iter().zip(&values) {
            if let Some(value) = parse_number(cell) {
                out.push(StatCandidate {
                    name,
                    value,
                    confidence: POSITION_CONFIDENCE,
                    source: Heuristic::Position,
                });
            }
        }
    }
    out
}

/// Proximity heuristic: within each table, a numeric chunk is attributed
/// to the nearest preceding label-like chunk. Loose matching; lowest
/// confidence.
pub fn by_proximity(doc: &Html) -> Vec<StatCandidate> {
    let mut out = Vec::new();
    for table in tables(doc) {
        let mut pending: Option<&'static str> = None;
        for chunk in table.text() {
            let text = normalize_text(chunk);
            if text.is_empty() {
                continue;
            }
            let label = fuzzy_stat(&text);
            let number = parse_number(&text);
            match (label, number) {
                // `Max: 75.0` carries both parts itself.
                (Some(name), Some(value)) => {
                    out.push(StatCandidate {
                        name,
                        value,
                        confidence: PROXIMITY_CONFIDENCE,
                        source: Heuristic::Proximity,
                    });
                    pending = None;
                }
                (Some(name), None) => pending = Some(name),
                (None, Some(value)) => {
                    if let Some(name) = pending.take() {
                        out.push(StatCandidate {
                            name,
                            value,
                            confidence: PROXIMITY_CONFIDENCE,
                            source: Heuristic::Proximity,
                        });
                    }
                }
                (None, None) => {}
            }
        }
    }
    out
}
