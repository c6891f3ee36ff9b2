//! Summary-statistic extraction from rendered HTML tables.
//!
//! Fallback path for when the graph protocol is unavailable or returns
//! nothing usable. The dashboard's summary tables were built for eyes,
//! not machines, so three independent heuristics each propose
//! `{statistic: value}` candidates with a confidence, and the merge
//! prefers agreement. A statistic no heuristic finds is absent from the
//! result — never zero-filled.

pub mod heuristics;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use scraper::Html;

use crate::error::ExtractError;
use heuristics::StatCandidate;

/// Two candidate values agree when they differ by at most
/// `max(0.05, 1e-3·|a|)` — display rounding, not real disagreement.
fn values_agree(a: f64, b: f64) -> bool {
    (a - b).abs() <= f64::max(0.05, 1e-3 * a.abs())
}

pub struct TableFallbackExtractor;

impl TableFallbackExtractor {
    /// Run all three heuristics over the page and merge their proposals.
    ///
    /// Fails with `TableExtraction` only when no heuristic produced any
    /// statistic at all.
    pub fn extract(html: &str) -> Result<BTreeMap<String, f64>, ExtractError> {
        let doc = Html::parse_document(html);

        let mut candidates = Vec::new();
        candidates.extend(heuristics::by_header(&doc));
        candidates.extend(heuristics::by_position(&doc));
        candidates.extend(heuristics::by_proximity(&doc));

        tracing::debug!(count = candidates.len(), "table heuristics proposed candidates");

        let merged = merge(candidates);
        if merged.is_empty() {
            return Err(ExtractError::TableExtraction {
                reason: "no heuristic produced any statistic".to_string(),
            });
        }
        Ok(merged)
    }
}

/// Merge candidates per statistic: cluster by agreement, prefer the
/// cluster with the greatest total confidence, and within it take the
/// highest-confidence source's value.
fn merge(candidates: Vec<StatCandidate>) -> BTreeMap<String, f64> {
    let mut by_name: BTreeMap<String, Vec<StatCandidate>> = BTreeMap::new();
    for c in candidates {
        by_name.entry(c.name.to_string()).or_default().push(c);
    }

    let mut out = BTreeMap::new();
    for (name, cands) in by_name {
        let mut clusters: Vec<Vec<StatCandidate>> = Vec::new();
        for c in cands {
            match clusters
                .iter_mut()
                .find(|cluster| values_agree(cluster[0].value, c.value))
            {
                Some(cluster) => cluster.push(c),
                None => clusters.push(vec![c]),
            }
        }

        let total = |cluster: &[StatCandidate]| -> f32 {
            cluster.iter().map(|c| c.confidence).sum()
        };
        let Some(best) = clusters.into_iter().max_by(|a, b| {
            total(a)
                .partial_cmp(&total(b))
                .unwrap_or(Ordering::Equal)
        }) else {
            continue;
        };

        if best.len() > 1 {
            tracing::debug!(stat = %name, sources = best.len(), "heuristics agree");
        } else {
            tracing::debug!(stat = %name, source = ?best[0].source, "single-source statistic");
        }

        if let Some(top) = best.iter().max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(Ordering::Equal)
        }) {
            out.insert(name, top.value);
        }
    }
    out
}
