//! Typed error taxonomy for the extraction engine.
//!
//! Every variant carries machine-readable context — target, URL, HTTP
//! status, a bounded response snippet — and never credentials. The caller
//! (the surrounding historical service) catches these and formats its own
//! user-facing messaging; nothing here is prose for end users.

use std::fmt;

/// Maximum length, in characters, of a response snippet carried in an
/// error or written to a log.
pub const MAX_SNIPPET: usize = 240;

/// Truncate a response body to a bounded, single-line snippet that is safe
/// to attach to errors and logs.
pub fn snippet(body: &str) -> String {
    let mut out: String = body
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(MAX_SNIPPET)
        .collect();
    if body.chars().count() > MAX_SNIPPET {
        out.push('…');
    }
    out
}

/// Which extraction strategy a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Graph,
    Table,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Graph => write!(f, "graph"),
            StrategyKind::Table => write!(f, "table"),
        }
    }
}

/// One failed strategy inside an aggregate [`ExtractError::ExtractionFailed`].
#[derive(Debug)]
pub struct StrategyFailure {
    pub strategy: StrategyKind,
    /// Pipeline state the strategy had reached when it failed.
    pub state_reached: String,
    pub cause: Box<ExtractError>,
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {}): {}", self.strategy, self.state_reached, self.cause)
    }
}

fn format_failures(failures: &[StrategyFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// All errors the extraction engine can surface.
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    /// Login or session failure. `detail` never contains credentials.
    #[error("authentication failed (status {status:?}): {detail}")]
    Authentication { status: Option<u16>, detail: String },

    /// Dashboard page retrieval or validation failure.
    #[error("page fetch failed for {url} (status {status:?}): {snippet}")]
    Fetch {
        url: String,
        status: Option<u16>,
        snippet: String,
    },

    /// Zero or ambiguous render-call matches in the page scripts.
    #[error("parameter extraction failed ({matches} matching render call(s)): {reason}")]
    ParameterExtraction { reason: String, matches: usize },

    /// The AJAX exchange failed or returned an unexpected shape.
    #[error("graph protocol exchange failed (status {status:?}): {snippet}")]
    Protocol { status: Option<u16>, snippet: String },

    /// Reconstructed timestamps disagree with the rendered axis.
    #[error("time reconstruction failed at index {index}: {detail}")]
    TimeReconstruction { index: usize, detail: String },

    /// No table heuristic produced any statistic.
    #[error("table extraction produced no statistics: {reason}")]
    TableExtraction { reason: String },

    /// Every attempted strategy failed. Carries the ordered per-strategy
    /// causes so the caller can diagnose which layer broke.
    #[error("all extraction strategies failed for '{target}': {}", format_failures(failures))]
    ExtractionFailed {
        target: String,
        failures: Vec<StrategyFailure>,
    },
}
