//! Shared HTML parsing utilities.
//!
//! Small helpers used by the parameter extractor and the table fallback:
//! inline-script harvesting, whitespace/entity normalization, and
//! unit-tolerant number parsing for rendered cells like `74.9 °C` or
//! `1,234.5 ms`.

use scraper::{ElementRef, Html, Selector};

/// Collect the text content of every inline `<script>` (no `src`) in
/// document order.
pub fn inline_scripts(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("script:not([src])").expect("valid selector");
    doc.select(&sel).map(|el| el.inner_html()).collect()
}

/// Collapse whitespace runs and decode the handful of HTML entities that
/// show up in dashboard cells.
pub fn normalize_text(raw: &str) -> String {
    let decoded = raw
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&deg;", "°")
        .replace("&#176;", "°")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized text content of an element.
pub fn text_of(el: &ElementRef) -> String {
    normalize_text(&el.text().collect::<String>())
}

/// Parse a rendered numeric cell.
///
/// Tolerates a unit suffix (`74.9 °C`), thousands separators (`1,234.5`)
/// and leading label junk (`Max: 75.0`). Returns `None` when no number is
/// present — callers must not zero-fill.
pub fn parse_number(raw: &str) -> Option<f64> {
    let text = normalize_text(raw);
    let mut cleaned = String::new();
    for c in text.chars() {
        match c {
            '0'..='9' | '.' => cleaned.push(c),
            '-' | '+' if cleaned.is_empty() => cleaned.push(c),
            ',' if !cleaned.is_empty() => {} // thousands separator
            _ if cleaned.chars().any(|d| d.is_ascii_digit()) => break, // unit suffix
            _ => cleaned.clear(), // leading junk, restart
        }
    }
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Whether the chunk reads as a numeric cell (digits present and parseable).
pub fn is_numeric_text(raw: &str) -> bool {
    parse_number(raw).is_some()
}
