//! Recover the internal rendering call's parameters from page scripts.
//!
//! The dashboard renders its chart by calling a fixed client-side function
//! with four JS-literal arguments. This module scans the page's inline
//! scripts for that call and normalizes the arguments into
//! [`GraphParameters`]. Pure functions, no I/O.

use regex::Regex;
use serde_json::Value;

use crate::error::ExtractError;
use crate::extract::jslit;
use crate::htmlutil;
use crate::model::{DataRange, GraphParameters};

/// Client-side call that renders the historical chart. Four positional
/// arguments: recipe, data range, render config, display id.
const RENDER_CALL: &str = "renderGraph";

pub struct ParameterExtractor;

impl ParameterExtractor {
    /// Extract [`GraphParameters`] from the dashboard page.
    ///
    /// Exactly one `renderGraph(…)` call must be present. Zero means the
    /// page layout changed; more than one usually means a stale cached
    /// page kept an old call around. Picking one silently would risk
    /// replaying stale parameters, so both cases fail.
    pub fn extract(html: &str) -> Result<GraphParameters, ExtractError> {
        let calls = find_render_calls(html);
        match calls.len() {
            0 => Err(ExtractError::ParameterExtraction {
                reason: format!("no {RENDER_CALL} call found in page scripts"),
                matches: 0,
            }),
            1 => parse_call(&calls[0]),
            n => Err(ExtractError::ParameterExtraction {
                reason: format!("{n} {RENDER_CALL} calls found, refusing to guess"),
                matches: n,
            }),
        }
    }
}

/// Every delimitable render-call argument list across the page's inline
/// scripts, in document order.
fn find_render_calls(html: &str) -> Vec<Vec<String>> {
    let re = Regex::new(&format!(r"\b{RENDER_CALL}\s*\(")).expect("valid regex");
    let mut calls = Vec::new();
    for script in htmlutil::inline_scripts(html) {
        for m in re.find_iter(&script) {
            if let Some((args, _)) = jslit::split_call_args(&script[m.end()..]) {
                calls.push(args);
            }
        }
    }
    calls
}

fn parse_call(args: &[String]) -> Result<GraphParameters, ExtractError> {
    if args.len() != 4 {
        return Err(ExtractError::ParameterExtraction {
            reason: format!("render call has {} arguments, expected 4", args.len()),
            matches: 1,
        });
    }

    let recipe = parse_arg(&args[0], "recipe")?;
    let range_value = parse_arg(&args[1], "data range")?;
    let render_config = parse_arg(&args[2], "render config")?;
    let display_id = match parse_arg(&args[3], "display id")? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => {
            return Err(ExtractError::ParameterExtraction {
                reason: format!("display id is neither string nor number: {other}"),
                matches: 1,
            })
        }
    };

    let data_range = parse_data_range(&range_value)?;
    Ok(GraphParameters {
        recipe,
        data_range,
        render_config,
        display_id,
    })
}

fn parse_arg(src: &str, what: &str) -> Result<Value, ExtractError> {
    jslit::parse(src).ok_or_else(|| ExtractError::ParameterExtraction {
        reason: format!("{what} argument is not a tolerated literal: {src}"),
        matches: 1,
    })
}

fn parse_data_range(value: &Value) -> Result<DataRange, ExtractError> {
    let start = value.get("start").and_then(Value::as_i64);
    let end = value.get("end").and_then(Value::as_i64);
    let step = value.get("step").and_then(Value::as_i64);
    match (start, end, step) {
        (Some(start), Some(end), Some(step)) if step > 0 && end >= start => {
            Ok(DataRange { start, end, step })
        }
        _ => Err(ExtractError::ParameterExtraction {
            reason: format!("data range is malformed: {value}"),
            matches: 1,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAGE: &str = r#"<html><body><div id="graphpane"></div>
        <script>
          var layout = init();
          renderGraph({id: 'cpu_temp', kind: 'line'},
                      {start: 1735689600, end: 1735693200, step: 60},
                      {width: 800, height: 240, legend: true,},
                      'graph-42');
        </script>
        </body></html>"#;

    #[test]
    fn test_extract_single_call() {
        let params = ParameterExtractor::extract(PAGE).unwrap();
        assert_eq!(params.recipe, json!({"id": "cpu_temp", "kind": "line"}));
        assert_eq!(params.data_range.start, 1735689600);
        assert_eq!(params.data_range.end, 1735693200);
        assert_eq!(params.data_range.step, 60);
        assert_eq!(
            params.render_config,
            json!({"width": 800, "height": 240, "legend": true})
        );
        assert_eq!(params.display_id, "graph-42");
    }

    #[test]
    fn test_extract_rejects_zero_matches() {
        let err = ParameterExtractor::extract("<html><body>nothing here</body></html>")
            .unwrap_err();
        match err {
            ExtractError::ParameterExtraction { matches, .. } => assert_eq!(matches, 0),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_extract_rejects_ambiguous_matches() {
        // A stale cached page with two render calls must never be resolved
        // by silently picking one.
        let page = r#"<html><script>
            renderGraph({id: 'old'}, {start: 1, end: 2, step: 1}, {}, 'g-1');
        </script><script>
            renderGraph({id: 'new'}, {start: 3, end: 4, step: 1}, {}, 'g-2');
        </script></html>"#;
        let err = ParameterExtractor::extract(page).unwrap_err();
        match err {
            ExtractError::ParameterExtraction { matches, .. } => assert_eq!(matches, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_extract_rejects_wrong_arity() {
        let page = r#"<script>renderGraph({id: 'x'}, {start: 1, end: 2, step: 1}, {});</script>"#;
        let err = ParameterExtractor::extract(page).unwrap_err();
        assert!(matches!(err, ExtractError::ParameterExtraction { .. }));
        assert!(err.to_string().contains("3 arguments"));
    }

    #[test]
    fn test_extract_rejects_bad_data_range() {
        // step must be positive, end must not precede start
        for range in ["{start: 10, end: 5, step: 60}", "{start: 1, end: 2, step: 0}", "{}"] {
            let page = format!(
                "<script>renderGraph({{}}, {range}, {{}}, 'g');</script>"
            );
            let err = ParameterExtractor::extract(&page).unwrap_err();
            assert!(matches!(err, ExtractError::ParameterExtraction { .. }));
        }
    }

    #[test]
    fn test_extract_numeric_display_id() {
        let page =
            r#"<script>renderGraph({}, {start: 1, end: 2, step: 1}, {}, 42);</script>"#;
        let params = ParameterExtractor::extract(page).unwrap();
        assert_eq!(params.display_id, "42");
    }

    #[test]
    fn test_similar_names_do_not_match() {
        let page = r#"<script>
            preRenderGraphs();
            renderGraphLegend('x');
            renderGraph({}, {start: 1, end: 2, step: 1}, {}, 'g');
        </script>"#;
        let params = ParameterExtractor::extract(page).unwrap();
        assert_eq!(params.display_id, "g");
    }
}
