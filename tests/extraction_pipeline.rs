//! Full-pipeline tests against a mock dashboard: login, page fetch,
//! parameter recovery, protocol replay, fallback and session handling.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use graphsift::{
    Credentials, Engine, EngineConfig, ExtractError, ExtractionMethod, PointValue, StrategyKind,
    TimeWindow,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "graphsift=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn engine_for(server: &MockServer) -> Engine {
    Engine::new(EngineConfig {
        base_url: server.uri(),
        credentials: Credentials {
            username: "ops".to_string(),
            password: "hunter2".to_string(),
        },
        timeout_ms: 5_000,
        default_period: "24h".to_string(),
    })
}

fn window() -> TimeWindow {
    TimeWindow::new(
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap(),
    )
}

/// Dashboard page: marker element plus the inline rendering call the
/// parameter extractor feeds on. `extra` lands after the chart pane.
fn dashboard_page(extra: &str) -> String {
    format!(
        r#"<html><body>
<div id="graphpane"></div>
<script>
  renderGraph({{metric: 'cpu_temp', rra: 0}}, {{start: 1735689600, end: 1735693200, step: 60}}, {{height: 120, width: 600}}, 'pane-1');
</script>
{extra}
</body></html>"#
    )
}

const SUMMARY_TABLE: &str = r#"<table class="summary">
<tr><th>Minimum</th><th>Maximum</th><th>Average</th><th>Last</th></tr>
<tr><td>65.2 &deg;C</td><td>74.9 &deg;C</td><td>70.1 &deg;C</td><td>66.0 &deg;C</td></tr>
</table>"#;

const CHART_RESPONSE: &str = "/* chart v3 */ drawChart({series: [{name: 'cpu_temp', unit: '°C', \
points: [65.2, 65.7, null, 66.1], \
scalars: {minimum: 65.2, maximum: 66.1, average: 65.67}}], \
time_axis: {labels: [[0, '00:00']]}}, 'pane-1');";

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login.htm"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "monsess=tok; Path=/; HttpOnly")
                .set_body_string("<html><body>welcome</body></html>"),
        )
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path("/dashboard/graph.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_graph_path_end_to_end() {
    init_tracing();
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_page(&server, dashboard_page("")).await;
    Mock::given(method("POST"))
        .and(path("/ajax/graph.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHART_RESPONSE))
        .mount(&server)
        .await;

    let result = engine_for(&server)
        .extract_history("cpu_temp", window(), ExtractionMethod::Auto)
        .await
        .unwrap();

    assert_eq!(result.source, ExtractionMethod::Graph);
    assert_eq!(result.metadata.extraction_method, ExtractionMethod::Graph);
    assert!(result
        .metadata
        .source
        .contains("/dashboard/graph.htm?id=cpu_temp"));

    // The null at index 2 is a gap, dropped without interpolation.
    assert_eq!(result.data_points.len(), 3);
    let expected = [
        (Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(), 65.2),
        (Utc.with_ymd_and_hms(2025, 1, 1, 0, 1, 0).unwrap(), 65.7),
        (Utc.with_ymd_and_hms(2025, 1, 1, 0, 3, 0).unwrap(), 66.1),
    ];
    for (point, (ts, value)) in result.data_points.iter().zip(expected) {
        assert_eq!(point.timestamp, ts);
        assert_eq!(point.value, PointValue::Number(value));
        assert_eq!(point.metric_name, "cpu_temp");
        assert_eq!(point.unit.as_deref(), Some("°C"));
    }
    for pair in result.data_points.windows(2) {
        assert!(pair[0].timestamp < pair[1].timestamp);
    }

    assert_eq!(result.summary_stats.get("minimum"), Some(&65.2));
    assert_eq!(result.summary_stats.get("maximum"), Some(&66.1));
    assert_eq!(result.summary_stats.get("average"), Some(&65.67));
}

#[tokio::test]
async fn test_auto_falls_back_to_table() {
    init_tracing();
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_page(&server, dashboard_page(SUMMARY_TABLE)).await;
    Mock::given(method("POST"))
        .and(path("/ajax/graph.htm"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let result = engine_for(&server)
        .extract_history("cpu_temp", window(), ExtractionMethod::Auto)
        .await
        .unwrap();

    // Degraded result: statistics only, no series, and the method says so.
    assert_eq!(result.source, ExtractionMethod::Table);
    assert!(result.data_points.is_empty());
    assert_eq!(result.summary_stats.get("minimum"), Some(&65.2));
    assert_eq!(result.summary_stats.get("maximum"), Some(&74.9));
    assert_eq!(result.summary_stats.get("average"), Some(&70.1));
    assert_eq!(result.summary_stats.get("last"), Some(&66.0));
}

#[tokio::test]
async fn test_pinned_graph_never_falls_back() {
    init_tracing();
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_page(&server, dashboard_page(SUMMARY_TABLE)).await;
    Mock::given(method("POST"))
        .and(path("/ajax/graph.htm"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let err = engine_for(&server)
        .extract_history("cpu_temp", window(), ExtractionMethod::Graph)
        .await
        .unwrap_err();

    // The failing strategy's own error, not an aggregate, and no table
    // result even though the page carries one.
    assert!(matches!(err, ExtractError::Protocol { status: Some(500), .. }));
}

#[tokio::test]
async fn test_pinned_graph_rejects_scalars_only_payload() {
    init_tracing();
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_page(&server, dashboard_page("")).await;
    // Payload with statistics but no series: stats-only results belong to
    // the table method, so pinned graph mode must fail, not degrade.
    Mock::given(method("POST"))
        .and(path("/ajax/graph.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "drawChart({series: [{name: 'cpu_temp', points: [], \
             scalars: {maximum: 74.9}}]}, 'pane-1');",
        ))
        .mount(&server)
        .await;

    let err = engine_for(&server)
        .extract_history("cpu_temp", window(), ExtractionMethod::Graph)
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::Protocol { .. }));
    assert!(err.to_string().contains("no time series"));
}

#[tokio::test]
async fn test_pinned_table_skips_graph_protocol() {
    init_tracing();
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_page(&server, dashboard_page(SUMMARY_TABLE)).await;
    Mock::given(method("POST"))
        .and(path("/ajax/graph.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHART_RESPONSE))
        .expect(0)
        .mount(&server)
        .await;

    let result = engine_for(&server)
        .extract_history("cpu_temp", window(), ExtractionMethod::Table)
        .await
        .unwrap();

    assert_eq!(result.source, ExtractionMethod::Table);
    assert!(result.data_points.is_empty());
    assert_eq!(result.summary_stats.get("maximum"), Some(&74.9));
}

#[tokio::test]
async fn test_auto_aggregates_both_failures() {
    init_tracing();
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_page(&server, dashboard_page("")).await;
    Mock::given(method("POST"))
        .and(path("/ajax/graph.htm"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let err = engine_for(&server)
        .extract_history("cpu_temp", window(), ExtractionMethod::Auto)
        .await
        .unwrap_err();

    let ExtractError::ExtractionFailed { target, failures } = err else {
        panic!("expected aggregate failure, got: {err}");
    };
    assert_eq!(target, "cpu_temp");
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].strategy, StrategyKind::Graph);
    assert_eq!(failures[1].strategy, StrategyKind::Table);
    assert_eq!(failures[0].state_reached, "PARAMS_EXTRACTED");
    assert_eq!(failures[1].state_reached, "TABLE_FALLBACK");
}

#[tokio::test]
async fn test_reauthenticates_once_on_mid_call_expiry() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login.htm"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "monsess=tok; Path=/")
                .set_body_string("welcome"),
        )
        .expect(2)
        .mount(&server)
        .await;
    mount_page(&server, dashboard_page("")).await;
    // First protocol exchange hits an expired session, the replay after
    // re-authentication succeeds.
    Mock::given(method("POST"))
        .and(path("/ajax/graph.htm"))
        .respond_with(ResponseTemplate::new(401).set_body_string("session expired"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ajax/graph.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHART_RESPONSE))
        .mount(&server)
        .await;

    let result = engine_for(&server)
        .extract_history("cpu_temp", window(), ExtractionMethod::Auto)
        .await
        .unwrap();

    assert_eq!(result.source, ExtractionMethod::Graph);
    assert_eq!(result.data_points.len(), 3);
}

/// Issues a unique session cookie per login.
struct UniqueCookieLogin {
    logins: AtomicU64,
}

impl Respond for UniqueCookieLogin {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.logins.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(200)
            .insert_header("set-cookie", format!("monsess=tok{n}; Path=/").as_str())
            .set_body_string("welcome")
    }
}

/// Echoes the caller's session cookie back as the series name, so each
/// result reveals which session performed the exchange.
struct CookieEchoChart;

impl Respond for CookieEchoChart {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let cookie = request
            .headers
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let tag = cookie
            .split('=')
            .nth(1)
            .unwrap_or("missing")
            .split(';')
            .next()
            .unwrap_or("missing");
        ResponseTemplate::new(200).set_body_string(format!(
            "drawChart({{series: [{{name: '{tag}', points: [1.0, 2.0]}}]}}, 'pane-1');"
        ))
    }
}

#[tokio::test]
async fn test_concurrent_calls_use_isolated_sessions() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login.htm"))
        .respond_with(UniqueCookieLogin {
            logins: AtomicU64::new(0),
        })
        .mount(&server)
        .await;
    mount_page(&server, dashboard_page("")).await;
    Mock::given(method("POST"))
        .and(path("/ajax/graph.htm"))
        .respond_with(CookieEchoChart)
        .mount(&server)
        .await;

    let engine = Arc::new(engine_for(&server));
    let mut tasks = Vec::new();
    for _ in 0..50 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            engine
                .extract_history("cpu_temp", window(), ExtractionMethod::Auto)
                .await
                .unwrap()
        }));
    }

    let mut sessions_seen = HashSet::new();
    for outcome in futures::future::join_all(tasks).await {
        let result = outcome.unwrap();
        assert_eq!(result.data_points.len(), 2);
        sessions_seen.insert(result.data_points[0].metric_name.clone());
    }

    // Fifty calls, fifty sessions; no sharing, no bleed-through.
    assert_eq!(sessions_seen.len(), 50);
}
