//! Extraction pipeline orchestration.
//!
//! Drives one extraction call through its states, selects the strategy
//! (`auto`, `graph`, `table`), takes the fallback edge when the graph
//! path dies after the page was fetched, and aggregates per-strategy
//! failures when everything fails. Every call builds fresh components
//! and owns its own session; calls share nothing, so any number of them
//! may run concurrently.

use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

use crate::auth::{Session, SessionAuthenticator};
use crate::config::{EngineConfig, TimeWindow};
use crate::error::{ExtractError, StrategyFailure, StrategyKind};
use crate::extract::ParameterExtractor;
use crate::fetch::{HtmlDocument, PageFetcher};
use crate::graph::{GraphProtocolClient, GraphResponseParser};
use crate::model::{ExtractionMethod, HistoricalDataPoint, HistoricalDataResult, ResultMetadata};
use crate::net::http::HttpClient;
use crate::table::TableFallbackExtractor;

/// Progress of one extraction call. Recorded in failure reports so a
/// caller can see how far each strategy got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Init,
    Authenticated,
    PageFetched,
    ParamsExtracted,
    ProtocolRequested,
    Parsed,
    TableFallback,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Init => "INIT",
            PipelineState::Authenticated => "AUTHENTICATED",
            PipelineState::PageFetched => "PAGE_FETCHED",
            PipelineState::ParamsExtracted => "PARAMS_EXTRACTED",
            PipelineState::ProtocolRequested => "PROTOCOL_REQUESTED",
            PipelineState::Parsed => "PARSED",
            PipelineState::TableFallback => "TABLE_FALLBACK",
        };
        f.write_str(s)
    }
}

/// What the graph strategy produced, with the state it reached.
type GraphOutcome = Result<
    (Vec<HistoricalDataPoint>, BTreeMap<String, f64>),
    (PipelineState, ExtractError),
>;

/// The extraction engine. Cheap to construct; all real state lives
/// inside each call.
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Extract historical data for `target` over `window`.
    ///
    /// `Auto` tries the graph protocol and falls back to rendered tables;
    /// a pinned method never falls back. Failures before the dashboard
    /// page is in hand are shared by both strategies and propagate
    /// directly rather than per-strategy.
    pub async fn extract_history(
        &self,
        target: &str,
        window: TimeWindow,
        method: ExtractionMethod,
    ) -> Result<HistoricalDataResult, ExtractError> {
        let call_id = Uuid::new_v4();
        tracing::info!(%call_id, target, %method, state = %PipelineState::Init, "extraction call started");

        let client = HttpClient::new(self.config.timeout_ms);
        let mut auth = SessionAuthenticator::new(
            client.clone(),
            &self.config.base_url,
            self.config.credentials.clone(),
        );
        let fetcher = PageFetcher::new(client.clone(), &self.config.base_url);
        let proto = GraphProtocolClient::new(client, &self.config.base_url);

        let mut session = auth.authenticate().await?;
        tracing::debug!(%call_id, state = %PipelineState::Authenticated, "session established");

        let page = self
            .fetch_page(&fetcher, &mut auth, &mut session, target, &window)
            .await?;
        tracing::debug!(%call_id, state = %PipelineState::PageFetched, url = %page.url, "page in hand");

        match method {
            ExtractionMethod::Graph => {
                let (points, stats) = self
                    .graph_attempt(&proto, &mut auth, &mut session, &page, target)
                    .await
                    .map_err(|(_, e)| e)?;
                // Stats without a series are what the table method
                // returns; a graph result must carry the series.
                if points.is_empty() {
                    return Err(ExtractError::Protocol {
                        status: None,
                        snippet: "graph path produced no time series".to_string(),
                    });
                }
                Ok(self.assemble(&page, window, ExtractionMethod::Graph, points, stats))
            }
            ExtractionMethod::Table => {
                let stats = TableFallbackExtractor::extract(&page.body)?;
                Ok(self.assemble(&page, window, ExtractionMethod::Table, Vec::new(), stats))
            }
            ExtractionMethod::Auto => {
                let graph_failure = match self
                    .graph_attempt(&proto, &mut auth, &mut session, &page, target)
                    .await
                {
                    Ok((points, stats)) if !points.is_empty() => {
                        return Ok(self.assemble(
                            &page,
                            window,
                            ExtractionMethod::Graph,
                            points,
                            stats,
                        ));
                    }
                    // Scalars without a series are not what `Auto`
                    // promised; let the table path try for real stats.
                    Ok(_) => StrategyFailure {
                        strategy: StrategyKind::Graph,
                        state_reached: PipelineState::Parsed.to_string(),
                        cause: Box::new(ExtractError::Protocol {
                            status: None,
                            snippet: "graph path produced no time series".to_string(),
                        }),
                    },
                    Err((state, cause)) => StrategyFailure {
                        strategy: StrategyKind::Graph,
                        state_reached: state.to_string(),
                        cause: Box::new(cause),
                    },
                };

                tracing::warn!(%call_id, cause = %graph_failure, "graph strategy failed, trying table fallback");

                match TableFallbackExtractor::extract(&page.body) {
                    Ok(stats) => {
                        Ok(self.assemble(&page, window, ExtractionMethod::Table, Vec::new(), stats))
                    }
                    Err(table_cause) => Err(ExtractError::ExtractionFailed {
                        target: target.to_string(),
                        failures: vec![
                            graph_failure,
                            StrategyFailure {
                                strategy: StrategyKind::Table,
                                state_reached: PipelineState::TableFallback.to_string(),
                                cause: Box::new(table_cause),
                            },
                        ],
                    }),
                }
            }
        }
    }

    /// Fetch the dashboard page, redeeming the single re-authentication
    /// if the session expired between login and fetch.
    async fn fetch_page(
        &self,
        fetcher: &PageFetcher,
        auth: &mut SessionAuthenticator,
        session: &mut Session,
        target: &str,
        window: &TimeWindow,
    ) -> Result<HtmlDocument, ExtractError> {
        match fetcher.fetch(target, window, session).await {
            Err(ExtractError::Authentication { .. }) => {
                auth.ensure_valid(session).await?;
                fetcher.fetch(target, window, session).await
            }
            other => other,
        }
    }

    /// The graph strategy: parameters out of the page, protocol exchange
    /// (with the single re-authentication if the session died mid-call),
    /// payload parse. Errors carry the state the strategy reached.
    async fn graph_attempt(
        &self,
        proto: &GraphProtocolClient,
        auth: &mut SessionAuthenticator,
        session: &mut Session,
        page: &HtmlDocument,
        target: &str,
    ) -> GraphOutcome {
        let params = ParameterExtractor::extract(&page.body)
            .map_err(|e| (PipelineState::PageFetched, e))?;

        let raw = match proto.request(&params, session).await {
            Err(ExtractError::Authentication { .. }) => {
                auth.ensure_valid(session)
                    .await
                    .map_err(|e| (PipelineState::ParamsExtracted, e))?;
                proto
                    .request(&params, session)
                    .await
                    .map_err(|e| (PipelineState::ParamsExtracted, e))?
            }
            Err(e) => return Err((PipelineState::ParamsExtracted, e)),
            Ok(raw) => raw,
        };

        GraphResponseParser::parse(&raw, &params, target)
            .map_err(|e| (PipelineState::ProtocolRequested, e))
    }

    fn assemble(
        &self,
        page: &HtmlDocument,
        window: TimeWindow,
        method: ExtractionMethod,
        data_points: Vec<HistoricalDataPoint>,
        summary_stats: BTreeMap<String, f64>,
    ) -> HistoricalDataResult {
        tracing::info!(
            points = data_points.len(),
            stats = summary_stats.len(),
            %method,
            "extraction finished"
        );
        HistoricalDataResult {
            data_points,
            summary_stats,
            metadata: ResultMetadata {
                source: page.url.clone(),
                time_range: window,
                extraction_method: method,
            },
            source: method,
        }
    }
}
