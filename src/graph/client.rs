//! Adapter for the dashboard's internal graph-rendering AJAX exchange.
//!
//! The exchange is an undocumented, reverse-engineered contract: endpoint
//! path, form field name, and the nested key names below must match what
//! the real dashboard client sends byte-for-byte or the server rejects
//! the request. Every wire-format assumption lives in this module, so
//! protocol drift stays a one-module change.

use serde_json::json;

use crate::auth::{Session, SessionAuthenticator};
use crate::error::{snippet, ExtractError};
use crate::model::GraphParameters;
use crate::net::http::HttpClient;

/// AJAX endpoint the dashboard posts render requests to.
const GRAPH_ENDPOINT: &str = "/ajax/graph.htm";

/// The single form field carrying the serialized parameters.
const SPEC_FIELD: &str = "graphspec";

/// Client-side call the endpoint's response feeds its payload into. Its
/// presence is the exchange's success marker; error pages never emit it.
pub(crate) const CHART_CALL: &str = "drawChart";

/// Opaque transport payload from the rendering endpoint. Transient,
/// discarded after parsing.
#[derive(Debug, Clone)]
pub struct RawGraphResponse {
    pub status: u16,
    pub body: String,
}

/// Replays the AJAX exchange using recovered parameters.
pub struct GraphProtocolClient {
    client: HttpClient,
    base_url: String,
}

impl GraphProtocolClient {
    pub fn new(client: HttpClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Serialize [`GraphParameters`] to the exact nested shape the
    /// endpoint expects. Key names and nesting mirror the real client
    /// verbatim.
    pub fn wire_body(params: &GraphParameters) -> String {
        json!({
            "graph_recipe": params.recipe,
            "graph_data_range": {
                "start": params.data_range.start,
                "end": params.data_range.end,
                "step": params.data_range.step,
            },
            "graph_render_config": params.render_config,
            "graph_display_id": params.display_id,
        })
        .to_string()
    }

    /// Replay the exchange. No retries here — a failed exchange is a
    /// fallback trigger or fatal, decided by the orchestrator; repeating
    /// a possibly malformed request would hammer an internal endpoint.
    pub async fn request(
        &self,
        params: &GraphParameters,
        session: &mut Session,
    ) -> Result<RawGraphResponse, ExtractError> {
        let url = format!("{}{}", self.base_url, GRAPH_ENDPOINT);
        let form = [(SPEC_FIELD.to_string(), Self::wire_body(params))];

        let resp = self
            .client
            .post_form(&url, &form, &session.request_headers())
            .await
            .map_err(|e| ExtractError::Protocol {
                status: None,
                snippet: format!("transport error: {e}"),
            })?;

        if SessionAuthenticator::is_expired(&resp) {
            session.invalidate();
            return Err(ExtractError::Authentication {
                status: Some(resp.status),
                detail: "session expired during graph exchange".to_string(),
            });
        }
        if !(200..300).contains(&resp.status) {
            return Err(ExtractError::Protocol {
                status: Some(resp.status),
                snippet: snippet(&resp.body),
            });
        }
        if !resp.body.contains(&format!("{CHART_CALL}(")) {
            return Err(ExtractError::Protocol {
                status: Some(resp.status),
                snippet: format!("success marker missing: {}", snippet(&resp.body)),
            });
        }

        session.touch();
        tracing::debug!(display_id = %params.display_id, bytes = resp.body.len(), "graph exchange complete");
        Ok(RawGraphResponse {
            status: resp.status,
            body: resp.body,
        })
    }
}
