//! Dashboard page retrieval and validation.
//!
//! Fetches the per-metric dashboard page for a target and time window,
//! then validates that the response really is the dashboard (status 200
//! plus a marker element) before handing it to the parameter extractor.
//! A transient transport failure is retried exactly once with a short
//! backoff; HTTP error statuses are never retried here.

use std::time::Duration;

use crate::auth::{Session, SessionAuthenticator};
use crate::config::TimeWindow;
use crate::error::{snippet, ExtractError};
use crate::net::http::{HttpClient, HttpResponse};

/// Path of the per-metric dashboard page.
const GRAPH_PAGE_PATH: &str = "/dashboard/graph.htm";

/// Marker that distinguishes the real dashboard page from error shells and
/// maintenance pages that also answer 200.
const PAGE_MARKER: &str = "id=\"graphpane\"";

/// Backoff before the single transient-failure retry.
const RETRY_BACKOFF: Duration = Duration::from_millis(400);

/// A fetched, validated dashboard page.
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    pub url: String,
    pub body: String,
}

/// Retrieves the dashboard page for a target and window.
pub struct PageFetcher {
    client: HttpClient,
    base_url: String,
}

impl PageFetcher {
    pub fn new(client: HttpClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Dashboard URL for a target and time window.
    pub fn page_url(&self, target: &str, window: &TimeWindow) -> String {
        let id: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
        format!(
            "{}{}?id={}&sdate={}&edate={}",
            self.base_url,
            GRAPH_PAGE_PATH,
            id,
            window.start.timestamp(),
            window.end.timestamp()
        )
    }

    /// Fetch and validate the dashboard page.
    ///
    /// Detected session expiry invalidates the session and surfaces as an
    /// `Authentication` error rather than a `Fetch` error, so the
    /// orchestrator can redeem its single re-authentication.
    pub async fn fetch(
        &self,
        target: &str,
        window: &TimeWindow,
        session: &mut Session,
    ) -> Result<HtmlDocument, ExtractError> {
        let url = self.page_url(target, window);
        let resp = self.get_with_retry(&url, session).await?;

        if SessionAuthenticator::is_expired(&resp) {
            session.invalidate();
            return Err(ExtractError::Authentication {
                status: Some(resp.status),
                detail: "session expired while fetching dashboard page".to_string(),
            });
        }
        if resp.status != 200 {
            return Err(ExtractError::Fetch {
                url,
                status: Some(resp.status),
                snippet: snippet(&resp.body),
            });
        }
        if !resp.body.contains(PAGE_MARKER) {
            return Err(ExtractError::Fetch {
                url,
                status: Some(resp.status),
                snippet: format!("page marker missing: {}", snippet(&resp.body)),
            });
        }

        session.touch();
        tracing::debug!(target, %url, bytes = resp.body.len(), "dashboard page fetched");
        Ok(HtmlDocument {
            url,
            body: resp.body,
        })
    }

    /// One retry on transient transport failure (timeout, connection
    /// reset). 4xx/5xx responses come back as `Ok` from the client and are
    /// never retried.
    async fn get_with_retry(
        &self,
        url: &str,
        session: &Session,
    ) -> Result<HttpResponse, ExtractError> {
        let headers = session.request_headers();
        match self.client.get(url, &headers).await {
            Ok(resp) => Ok(resp),
            Err(first) if first.is_timeout() || first.is_connect() => {
                tracing::warn!(%url, error = %first, "transient fetch failure, retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.client
                    .get(url, &headers)
                    .await
                    .map_err(|e| ExtractError::Fetch {
                        url: url.to_string(),
                        status: None,
                        snippet: format!("transport error after retry: {e}"),
                    })
            }
            Err(e) => Err(ExtractError::Fetch {
                url: url.to_string(),
                status: None,
                snippet: format!("transport error: {e}"),
            }),
        }
    }
}
