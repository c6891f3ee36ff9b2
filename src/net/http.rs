//! Async HTTP client wrapping reqwest.
//!
//! Not a browser — just HTTP requests with a browser-like user agent.
//! Redirects are deliberately *not* followed: the auth layer treats
//! redirects as data (a redirect to the login page is how session expiry
//! is detected), so every 3xx is surfaced with its `Location` header
//! intact. Retry policy lives with the callers — the fetcher retries a
//! transient failure once, the protocol client never retries.

use std::time::Duration;

/// Response from an HTTP request.
///
/// All response headers are captured (not a filtered subset) because the
/// auth layer needs every `set-cookie` line.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Requested URL.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// All response headers, lowercased names, in arrival order.
    pub headers: Vec<(String, String)>,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    /// First value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of a repeated header (cookies arrive as several
    /// `set-cookie` lines).
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// HTTP client for the extraction engine.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for servers that reject HTTP/2.
    h1_client: reqwest::Client,
    timeout_ms: u64,
}

impl HttpClient {
    /// Create a new client with a standard Chrome user-agent and the given
    /// default per-request deadline.
    pub fn new(timeout_ms: u64) -> Self {
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                  AppleWebKit/537.36 (KHTML, like Gecko) \
                  Chrome/131.0.0.0 Safari/537.36";

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(ua)
            .build()
            .unwrap_or_default();

        let h1_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(ua)
            .http1_only()
            .build()
            .unwrap_or_default();

        Self {
            client,
            h1_client,
            timeout_ms,
        }
    }

    /// Perform a single GET request.
    ///
    /// Falls back to HTTP/1.1 on protocol errors (some front-ends reject
    /// HTTP/2); that is a transport-level repair, not a retry of a failed
    /// exchange.
    pub async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<HttpResponse, reqwest::Error> {
        match self.request_inner(&self.client, url, headers, None).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                let err_str = format!("{e}");
                if err_str.contains("http2")
                    || err_str.contains("protocol")
                    || err_str.contains("connection closed")
                {
                    self.request_inner(&self.h1_client, url, headers, None).await
                } else {
                    Err(e)
                }
            }
        }
    }

    /// POST form data (url-encoded).
    pub async fn post_form(
        &self,
        url: &str,
        form_fields: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<HttpResponse, reqwest::Error> {
        self.request_inner(&self.client, url, headers, Some(form_fields))
            .await
    }

    async fn request_inner(
        &self,
        client: &reqwest::Client,
        url: &str,
        headers: &[(String, String)],
        form: Option<&[(String, String)]>,
    ) -> Result<HttpResponse, reqwest::Error> {
        let mut builder = match form {
            Some(fields) => client.post(url).form(fields),
            None => client.get(url),
        };
        builder = builder.timeout(Duration::from_millis(self.timeout_ms));
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let r = builder.send().await?;
        let status = r.status().as_u16();

        let headers: Vec<(String, String)> = r
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();

        let body = r.text().await.unwrap_or_default();

        Ok(HttpResponse {
            url: url.to_string(),
            status,
            headers,
            body,
        })
    }
}
