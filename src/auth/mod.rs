//! Browser-like session authentication against the dashboard login flow.
//!
//! The platform's REST API exposes no historical data, so the engine logs
//! in the way a browser does — POST to the login form — and carries the
//! issued session cookies on every subsequent request. A `Session` is
//! owned by exactly one extraction call; nothing here is shared across
//! concurrent calls.

use chrono::{DateTime, Utc};

use crate::config::Credentials;
use crate::error::{snippet, ExtractError};
use crate::net::http::{HttpClient, HttpResponse};

/// Path of the dashboard login form, relative to the base URL.
const LOGIN_PATH: &str = "/login.htm";

/// Marker present in the rendered login form. Seeing it in any response
/// body means the server bounced us to login — i.e. the session expired.
const LOGIN_FORM_MARKER: &str = "id=\"loginform\"";

/// Cookie state for one authenticated extraction call.
#[derive(Debug, Clone)]
pub struct Session {
    /// `name=value` cookie pairs exactly as the server issued them.
    cookies: Vec<String>,
    valid: bool,
    last_used: DateTime<Utc>,
}

impl Session {
    /// Build a session from the cookies a login response issued.
    fn from_response(resp: &HttpResponse) -> Option<Self> {
        let cookies: Vec<String> = resp
            .header_all("set-cookie")
            .iter()
            .filter_map(|line| line.split(';').next())
            .map(|pair| pair.trim().to_string())
            .filter(|pair| !pair.is_empty())
            .collect();
        if cookies.is_empty() {
            return None;
        }
        Some(Self {
            cookies,
            valid: true,
            last_used: Utc::now(),
        })
    }

    /// Value for the `Cookie` request header.
    pub fn cookie_header(&self) -> String {
        self.cookies.join("; ")
    }

    /// Request headers that attach this session to an outgoing call.
    pub fn request_headers(&self) -> Vec<(String, String)> {
        vec![("cookie".to_string(), self.cookie_header())]
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Mark the session expired. The authenticator may redeem this once
    /// per extraction call via [`SessionAuthenticator::ensure_valid`].
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Record that the session was just used successfully.
    pub fn touch(&mut self) {
        self.last_used = Utc::now();
    }

    pub fn last_used(&self) -> DateTime<Utc> {
        self.last_used
    }
}

/// Performs the login flow and keeps the resulting session valid.
pub struct SessionAuthenticator {
    client: HttpClient,
    base_url: String,
    credentials: Credentials,
    /// Whether the single per-call re-authentication has been spent.
    reauth_used: bool,
}

impl SessionAuthenticator {
    pub fn new(client: HttpClient, base_url: &str, credentials: Credentials) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            reauth_used: false,
        }
    }

    /// POST the login form and build a session from the issued cookies.
    ///
    /// A login that lands back on the login form is a rejection even when
    /// the status is 200. Errors carry a redacted snippet, never the
    /// credentials themselves.
    pub async fn authenticate(&mut self) -> Result<Session, ExtractError> {
        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        let form = [
            ("username".to_string(), self.credentials.username.clone()),
            ("password".to_string(), self.credentials.password.clone()),
        ];

        let resp = self
            .client
            .post_form(&url, &form, &[])
            .await
            .map_err(|e| ExtractError::Authentication {
                status: None,
                detail: format!("login request failed: {e}"),
            })?;

        if resp.status >= 400 || resp.body.contains(LOGIN_FORM_MARKER) {
            return Err(ExtractError::Authentication {
                status: Some(resp.status),
                detail: format!("login rejected: {}", snippet(&resp.body)),
            });
        }

        Session::from_response(&resp).ok_or_else(|| ExtractError::Authentication {
            status: Some(resp.status),
            detail: "login succeeded but no session cookie was issued".to_string(),
        })
    }

    /// Re-authenticate in place if the session has been invalidated.
    ///
    /// Re-authentication happens at most once per extraction call; a
    /// session that expires again afterwards is fatal for the call.
    pub async fn ensure_valid(&mut self, session: &mut Session) -> Result<(), ExtractError> {
        if session.is_valid() {
            return Ok(());
        }
        if self.reauth_used {
            return Err(ExtractError::Authentication {
                status: None,
                detail: "session expired again after re-authentication".to_string(),
            });
        }
        self.reauth_used = true;
        tracing::info!("session expired, re-authenticating");
        *session = self.authenticate().await?;
        Ok(())
    }

    /// Heuristic: does this response indicate an expired or missing
    /// session? Redirect-to-login, an auth-error status, or the login
    /// form itself.
    pub fn is_expired(resp: &HttpResponse) -> bool {
        if resp.status == 401 || resp.status == 403 {
            return true;
        }
        if resp.is_redirect() {
            if let Some(location) = resp.header("location") {
                if location.contains("login") {
                    return true;
                }
            }
        }
        resp.body.contains(LOGIN_FORM_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(status: u16, headers: Vec<(String, String)>, body: &str) -> HttpResponse {
        HttpResponse {
            url: "https://monitor.example.com/x".into(),
            status,
            headers,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_session_from_set_cookie() {
        let r = resp(
            302,
            vec![
                ("set-cookie".into(), "monsess=abc123; Path=/; HttpOnly".into()),
                ("set-cookie".into(), "csrf=t0k; Path=/".into()),
            ],
            "",
        );
        let s = Session::from_response(&r).unwrap();
        assert_eq!(s.cookie_header(), "monsess=abc123; csrf=t0k");
        assert!(s.is_valid());
    }

    #[test]
    fn test_session_requires_cookie() {
        let r = resp(200, vec![], "<html>welcome</html>");
        assert!(Session::from_response(&r).is_none());
    }

    #[test]
    fn test_is_expired_on_auth_status() {
        assert!(SessionAuthenticator::is_expired(&resp(401, vec![], "")));
        assert!(SessionAuthenticator::is_expired(&resp(403, vec![], "")));
        assert!(!SessionAuthenticator::is_expired(&resp(500, vec![], "")));
    }

    #[test]
    fn test_is_expired_on_login_redirect() {
        let r = resp(
            302,
            vec![("location".into(), "/login.htm?back=%2Fdashboard".into())],
            "",
        );
        assert!(SessionAuthenticator::is_expired(&r));

        let elsewhere = resp(302, vec![("location".into(), "/overview.htm".into())], "");
        assert!(!SessionAuthenticator::is_expired(&elsewhere));
    }

    #[test]
    fn test_is_expired_on_login_form_body() {
        let r = resp(200, vec![], r#"<form id="loginform">…</form>"#);
        assert!(SessionAuthenticator::is_expired(&r));
    }

    #[test]
    fn test_invalidate_and_touch() {
        let r = resp(200, vec![("set-cookie".into(), "monsess=a".into())], "ok");
        let mut s = Session::from_response(&r).unwrap();
        let t0 = s.last_used();
        s.invalidate();
        assert!(!s.is_valid());
        s.touch();
        assert!(s.last_used() >= t0);
    }
}
