//! Engine configuration and credential input.
//!
//! The surrounding system supplies these; the engine treats them as opaque
//! input and owns no credential storage.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Login credentials for the dashboard.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// Manual Debug so a logged config can never leak the password.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Absolute time window of an extraction request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// A window of the given length ending now.
    pub fn ending_now(period: Duration) -> Self {
        let end = Utc::now();
        Self {
            start: end - period,
            end,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Resolve a symbolic period ("15m", "1h", "24h", "7d", "4w") to a duration.
///
/// Returns `None` for anything outside the vocabulary — a typo'd period
/// must not silently become some default length.
pub fn resolve_period(symbol: &str) -> Option<Duration> {
    let s = symbol.trim().to_ascii_lowercase();
    let unit = s.chars().last()?;
    let digits = &s[..s.len() - unit.len_utf8()];
    let n: i64 = digits.parse().ok()?;
    if n <= 0 {
        return None;
    }
    match unit {
        'm' => Some(Duration::minutes(n)),
        'h' => Some(Duration::hours(n)),
        'd' => Some(Duration::days(n)),
        'w' => Some(Duration::weeks(n)),
        _ => None,
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the dashboard, e.g. `https://monitor.example.com`.
    pub base_url: String,
    pub credentials: Credentials,
    /// Deadline for each individual network step, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Symbolic period used when the caller supplies no window.
    #[serde(default = "default_period")]
    pub default_period: String,
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_period() -> String {
    "24h".to_string()
}

impl EngineConfig {
    /// Resolve an optional symbolic period into a window ending now.
    pub fn window_for(&self, period: Option<&str>) -> Option<TimeWindow> {
        let symbol = period.unwrap_or(&self.default_period);
        resolve_period(symbol).map(TimeWindow::ending_now)
    }
}
