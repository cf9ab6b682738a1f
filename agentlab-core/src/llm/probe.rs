//! Rate-limit probe report
//!
//! A probe sends one tiny completion and records whatever rate-limit headers
//! the endpoint returns, so an operator can see how long to wait.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, SecondsFormat};
use reqwest::header::HeaderMap;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// The ping succeeded, so the caller is not rate limited right now
    pub ok: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
    /// Raw `retry-after` header
    pub retry_after: Option<String>,
    /// Raw `x-ratelimit-remaining` header
    pub remaining: Option<String>,
    /// Raw `x-ratelimit-limit` header
    pub limit: Option<String>,
    /// Raw `x-ratelimit-reset` header, epoch seconds
    pub reset: Option<String>,
}

impl ProbeReport {
    pub fn succeeded(status: u16) -> Self {
        Self {
            ok: true,
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn failed(status: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            status,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.retry_after = get("retry-after");
        self.remaining = get("x-ratelimit-remaining");
        self.limit = get("x-ratelimit-limit");
        self.reset = get("x-ratelimit-reset");
        self
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(429)
    }

    /// `retry-after` as whole seconds; fractional values are truncated
    pub fn retry_after_secs(&self) -> Option<u64> {
        let secs: f64 = self.retry_after.as_deref()?.trim().parse().ok()?;
        (secs.is_finite() && secs >= 0.0).then_some(secs as u64)
    }

    /// Human-readable wait derived from `retry-after`
    pub fn wait(&self) -> Option<String> {
        self.retry_after_secs().map(pretty_wait)
    }

    /// Local time at which `retry-after` elapses, counted from `now`
    pub fn ready_at(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let secs = i64::try_from(self.retry_after_secs()?).ok()?;
        now.checked_add_signed(ChronoDuration::try_seconds(secs)?)
    }

    /// `x-ratelimit-reset` rendered as an ISO 8601 UTC timestamp
    pub fn reset_utc(&self) -> Option<String> {
        self.reset.as_deref().and_then(reset_to_utc_iso)
    }
}

/// Format seconds as `"{h}h {m}m {s}s"`
pub fn pretty_wait(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{}h {}m {}s", hours, minutes, secs)
}

/// Convert epoch seconds to ISO 8601 in UTC, e.g. `2024-01-01T00:00:00+00:00`
pub fn reset_to_utc_iso(epoch_seconds: &str) -> Option<String> {
    let secs: i64 = epoch_seconds.trim().parse().ok()?;
    DateTime::from_timestamp(secs, 0).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_pretty_wait() {
        assert_eq!(pretty_wait(3725), "1h 2m 5s");
        assert_eq!(pretty_wait(0), "0h 0m 0s");
        assert_eq!(pretty_wait(59), "0h 0m 59s");
        assert_eq!(pretty_wait(86400), "24h 0m 0s");
    }

    #[test]
    fn test_reset_to_utc_iso() {
        assert_eq!(
            reset_to_utc_iso("1704067200").as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );
        assert_eq!(reset_to_utc_iso("soon"), None);
    }

    #[test]
    fn test_headers_are_captured() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("3725"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("50"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704067200"));

        let report = ProbeReport::failed(Some(429), "RateLimitReached").with_headers(&headers);
        assert!(!report.ok);
        assert!(report.is_rate_limited());
        assert_eq!(report.remaining.as_deref(), Some("0"));
        assert_eq!(report.limit.as_deref(), Some("50"));
        assert_eq!(report.wait().as_deref(), Some("1h 2m 5s"));
        assert_eq!(report.reset_utc().as_deref(), Some("2024-01-01T00:00:00+00:00"));

        let now = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let ready = report.ready_at(now).unwrap();
        assert_eq!(ready.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-01 11:02:05");
    }

    #[test]
    fn test_success_without_headers() {
        let report = ProbeReport::succeeded(200).with_headers(&HeaderMap::new());
        assert!(report.ok);
        assert_eq!(report.retry_after, None);
        assert_eq!(report.wait(), None);
        assert_eq!(report.error, None);
    }

    #[test]
    fn test_unparsable_retry_after() {
        let report = ProbeReport {
            retry_after: Some("later".into()),
            ..ProbeReport::default()
        };
        assert_eq!(report.retry_after_secs(), None);
    }
}
