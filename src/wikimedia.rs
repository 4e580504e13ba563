//! Wikimedia page-view API client.
//!
//! Fetches daily, user-agent-only, all-access page views for one article over
//! an inclusive date range from the per-article metrics endpoint:
//!
//! ```text
//! {api_base}/metrics/pageviews/per-article/{edition}/all-access/user/{article}/daily/{start}/{end}
//! ```
//!
//! Wikimedia's usage policy requires an identifying User-Agent with a contact
//! address; every request carries `PoliticianTracker/1.0 ({contact})`.
//!
//! Each subject gets exactly one attempt. Failures are logged and returned to
//! the caller as a [`FetchError`] so it can tell "no data" apart from "fetch
//! failed".

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::config::DateWindow;
use crate::error::FetchError;
use crate::models::{DailyRecord, PageviewsResponse};
use crate::utils::truncate_for_log;

pub const DEFAULT_API_BASE: &str = "https://wikimedia.org/api/rest_v1";
pub const DEFAULT_EDITION: &str = "en.wikipedia";
pub const USER_AGENT_PRODUCT: &str = "PoliticianTracker/1.0";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Anything that can produce a subject's daily history.
///
/// The driver only talks to this trait, so tests can stand in for the API.
pub trait HistorySource {
    /// Fetch every day in `window` for `subject`, in whatever order the
    /// source returns them.
    async fn fetch_history(
        &self,
        subject: &str,
        window: &DateWindow,
    ) -> Result<Vec<DailyRecord>, FetchError>;
}

/// `User-Agent` value identifying this tool and its operator.
pub fn user_agent(contact: &str) -> String {
    format!("{USER_AGENT_PRODUCT} ({contact})")
}

/// HTTP client for the per-article page-view endpoint.
#[derive(Debug, Clone)]
pub struct PageviewClient {
    http: Client,
    api_base: String,
    edition: String,
}

impl PageviewClient {
    /// Build a client with the identifying User-Agent and a fixed 15 second
    /// timeout.
    pub fn new(api_base: &Url, edition: &str, contact: &str) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(user_agent(contact))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.as_str().trim_end_matches('/').to_string(),
            edition: edition.to_string(),
        })
    }

    /// Full request URL for one subject and window.
    pub fn history_url(&self, subject: &str, window: &DateWindow) -> String {
        format!(
            "{}/metrics/pageviews/per-article/{}/all-access/user/{}/daily/{}/{}",
            self.api_base,
            self.edition,
            urlencoding::encode(subject),
            window.start_compact(),
            window.end_compact(),
        )
    }
}

impl HistorySource for PageviewClient {
    #[instrument(level = "info", skip(self, window), fields(start = %window.start_compact(), end = %window.end_compact()))]
    async fn fetch_history(
        &self,
        subject: &str,
        window: &DateWindow,
    ) -> Result<Vec<DailyRecord>, FetchError> {
        let url = self.history_url(subject, window);
        debug!(%url, "Requesting page-view history");
        let t0 = Instant::now();

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                error!(subject, error = %e, "Network error fetching history");
                return Err(e.into());
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                error!(subject, status = status.as_u16(), error = %e, "Failed reading response body");
                return Err(e.into());
            }
        };

        if !status.is_success() {
            error!(
                subject,
                status = status.as_u16(),
                body = %truncate_for_log(&body, 300),
                "Error fetching history"
            );
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PageviewsResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(
                    subject,
                    error = %e,
                    body = %truncate_for_log(&body, 300),
                    "Page-view response is not valid JSON"
                );
                return Err(e.into());
            }
        };

        info!(
            subject,
            days = parsed.items.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page-view history"
        );
        Ok(parsed.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{closed_port_url, serve};
    use chrono::NaiveDate;

    fn window() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        )
        .unwrap()
    }

    fn client(base: &str) -> PageviewClient {
        PageviewClient::new(&Url::parse(base).unwrap(), DEFAULT_EDITION, "ops@example.org").unwrap()
    }

    #[test]
    fn test_user_agent() {
        assert_eq!(
            user_agent("ops@example.org"),
            "PoliticianTracker/1.0 (ops@example.org)"
        );
    }

    #[test]
    fn test_history_url() {
        let client = client("https://wikimedia.org/api/rest_v1/");
        assert_eq!(
            client.history_url("Barack_Obama", &window()),
            "https://wikimedia.org/api/rest_v1/metrics/pageviews/per-article/en.wikipedia/all-access/user/Barack_Obama/daily/20240101/20240103"
        );
    }

    #[test]
    fn test_history_url_encodes_subject() {
        let client = client(DEFAULT_API_BASE);
        let url = client.history_url("AC/DC", &window());
        assert!(url.contains("/user/AC%2FDC/daily/"));
    }

    #[tokio::test]
    async fn test_fetch_success_returns_items() {
        let body = r#"{"items": [
            {"project": "en.wikipedia", "article": "Barack_Obama", "granularity": "daily",
             "timestamp": "2024010100", "access": "all-access", "agent": "user", "views": 100},
            {"project": "en.wikipedia", "article": "Barack_Obama", "granularity": "daily",
             "timestamp": "2024010200", "access": "all-access", "agent": "user", "views": 150}
        ]}"#;
        let (base, server) = serve(vec![("200 OK", body.to_string())]).await;

        let items = client(&base)
            .fetch_history("Barack_Obama", &window())
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].views, 150);

        let requests = server.await.unwrap();
        let request = requests[0].to_lowercase();
        assert!(request.starts_with(
            "get /metrics/pageviews/per-article/en.wikipedia/all-access/user/barack_obama/daily/20240101/20240103 "
        ));
        assert!(request.contains("user-agent: politiciantracker/1.0 (ops@example.org)"));
    }

    #[tokio::test]
    async fn test_fetch_missing_items_is_empty_success() {
        let (base, _server) = serve(vec![("200 OK", "{}".to_string())]).await;
        let items = client(&base).fetch_history("Nobody", &window()).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_server_error() {
        let (base, _server) =
            serve(vec![("500 Internal Server Error", r#"{"detail":"boom"}"#.to_string())]).await;

        let err = client(&base)
            .fetch_history("Barack_Obama", &window())
            .await
            .unwrap_err();
        match err {
            FetchError::Status { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let (base, _server) = serve(vec![("404 Not Found", "{}".to_string())]).await;
        let err = client(&base).fetch_history("Nobody", &window()).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_invalid_json() {
        let (base, _server) = serve(vec![("200 OK", "<html>".to_string())]).await;
        let err = client(&base).fetch_history("Nobody", &window()).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_network_error() {
        let base = closed_port_url().await;
        let err = client(&base)
            .fetch_history("Barack_Obama", &window())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
