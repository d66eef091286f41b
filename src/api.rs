//! News search API client with a fixed-rate throttle.
//!
//! # Architecture
//!
//! The module uses a trait-based design for flexibility:
//! - [`PageSource`]: Core trait fetching one page of search results
//! - [`NewsApiClient`]: The HTTP implementation backed by `reqwest`
//! - [`Throttled`]: Decorator that spaces consecutive requests by a fixed delay
//!
//! # Throttle
//!
//! The throttle is a courtesy to the API's rate limit, not a retry policy:
//! the first request goes out immediately and every later one waits the
//! configured delay (1 second by default). Failures are never retried here;
//! the whole run is retried by the external scheduler.

use crate::config::ExtractSettings;
use crate::error::ExtractError;
use crate::models::{ApiPage, RunDate};
use crate::utils::{looks_truncated, truncate_for_log};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};
use url::Url;

/// Trait for fetching pages of search results.
///
/// Implementors return one decoded page per call. This abstraction lets the
/// extractor be driven by the HTTP client, a decorator around it, or a fake.
pub trait PageSource {
    /// Fetch page `page` (1-based).
    ///
    /// # Errors
    ///
    /// Transport failures, non-success statuses, API error bodies and
    /// undecodable JSON are all reported as [`ExtractError`].
    async fn fetch_page(&self, page: u32) -> Result<ApiPage, ExtractError>;
}

/// HTTP client for the news search endpoint.
///
/// The date lower bound, credential and page size are fixed at construction
/// so every page of one run carries the same query parameters.
pub struct NewsApiClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    from: String,
    page_size: u32,
}

impl NewsApiClient {
    /// Build a client for one run.
    ///
    /// Every request made by the client is bounded by
    /// `settings.request_timeout`.
    pub fn new(settings: &ExtractSettings, run_date: RunDate) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ExtractError::Client)?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            from: run_date.query_param(),
            page_size: settings.page_size,
        })
    }

    /// The request URL for `page`: the configured base URL (and whatever
    /// static query it carries) plus `from`, `apiKey`, `pageSize` and `page`.
    pub fn page_url(&self, page: u32) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("from", &self.from)
            .append_pair("apiKey", &self.api_key)
            .append_pair("pageSize", &self.page_size.to_string())
            .append_pair("page", &page.to_string());
        url
    }
}

impl fmt::Debug for NewsApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // api_key deliberately omitted
        f.debug_struct("NewsApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("from", &self.from)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl PageSource for NewsApiClient {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_page(&self, page: u32) -> Result<ApiPage, ExtractError> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(self.page_url(page))
            .send()
            .await
            .map_err(|source| ExtractError::Http { page, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ExtractError::Http { page, source })?;
        debug!(
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Received page"
        );

        match serde_json::from_str::<ApiPage>(&body) {
            Ok(api_page) if api_page.is_error() => Err(ExtractError::Api {
                page,
                code: api_page.code.unwrap_or_else(|| status.as_u16().to_string()),
                message: api_page.message.unwrap_or_default(),
            }),
            Ok(api_page) if status.is_success() => Ok(api_page),
            _ if !status.is_success() => Err(ExtractError::Status {
                page,
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            }),
            Ok(api_page) => Ok(api_page),
            Err(source) => {
                warn!(
                    truncated = looks_truncated(&source),
                    body_preview = %truncate_for_log(&body, 300),
                    "Page body is not valid JSON"
                );
                Err(ExtractError::Decode { page, source })
            }
        }
    }
}

/// Wrapper that spaces out requests to any [`PageSource`] by a fixed delay.
///
/// The first call passes straight through; every subsequent call sleeps for
/// `delay` before delegating.
pub struct Throttled<T> {
    /// The underlying page source.
    inner: T,
    /// Pause inserted before every request but the first.
    delay: Duration,
    started: AtomicBool,
}

impl<T> Throttled<T>
where
    T: PageSource,
{
    pub fn new(inner: T, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            started: AtomicBool::new(false),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Throttled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttled")
            .field("inner", &self.inner)
            .field("delay", &self.delay)
            .finish()
    }
}

impl<T> PageSource for Throttled<T>
where
    T: PageSource,
{
    async fn fetch_page(&self, page: u32) -> Result<ApiPage, ExtractError> {
        if self.started.swap(true, Ordering::Relaxed) && !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.inner.fetch_page(page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::AtomicU32;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: &str) -> ExtractSettings {
        ExtractSettings {
            api_key: "secret".to_string(),
            base_url: Url::parse(base_url).unwrap(),
            page_size: 10,
            max_pages: 100,
            page_delay: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
        }
    }

    fn run_date() -> RunDate {
        RunDate::new(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
    }

    #[test]
    fn test_page_url_keeps_static_query() {
        let client = NewsApiClient::new(
            &settings("https://newsapi.org/v2/everything?q=rust&language=en"),
            run_date(),
        )
        .unwrap();

        let url = client.page_url(3);
        assert_eq!(
            url.as_str(),
            "https://newsapi.org/v2/everything?q=rust&language=en&from=2024-01-15&apiKey=secret&pageSize=10&page=3"
        );
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = NewsApiClient::new(&settings("https://newsapi.org/v2/everything"), run_date())
            .unwrap();
        assert!(!format!("{client:?}").contains("secret"));
    }

    #[tokio::test]
    async fn test_fetch_page_decodes_articles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/everything"))
            .and(query_param("from", "2024-01-15"))
            .and(query_param("page", "1"))
            .and(query_param("pageSize", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"status":"ok","totalResults":1,"articles":[{"source":{"id":null,"name":"Wired"},"title":"Hi"}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = NewsApiClient::new(
            &settings(&format!("{}/v2/everything?q=rust", server.uri())),
            run_date(),
        )
        .unwrap();
        let page = client.fetch_page(1).await.unwrap();
        let articles = page.articles.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title.as_deref(), Some("Hi"));
    }

    #[tokio::test]
    async fn test_fetch_page_reports_api_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string(
                r#"{"status":"error","code":"apiKeyInvalid","message":"Your API key is invalid."}"#,
            ))
            .mount(&server)
            .await;

        let client = NewsApiClient::new(&settings(&server.uri()), run_date()).unwrap();
        match client.fetch_page(1).await {
            Err(ExtractError::Api { page, code, .. }) => {
                assert_eq!(page, 1);
                assert_eq!(code, "apiKeyInvalid");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_page_reports_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad gateway"))
            .mount(&server)
            .await;

        let client = NewsApiClient::new(&settings(&server.uri()), run_date()).unwrap();
        assert!(matches!(
            client.fetch_page(2).await,
            Err(ExtractError::Status { page: 2, status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_page_reports_invalid_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"articles\": ["))
            .mount(&server)
            .await;

        let client = NewsApiClient::new(&settings(&server.uri()), run_date()).unwrap();
        assert!(matches!(
            client.fetch_page(1).await,
            Err(ExtractError::Decode { page: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_page_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"status":"ok","articles":[]}"#)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let mut settings = settings(&server.uri());
        settings.request_timeout = Duration::from_millis(200);
        let client = NewsApiClient::new(&settings, run_date()).unwrap();
        match client.fetch_page(1).await {
            Err(ExtractError::Http { source, .. }) => assert!(source.is_timeout()),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[derive(Debug, Default)]
    struct CountingSource {
        calls: AtomicU32,
    }

    impl PageSource for CountingSource {
        async fn fetch_page(&self, _page: u32) -> Result<ApiPage, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ApiPage::default())
        }
    }

    #[tokio::test]
    async fn test_throttle_skips_delay_on_first_request() {
        let throttled = Throttled::new(CountingSource::default(), Duration::from_millis(100));

        let t0 = Instant::now();
        throttled.fetch_page(1).await.unwrap();
        assert!(t0.elapsed() < Duration::from_millis(100));

        throttled.fetch_page(2).await.unwrap();
        throttled.fetch_page(3).await.unwrap();
        assert!(t0.elapsed() >= Duration::from_millis(200));
        assert_eq!(throttled.inner.calls.load(Ordering::SeqCst), 3);
    }
}
