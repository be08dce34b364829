use reqwest::header::{self, HeaderMap, HeaderValue};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::AppError;
use crate::models::{RawDocument, VendorQuery};
use crate::vendors::VendorDirectory;

/// Browser-like agent used for the first attempt.
pub const PRIMARY_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Agent used for the single retry. Some sites gate on the first one.
pub const ALTERNATE_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15";

/// Hard cap on GET attempts per vendor.
const USER_AGENTS: [&str; 2] = [PRIMARY_USER_AGENT, ALTERNATE_USER_AGENT];

/// Payload of a successful attempt.
struct FetchedPage {
    status: u16,
    content_type: Option<String>,
    body: String,
}

/// Why a single attempt failed.
struct AttemptError {
    status: Option<u16>,
    message: String,
}

/// Retrieves vendor pages over HTTP.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    directory: Arc<VendorDirectory>,
}

impl PageFetcher {
    /// Creates a fetcher whose requests each time out after `timeout`.
    pub fn new(directory: Arc<VendorDirectory>, timeout: Duration) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create page fetcher: {}", e))
            })?;

        Ok(Self { client, directory })
    }

    pub fn directory(&self) -> &VendorDirectory {
        &self.directory
    }

    /// Fetches the canonical page for a vendor.
    ///
    /// Never fails: unresolved vendors yield a `not_found` document, and
    /// network errors or non-2xx replies yield a `failed` one after one retry
    /// with the alternate user agent.
    pub async fn fetch(&self, query: &VendorQuery) -> RawDocument {
        let Some(entry) = self.directory.resolve(query) else {
            tracing::warn!("Vendor '{}' not found in alias table", query.name());
            return RawDocument::not_found(query);
        };

        let mut last_error = AttemptError {
            status: None,
            message: "no attempt made".to_string(),
        };

        for (idx, user_agent) in USER_AGENTS.iter().enumerate() {
            let attempt = (idx + 1) as u8;
            tracing::info!(
                "Fetching {} for {} (attempt {}/{})",
                entry.url,
                entry.name,
                attempt,
                USER_AGENTS.len()
            );

            match self.attempt(&entry.url, user_agent).await {
                Ok(page) => {
                    tracing::info!(
                        "✓ Fetched {} ({} bytes, HTTP {})",
                        entry.url,
                        page.body.len(),
                        page.status
                    );
                    return RawDocument::success(
                        entry.name.clone(),
                        entry.url.clone(),
                        page.status,
                        page.content_type,
                        page.body,
                        attempt,
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Fetch attempt {} for {} failed: {}",
                        attempt,
                        entry.url,
                        e.message
                    );
                    last_error = e;
                }
            }
        }

        tracing::error!(
            "Giving up on {} after {} attempts: {}",
            entry.url,
            USER_AGENTS.len(),
            last_error.message
        );
        RawDocument::failed(
            entry.name.clone(),
            entry.url.clone(),
            last_error.status,
            last_error.message,
            USER_AGENTS.len() as u8,
        )
    }

    async fn attempt(&self, url: &str, user_agent: &str) -> Result<FetchedPage, AttemptError> {
        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| AttemptError {
                status: None,
                message: if e.is_timeout() {
                    format!("request timed out: {}", e)
                } else {
                    format!("request failed: {}", e)
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError {
                status: Some(status.as_u16()),
                message: format!("HTTP {}", status),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.text().await.map_err(|e| AttemptError {
            status: Some(status.as_u16()),
            message: format!("failed to read body: {}", e),
        })?;

        Ok(FetchedPage {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchStatus;
    use crate::vendors::VendorEntry;
    use wiremock::matchers::{method, path};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    /// Exact user-agent match. Browser agents contain commas, which the
    /// stock header matcher treats as value separators.
    struct UserAgent(&'static str);

    impl Match for UserAgent {
        fn matches(&self, request: &Request) -> bool {
            request
                .headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                == Some(self.0)
        }
    }

    fn fetcher_for(server: &MockServer, timeout: Duration) -> PageFetcher {
        let directory = VendorDirectory::new(vec![VendorEntry::new(
            "Acme CRM",
            format!("{}/pricing", server.uri()),
            &["acme"],
        )]);
        PageFetcher::new(Arc::new(directory), timeout).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_vendor_is_not_found() {
        let server = MockServer::start().await;
        let fetcher = fetcher_for(&server, Duration::from_secs(1));

        let doc = fetcher.fetch(&VendorQuery::new("UnknownCo").unwrap()).await;

        assert_eq!(doc.status, FetchStatus::NotFound);
        assert!(doc.body.is_empty());
        assert_eq!(doc.attempts, 0);
        assert!(doc.source_url.is_none());
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pricing"))
            .and(UserAgent(PRIMARY_USER_AGENT))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<p>Plans</p>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, Duration::from_secs(2));
        let doc = fetcher.fetch(&VendorQuery::new("ACME").unwrap()).await;

        assert!(doc.is_success());
        assert_eq!(doc.vendor, "Acme CRM");
        assert_eq!(doc.attempts, 1);
        assert_eq!(doc.http_status, Some(200));
        assert_eq!(doc.body, "<p>Plans</p>");
    }

    #[tokio::test]
    async fn test_retries_with_alternate_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pricing"))
            .and(UserAgent(ALTERNATE_USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pricing"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, Duration::from_secs(2));
        let doc = fetcher.fetch(&VendorQuery::new("acme").unwrap()).await;

        assert!(doc.is_success());
        assert_eq!(doc.attempts, 2);
    }

    #[tokio::test]
    async fn test_never_more_than_two_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pricing"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, Duration::from_secs(2));
        let doc = fetcher.fetch(&VendorQuery::new("acme").unwrap()).await;

        assert_eq!(doc.status, FetchStatus::Failed);
        assert_eq!(doc.http_status, Some(503));
        assert_eq!(doc.attempts, 2);
        assert!(doc.body.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_a_failed_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, Duration::from_millis(200));
        let doc = fetcher.fetch(&VendorQuery::new("acme").unwrap()).await;

        assert_eq!(doc.status, FetchStatus::Failed);
        assert!(doc.http_status.is_none());
    }
}
