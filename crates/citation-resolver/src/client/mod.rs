//! HTTP session shared by all resolvers.
//!
//! Provides async HTTP client with:
//! - Connection pooling via reqwest
//! - Retry middleware with exponential backoff for transient failures
//! - Per-host politeness limiting
//! - An in-run page memo so several resolvers share one fetch of a page

mod limiter;

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use sha2::{Digest, Sha256};
use url::Url;

pub use limiter::HostLimiter;

use crate::config::{Config, defaults};
use crate::error::{ClientError, ClientResult};

/// Accept header for HTML pages.
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8";

/// Accept header for JSON APIs.
pub const ACCEPT_JSON: &str = "application/json";

/// Accept header for DOI content negotiation.
pub const ACCEPT_CSL_JSON: &str = "application/vnd.citationstyles.csl+json";

/// A fetched response body with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// URL that was requested.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    /// HTTP status.
    pub status: u16,
    /// Content-Type header, if any.
    pub content_type: Option<String>,
    /// Raw body.
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Body decoded as UTF-8, lossily.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns true if the body is a PDF document.
    #[must_use]
    pub fn is_pdf(&self) -> bool {
        self.body.starts_with(b"%PDF")
            || self.content_type.as_deref().is_some_and(|ct| ct.contains("application/pdf"))
    }

    /// Returns true if the body looks like HTML.
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("html"))
    }

    /// Host of the final URL.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        host_of(&self.final_url)
    }
}

/// HTTP client used by the resolver chain.
#[derive(Clone)]
pub struct HttpClient {
    /// HTTP client with middleware.
    client: ClientWithMiddleware,

    /// In-run page memo.
    pages: Cache<String, Arc<FetchedPage>>,

    /// Politeness limiter shared by every clone.
    limiter: Arc<HostLimiter>,

    /// Request timeout, reported on timeouts.
    timeout: Duration,
}

impl HttpClient {
    /// Create a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> ClientResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent())
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(defaults::MAX_KEEPALIVE)
            .pool_idle_timeout(defaults::KEEPALIVE_EXPIRY)
            .gzip(true)
            .build()?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(500), Duration::from_secs(30))
            .build_with_max_retries(config.max_retries);

        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        let pages = Cache::builder()
            .max_capacity(config.page_cache_max_size)
            .time_to_live(config.page_cache_ttl.max(Duration::from_millis(1)))
            .build();

        Ok(Self {
            client,
            pages,
            limiter: Arc::new(HostLimiter::new(config.politeness_delay)),
            timeout: config.request_timeout,
        })
    }

    /// Fetch a URL with the given Accept header.
    ///
    /// Responses are memoized for the lifetime of the client.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-success status.
    pub async fn fetch(&self, url: &str, accept: &str) -> ClientResult<Arc<FetchedPage>> {
        let key = memo_key(accept, url);
        if let Some(page) = self.pages.get(&key).await {
            tracing::debug!(url, "Page memo hit");
            return Ok(page);
        }

        let host = host_of(url).ok_or_else(|| ClientError::bad_request(format!("invalid URL: {url}")))?;
        self.limiter.wait(&host).await;

        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = match self.handle_response(url, response).await {
            Ok(response) => response,
            Err(e) => {
                if let Some(delay) = e.retry_after() {
                    self.limiter.back_off(&host, delay);
                }
                if e.is_retryable() {
                    tracing::warn!(url, error = %e, "Transient provider failure");
                }
                return Err(e);
            }
        };
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);
        let body = response.bytes().await?.to_vec();

        tracing::debug!(
            url,
            status,
            bytes = body.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Fetched"
        );

        let page = Arc::new(FetchedPage { url: url.to_string(), final_url, status, content_type, body });
        self.pages.insert(key, Arc::clone(&page)).await;
        Ok(page)
    }

    /// GET a JSON document with query parameters.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, a non-success status or an
    /// undecodable body.
    pub async fn get_json<T>(&self, url: &str, params: &[(&str, &str)]) -> ClientResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut full =
            Url::parse(url).map_err(|e| ClientError::bad_request(format!("invalid URL {url}: {e}")))?;
        if !params.is_empty() {
            full.query_pairs_mut().extend_pairs(params);
        }
        let page = self.fetch(full.as_str(), ACCEPT_JSON).await?;
        serde_json::from_slice(&page.body).map_err(ClientError::from)
    }

    /// Handle provider response status codes.
    async fn handle_response(
        &self,
        url: &str,
        response: reqwest::Response,
    ) -> ClientResult<reqwest::Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        match status.as_u16() {
            429 => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);

                Err(ClientError::rate_limited(retry_after))
            }
            401 | 403 => Err(ClientError::blocked(status.as_u16(), url)),
            404 | 410 => Err(ClientError::not_found(url)),
            400 => {
                let text = response.text().await.unwrap_or_default();
                Err(ClientError::bad_request(text))
            }
            500..=599 => {
                let text = response.text().await.unwrap_or_default();
                Err(ClientError::server(status.as_u16(), text))
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                Err(ClientError::UnexpectedStatus { status: status.as_u16(), message: text })
            }
        }
    }

    fn map_send_error(&self, error: reqwest_middleware::Error) -> ClientError {
        match error {
            reqwest_middleware::Error::Reqwest(e) if e.is_timeout() => ClientError::Timeout(self.timeout),
            reqwest_middleware::Error::Reqwest(e) => ClientError::Http(e),
            other => ClientError::Middleware(other),
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("memoized_pages", &self.pages.entry_count())
            .field("limiter", &self.limiter)
            .finish()
    }
}

/// Lower-cased host of a URL.
#[must_use]
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_ascii_lowercase)
}

/// Generate memo key.
fn memo_key(accept: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(accept.as_bytes());
    hasher.update(b"|");
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}
