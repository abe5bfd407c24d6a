//! Retrying HTTP client
//!
//! Thin wrapper over [`reqwest::Client`] that carries the fixed header set
//! from [`HttpConfig`] and classifies failures: connection errors, timeouts,
//! HTTP 429 and 5xx become [`Error::Network`] and are retried with backoff;
//! every other 4xx becomes [`Error::HttpStatus`] and fails immediately.

use crate::config::{HttpConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Request, Response, StatusCode};

/// HTTP client with an immutable header configuration and centralized retries
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpClient {
    /// Build a client from its header/timeout configuration and retry policy
    ///
    /// # Errors
    /// Returns [`Error::Config`] if a configured header is not a valid HTTP header
    pub fn new(http: &HttpConfig, retry: RetryConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header_value("http.accept_language", &http.accept_language)?,
        );
        for (name, value) in &http.extra_headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::Config {
                message: format!("invalid header name '{}': {}", name, e),
                key: Some("http.extra_headers".to_string()),
            })?;
            headers.insert(name, header_value("http.extra_headers", value)?);
        }

        let client = reqwest::Client::builder()
            .timeout(http.timeout)
            .user_agent(http.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, retry })
    }

    /// Retry policy used by this client
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Build a GET request with an optional Referer
    pub fn get_request(&self, url: &str, referer: Option<&str>) -> Result<Request> {
        let mut builder = self.client.get(url);
        if let Some(referer) = referer {
            builder = builder.header(header::REFERER, referer);
        }
        builder
            .build()
            .map_err(|e| Error::Other(format!("Failed to build request for '{}': {}", url, e)))
    }

    /// Execute a request, retrying transient failures
    ///
    /// Only the status line is awaited; callers stream or read the body.
    pub async fn perform(&self, request: Request) -> Result<Response> {
        let url = request.url().to_string();
        let url = url.as_str();
        let request = &request;
        with_retry(&self.retry, || async move {
            let attempt = request
                .try_clone()
                .ok_or_else(|| Error::Other(format!("request to '{}' cannot be retried", url)))?;
            self.execute_once(attempt).await
        })
        .await
    }

    /// GET a URL, retrying transient failures
    pub async fn get(&self, url: &str, referer: Option<&str>) -> Result<Response> {
        let request = self.get_request(url, referer)?;
        self.perform(request).await
    }

    /// GET only the first `len` bytes of a URL (`Range: bytes=0-{len-1}`)
    ///
    /// Servers are free to ignore the header and answer 200 with the full body;
    /// callers must stop reading after `len` bytes.
    pub async fn get_range(&self, url: &str, referer: Option<&str>, len: u64) -> Result<Response> {
        let mut request = self.get_request(url, referer)?;
        let range = format!("bytes=0-{}", len.saturating_sub(1));
        request.headers_mut().insert(
            header::RANGE,
            HeaderValue::from_str(&range)
                .map_err(|e| Error::Other(format!("invalid range header: {}", e)))?,
        );
        self.perform(request).await
    }

    /// GET a page and read it as text
    ///
    /// Body read failures are retried together with the request.
    pub async fn get_text(&self, url: &str, referer: Option<&str>) -> Result<String> {
        let request = self.get_request(url, referer)?;
        let request = &request;
        with_retry(&self.retry, || async move {
            let attempt = request
                .try_clone()
                .ok_or_else(|| Error::Other(format!("request to '{}' cannot be retried", url)))?;
            let response = self.execute_once(attempt).await?;
            response
                .text()
                .await
                .map_err(|e| Error::network(url, format!("failed to read body: {}", e)))
        })
        .await
    }

    async fn execute_once(&self, request: Request) -> Result<Response> {
        let url = request.url().to_string();
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| classify_transport_error(&url, e))?;
        check_status(&url, response)
    }
}

fn header_value(key: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::Config {
        message: format!("invalid header value '{}': {}", value, e),
        key: Some(key.to_string()),
    })
}

/// Map a reqwest failure to the engine's taxonomy
fn classify_transport_error(url: &str, e: reqwest::Error) -> Error {
    if e.is_builder() {
        return Error::Other(format!("invalid request for '{}': {}", url, e));
    }
    let message = if e.is_timeout() {
        format!("timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    };
    Error::network(url, message)
}

/// Turn non-success statuses into errors: 429 and 5xx are transient
pub(crate) fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Err(Error::Network {
            url: url.to_string(),
            status: Some(status.as_u16()),
            message: format!("server answered {}", status),
        });
    }
    Err(Error::HttpStatus {
        url: url.to_string(),
        status: status.as_u16(),
    })
}
