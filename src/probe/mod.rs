//! Image prober: characterize a candidate from a bounded byte prefix
//!
//! A probe requests only the first [`ProbeConfig::range_bytes`] bytes, checks
//! that the payload is a raster image, and reads dimensions straight from the
//! JPEG/PNG/WebP header without decoding.

pub mod sniff;

use crate::config::ProbeConfig;
use crate::error::{Error, ProbeError, Result};
use crate::http::HttpClient;
use crate::types::{ImageFormat, ProbeResult};
use crate::utils::{is_raster_content_type, normalize_content_type};
use reqwest::header;
use std::sync::Arc;

/// Prefix prober sharing the engine's retrying HTTP client
#[derive(Clone, Debug)]
pub struct ImageProber {
    http: Arc<HttpClient>,
    config: ProbeConfig,
}

impl ImageProber {
    /// Create a prober
    pub fn new(http: Arc<HttpClient>, config: ProbeConfig) -> Self {
        Self { http, config }
    }

    /// Probe a URL
    ///
    /// # Errors
    /// - [`ProbeError::NotAnImage`] for non-`image/*` or SVG payloads
    /// - [`ProbeError::TooSmall`] when the sample is below the plausibility floor
    /// - transport errors from the HTTP client (after its retries)
    pub async fn probe(&self, url: &str, referer: Option<&str>) -> Result<ProbeResult> {
        let mut response = self
            .http
            .get_range(url, referer, self.config.range_bytes)
            .await?;

        let status = response.status();
        let declared_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let range_total = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);
        let content_length = response.content_length();

        // Cheap rejection before reading anything
        if let Some(ct) = &declared_type
            && !is_raster_content_type(ct)
            && !is_vague_content_type(ct)
        {
            return Err(not_an_image(url, declared_type));
        }

        let limit = self.config.range_bytes as usize;
        let mut buf: Vec<u8> = Vec::with_capacity(limit.min(64 * 1024));
        while buf.len() < limit {
            let chunk = response
                .chunk()
                .await
                .map_err(|e| Error::network(url, format!("failed to read probe body: {}", e)))?;
            let Some(chunk) = chunk else {
                break;
            };
            let take = chunk.len().min(limit - buf.len());
            buf.extend_from_slice(&chunk[..take]);
        }

        let sniffed = sniff::detect_format(&buf);
        let (content_type, format) = match (&declared_type, sniffed) {
            (Some(ct), sniffed) if is_raster_content_type(ct) => (
                normalize_content_type(ct),
                sniffed.unwrap_or(ImageFormat::Other),
            ),
            // Missing or octet-stream content type: trust the magic bytes only
            (_, Some(format)) => (format.mime_type().to_string(), format),
            (_, None) => return Err(not_an_image(url, declared_type)),
        };

        let sampled = buf.len() as u64;
        if sampled < self.config.min_bytes {
            return Err(ProbeError::TooSmall {
                url: url.to_string(),
                bytes: sampled,
                min_bytes: self.config.min_bytes,
            }
            .into());
        }

        // A 206 Content-Length describes the slice, not the file
        let byte_length = range_total
            .or(if status == reqwest::StatusCode::PARTIAL_CONTENT {
                None
            } else {
                content_length
            })
            .unwrap_or(sampled);

        let (width, height) = match sniff::dimensions(format, &buf) {
            Some((w, h)) => (Some(w), Some(h)),
            None => (None, None),
        };

        tracing::debug!(
            url = url,
            content_type = %content_type,
            byte_length = byte_length,
            width = ?width,
            height = ?height,
            "Probed candidate"
        );

        Ok(ProbeResult {
            content_type,
            byte_length,
            format,
            width,
            height,
        })
    }
}

fn not_an_image(url: &str, content_type: Option<String>) -> Error {
    ProbeError::NotAnImage {
        url: url.to_string(),
        content_type,
    }
    .into()
}

/// Missing or generic binary content type, settled by sniffing
pub(crate) fn is_vague_content_type(content_type: &str) -> bool {
    matches!(
        normalize_content_type(content_type).as_str(),
        "" | "application/octet-stream" | "binary/octet-stream"
    )
}

/// Total size from `Content-Range: bytes 0-65535/123456`; `*` yields None
fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::sniff::fixtures;
    use super::*;
    use crate::config::{HttpConfig, RetryConfig};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prober() -> ImageProber {
        let retry = RetryConfig {
            max_attempts: 0,
            initial_delay: Duration::from_millis(1),
            ..Default::default()
        };
        let http = Arc::new(HttpClient::new(&HttpConfig::default(), retry).unwrap());
        ImageProber::new(
            http,
            ProbeConfig {
                range_bytes: 2048,
                min_bytes: 256,
            },
        )
    }

    #[test]
    fn content_range_total_parsing() {
        assert_eq!(parse_content_range_total("bytes 0-2047/650000"), Some(650000));
        assert_eq!(parse_content_range_total("bytes 0-2047/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[tokio::test]
    async fn probe_reads_dimensions_and_declared_total() {
        let server = MockServer::start().await;
        let body = fixtures::jpeg(1200, 1600, 2048);
        Mock::given(method("GET"))
            .and(path("/cover.jpg"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("content-type", "image/jpeg")
                    .insert_header("content-range", "bytes 0-2047/650000")
                    .set_body_bytes(body),
            )
            .mount(&server)
            .await;

        let result = prober()
            .probe(&format!("{}/cover.jpg", server.uri()), None)
            .await
            .unwrap();

        assert_eq!(result.content_type, "image/jpeg");
        assert_eq!(result.byte_length, 650000);
        assert_eq!(result.format, ImageFormat::Jpeg);
        assert_eq!(result.dimensions(), Some((1200, 1600)));
    }

    #[tokio::test]
    async fn probe_uses_content_length_when_range_is_ignored() {
        let server = MockServer::start().await;
        let body = fixtures::png(900, 1300, 5000);
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(body),
            )
            .mount(&server)
            .await;

        let result = prober().probe(&server.uri(), None).await.unwrap();

        // Whole body was sent, only the prefix was read
        assert_eq!(result.byte_length, 5000);
        assert_eq!(result.dimensions(), Some((900, 1300)));
    }

    #[tokio::test]
    async fn probe_rejects_html_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    "<html>not found</html>".repeat(100),
                    "text/html; charset=utf-8",
                ),
            )
            .mount(&server)
            .await;

        let err = prober().probe(&server.uri(), None).await.unwrap_err();
        assert!(matches!(err, Error::Probe(ProbeError::NotAnImage { .. })));
    }

    #[tokio::test]
    async fn probe_rejects_svg() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    "<svg xmlns=\"http://www.w3.org/2000/svg\"/>".repeat(50),
                    "image/svg+xml",
                ),
            )
            .mount(&server)
            .await;

        let err = prober().probe(&server.uri(), None).await.unwrap_err();
        assert!(matches!(err, Error::Probe(ProbeError::NotAnImage { .. })));
    }

    #[tokio::test]
    async fn probe_rejects_tiny_buffers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/gif")
                    .set_body_bytes(b"GIF89a\x01\x00\x01\x00".to_vec()),
            )
            .mount(&server)
            .await;

        let err = prober().probe(&server.uri(), None).await.unwrap_err();
        match err {
            Error::Probe(ProbeError::TooSmall { bytes, min_bytes, .. }) => {
                assert_eq!(bytes, 10);
                assert_eq!(min_bytes, 256);
            }
            other => panic!("expected TooSmall, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn probe_sniffs_octet_stream_payloads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/octet-stream")
                    .set_body_bytes(fixtures::webp_vp8x(1000, 1400, 1024)),
            )
            .mount(&server)
            .await;

        let result = prober().probe(&server.uri(), None).await.unwrap();
        assert_eq!(result.content_type, "image/webp");
        assert_eq!(result.dimensions(), Some((1000, 1400)));
    }

    #[tokio::test]
    async fn probe_tolerates_unknown_dimensions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/avif")
                    .set_body_bytes(vec![0u8; 1024]),
            )
            .mount(&server)
            .await;

        let result = prober().probe(&server.uri(), None).await.unwrap();
        assert_eq!(result.format, ImageFormat::Other);
        assert_eq!(result.dimensions(), None);
    }
}
