//! Error types for frontpage-dl
//!
//! This module provides the error taxonomy of the cover resolution engine:
//! - Transport errors split into retryable ([`Error::Network`]) and permanent
//!   ([`Error::HttpStatus`]) failures
//! - Probe rejections ([`ProbeError`]) and post-download validation failures
//!   ([`DownloadError`])
//! - Resolution-level outcomes ([`Error::NoCandidates`],
//!   [`Error::AllCandidatesFailed`]) that callers surface per publisher
//! - Machine-readable error codes for batch summaries

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for frontpage-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for frontpage-dl
///
/// Harvesters and probes convert most of these into "no candidate" locally;
/// only the resolver's final outcome is meant to reach the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "sources.cdn_template")
        key: Option<String>,
    },

    /// Transient transport failure: connection error, timeout, HTTP 429 or 5xx
    #[error("network error fetching {url}: {message}")]
    Network {
        /// The URL that was being fetched
        url: String,
        /// HTTP status when the server answered (429/5xx), None for connection-level failures
        status: Option<u16>,
        /// Underlying cause
        message: String,
    },

    /// Permanent HTTP failure (any 4xx other than 429)
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that was being fetched
        url: String,
        /// The HTTP status code returned
        status: u16,
    },

    /// Probe rejected the candidate
    #[error("probe rejected candidate: {0}")]
    Probe(#[from] ProbeError),

    /// Full download or its validation failed
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// A candidate URL embeds a date that differs from the requested one
    #[error("strict date check failed for {url}: expected {expected}, found {found}")]
    StrictDateMismatch {
        /// The candidate URL carrying the date token
        url: String,
        /// The date that was requested
        expected: NaiveDate,
        /// The date token that was found in the URL
        found: String,
    },

    /// Every harvester returned an empty candidate list
    #[error("no candidates found for {publisher} on {date}")]
    NoCandidates {
        /// Publisher id as requested
        publisher: String,
        /// Requested date
        date: NaiveDate,
    },

    /// Candidates existed, but every probe or download failed
    #[error("all {attempts} candidates failed; last error: {last_cause}")]
    AllCandidatesFailed {
        /// Number of candidates that were tried
        attempts: usize,
        /// The error of the last candidate tried
        #[source]
        last_cause: Box<Error>,
        /// Per-candidate causes, in the order they were tried
        failures: Vec<CandidateFailure>,
    },

    /// Publisher id is not present in the roster
    #[error("unknown publisher: {0}")]
    UnknownPublisher(String),

    /// Alias chain loops back on itself
    #[error("alias cycle detected while resolving {0}")]
    AliasCycle(String),

    /// URL could not be parsed or joined
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// One failed attempt recorded in [`Error::AllCandidatesFailed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    /// Candidate URL
    pub url: String,
    /// Rendered cause of the failure
    pub cause: String,
}

impl std::fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.url, self.cause)
    }
}

/// Reasons the cheap prefix probe rejects a URL
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Content type is not a raster image (HTML error page, SVG, etc.)
    #[error("{url} is not a raster image (content type {content_type:?})")]
    NotAnImage {
        /// Probed URL
        url: String,
        /// Content type reported by the server, if any
        content_type: Option<String>,
    },

    /// Sampled buffer is below the plausibility floor
    #[error("{url} is too small: {bytes} bytes, minimum {min_bytes}")]
    TooSmall {
        /// Probed URL
        url: String,
        /// Number of bytes sampled
        bytes: u64,
        /// Configured floor
        min_bytes: u64,
    },
}

/// Full-download and materialization failures
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Final content type is not a raster image
    #[error("{url} served {content_type:?} instead of an image")]
    InvalidContentType {
        /// Downloaded URL
        url: String,
        /// Content type reported by the server, if any
        content_type: Option<String>,
    },

    /// Downloaded body is below the minimum size floor
    #[error("{url} is too small: {bytes} bytes, minimum {min_bytes}")]
    TooSmall {
        /// Downloaded URL
        url: String,
        /// Number of bytes received
        bytes: u64,
        /// Configured floor
        min_bytes: u64,
    },

    /// Body ended before the declared Content-Length
    #[error("{url} truncated: received {received} of {expected} bytes")]
    Truncated {
        /// Downloaded URL
        url: String,
        /// Bytes actually received
        received: u64,
        /// Bytes declared by the server
        expected: u64,
    },

    /// Atomic publish of the temporary file failed
    #[error("failed to move {} to {}: {reason}", .temp_path.display(), .final_path.display())]
    PublishFailed {
        /// Temporary artifact
        temp_path: PathBuf,
        /// Deterministic final path
        final_path: PathBuf,
        /// Underlying cause
        reason: String,
    },
}

impl Error {
    /// Machine-readable error code, suitable for batch summary files
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Network { .. } => "network_error",
            Error::HttpStatus { .. } => "http_status",
            Error::Probe(e) => match e {
                ProbeError::NotAnImage { .. } => "not_an_image",
                ProbeError::TooSmall { .. } => "too_small",
            },
            Error::Download(e) => match e {
                DownloadError::InvalidContentType { .. } => "invalid_content_type",
                DownloadError::TooSmall { .. } => "download_too_small",
                DownloadError::Truncated { .. } => "truncated",
                DownloadError::PublishFailed { .. } => "publish_failed",
            },
            Error::StrictDateMismatch { .. } => "strict_date_mismatch",
            Error::NoCandidates { .. } => "no_candidates",
            Error::AllCandidatesFailed { .. } => "all_candidates_failed",
            Error::UnknownPublisher(_) => "unknown_publisher",
            Error::AliasCycle(_) => "alias_cycle",
            Error::InvalidUrl(_) => "invalid_url",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// Shorthand for a network error without an HTTP status
    pub(crate) fn network(url: &str, message: impl Into<String>) -> Self {
        Error::Network {
            url: url.to_string(),
            status: None,
            message: message.into(),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 20).unwrap()
    }

    #[test]
    fn error_codes_distinguish_exhaustion_outcomes() {
        let none = Error::NoCandidates {
            publisher: "elpais".into(),
            date: date(),
        };
        let all_failed = Error::AllCandidatesFailed {
            attempts: 2,
            last_cause: Box::new(Error::HttpStatus {
                url: "https://example.com/a.jpg".into(),
                status: 404,
            }),
            failures: vec![],
        };

        assert_eq!(none.error_code(), "no_candidates");
        assert_eq!(all_failed.error_code(), "all_candidates_failed");
        assert_ne!(none.error_code(), all_failed.error_code());
    }

    #[test]
    fn nested_errors_get_specific_codes() {
        let probe = Error::from(ProbeError::TooSmall {
            url: "u".into(),
            bytes: 10,
            min_bytes: 1024,
        });
        let download = Error::from(DownloadError::Truncated {
            url: "u".into(),
            received: 10,
            expected: 20,
        });

        assert_eq!(probe.error_code(), "too_small");
        assert_eq!(download.error_code(), "truncated");
    }

    #[test]
    fn all_candidates_failed_message_names_count_and_last_cause() {
        let err = Error::AllCandidatesFailed {
            attempts: 3,
            last_cause: Box::new(Error::from(DownloadError::TooSmall {
                url: "https://example.com/c.jpg".into(),
                bytes: 4000,
                min_bytes: 10240,
            })),
            failures: vec![CandidateFailure {
                url: "https://example.com/c.jpg".into(),
                cause: "too small".into(),
            }],
        };

        let msg = err.to_string();
        assert!(msg.contains("all 3 candidates failed"), "got: {msg}");
        assert!(msg.contains("4000 bytes"), "got: {msg}");
    }

    #[test]
    fn strict_date_mismatch_displays_both_dates() {
        let err = Error::StrictDateMismatch {
            url: "https://example.com/2025/12/19/a.jpg".into(),
            expected: date(),
            found: "2025-12-19".into(),
        };

        let msg = err.to_string();
        assert!(msg.contains("2025-12-20"));
        assert!(msg.contains("2025-12-19"));
    }
}
