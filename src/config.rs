//! Configuration types for frontpage-dl

use crate::error::{Error, Result};
use crate::scoring::ScoringWeights;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, path::PathBuf, time::Duration};

/// Main configuration for the cover resolution engine
///
/// Every field has a default, so `Config::default()` resolves against the
/// public kiosk mirror with conservative retry and size floors.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Fixed request headers and timeouts for the HTTP client
    #[serde(default)]
    pub http: HttpConfig,

    /// Backoff policy for transient transport failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Prefix probe settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Post-download validation settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// URL templates and limits for the candidate sources
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Cover-likeness weights and acceptance thresholds
    #[serde(default)]
    pub scoring: ScoringWeights,

    /// JSON file holding curated records (None disables the curated store)
    #[serde(default)]
    pub curated_store: Option<PathBuf>,
}

impl Config {
    /// Parse a configuration from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        Self::from_json_str(&content)
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.probe.range_bytes == 0 {
            return Err(Error::Config {
                message: "probe range must be at least one byte".to_string(),
                key: Some("probe.range_bytes".to_string()),
            });
        }
        if self.probe.min_bytes > self.probe.range_bytes {
            return Err(Error::Config {
                message: format!(
                    "probe floor ({}) exceeds the probe range ({})",
                    self.probe.min_bytes, self.probe.range_bytes
                ),
                key: Some("probe.min_bytes".to_string()),
            });
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: "backoff multiplier must be >= 1.0".to_string(),
                key: Some("retry.backoff_multiplier".to_string()),
            });
        }
        if self.sources.cdn_sizes.is_empty() {
            return Err(Error::Config {
                message: "at least one CDN size suffix is required".to_string(),
                key: Some("sources.cdn_sizes".to_string()),
            });
        }
        Ok(())
    }
}

/// HTTP client configuration, injected once at client construction
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Accept-Language sent with every request
    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Per-request timeout (default: 20 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Additional fixed headers
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            timeout: default_timeout(),
            extra_headers: BTreeMap::new(),
        }
    }
}

/// Retry behavior for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 500 ms)
    #[serde(default = "default_initial_delay", with = "duration_millis_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 8 seconds)
    #[serde(default = "default_max_delay", with = "duration_millis_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Prefix probe configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Number of leading bytes requested with a Range header (default: 64 KiB)
    #[serde(default = "default_probe_range")]
    pub range_bytes: u64,

    /// Sampled buffers below this size are not plausible images (default: 1 KiB)
    #[serde(default = "default_probe_min_bytes")]
    pub min_bytes: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            range_bytes: default_probe_range(),
            min_bytes: default_probe_min_bytes(),
        }
    }
}

/// Post-download validation configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Downloads below this size are treated as error pages (default: 10 KiB)
    #[serde(default = "default_download_min_bytes")]
    pub min_bytes: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            min_bytes: default_download_min_bytes(),
        }
    }
}

/// Candidate source templates
///
/// Templates accept the placeholders `{yyyy}`, `{mm}`, `{dd}`, `{date}`,
/// `{country}`, `{slug}`, `{id}`, `{size}` and `{handle}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Deterministic CDN image URL
    #[serde(default = "default_cdn_template")]
    pub cdn_template: String,

    /// Referer sent with CDN requests (hotlink protection)
    #[serde(default = "default_cdn_referer")]
    pub cdn_referer: Option<String>,

    /// CDN size suffixes, largest first
    #[serde(default = "default_cdn_sizes")]
    pub cdn_sizes: Vec<String>,

    /// Per-publisher mirror page
    #[serde(default = "default_listing_template")]
    pub listing_template: String,

    /// Date-indexed page listing many publishers
    #[serde(default = "default_day_index_template")]
    pub day_index_template: String,

    /// Public read-only mirror for a social media account's media tab
    #[serde(default = "default_social_mirror_template")]
    pub social_mirror_template: String,

    /// Origin that mirror `/pic/` media links are rewritten to
    #[serde(default = "default_social_media_origin")]
    pub social_media_origin: String,

    /// Upper bound of extracted URLs probed per page (default: 12)
    #[serde(default = "default_max_page_candidates")]
    pub max_page_candidates: usize,

    /// Minimum token overlap for a day-index tile to be considered (default: 0.6)
    #[serde(default = "default_min_match_confidence")]
    pub min_match_confidence: f64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            cdn_template: default_cdn_template(),
            cdn_referer: default_cdn_referer(),
            cdn_sizes: default_cdn_sizes(),
            listing_template: default_listing_template(),
            day_index_template: default_day_index_template(),
            social_mirror_template: default_social_mirror_template(),
            social_media_origin: default_social_media_origin(),
            max_page_candidates: default_max_page_candidates(),
            min_match_confidence: default_min_match_confidence(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string()
}

fn default_accept_language() -> String {
    "es-ES,es;q=0.9,en;q=0.8".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(8)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_probe_range() -> u64 {
    64 * 1024
}

fn default_probe_min_bytes() -> u64 {
    1024
}

fn default_download_min_bytes() -> u64 {
    10 * 1024
}

fn default_cdn_template() -> String {
    "https://img.kiosko.net/{yyyy}/{mm}/{dd}/{country}/{slug}.{size}.jpg".to_string()
}

fn default_cdn_referer() -> Option<String> {
    Some("https://{country}.kiosko.net/".to_string())
}

fn default_cdn_sizes() -> Vec<String> {
    vec!["750".to_string(), "500".to_string(), "200".to_string()]
}

fn default_listing_template() -> String {
    "https://{country}.kiosko.net/{country}/np/{slug}.html".to_string()
}

fn default_day_index_template() -> String {
    "https://{country}.kiosko.net/{country}/{date}/".to_string()
}

fn default_social_mirror_template() -> String {
    "https://nitter.net/{handle}/media".to_string()
}

fn default_social_media_origin() -> String {
    "https://pbs.twimg.com/".to_string()
}

fn default_max_page_candidates() -> usize {
    12
}

fn default_min_match_confidence() -> f64 {
    0.6
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds, for backoff delays)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
