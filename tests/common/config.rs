//! Test configuration helpers for mock-backed and live resolvers

use chrono::NaiveDate;
use frontpage_dl::config::{ProbeConfig, RetryConfig, SourcesConfig};
use frontpage_dl::{Config, CoverResolver, CuratedStore, Publisher};
use std::sync::Arc;
use std::time::Duration;

/// Date used by every mock scenario
pub fn cover_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 20).expect("valid date")
}

/// Engine configuration whose source templates all point at `base`
///
/// Retries are disabled so missing mocks fail fast, and the probe range is
/// small enough to keep fixtures light.
pub fn config_at(base: &str) -> Config {
    Config {
        retry: RetryConfig {
            max_attempts: 0,
            initial_delay: Duration::from_millis(1),
            ..Default::default()
        },
        probe: ProbeConfig {
            range_bytes: 4096,
            min_bytes: 256,
        },
        sources: SourcesConfig {
            cdn_template: format!(
                "{}/cdn/{{yyyy}}/{{mm}}/{{dd}}/{{country}}/{{slug}}.{{size}}.jpg",
                base
            ),
            cdn_referer: Some(format!("{}/{{country}}/", base)),
            listing_template: format!("{}/{{country}}/np/{{slug}}.html", base),
            day_index_template: format!("{}/{{country}}/{{date}}/", base),
            social_mirror_template: format!("{}/mirror/{{handle}}/media", base),
            social_media_origin: format!("{}/", base),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Resolver over a mock server, optionally backed by a curated store
pub fn resolver_at(base: &str, store: Option<Arc<dyn CuratedStore>>) -> CoverResolver {
    CoverResolver::with_curated_store(config_at(base), store)
        .unwrap_or_else(|e| panic!("failed to build resolver: {e}"))
}

/// Spanish publisher with no declarative methods
pub fn spanish(id: &str, name: &str) -> Publisher {
    Publisher::new(id, "es", name)
}

/// Publisher and date for live runs
///
/// Reads `FRONTPAGE_PUBLISHER`, `FRONTPAGE_COUNTRY` and `FRONTPAGE_NAME`
/// from the environment (or `.env`), defaulting to El País for today.
pub fn live_target() -> (Publisher, NaiveDate) {
    dotenvy::dotenv().ok();

    let id = std::env::var("FRONTPAGE_PUBLISHER").unwrap_or_else(|_| "elpais".to_string());
    let country = std::env::var("FRONTPAGE_COUNTRY").unwrap_or_else(|_| "es".to_string());
    let name = std::env::var("FRONTPAGE_NAME").unwrap_or_else(|_| "El País".to_string());
    (
        Publisher::new(id, country, name),
        chrono::Utc::now().date_naive(),
    )
}
