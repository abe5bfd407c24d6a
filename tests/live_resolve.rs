#![cfg(feature = "live-tests")]
//! Resolution against the real public sources
//!
//! Gated behind the `live-tests` feature flag. The target publisher can be
//! overridden from `.env` (see `common::live_target`).
//!
//! ```bash
//! cargo test --features live-tests --test live_resolve -- --nocapture
//! ```

mod common;

use common::{assert_single_cover, live_target};
use frontpage_dl::{Config, CoverResolver};
use serial_test::serial;
use tempfile::tempdir;

#[tokio::test]
#[serial]
async fn resolves_todays_cover_from_public_sources() {
    let (publisher, date) = live_target();
    let resolver = CoverResolver::new(Config::default()).unwrap();
    let output = tempdir().unwrap();
    let roster = vec![publisher.clone()];

    let result = resolver
        .resolve_cover(&publisher.id, date, output.path(), &roster)
        .await;

    let cover = match result {
        Ok(cover) => cover,
        Err(e) => panic!("live resolution of {} on {} failed: {}", publisher.id, date, e),
    };
    println!(
        "Resolved {} from {} ({}, score {})",
        cover.file_name, cover.url, cover.source, cover.score
    );
    let bytes = std::fs::metadata(&cover.path).unwrap().len();
    assert!(bytes >= Config::default().download.min_bytes);
    assert_single_cover(output.path(), &cover.file_name, bytes);
}

#[tokio::test]
#[serial]
async fn unknown_cdn_slug_fails_cleanly() {
    let (_, date) = live_target();
    let resolver = CoverResolver::new(Config::default()).unwrap();
    let output = tempdir().unwrap();
    let roster = vec![frontpage_dl::Publisher::new(
        "no-such-paper-xyz",
        "es",
        "No Such Paper",
    )];

    let err = resolver
        .resolve_cover("no-such-paper-xyz", date, output.path(), &roster)
        .await
        .unwrap_err();

    println!("Expected failure: {} ({})", err, err.error_code());
    assert!(common::files_under(output.path()).is_empty());
}
