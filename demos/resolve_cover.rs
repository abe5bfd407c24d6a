//! Resolve one front page
//!
//! This example demonstrates the core functionality of frontpage-dl:
//! - Loading (or defaulting) the engine configuration
//! - Describing a small publisher roster, including an alias
//! - Resolving and downloading a cover for a date
//! - Inspecting aggregated failures
//!
//! ```bash
//! cargo run --example resolve_cover -- elpais 2025-12-20 covers
//! ```

use chrono::NaiveDate;
use frontpage_dl::{Config, CoverResolver, Error, MethodDescriptor, MethodKind, Publisher};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let publisher_id = args.next().unwrap_or_else(|| "elpais".to_string());
    let date = match args.next() {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")?,
        None => chrono::Utc::now().date_naive(),
    };
    let output_dir = PathBuf::from(args.next().unwrap_or_else(|| "covers".to_string()));

    // Optional engine config from FRONTPAGE_CONFIG
    let config = match std::env::var("FRONTPAGE_CONFIG") {
        Ok(path) => Config::from_file(Path::new(&path))?,
        Err(_) => Config {
            curated_store: Some(output_dir.join("curated.json")),
            ..Default::default()
        },
    };

    let mut ara = Publisher::new("ara", "es", "Ara");
    ara.primary = Some(MethodDescriptor {
        kind: MethodKind::Scrape,
        url: "https://www.ara.cat/".to_string(),
        selector: Some(".portada img".to_string()),
    });
    ara.social_handle = Some("diariARA".to_string());
    ara.fallbacks = vec![MethodDescriptor {
        kind: MethodKind::Social,
        url: "https://nitter.net/diariARA".to_string(),
        selector: None,
    }];

    let mut as_madrid = Publisher::new("as-madrid", "es", "AS Madrid");
    as_madrid.alias_of = Some("as".to_string());

    let roster = vec![
        Publisher::new("elpais", "es", "El País"),
        Publisher::new("abc", "es", "ABC"),
        Publisher::new("as", "es", "AS"),
        as_madrid,
        ara,
    ];

    let resolver = CoverResolver::new(config)?;
    println!("Resolving {} for {}...", publisher_id, date);

    match resolver
        .resolve_cover(&publisher_id, date, &output_dir, &roster)
        .await
    {
        Ok(cover) => {
            println!("✓ {}", cover.path.display());
            println!("  source: {} (score {})", cover.source, cover.score);
            println!("  from:   {}", cover.url);
        }
        Err(Error::AllCandidatesFailed {
            attempts, failures, ..
        }) => {
            println!("✗ all {} candidates failed:", attempts);
            for failure in failures {
                println!("  - {}: {}", failure.url, failure.cause);
            }
        }
        Err(e) => {
            println!("✗ {} ({})", e, e.error_code());
        }
    }

    Ok(())
}
