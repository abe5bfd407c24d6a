//! # frontpage-dl
//!
//! Resolves the front page of a newspaper for a given date from a set of
//! unreliable web sources and materializes it as a validated local image.
//!
//! ## Design Philosophy
//!
//! frontpage-dl is designed to be:
//! - **Library-first** - No CLI; the caller owns the publisher catalog and the batch loop
//! - **Sensible defaults** - Every setting in [`Config`] has a working default
//! - **Failure-isolated** - One broken source never aborts the others
//! - **Cheap before expensive** - Candidates are characterized from a byte prefix
//!   before anything is downloaded in full
//!
//! ## Quick Start
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use frontpage_dl::{Config, CoverResolver, Publisher};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = CoverResolver::new(Config::default())?;
//!     let roster = vec![Publisher::new("elpais", "es", "El País")];
//!     let date = NaiveDate::from_ymd_opt(2025, 12, 20).ok_or("bad date")?;
//!
//!     let cover = resolver
//!         .resolve_cover("elpais", date, Path::new("covers"), &roster)
//!         .await?;
//!     println!("{} from {} ({})", cover.file_name, cover.url, cover.source);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Curated record store
pub mod curated;
/// Streaming downloader with atomic publish
pub mod download;
/// Error types
pub mod error;
/// Candidate harvesters
pub mod harvest;
/// Retrying HTTP client
pub mod http;
/// Byte-prefix image prober
pub mod probe;
/// Resolution orchestrator
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Cover-likeness scoring
pub mod scoring;
/// Core data types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use curated::{CuratedStore, JsonCuratedStore, MemoryCuratedStore};
pub use download::{Downloader, MaterializedFile};
pub use error::{CandidateFailure, DownloadError, Error, ProbeError, Result};
pub use harvest::{HarvestContext, HarvestServices, Harvester};
pub use probe::ImageProber;
pub use resolver::CoverResolver;
pub use scoring::{Scorer, ScoringWeights};
pub use types::{
    Candidate, CuratedRecord, ImageFormat, MethodDescriptor, MethodKind, ProbeResult, Publisher,
    ResolutionRequest, ResolvedCover, ScoredCandidate, SourceTag,
};
