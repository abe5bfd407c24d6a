//! Core types for frontpage-dl

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Provenance of a candidate: which source strategy produced it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTag {
    /// Previously persisted, trusted record for this exact request
    Curated,
    /// Deterministically constructed CDN URL
    Cdn,
    /// Scraped from the publisher's mirror page
    Listing,
    /// Matched on a date-indexed page listing many publishers
    DayIndex,
    /// Publisher's configured primary method
    ConfiguredPrimary,
    /// One of the publisher's configured fallback methods
    ConfiguredFallback,
    /// Latest media post from a public social mirror
    Social,
}

impl SourceTag {
    /// Provenance string as written to curated records and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Curated => "curated",
            SourceTag::Cdn => "cdn",
            SourceTag::Listing => "listing",
            SourceTag::DayIndex => "day-index",
            SourceTag::ConfiguredPrimary => "configured-primary",
            SourceTag::ConfiguredFallback => "configured-fallback",
            SourceTag::Social => "social",
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered, unvalidated image URL plus provenance
///
/// Harvesters only emit absolute URLs; a candidate is never mutated after
/// it leaves the harvester.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Absolute image URL
    pub url: String,
    /// Referer to send when fetching (hotlink-protected hosts)
    pub referer: Option<String>,
    /// Which strategy produced this candidate
    pub source: SourceTag,
}

impl Candidate {
    /// Create a candidate without a referer
    pub fn new(url: impl Into<String>, source: SourceTag) -> Self {
        Self {
            url: url.into(),
            referer: None,
            source,
        }
    }

    /// Attach a referer
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }
}

/// Raster formats recognized by header sniffing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// JPEG (SOI marker)
    Jpeg,
    /// PNG (8-byte signature)
    Png,
    /// WebP (RIFF container)
    WebP,
    /// GIF (GIF87a/GIF89a)
    Gif,
    /// Declared image type without a recognized signature
    Other,
}

impl ImageFormat {
    /// Conventional file extension
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            ImageFormat::Jpeg => Some("jpg"),
            ImageFormat::Png => Some("png"),
            ImageFormat::WebP => Some("webp"),
            ImageFormat::Gif => Some("gif"),
            ImageFormat::Other => None,
        }
    }

    /// Canonical MIME type
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Other => "application/octet-stream",
        }
    }
}

/// Metadata gathered by a prefix probe
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeResult {
    /// Content type (server-declared, or sniffed when the server was vague)
    pub content_type: String,
    /// Declared total size if known, else the sampled buffer's size
    pub byte_length: u64,
    /// Sniffed format
    pub format: ImageFormat,
    /// Width in pixels, when the header carried it
    pub width: Option<u32>,
    /// Height in pixels, when the header carried it
    pub height: Option<u32>,
}

impl ProbeResult {
    /// Both dimensions, if known
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }
}

/// A candidate with its probe metadata and cover-likeness score
///
/// Built fresh for every resolution attempt; never persisted.
#[derive(Clone, Debug)]
pub struct ScoredCandidate {
    /// The candidate
    pub candidate: Candidate,
    /// Probe metadata (None when the candidate was never probed)
    pub probe: Option<ProbeResult>,
    /// Cover-likeness score
    pub score: i32,
}

/// Technique named by a publisher's method descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MethodKind {
    /// Deterministic CDN path (handled by the CDN harvester)
    Cdn,
    /// Scrape an explicit page, optionally scoped by a CSS selector
    Scrape,
    /// The URL itself is the image (date placeholders allowed)
    DirectImage,
    /// Latest media post of a social account, via a public mirror
    Social,
}

/// One entry of a publisher's declarative configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Technique to apply
    pub kind: MethodKind,
    /// Page, image or profile URL (may contain date placeholders)
    #[serde(default)]
    pub url: String,
    /// CSS selector scoping the extraction (scrape only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

/// A newspaper in the catalog
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
    /// Stable identifier (also the default CDN slug)
    pub id: String,
    /// Two-letter country code used in mirror URLs
    pub country: String,
    /// Display name
    pub name: String,
    /// Id of the publisher whose cover this one shares
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<String>,
    /// CDN slug variants, most recent naming first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slugs: Vec<String>,
    /// Social media handle for the social mirror technique
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_handle: Option<String>,
    /// Primary declarative method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<MethodDescriptor>,
    /// Ordered fallback methods
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<MethodDescriptor>,
}

impl Publisher {
    /// Create a publisher with no aliases or declarative methods
    pub fn new(id: impl Into<String>, country: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            country: country.into(),
            name: name.into(),
            alias_of: None,
            slugs: Vec::new(),
            social_handle: None,
            primary: None,
            fallbacks: Vec::new(),
        }
    }

    /// CDN slug variants: the configured list, or variants derived from the id
    ///
    /// Derived variants are the id itself, the id without separators, and the
    /// id with hyphens turned into underscores.
    pub fn slug_variants(&self) -> Vec<String> {
        if !self.slugs.is_empty() {
            return self.slugs.clone();
        }
        let mut variants = vec![self.id.clone()];
        for variant in [
            self.id.replace(['-', '_'], ""),
            self.id.replace('-', "_"),
        ] {
            if !variants.contains(&variant) {
                variants.push(variant);
            }
        }
        variants
    }
}

/// One resolution call's input
#[derive(Clone, Copy, Debug)]
pub struct ResolutionRequest<'a> {
    /// Requested publisher id (may be an alias)
    pub publisher_id: &'a str,
    /// Requested date
    pub date: NaiveDate,
    /// Directory the cover is written to
    pub output_dir: &'a Path,
    /// Full roster, used for alias resolution
    pub roster: &'a [Publisher],
}

/// Successful resolution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCover {
    /// URL the cover was downloaded from
    pub url: String,
    /// Local file name (inside the output directory)
    pub file_name: String,
    /// Full local path
    pub path: PathBuf,
    /// Provenance of the winning candidate
    pub source: SourceTag,
    /// Score of the winning candidate
    pub score: i32,
}

/// A previously persisted, trusted resolution outcome for one (publisher, date)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedRecord {
    /// Publisher id as requested
    pub publisher_id: String,
    /// Cover date
    pub date: NaiveDate,
    /// Where the cover came from
    pub source_url: String,
    /// Local file name of the materialized cover
    pub local_file: String,
    /// Provenance of the original winning candidate
    pub provenance: SourceTag,
    /// When the record was written
    pub recorded_at: DateTime<Utc>,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_variants_derive_from_id() {
        let publisher = Publisher::new("el-pais", "es", "El País");
        assert_eq!(
            publisher.slug_variants(),
            vec!["el-pais", "elpais", "el_pais"]
        );
    }

    #[test]
    fn slug_variants_skip_duplicates() {
        let publisher = Publisher::new("abc", "es", "ABC");
        assert_eq!(publisher.slug_variants(), vec!["abc"]);
    }

    #[test]
    fn configured_slugs_take_precedence() {
        let mut publisher = Publisher::new("elmundo", "es", "El Mundo");
        publisher.slugs = vec!["elmundo".into(), "el_mundo".into()];
        assert_eq!(publisher.slug_variants(), vec!["elmundo", "el_mundo"]);
    }

    #[test]
    fn publisher_deserializes_declarative_methods() {
        let json = r#"{
            "id": "lavanguardia",
            "country": "es",
            "name": "La Vanguardia",
            "primary": { "kind": "scrape", "url": "https://example.com/portada", "selector": "div.cover img" },
            "fallbacks": [
                { "kind": "social", "url": "https://x.com/LaVanguardia" },
                { "kind": "direct-image", "url": "https://example.com/{yyyy}{mm}{dd}.jpg" }
            ]
        }"#;
        let publisher: Publisher = serde_json::from_str(json).unwrap();

        let primary = publisher.primary.unwrap();
        assert_eq!(primary.kind, MethodKind::Scrape);
        assert_eq!(primary.selector.as_deref(), Some("div.cover img"));
        assert_eq!(publisher.fallbacks.len(), 2);
        assert_eq!(publisher.fallbacks[1].kind, MethodKind::DirectImage);
        assert!(publisher.alias_of.is_none());
    }

    #[test]
    fn source_tag_serializes_as_provenance_string() {
        let json = serde_json::to_string(&SourceTag::DayIndex).unwrap();
        assert_eq!(json, "\"day-index\"");
        assert_eq!(SourceTag::ConfiguredFallback.to_string(), "configured-fallback");
    }
}
