//! Cover-likeness scoring
//!
//! [`Scorer::score`] is a pure additive rule set over the candidate URL, the
//! probe metadata (when the probe succeeded) and the provenance tag. All
//! weights live in [`ScoringWeights`] so they can be tuned from configuration
//! and tested without any network I/O.

use crate::types::{Candidate, ProbeResult, ScoredCandidate, SourceTag};
use crate::utils::extension_from_url;
use serde::{Deserialize, Serialize};

/// A substring pattern and the weight it contributes when present
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternWeight {
    /// Lowercase substring matched against the URL path
    pub pattern: String,
    /// Weight added on match
    pub weight: i32,
}

impl PatternWeight {
    fn new(pattern: &str, weight: i32) -> Self {
        Self {
            pattern: pattern.to_string(),
            weight,
        }
    }
}

/// A lower bound and the weight for values at or above it
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    /// Inclusive lower bound
    pub min: u64,
    /// Weight applied when the value reaches `min`
    pub weight: i32,
}

impl Tier {
    const fn new(min: u64, weight: i32) -> Self {
        Self { min, weight }
    }
}

/// Named, tunable scoring table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Bonus for a curated record of the exact request
    pub curated_bonus: i32,

    /// Penalty applied once per distinct non-cover pattern the URL matches
    pub non_cover_penalty: i32,

    /// Non-cover URL patterns (logo, icon, banner...)
    ///
    /// Patterns of four or more characters match anywhere inside a URL token;
    /// shorter ones only match a whole token or its plural, so `ad` does not
    /// fire on `upload` or `madrid`.
    pub non_cover_patterns: Vec<String>,

    /// Hosts of the reliable CDN origin
    pub cdn_hosts: Vec<String>,

    /// Bonus for URLs served from one of `cdn_hosts`
    pub cdn_host_bonus: i32,

    /// Path hints, each applied at most once
    pub path_hints: Vec<PatternWeight>,

    /// Byte-size tiers, checked from the largest bound down
    pub size_tiers: Vec<Tier>,

    /// Weight for sizes below every tier
    pub size_floor_weight: i32,

    /// Sides at or below this many pixels are icons
    pub icon_max_side: u32,

    /// Penalty for icon-sized images
    pub icon_penalty: i32,

    /// Penalty for landscape images (wider than tall)
    pub landscape_penalty: i32,

    /// Lowest height/width ratio of a newspaper page
    pub portrait_min_ratio: f64,

    /// Highest height/width ratio of a newspaper page
    pub portrait_max_ratio: f64,

    /// Bonus for a ratio within the newspaper range
    pub portrait_bonus: i32,

    /// Short-side pixel tiers, checked from the largest bound down
    pub short_side_tiers: Vec<Tier>,

    /// Extensions that earn `extension_bonus`
    pub raster_extensions: Vec<String>,

    /// Bonus for a common raster extension
    pub extension_bonus: i32,

    /// Minimum score for a constructed CDN URL
    pub cdn_threshold: i32,

    /// Minimum score for scraped, configured and social candidates
    pub scraped_threshold: i32,

    /// Minimum score for a curated candidate
    pub curated_threshold: i32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            curated_bonus: 1000,
            non_cover_penalty: -150,
            non_cover_patterns: [
                "logo",
                "icon",
                "favicon",
                "sprite",
                "avatar",
                "placeholder",
                "banner",
                "ad",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            cdn_hosts: vec!["img.kiosko.net".to_string()],
            cdn_host_bonus: 40,
            path_hints: vec![
                PatternWeight::new("cover", 15),
                PatternWeight::new("frontpage", 15),
                PatternWeight::new("portada", 15),
                PatternWeight::new("upload", 5),
            ],
            size_tiers: vec![
                Tier::new(500_000, 30),
                Tier::new(200_000, 20),
                Tier::new(80_000, 10),
                Tier::new(20_000, 0),
                Tier::new(5_000, -30),
            ],
            size_floor_weight: -60,
            icon_max_side: 64,
            icon_penalty: -80,
            landscape_penalty: -40,
            portrait_min_ratio: 1.18,
            portrait_max_ratio: 2.0,
            portrait_bonus: 35,
            short_side_tiers: vec![Tier::new(900, 30), Tier::new(600, 20), Tier::new(400, 10)],
            raster_extensions: ["jpg", "jpeg", "png", "webp"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            extension_bonus: 5,
            cdn_threshold: 90,
            scraped_threshold: 40,
            curated_threshold: 0,
        }
    }
}

/// Pure cover-likeness scorer
#[derive(Clone, Debug, Default)]
pub struct Scorer {
    weights: ScoringWeights,
}

impl Scorer {
    /// Create a scorer from a weight table
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// The weight table in use
    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score a candidate URL
    ///
    /// A missing probe contributes nothing for size and dimensions.
    #[must_use]
    pub fn score(&self, url: &str, probe: Option<&ProbeResult>, source: SourceTag) -> i32 {
        let w = &self.weights;
        let lower = url.to_ascii_lowercase();
        let mut score = 0;

        if source == SourceTag::Curated {
            score += w.curated_bonus;
        }
        let non_cover = self.non_cover_matches(&lower);
        score += w.non_cover_penalty.saturating_mul(i32::try_from(non_cover).unwrap_or(i32::MAX));

        let parsed = url::Url::parse(url).ok();
        if let Some(host) = parsed.as_ref().and_then(|u| u.host_str())
            && w
                .cdn_hosts
                .iter()
                .any(|h| host.eq_ignore_ascii_case(h) || host.ends_with(&format!(".{}", h)))
        {
            score += w.cdn_host_bonus;
        }

        let path = parsed
            .as_ref()
            .map(|u| u.path().to_ascii_lowercase())
            .unwrap_or_else(|| lower.clone());
        score += w
            .path_hints
            .iter()
            .filter(|hint| path.contains(hint.pattern.as_str()))
            .map(|hint| hint.weight)
            .sum::<i32>();

        if let Some(probe) = probe {
            score += tier_weight(&w.size_tiers, probe.byte_length).unwrap_or(w.size_floor_weight);
            if let Some((width, height)) = probe.dimensions() {
                score += self.dimension_weight(width, height);
            }
        }

        if let Some(ext) = extension_from_url(url)
            && w.raster_extensions.iter().any(|e| e == ext)
        {
            score += w.extension_bonus;
        }

        score
    }

    /// Minimum score a candidate from `source` needs to be accepted
    #[must_use]
    pub fn acceptance_threshold(&self, source: SourceTag) -> i32 {
        match source {
            SourceTag::Cdn => self.weights.cdn_threshold,
            SourceTag::Curated => self.weights.curated_threshold,
            SourceTag::Listing
            | SourceTag::DayIndex
            | SourceTag::ConfiguredPrimary
            | SourceTag::ConfiguredFallback
            | SourceTag::Social => self.weights.scraped_threshold,
        }
    }

    /// Whether `score` clears the threshold for `source`
    #[must_use]
    pub fn accepts(&self, score: i32, source: SourceTag) -> bool {
        score >= self.acceptance_threshold(source)
    }

    /// Score a candidate together with its probe result
    pub fn score_candidate(
        &self,
        candidate: Candidate,
        probe: Option<ProbeResult>,
    ) -> ScoredCandidate {
        let score = self.score(&candidate.url, probe.as_ref(), candidate.source);
        ScoredCandidate {
            candidate,
            probe,
            score,
        }
    }

    /// Number of distinct non-cover patterns present in the URL tokens
    fn non_cover_matches(&self, lower_url: &str) -> usize {
        let tokens: Vec<&str> = lower_url
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        let mut patterns: Vec<String> = self
            .weights
            .non_cover_patterns
            .iter()
            .map(|p| p.to_ascii_lowercase())
            .collect();
        patterns.sort();
        patterns.dedup();
        patterns
            .iter()
            .filter(|pattern| {
                let pattern = pattern.as_str();
                if pattern.len() >= 4 {
                    tokens.iter().any(|t| t.contains(pattern))
                } else {
                    tokens
                        .iter()
                        .any(|t| *t == pattern || t.strip_suffix('s') == Some(pattern))
                }
            })
            .count()
    }

    fn dimension_weight(&self, width: u32, height: u32) -> i32 {
        let w = &self.weights;
        let mut score = 0;
        if width <= w.icon_max_side || height <= w.icon_max_side {
            score += w.icon_penalty;
        }
        if width > height {
            score += w.landscape_penalty;
        } else if width > 0 {
            let ratio = f64::from(height) / f64::from(width);
            if (w.portrait_min_ratio..=w.portrait_max_ratio).contains(&ratio) {
                score += w.portrait_bonus;
            }
        }
        score += tier_weight(&w.short_side_tiers, u64::from(width.min(height))).unwrap_or(0);
        score
    }
}

/// Weight of the highest tier whose bound `value` reaches
fn tier_weight(tiers: &[Tier], value: u64) -> Option<i32> {
    tiers
        .iter()
        .filter(|t| value >= t.min)
        .max_by_key(|t| t.min)
        .map(|t| t.weight)
}
