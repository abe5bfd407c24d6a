//! Resolution orchestrator
//!
//! [`CoverResolver`] owns the harvester set and runs one resolution as:
//! alias resolution, concurrent failure-isolated harvesting, merge and
//! deduplication by URL, a uniform re-probe and re-score, a stable sort by
//! score, and downloads in ranked order until one succeeds.

use crate::config::Config;
use crate::curated::{CuratedStore, JsonCuratedStore};
use crate::download::Downloader;
use crate::error::{CandidateFailure, Error, Result};
use crate::harvest::{
    CdnHarvester, CuratedHarvester, DayIndexHarvester, DeclarativeHarvester, HarvestContext,
    HarvestServices, Harvester, ListingHarvester, harvest_isolated, resolve_alias,
};
use crate::types::{
    Candidate, CuratedRecord, Publisher, ResolutionRequest, ResolvedCover, ScoredCandidate,
    SourceTag,
};
use crate::utils::cover_file_stem;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Front-page cover resolution engine
pub struct CoverResolver {
    services: HarvestServices,
    downloader: Downloader,
    harvesters: Vec<Box<dyn Harvester>>,
    curated: Option<Arc<dyn CuratedStore>>,
}

impl std::fmt::Debug for CoverResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverResolver")
            .field(
                "harvesters",
                &self.harvesters.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .field("curated", &self.curated.is_some())
            .finish_non_exhaustive()
    }
}

impl CoverResolver {
    /// Build a resolver with the standard harvester set
    ///
    /// When `config.curated_store` names a file, a [`JsonCuratedStore`] over
    /// it backs the curated harvester and receives a record after every
    /// successful resolution.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for invalid settings, or a network error if
    /// the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let store = config
            .curated_store
            .as_ref()
            .map(|path| Arc::new(JsonCuratedStore::new(path.clone())) as Arc<dyn CuratedStore>);
        Self::with_curated_store(config, store)
    }

    /// Build a resolver with the standard harvester set over any record store
    pub fn with_curated_store(
        config: Config,
        store: Option<Arc<dyn CuratedStore>>,
    ) -> Result<Self> {
        config.validate()?;
        let services = HarvestServices::from_config(&config)?;
        let harvesters = default_harvesters(&services, store.clone());
        Ok(Self::from_parts(config, services, harvesters, store))
    }

    /// Assemble a resolver from explicit parts
    ///
    /// `harvesters` run in the given order; on duplicate URLs the earlier
    /// harvester's candidate wins.
    pub fn from_parts(
        config: Config,
        services: HarvestServices,
        harvesters: Vec<Box<dyn Harvester>>,
        curated: Option<Arc<dyn CuratedStore>>,
    ) -> Self {
        let downloader = Downloader::new(services.http.clone(), config.download);
        Self {
            services,
            downloader,
            harvesters,
            curated,
        }
    }

    /// Shared client, prober, scorer and templates
    pub fn services(&self) -> &HarvestServices {
        &self.services
    }

    /// Resolve and materialize the cover for `publisher_id` on `date`
    pub async fn resolve_cover(
        &self,
        publisher_id: &str,
        date: NaiveDate,
        output_dir: &Path,
        roster: &[Publisher],
    ) -> Result<ResolvedCover> {
        self.resolve(&ResolutionRequest {
            publisher_id,
            date,
            output_dir,
            roster,
        })
        .await
    }

    /// Resolve one request
    ///
    /// # Errors
    /// - [`Error::UnknownPublisher`] / [`Error::AliasCycle`] from alias resolution
    /// - [`Error::NoCandidates`] when no harvester produced anything
    /// - [`Error::AllCandidatesFailed`] when every candidate failed its probe or download
    pub async fn resolve(&self, request: &ResolutionRequest<'_>) -> Result<ResolvedCover> {
        let publisher = resolve_alias(request.publisher_id, request.roster)?;
        if publisher.id != request.publisher_id {
            tracing::debug!(
                publisher = request.publisher_id,
                target = %publisher.id,
                "Resolved publisher alias"
            );
        }
        let ctx = HarvestContext {
            requested_id: request.publisher_id,
            publisher,
            date: request.date,
        };

        let batches = futures::future::join_all(
            self.harvesters
                .iter()
                .map(|harvester| harvest_isolated(harvester.as_ref(), &ctx)),
        )
        .await;
        let candidates = merge_candidates(batches);

        if candidates.is_empty() {
            tracing::info!(
                publisher = request.publisher_id,
                date = %request.date,
                "No candidates found"
            );
            return Err(Error::NoCandidates {
                publisher: request.publisher_id.to_string(),
                date: request.date,
            });
        }

        let mut failures: Vec<CandidateFailure> = Vec::new();
        let mut last_cause: Option<Error> = None;
        let mut ranked: Vec<ScoredCandidate> = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            match self
                .services
                .prober
                .probe(&candidate.url, candidate.referer.as_deref())
                .await
            {
                Ok(probe) => ranked.push(self.services.scorer.score_candidate(candidate, Some(probe))),
                Err(e) => {
                    tracing::debug!(url = %candidate.url, error = %e, "Candidate failed re-probe");
                    failures.push(CandidateFailure {
                        url: candidate.url,
                        cause: e.to_string(),
                    });
                    last_cause = Some(e);
                }
            }
        }
        // Thresholds are not re-applied: harvesters already filtered, the re-score only orders
        rank(&mut ranked);

        let stem = cover_file_stem(request.publisher_id, request.date);
        for (position, scored) in ranked.into_iter().enumerate() {
            tracing::debug!(
                publisher = request.publisher_id,
                url = %scored.candidate.url,
                source = %scored.candidate.source,
                score = scored.score,
                rank = position + 1,
                "Attempting download"
            );
            match self
                .downloader
                .download(&scored.candidate, request.output_dir, &stem)
                .await
            {
                Ok(file) => {
                    tracing::info!(
                        publisher = request.publisher_id,
                        date = %request.date,
                        url = %scored.candidate.url,
                        source = %scored.candidate.source,
                        score = scored.score,
                        file = %file.file_name,
                        "Resolved cover"
                    );
                    let resolved = ResolvedCover {
                        url: scored.candidate.url,
                        file_name: file.file_name,
                        path: file.path,
                        source: scored.candidate.source,
                        score: scored.score,
                    };
                    self.remember(request, &resolved).await;
                    return Ok(resolved);
                }
                Err(e) => {
                    tracing::warn!(
                        publisher = request.publisher_id,
                        url = %scored.candidate.url,
                        error = %e,
                        "Download failed, trying next candidate"
                    );
                    failures.push(CandidateFailure {
                        url: scored.candidate.url,
                        cause: e.to_string(),
                    });
                    last_cause = Some(e);
                }
            }
        }

        let attempts = failures.len();
        tracing::info!(
            publisher = request.publisher_id,
            date = %request.date,
            attempts = attempts,
            "All candidates failed"
        );
        Err(Error::AllCandidatesFailed {
            attempts,
            last_cause: Box::new(
                last_cause.unwrap_or_else(|| Error::Other("no candidate was attempted".into())),
            ),
            failures,
        })
    }

    /// Persist a successful outcome; a store failure never fails the resolution
    async fn remember(&self, request: &ResolutionRequest<'_>, resolved: &ResolvedCover) {
        let Some(store) = &self.curated else {
            return;
        };
        // A replayed record already holds the original provenance
        if resolved.source == SourceTag::Curated {
            return;
        }
        let record = CuratedRecord {
            publisher_id: request.publisher_id.to_string(),
            date: request.date,
            source_url: resolved.url.clone(),
            local_file: resolved.file_name.clone(),
            provenance: resolved.source,
            recorded_at: chrono::Utc::now(),
        };
        if let Err(e) = store.record(record).await {
            tracing::warn!(
                publisher = request.publisher_id,
                date = %request.date,
                error = %e,
                "Failed to write curated record"
            );
        }
    }
}

/// Standard harvester set, in merge order
pub fn default_harvesters(
    services: &HarvestServices,
    curated: Option<Arc<dyn CuratedStore>>,
) -> Vec<Box<dyn Harvester>> {
    let mut harvesters: Vec<Box<dyn Harvester>> = Vec::new();
    if let Some(store) = curated {
        harvesters.push(Box::new(CuratedHarvester::new(services.clone(), store)));
    }
    harvesters.push(Box::new(CdnHarvester::new(services.clone())));
    harvesters.push(Box::new(DeclarativeHarvester::new(services.clone())));
    harvesters.push(Box::new(ListingHarvester::new(services.clone())));
    harvesters.push(Box::new(DayIndexHarvester::new(services.clone())));
    harvesters
}

/// Concatenate harvester outputs in order, keeping the first candidate per URL
pub fn merge_candidates(batches: Vec<Vec<Candidate>>) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|candidate| seen.insert(candidate.url.clone()))
        .collect()
}

/// Stable sort, best score first; equal scores keep merge order
fn rank(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn scored(url: &str, score: i32) -> ScoredCandidate {
        ScoredCandidate {
            candidate: Candidate::new(url, SourceTag::Listing),
            probe: None,
            score,
        }
    }

    #[test]
    fn merge_deduplicates_by_url_keeping_first_provenance() {
        let merged = merge_candidates(vec![
            vec![Candidate::new("https://a/x.jpg", SourceTag::Curated)],
            vec![
                Candidate::new("https://a/x.jpg", SourceTag::Cdn),
                Candidate::new("https://a/y.jpg", SourceTag::Cdn),
            ],
            vec![],
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].source, SourceTag::Curated);
        assert_eq!(merged[1].url, "https://a/y.jpg");
    }

    #[test]
    fn merge_of_repeated_url_yields_two() {
        let merged = merge_candidates(vec![vec![
            Candidate::new("A", SourceTag::Listing),
            Candidate::new("A", SourceTag::Listing),
            Candidate::new("B", SourceTag::Listing),
        ]]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn ranking_is_descending_and_stable() {
        let mut candidates = vec![
            scored("low", 10),
            scored("first-tie", 50),
            scored("high", 90),
            scored("second-tie", 50),
        ];
        rank(&mut candidates);
        let order: Vec<&str> = candidates.iter().map(|c| c.candidate.url.as_str()).collect();
        assert_eq!(order, vec!["high", "first-tie", "second-tie", "low"]);
    }

    #[test]
    fn default_set_includes_curated_only_with_a_store() {
        let services = crate::harvest::test_support::services(Default::default());
        let names = |hs: Vec<Box<dyn Harvester>>| hs.iter().map(|h| h.name()).collect::<Vec<_>>();

        assert_eq!(
            names(default_harvesters(&services, None)),
            vec!["cdn", "declarative", "listing", "day-index"]
        );
        let store: Arc<dyn CuratedStore> = Arc::new(crate::curated::MemoryCuratedStore::new());
        assert_eq!(
            names(default_harvesters(&services, Some(store)))[0],
            "curated"
        );
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let mut config = Config::default();
        config.sources.cdn_sizes.clear();
        assert!(matches!(CoverResolver::new(config), Err(Error::Config { .. })));
    }
}
