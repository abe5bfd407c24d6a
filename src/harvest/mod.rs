//! Candidate harvesters
//!
//! Every source strategy implements [`Harvester`]. The resolver runs them
//! side by side through [`harvest_isolated`], which turns a failing
//! harvester into an empty candidate list so one broken source never
//! aborts its siblings.
//!
//! Harvesters share one set of [`HarvestServices`]: the retrying HTTP
//! client, the prober, the scorer and the source templates.

pub mod cdn;
pub mod curated;
pub mod day_index;
pub mod declarative;
pub mod extract;
pub mod listing;

pub use cdn::CdnHarvester;
pub use curated::CuratedHarvester;
pub use day_index::DayIndexHarvester;
pub use declarative::DeclarativeHarvester;
pub use listing::ListingHarvester;

use crate::config::{Config, SourcesConfig};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::probe::ImageProber;
use crate::scoring::Scorer;
use crate::types::{Candidate, Publisher, ScoredCandidate, SourceTag};
use crate::utils::TemplateVars;
use async_trait::async_trait;
use chrono::NaiveDate;
use extract::{SimpleSelector, extract_image_urls};
use std::collections::HashSet;
use std::sync::Arc;

/// What a harvester is asked to find
#[derive(Clone, Copy, Debug)]
pub struct HarvestContext<'a> {
    /// Publisher id as requested (before alias resolution)
    pub requested_id: &'a str,
    /// Publisher whose identity and configuration drive harvesting
    pub publisher: &'a Publisher,
    /// Requested date
    pub date: NaiveDate,
}

impl<'a> HarvestContext<'a> {
    /// Template variables for this publisher and date
    pub fn template_vars(&self) -> TemplateVars<'a> {
        TemplateVars {
            date: Some(self.date),
            country: Some(self.publisher.country.as_str()),
            slug: None,
            id: Some(self.publisher.id.as_str()),
            size: None,
            handle: self.publisher.social_handle.as_deref(),
        }
    }
}

/// A source strategy producing cover candidates
///
/// Returning `Ok(vec![])` means "nothing found"; an `Err` is logged by the
/// resolver and treated the same way.
#[async_trait]
pub trait Harvester: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Discover candidates for one request
    async fn produce(&self, ctx: &HarvestContext<'_>) -> Result<Vec<Candidate>>;
}

/// Run a harvester, converting any failure into an empty list
pub async fn harvest_isolated(harvester: &dyn Harvester, ctx: &HarvestContext<'_>) -> Vec<Candidate> {
    match harvester.produce(ctx).await {
        Ok(candidates) => {
            tracing::debug!(
                harvester = harvester.name(),
                publisher = %ctx.publisher.id,
                date = %ctx.date,
                count = candidates.len(),
                "Harvester finished"
            );
            candidates
        }
        Err(e) => {
            tracing::warn!(
                harvester = harvester.name(),
                publisher = %ctx.publisher.id,
                date = %ctx.date,
                error = %e,
                "Harvester failed, continuing without its candidates"
            );
            Vec::new()
        }
    }
}

/// Collaborators shared by all harvesters
#[derive(Clone, Debug)]
pub struct HarvestServices {
    /// Retrying HTTP client for page fetches
    pub http: Arc<HttpClient>,
    /// Prefix prober
    pub prober: Arc<ImageProber>,
    /// Cover-likeness scorer
    pub scorer: Arc<Scorer>,
    /// Source URL templates and limits
    pub sources: Arc<SourcesConfig>,
}

impl HarvestServices {
    /// Build the shared client, prober and scorer from engine configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = Arc::new(HttpClient::new(&config.http, config.retry.clone())?);
        let prober = Arc::new(ImageProber::new(http.clone(), config.probe.clone()));
        Ok(Self {
            http,
            prober,
            scorer: Arc::new(Scorer::new(config.scoring.clone())),
            sources: Arc::new(config.sources.clone()),
        })
    }

    /// Probe and score a candidate; a failed probe yields None
    pub async fn probe_and_score(&self, candidate: Candidate) -> Option<ScoredCandidate> {
        match self
            .prober
            .probe(&candidate.url, candidate.referer.as_deref())
            .await
        {
            Ok(probe) => {
                let scored = self.scorer.score_candidate(candidate, Some(probe));
                tracing::debug!(
                    url = %scored.candidate.url,
                    source = %scored.candidate.source,
                    score = scored.score,
                    "Scored candidate"
                );
                Some(scored)
            }
            Err(e) => {
                tracing::debug!(url = %candidate.url, error = %e, "Probe rejected candidate");
                None
            }
        }
    }

    /// Probe a candidate and keep it only if it clears its source threshold
    pub async fn accept(&self, candidate: Candidate) -> Option<ScoredCandidate> {
        let scored = self.probe_and_score(candidate).await?;
        if self
            .scorer
            .accepts(scored.score, scored.candidate.source)
        {
            Some(scored)
        } else {
            tracing::debug!(
                url = %scored.candidate.url,
                score = scored.score,
                threshold = self.scorer.acceptance_threshold(scored.candidate.source),
                "Candidate below acceptance threshold"
            );
            None
        }
    }

    /// Probe every candidate and keep the best accepted one
    ///
    /// Ties keep the earlier candidate.
    pub async fn best_accepted(&self, candidates: Vec<Candidate>) -> Option<Candidate> {
        let mut best: Option<ScoredCandidate> = None;
        for candidate in candidates {
            if let Some(scored) = self.accept(candidate).await
                && best.as_ref().is_none_or(|b| scored.score > b.score)
            {
                best = Some(scored);
            }
        }
        best.map(|b| b.candidate)
    }

    /// Probe candidates in order and keep the first accepted one
    pub async fn first_accepted(&self, candidates: Vec<Candidate>) -> Option<Candidate> {
        for candidate in candidates {
            if let Some(scored) = self.accept(candidate).await {
                return Some(scored.candidate);
            }
        }
        None
    }

    /// Fetch a page and turn its image URLs into candidates
    ///
    /// Candidates carry the page URL as referer.
    pub async fn scrape_page(
        &self,
        page_url: &str,
        selector: Option<&SimpleSelector>,
        source: SourceTag,
    ) -> Result<Vec<Candidate>> {
        let base = url::Url::parse(page_url)?;
        let html = self.http.get_text(page_url, None).await?;
        let images = extract_image_urls(&html, &base, selector, self.sources.max_page_candidates);
        tracing::debug!(page = page_url, found = images.len(), "Extracted page images");
        Ok(images
            .into_iter()
            .map(|image| Candidate::new(image.url, source).with_referer(page_url))
            .collect())
    }
}

/// Follow `alias_of` links to the publisher whose cover is shared
///
/// # Errors
/// - [`Error::UnknownPublisher`] if the id, or any alias target, is not in the roster
/// - [`Error::AliasCycle`] if the alias chain loops
pub fn resolve_alias<'a>(publisher_id: &str, roster: &'a [Publisher]) -> Result<&'a Publisher> {
    let find = |id: &str| roster.iter().find(|p| p.id == id);
    let mut current =
        find(publisher_id).ok_or_else(|| Error::UnknownPublisher(publisher_id.to_string()))?;
    let mut visited = HashSet::from([current.id.as_str()]);

    while let Some(target) = current.alias_of.as_deref() {
        if !visited.insert(target) {
            return Err(Error::AliasCycle(publisher_id.to_string()));
        }
        current = find(target).ok_or_else(|| Error::UnknownPublisher(target.to_string()))?;
    }
    Ok(current)
}
