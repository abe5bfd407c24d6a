//! Declarative primary/fallback harvester
//!
//! Follows the publisher's own configuration: the primary method first, then
//! each fallback in order, stopping at the first method that yields an
//! accepted candidate. `cdn` descriptors are left to the CDN harvester.

use super::extract::{SimpleSelector, extract_image_urls};
use super::{HarvestContext, HarvestServices, Harvester};
use crate::error::{Error, Result};
use crate::types::{Candidate, MethodDescriptor, MethodKind, SourceTag};
use crate::utils::{TemplateVars, expand_template};
use async_trait::async_trait;

/// Runs the publisher's configured methods
#[derive(Clone, Debug)]
pub struct DeclarativeHarvester {
    services: HarvestServices,
}

impl DeclarativeHarvester {
    /// Create the harvester
    pub fn new(services: HarvestServices) -> Self {
        Self { services }
    }

    async fn run_method(
        &self,
        ctx: &HarvestContext<'_>,
        method: &MethodDescriptor,
        source: SourceTag,
    ) -> Result<Option<Candidate>> {
        match method.kind {
            MethodKind::Cdn => Ok(None),
            MethodKind::Scrape => self.scrape(ctx, method, source).await,
            MethodKind::DirectImage => {
                let url = expand_template(&method.url, &ctx.template_vars());
                Ok(self
                    .services
                    .accept(Candidate::new(url, source))
                    .await
                    .map(|scored| scored.candidate))
            }
            MethodKind::Social => self.social(ctx, method).await,
        }
    }

    async fn scrape(
        &self,
        ctx: &HarvestContext<'_>,
        method: &MethodDescriptor,
        source: SourceTag,
    ) -> Result<Option<Candidate>> {
        if method.url.is_empty() {
            return Err(Error::Config {
                message: format!("scrape method of '{}' has no URL", ctx.publisher.id),
                key: Some("publisher.primary.url".to_string()),
            });
        }
        let selector = match method.selector.as_deref() {
            Some(raw) => {
                let parsed = SimpleSelector::parse(raw);
                if parsed.is_none() {
                    tracing::warn!(
                        publisher = %ctx.publisher.id,
                        selector = raw,
                        "Unsupported selector, scanning the whole page"
                    );
                }
                parsed
            }
            None => None,
        };
        let page_url = expand_template(&method.url, &ctx.template_vars());
        let candidates = self
            .services
            .scrape_page(&page_url, selector.as_ref(), source)
            .await?;
        Ok(self.services.best_accepted(candidates).await)
    }

    async fn social(
        &self,
        ctx: &HarvestContext<'_>,
        method: &MethodDescriptor,
    ) -> Result<Option<Candidate>> {
        let handle = social_handle(&method.url)
            .or_else(|| ctx.publisher.social_handle.clone())
            .ok_or_else(|| Error::Config {
                message: format!("no social handle configured for '{}'", ctx.publisher.id),
                key: Some("publisher.social_handle".to_string()),
            })?;
        let vars = TemplateVars {
            handle: Some(handle.as_str()),
            ..ctx.template_vars()
        };
        let mirror_url = expand_template(&self.services.sources.social_mirror_template, &vars);
        let base = url::Url::parse(&mirror_url)?;
        let html = self.services.http.get_text(&mirror_url, None).await?;

        // Unbounded scan: avatars and banners come first on mirror pages
        let origin = self.services.sources.social_media_origin.as_str();
        let limit = self.services.sources.max_page_candidates;
        let mut media: Vec<Candidate> = Vec::new();
        for image in extract_image_urls(&html, &base, None, usize::MAX) {
            if media.len() >= limit {
                break;
            }
            if let Some(url) = origin_media_url(&image.url, origin)
                && !media.iter().any(|c| c.url == url)
            {
                media.push(Candidate::new(url, SourceTag::Social));
            }
        }

        tracing::debug!(
            publisher = %ctx.publisher.id,
            handle = %handle,
            media = media.len(),
            "Read social mirror"
        );
        // Newest post first
        Ok(self.services.first_accepted(media).await)
    }
}

#[async_trait]
impl Harvester for DeclarativeHarvester {
    fn name(&self) -> &'static str {
        "declarative"
    }

    async fn produce(&self, ctx: &HarvestContext<'_>) -> Result<Vec<Candidate>> {
        let publisher = ctx.publisher;
        let methods = publisher
            .primary
            .iter()
            .map(|m| (m, SourceTag::ConfiguredPrimary))
            .chain(
                publisher
                    .fallbacks
                    .iter()
                    .map(|m| (m, SourceTag::ConfiguredFallback)),
            );

        for (method, source) in methods {
            match self.run_method(ctx, method, source).await {
                Ok(Some(candidate)) => {
                    tracing::debug!(
                        publisher = %publisher.id,
                        kind = ?method.kind,
                        url = %candidate.url,
                        "Configured method produced a candidate"
                    );
                    return Ok(vec![candidate]);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    publisher = %publisher.id,
                    kind = ?method.kind,
                    url = %method.url,
                    error = %e,
                    "Configured method failed, trying the next one"
                ),
            }
        }
        Ok(Vec::new())
    }
}

/// Handle from a profile URL (`https://x.com/elpais` gives `elpais`)
fn social_handle(profile_url: &str) -> Option<String> {
    let trimmed = profile_url.trim();
    if trimmed.is_empty() {
        return None;
    }
    let last = match url::Url::parse(trimmed) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(str::to_string))?,
        Err(_) => trimmed.trim_end_matches('/').rsplit('/').next()?.to_string(),
    };
    let handle = last.trim_start_matches('@');
    (!handle.is_empty()).then(|| handle.to_string())
}

/// Origin media URL behind a mirror link, at original resolution
///
/// With origin `https://pbs.twimg.com/`, `/pic/media%2FABC.jpg%3Fname%3Dsmall`
/// and `/pic/orig/media%2FABC.jpg` both become
/// `https://pbs.twimg.com/media/ABC.jpg?name=orig`. Links that are not post
/// media (avatars, banners) yield None.
pub fn origin_media_url(mirror_link: &str, origin: &str) -> Option<String> {
    let (_, encoded) = mirror_link.split_once("/pic/")?;
    let encoded = encoded.strip_prefix("orig/").unwrap_or(encoded);
    let decoded = urlencoding::decode(encoded).ok()?.into_owned();

    let absolute = if decoded.starts_with("http://") || decoded.starts_with("https://") {
        decoded
    } else {
        format!(
            "{}/{}",
            origin.trim_end_matches('/'),
            decoded.trim_start_matches('/')
        )
    };

    let mut url = url::Url::parse(&absolute).ok()?;
    if !url.path().starts_with("/media/") {
        return None;
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "name")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("name", "orig");
    Some(url.to_string())
}
