//! Publisher mirror page harvester

use super::{HarvestContext, HarvestServices, Harvester};
use crate::error::Result;
use crate::types::{Candidate, SourceTag};
use crate::utils::{TemplateVars, expand_template};
use async_trait::async_trait;

/// Scrapes the publisher's page on the kiosk mirror
///
/// Every image the signal chain finds is probed and scored; the best one
/// that clears the scraped-source threshold is returned.
#[derive(Clone, Debug)]
pub struct ListingHarvester {
    services: HarvestServices,
}

impl ListingHarvester {
    /// Create the harvester
    pub fn new(services: HarvestServices) -> Self {
        Self { services }
    }

    /// Mirror page URL for a request
    pub fn page_url(&self, ctx: &HarvestContext<'_>) -> String {
        let slug = ctx
            .publisher
            .slug_variants()
            .into_iter()
            .next()
            .unwrap_or_else(|| ctx.publisher.id.clone());
        let vars = TemplateVars {
            slug: Some(slug.as_str()),
            ..ctx.template_vars()
        };
        expand_template(&self.services.sources.listing_template, &vars)
    }
}

#[async_trait]
impl Harvester for ListingHarvester {
    fn name(&self) -> &'static str {
        "listing"
    }

    async fn produce(&self, ctx: &HarvestContext<'_>) -> Result<Vec<Candidate>> {
        let page_url = self.page_url(ctx);
        let candidates = self
            .services
            .scrape_page(&page_url, None, SourceTag::Listing)
            .await?;
        Ok(self
            .services
            .best_accepted(candidates)
            .await
            .into_iter()
            .collect())
    }
}
