//! Deterministic CDN path harvester

use super::{HarvestContext, HarvestServices, Harvester};
use crate::error::Result;
use crate::types::{Candidate, MethodKind, SourceTag};
use crate::utils::{TemplateVars, expand_template};
use async_trait::async_trait;

/// Builds CDN URLs from the date, slug variants and size suffixes
///
/// Slug variants are tried in order, and for each slug the sizes from the
/// largest down; the first URL whose probe clears the CDN threshold wins.
/// A publisher's own `cdn` method descriptors override the default template.
#[derive(Clone, Debug)]
pub struct CdnHarvester {
    services: HarvestServices,
}

impl CdnHarvester {
    /// Create the harvester
    pub fn new(services: HarvestServices) -> Self {
        Self { services }
    }

    /// Candidate URLs in priority order
    pub fn candidate_urls(&self, ctx: &HarvestContext<'_>) -> Vec<String> {
        let sources = &self.services.sources;
        let publisher = ctx.publisher;

        let mut templates: Vec<&str> = publisher
            .primary
            .iter()
            .chain(publisher.fallbacks.iter())
            .filter(|m| m.kind == MethodKind::Cdn && !m.url.is_empty())
            .map(|m| m.url.as_str())
            .collect();
        templates.push(sources.cdn_template.as_str());
        templates.dedup();

        let slugs = publisher.slug_variants();
        let mut urls = Vec::new();
        for template in templates {
            for slug in &slugs {
                for size in &sources.cdn_sizes {
                    let vars = TemplateVars {
                        slug: Some(slug.as_str()),
                        size: Some(size.as_str()),
                        ..ctx.template_vars()
                    };
                    let url = expand_template(template, &vars);
                    if !urls.contains(&url) {
                        urls.push(url);
                    }
                }
            }
        }
        urls
    }
}

#[async_trait]
impl Harvester for CdnHarvester {
    fn name(&self) -> &'static str {
        "cdn"
    }

    async fn produce(&self, ctx: &HarvestContext<'_>) -> Result<Vec<Candidate>> {
        let referer = self
            .services
            .sources
            .cdn_referer
            .as_deref()
            .map(|template| expand_template(template, &ctx.template_vars()));

        for url in self.candidate_urls(ctx) {
            let mut candidate = Candidate::new(url, SourceTag::Cdn);
            if let Some(referer) = &referer {
                candidate = candidate.with_referer(referer.as_str());
            }
            if let Some(scored) = self.services.accept(candidate).await {
                tracing::debug!(
                    publisher = %ctx.publisher.id,
                    url = %scored.candidate.url,
                    score = scored.score,
                    "CDN candidate accepted"
                );
                return Ok(vec![scored.candidate]);
            }
        }
        Ok(Vec::new())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::test_support::{services, sources_at};
    use crate::probe::sniff::fixtures;
    use crate::types::{MethodDescriptor, Publisher};
    use chrono::NaiveDate;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx(publisher: &Publisher) -> HarvestContext<'_> {
        HarvestContext {
            requested_id: &publisher.id,
            publisher,
            date: NaiveDate::from_ymd_opt(2025, 12, 20).unwrap(),
        }
    }

    fn jpeg_response(w: u16, h: u16, total: u64) -> ResponseTemplate {
        ResponseTemplate::new(206)
            .insert_header("content-type", "image/jpeg")
            .insert_header("content-range", format!("bytes 0-4095/{}", total))
            .set_body_bytes(fixtures::jpeg(w, h, 4096))
    }

    #[test]
    fn urls_cover_every_slug_and_size_in_order() {
        let harvester = CdnHarvester::new(services(Default::default()));
        let publisher = Publisher::new("la-razon", "es", "La Razón");

        let urls = harvester.candidate_urls(&ctx(&publisher));

        assert_eq!(urls.len(), 9);
        assert_eq!(urls[0], "https://img.kiosko.net/2025/12/20/es/la-razon.750.jpg");
        assert_eq!(urls[1], "https://img.kiosko.net/2025/12/20/es/la-razon.500.jpg");
        assert_eq!(urls[3], "https://img.kiosko.net/2025/12/20/es/larazon.750.jpg");
        assert_eq!(urls[8], "https://img.kiosko.net/2025/12/20/es/la_razon.200.jpg");
    }

    #[test]
    fn configured_cdn_template_comes_first() {
        let harvester = CdnHarvester::new(services(Default::default()));
        let mut publisher = Publisher::new("abc", "es", "ABC");
        publisher.primary = Some(MethodDescriptor {
            kind: MethodKind::Cdn,
            url: "https://covers.example.com/{date}/{slug}-{size}.jpg".into(),
            selector: None,
        });

        let urls = harvester.candidate_urls(&ctx(&publisher));

        assert_eq!(urls[0], "https://covers.example.com/2025-12-20/abc-750.jpg");
        assert_eq!(urls.len(), 6);
    }

    #[tokio::test]
    async fn short_circuits_on_first_accepted_size() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cdn/2025/12/20/es/elpais.750.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cdn/2025/12/20/es/elpais.500.jpg"))
            .and(header("referer", format!("{}/es/", server.uri()).as_str()))
            .respond_with(jpeg_response(1200, 1600, 650_000))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cdn/2025/12/20/es/elpais.200.jpg"))
            .respond_with(jpeg_response(1200, 1600, 650_000))
            .expect(0)
            .mount(&server)
            .await;

        let harvester = CdnHarvester::new(services(sources_at(&server.uri())));
        let publisher = Publisher::new("elpais", "es", "El País");

        let candidates = harvester.produce(&ctx(&publisher)).await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].url.ends_with("/elpais.500.jpg"));
        assert_eq!(candidates[0].source, SourceTag::Cdn);
    }

    #[tokio::test]
    async fn thumbnails_below_threshold_are_skipped() {
        let server = MockServer::start().await;
        // Only a tiny landscape thumbnail exists
        Mock::given(method("GET"))
            .and(path("/cdn/2025/12/20/es/elpais.200.jpg"))
            .respond_with(jpeg_response(200, 150, 6_000))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let harvester = CdnHarvester::new(services(sources_at(&server.uri())));
        let publisher = Publisher::new("elpais", "es", "El País");

        let candidates = harvester.produce(&ctx(&publisher)).await.unwrap();
        assert!(candidates.is_empty());
    }
}
