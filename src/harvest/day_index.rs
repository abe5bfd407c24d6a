//! Fuzzy day-index harvester

use super::extract::{Tile, linked_tiles};
use super::{HarvestContext, HarvestServices, Harvester};
use crate::error::Result;
use crate::types::{Candidate, Publisher, SourceTag};
use crate::utils::{expand_template, tokenize};
use async_trait::async_trait;
use std::collections::HashSet;

/// Articles and prepositions that carry no identity in publisher names
const STOPWORDS: &[&str] = &[
    "el", "la", "lo", "los", "las", "de", "del", "da", "das", "do", "dos", "en", "y", "e", "o",
    "a", "le", "les", "du", "des", "the", "of", "and",
];

/// Matches the publisher against the tiles of a date-indexed page
///
/// The tile whose text best overlaps the publisher's id and name tokens is
/// only probed when that overlap reaches `min_match_confidence`, whatever
/// its image would score.
#[derive(Clone, Debug)]
pub struct DayIndexHarvester {
    services: HarvestServices,
}

impl DayIndexHarvester {
    /// Create the harvester
    pub fn new(services: HarvestServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Harvester for DayIndexHarvester {
    fn name(&self) -> &'static str {
        "day-index"
    }

    async fn produce(&self, ctx: &HarvestContext<'_>) -> Result<Vec<Candidate>> {
        let page_url = expand_template(
            &self.services.sources.day_index_template,
            &ctx.template_vars(),
        );
        let base = url::Url::parse(&page_url)?;
        let html = self.services.http.get_text(&page_url, None).await?;
        let tiles = linked_tiles(&html, &base);

        let Some((tile, confidence)) = best_tile(ctx.publisher, &tiles) else {
            tracing::debug!(page = %page_url, "Day index has no image tiles");
            return Ok(Vec::new());
        };
        let min_confidence = self.services.sources.min_match_confidence;
        if confidence < min_confidence {
            tracing::debug!(
                publisher = %ctx.publisher.id,
                confidence = confidence,
                min_confidence = min_confidence,
                "No day index tile matches the publisher"
            );
            return Ok(Vec::new());
        }

        tracing::debug!(
            publisher = %ctx.publisher.id,
            url = %tile.image,
            confidence = confidence,
            "Matched day index tile"
        );
        let candidate =
            Candidate::new(tile.image.clone(), SourceTag::DayIndex).with_referer(page_url.as_str());
        Ok(self
            .services
            .accept(candidate)
            .await
            .map(|scored| scored.candidate)
            .into_iter()
            .collect())
    }
}

/// Tile with the highest confidence; ties keep the earlier tile
fn best_tile<'t>(publisher: &Publisher, tiles: &'t [Tile]) -> Option<(&'t Tile, f64)> {
    let mut best: Option<(&Tile, f64)> = None;
    for tile in tiles {
        let confidence = match_confidence(publisher, &tile.text);
        if best.is_none_or(|(_, c)| confidence > c) {
            best = Some((tile, confidence));
        }
    }
    best
}

/// Share of the publisher's significant tokens present in a tile text
///
/// A tile token equal to a separator-free slug variant (`elpais` for
/// `el-pais`) is a full match.
pub fn match_confidence(publisher: &Publisher, tile_text: &str) -> f64 {
    let tile_tokens: HashSet<String> = tokenize(tile_text, 1).into_iter().collect();

    if publisher
        .slug_variants()
        .iter()
        .map(|s| tokenize(s, 1).concat())
        .any(|s| !s.is_empty() && tile_tokens.contains(&s))
    {
        return 1.0;
    }

    let target = significant_tokens(&format!("{} {}", publisher.id, publisher.name));
    if target.is_empty() {
        return 0.0;
    }
    let hits = target.iter().filter(|t| tile_tokens.contains(*t)).count();
    hits as f64 / target.len() as f64
}

fn significant_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in tokenize(text, 1) {
        if !STOPWORDS.contains(&token.as_str()) && !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::test_support::{services, sources_at};
    use crate::probe::sniff::fixtures;
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn confidence_folds_accents_and_drops_stopwords() {
        let publisher = Publisher::new("diario-de-sevilla", "es", "Diario de Sevilla");

        assert_eq!(match_confidence(&publisher, "DIARIO DE SEVILLA - portada"), 1.0);
        assert_eq!(match_confidence(&publisher, "Diario de Cádiz"), 0.5);
        assert_eq!(match_confidence(&publisher, "/es/np/diariodesevilla.html"), 1.0);

        let accented = Publisher::new("el-pais", "es", "El País");
        assert_eq!(match_confidence(&accented, "EL PAÍS"), 1.0);
        assert_eq!(match_confidence(&accented, "El Mundo"), 0.0);
    }

    fn page(base: &str) -> String {
        format!(
            r#"<ul>
              <li><a href="/es/np/elmundo.html"><img src="{b}/t/elmundo.jpg" alt="El Mundo"></a></li>
              <li><a href="/es/np/elpais.html"><img src="{b}/t/elpais.jpg" alt="El País"></a></li>
            </ul>"#,
            b = base
        )
    }

    #[tokio::test]
    async fn probes_only_the_matching_tile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/es/2025-12-20/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(page(&server.uri()), "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/t/elpais.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(fixtures::jpeg(700, 1000, 90_000)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/t/elmundo.jpg"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let harvester = DayIndexHarvester::new(services(sources_at(&server.uri())));
        let publisher = Publisher::new("el-pais", "es", "El País");
        let ctx = HarvestContext {
            requested_id: "el-pais",
            publisher: &publisher,
            date: NaiveDate::from_ymd_opt(2025, 12, 20).unwrap(),
        };

        let candidates = harvester.produce(&ctx).await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, format!("{}/t/elpais.jpg", server.uri()));
        assert_eq!(candidates[0].source, SourceTag::DayIndex);
    }

    #[tokio::test]
    async fn weak_text_match_never_probes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/es/2025-12-20/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(page(&server.uri()), "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/t/elpais.jpg"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/t/elmundo.jpg"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let harvester = DayIndexHarvester::new(services(sources_at(&server.uri())));
        let publisher = Publisher::new("la-vanguardia", "es", "La Vanguardia");
        let ctx = HarvestContext {
            requested_id: "la-vanguardia",
            publisher: &publisher,
            date: NaiveDate::from_ymd_opt(2025, 12, 20).unwrap(),
        };

        assert!(harvester.produce(&ctx).await.unwrap().is_empty());
    }
}
