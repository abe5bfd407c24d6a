//! Curated-override harvester

use super::{HarvestContext, HarvestServices, Harvester};
use crate::curated::CuratedStore;
use crate::error::{Error, Result};
use crate::types::{Candidate, SourceTag};
use crate::utils::url_dates;
use async_trait::async_trait;
use std::sync::Arc;

/// Replays a persisted curated record for the exact request
///
/// The record is looked up under the requested id first, then under the
/// alias target. Any date embedded in the record's URL must equal the
/// requested date. A mismatched record is skipped in favour of the next id;
/// only when no record is usable does the harvester fail with
/// [`Error::StrictDateMismatch`], which is never retried.
#[derive(Clone)]
pub struct CuratedHarvester {
    services: HarvestServices,
    store: Arc<dyn CuratedStore>,
}

impl std::fmt::Debug for CuratedHarvester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CuratedHarvester").finish_non_exhaustive()
    }
}

impl CuratedHarvester {
    /// Create the harvester over a record store
    pub fn new(services: HarvestServices, store: Arc<dyn CuratedStore>) -> Self {
        Self { services, store }
    }
}

/// Reject a URL whose embedded date tokens disagree with `expected`
pub fn check_url_date(url: &str, expected: chrono::NaiveDate) -> Result<()> {
    match url_dates(url).into_iter().find(|d| *d != expected) {
        Some(found) => Err(Error::StrictDateMismatch {
            url: url.to_string(),
            expected,
            found: found.to_string(),
        }),
        None => Ok(()),
    }
}

#[async_trait]
impl Harvester for CuratedHarvester {
    fn name(&self) -> &'static str {
        "curated"
    }

    async fn produce(&self, ctx: &HarvestContext<'_>) -> Result<Vec<Candidate>> {
        let mut ids = vec![ctx.requested_id];
        if ctx.publisher.id != ctx.requested_id {
            ids.push(ctx.publisher.id.as_str());
        }

        let mut mismatch = None;
        for id in ids {
            let Some(record) = self.store.lookup(id, ctx.date).await? else {
                continue;
            };
            if let Err(e) = check_url_date(&record.source_url, ctx.date) {
                tracing::debug!(
                    publisher = id,
                    date = %ctx.date,
                    error = %e,
                    "Skipping curated record"
                );
                mismatch.get_or_insert(e);
                continue;
            }

            tracing::debug!(
                publisher = id,
                date = %ctx.date,
                url = %record.source_url,
                provenance = %record.provenance,
                "Found curated record"
            );
            let candidate = Candidate::new(record.source_url, SourceTag::Curated);
            return Ok(self
                .services
                .accept(candidate)
                .await
                .map(|scored| scored.candidate)
                .into_iter()
                .collect());
        }
        match mismatch {
            Some(e) => Err(e),
            None => Ok(Vec::new()),
        }
    }
}
