//! Entity resolution and enrichment.
//!
//! Each scraped person is resolved against the [`Authority`] with an ordered
//! fallback chain, stopping at the first strategy that yields a candidate:
//!
//! 1. [`MatchStrategy::Orcid`]: direct lookup when the person carries an ORCID iD.
//! 2. [`MatchStrategy::NameInstitution`]: name search filtered to the tenant's
//!    registered institution id (skipped when none is configured).
//! 3. [`MatchStrategy::NameOnly`]: unfiltered name search, top hit.
//!
//! A found candidate is scored with [`assess_candidate`]; no candidate at all
//! is [`MatchConfidence::None`]. Enrichment never fails: every person gets
//! exactly one [`EnrichmentResult`].
//!
//! Batch enrichment walks the input in chunks of `batch_size`, runs up to
//! `max_concurrency` lookups of a chunk at once (results keep input order),
//! and pauses `batch_pause_ms` between chunks.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use federation_core::matching::{assess_candidate, extract_topics, AuthorCandidate};
use federation_core::models::{
    AuthorMetrics, EnrichmentResult, MatchConfidence, MatchStrategy, ScrapedPerson,
};

use crate::authority::Authority;
use crate::config::{EnrichmentConfig, TenantConfig};

/// Resolution order. Strategies that do not apply to a person are skipped.
pub const STRATEGY_CHAIN: [MatchStrategy; 3] = [
    MatchStrategy::Orcid,
    MatchStrategy::NameInstitution,
    MatchStrategy::NameOnly,
];

/// Per-tenant resolution inputs.
#[derive(Debug, Clone, Default)]
pub struct TenantMatchContext {
    pub institution_id: Option<String>,
    pub institution_names: Vec<String>,
    /// Number of top works to attach to a match; 0 disables the lookup.
    pub works_per_author: usize,
}

impl TenantMatchContext {
    pub fn for_tenant(tenant: &TenantConfig, enrichment: &EnrichmentConfig) -> Self {
        Self {
            institution_id: tenant
                .enrichment
                .institution_id
                .clone()
                .filter(|id| !id.trim().is_empty()),
            institution_names: tenant.enrichment.institution_names.clone(),
            works_per_author: if tenant.enrichment.works {
                enrichment.works_per_author
            } else {
                0
            },
        }
    }
}

/// Chunking and backpressure settings for [`Enricher::enrich_batch`].
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub max_concurrency: usize,
}

impl From<&EnrichmentConfig> for BatchSettings {
    fn from(cfg: &EnrichmentConfig) -> Self {
        Self {
            batch_size: cfg.batch_size.max(1),
            batch_pause: Duration::from_millis(cfg.batch_pause_ms),
            max_concurrency: cfg.max_concurrency.max(1),
        }
    }
}

#[derive(Clone)]
pub struct Enricher {
    authority: Arc<dyn Authority>,
    batch: BatchSettings,
    cancel: CancellationToken,
}

impl Enricher {
    pub fn new(authority: Arc<dyn Authority>, batch: BatchSettings, cancel: CancellationToken) -> Self {
        Self {
            authority,
            batch,
            cancel,
        }
    }

    /// Run one strategy. `None` when it does not apply or finds nothing.
    async fn try_strategy(
        &self,
        strategy: MatchStrategy,
        person: &ScrapedPerson,
        ctx: &TenantMatchContext,
    ) -> Option<AuthorCandidate> {
        match strategy {
            MatchStrategy::Orcid => {
                let orcid = person.orcid.as_deref()?;
                self.authority.author_by_orcid(orcid).await
            }
            MatchStrategy::NameInstitution => {
                let institution_id = ctx.institution_id.as_deref()?;
                self.authority
                    .search_authors(&person.full_name, Some(institution_id))
                    .await
            }
            MatchStrategy::NameOnly => self.authority.search_authors(&person.full_name, None).await,
        }
    }

    /// First candidate along [`STRATEGY_CHAIN`].
    pub async fn resolve(
        &self,
        person: &ScrapedPerson,
        ctx: &TenantMatchContext,
    ) -> Option<(AuthorCandidate, MatchStrategy)> {
        for strategy in STRATEGY_CHAIN {
            if let Some(candidate) = self.try_strategy(strategy, person, ctx).await {
                return Some((candidate, strategy));
            }
        }
        None
    }

    /// Resolve, score, and attach metrics, topics, and (optionally) works.
    pub async fn enrich_person(
        &self,
        person: &ScrapedPerson,
        ctx: &TenantMatchContext,
    ) -> EnrichmentResult {
        let Some((candidate, strategy)) = self.resolve(person, ctx).await else {
            tracing::debug!(person = %person.full_name, "no authority candidate");
            return EnrichmentResult::unmatched(person.clone());
        };

        let (score, confidence) =
            assess_candidate(&person.full_name, &candidate, &ctx.institution_names);
        tracing::debug!(
            person = %person.full_name,
            candidate = %candidate.display_name,
            strategy = ?strategy,
            score,
            confidence = %confidence,
            "authority match"
        );

        let works = if ctx.works_per_author > 0 {
            self.authority
                .top_works(&candidate.id, ctx.works_per_author)
                .await
        } else {
            Vec::new()
        };

        EnrichmentResult {
            person: person.clone(),
            openalex_id: Some(candidate.id.clone()),
            matched_name: Some(candidate.display_name.clone()).filter(|n| !n.is_empty()),
            strategy: Some(strategy),
            metrics: Some(AuthorMetrics {
                works_count: candidate.works_count,
                cited_by_count: candidate.cited_by_count,
                h_index: candidate.h_index,
                i10_index: candidate.i10_index,
            }),
            topics: extract_topics(&candidate.topics),
            works,
            confidence,
        }
    }

    /// Enrich `people` in order with chunking, bounded concurrency, and
    /// pauses between chunks.
    ///
    /// On cancellation the chunk in flight completes and the results so far
    /// are returned.
    pub async fn enrich_batch(
        &self,
        people: &[ScrapedPerson],
        ctx: &TenantMatchContext,
    ) -> Vec<EnrichmentResult> {
        let mut results = Vec::with_capacity(people.len());
        let chunks: Vec<&[ScrapedPerson]> = people.chunks(self.batch.batch_size).collect();
        let total = chunks.len();

        for (i, chunk) in chunks.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(done = results.len(), total = people.len(), "enrichment cancelled");
                break;
            }

            let enriched: Vec<EnrichmentResult> = stream::iter(chunk)
                .map(|person| self.enrich_person(person, ctx))
                .buffered(self.batch.max_concurrency)
                .collect()
                .await;
            results.extend(enriched);

            tracing::debug!(batch = i + 1, batches = total, done = results.len(), "batch enriched");

            if i + 1 < total && !self.batch.batch_pause.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.batch.batch_pause) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
        }

        results
    }
}

/// Number of results with a candidate.
pub fn matched_count(results: &[EnrichmentResult]) -> usize {
    results
        .iter()
        .filter(|r| r.confidence != MatchConfidence::None)
        .count()
}
