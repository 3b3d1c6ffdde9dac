//! Four-phase federation pipeline.
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌─────────────┐   ┌───────────┐
//! │ 1 Scrape │──▶│ 2 Enrich │──▶│ 3 Build idx │──▶│ 4 Summary │
//! └────┬─────┘   └────┬─────┘   └──────┬──────┘   └─────┬─────┘
//!      ▼              ▼                ▼                ▼
//!  raw/<slug>   enriched/<slug>  federation_index  run_summary
//!  imports/<slug>
//! ```
//!
//! Each phase reads its inputs from the files the previous phase wrote, so
//! `--skip-scrape` and `--skip-enrichment` resume from whatever is already
//! on disk. A tenant failing in one phase is logged and contributes zero
//! records to that phase; it is never dropped from later phases.
//!
//! Tenants are processed with at most `pipeline.max_parallel_tenants` in
//! flight; outputs always follow configuration order.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use federation_core::index::build_tenant_profiles;
use federation_core::models::{
    EnrichedTenantFile, EnrichmentResult, FederationIndexFile, ImportError, ImportResult,
    RawTenantFile, ScrapedPerson,
};

use crate::authority::Authority;
use crate::config::{Config, TenantConfig};
use crate::directory::{DirectoryScraper, PageSource};
use crate::enricher::{matched_count, BatchSettings, Enricher, TenantMatchContext};

/// Caller-selected phase switches.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub skip_scrape: bool,
    pub skip_enrichment: bool,
    /// Restrict scrape and enrich to these slugs; the index always covers
    /// every configured tenant.
    pub tenants: Option<Vec<String>>,
}

/// `run_summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub federation_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub scrape_skipped: bool,
    pub enrichment_skipped: bool,
    pub cancelled: bool,
    pub tenants: Vec<TenantSummary>,
    pub totals: RunTotals,
    pub outputs: RunOutputs,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantSummary {
    pub slug: String,
    pub name: String,
    pub scraped: bool,
    /// Raw records available to the index (scraped now or loaded from disk).
    pub found: usize,
    /// Extraction errors recorded by this run's scrape.
    pub failed: usize,
    pub enriched: usize,
    pub matched: usize,
    pub profiles: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub found: usize,
    pub failed: usize,
    pub enriched: usize,
    pub matched: usize,
    pub profiles: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOutputs {
    pub raw: Vec<PathBuf>,
    pub imports: Vec<PathBuf>,
    pub enriched: Vec<PathBuf>,
    pub index: PathBuf,
    pub summary: PathBuf,
}

// ============ JSON files ============

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// `Ok(None)` when the file does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

// ============ Pipeline ============

pub struct Pipeline {
    config: Config,
    scraper: DirectoryScraper,
    enricher: Enricher,
    cancel: CancellationToken,
}

struct ScrapePhaseOutcome {
    slug: String,
    found: usize,
    failed: usize,
}

struct EnrichPhaseOutcome {
    slug: String,
    enriched: usize,
    matched: usize,
}

impl Pipeline {
    pub fn new(
        config: Config,
        pages: Arc<dyn PageSource>,
        authority: Arc<dyn Authority>,
        cancel: CancellationToken,
    ) -> Self {
        let scraper = DirectoryScraper::new(pages, cancel.clone());
        let enricher = Enricher::new(
            authority,
            BatchSettings::from(&config.enrichment),
            cancel.clone(),
        );
        Self {
            config,
            scraper,
            enricher,
            cancel,
        }
    }

    /// Tenants selected by `--tenants`, in configuration order.
    fn selected_tenants(&self, options: &RunOptions) -> Result<Vec<&TenantConfig>> {
        let Some(filter) = &options.tenants else {
            return Ok(self.config.tenants.iter().collect());
        };
        let known: HashSet<&str> = self.config.tenants.iter().map(|t| t.slug.as_str()).collect();
        for slug in filter {
            if !known.contains(slug.as_str()) {
                anyhow::bail!("Unknown tenant: '{}'", slug);
            }
        }
        Ok(self
            .config
            .tenants
            .iter()
            .filter(|t| filter.iter().any(|s| *s == t.slug))
            .collect())
    }

    /// Run all four phases and persist the run summary.
    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let started_at = Utc::now();
        let output = &self.config.output;
        std::fs::create_dir_all(&output.dir).with_context(|| {
            format!("Failed to create output directory: {}", output.dir.display())
        })?;

        let selected = self.selected_tenants(options)?;
        tracing::info!(
            federation = %self.config.federation.id,
            tenants = selected.len(),
            "pipeline starting"
        );

        // Phase 1
        let scraped = if options.skip_scrape {
            tracing::info!("phase 1: scrape skipped");
            Vec::new()
        } else {
            self.scrape_phase(&selected).await?
        };

        // Phase 2
        let enriched = if options.skip_enrichment {
            tracing::info!("phase 2: enrichment skipped");
            Vec::new()
        } else {
            self.enrich_phase(&selected).await?
        };

        // Phase 3
        let profile_counts = self.index_phase()?;

        // Phase 4
        let mut tenants = Vec::new();
        for (tenant, (found, profiles)) in self.config.tenants.iter().zip(profile_counts) {
            let scrape = scraped.iter().find(|s| s.slug == tenant.slug);
            let enrich = enriched.iter().find(|e| e.slug == tenant.slug);
            tenants.push(TenantSummary {
                slug: tenant.slug.clone(),
                name: tenant.name.clone(),
                scraped: scrape.is_some(),
                found: scrape.map(|s| s.found).unwrap_or(found),
                failed: scrape.map(|s| s.failed).unwrap_or(0),
                enriched: enrich.map(|e| e.enriched).unwrap_or(0),
                matched: enrich.map(|e| e.matched).unwrap_or(0),
                profiles,
            });
        }

        let totals = RunTotals {
            found: tenants.iter().map(|t| t.found).sum(),
            failed: tenants.iter().map(|t| t.failed).sum(),
            enriched: tenants.iter().map(|t| t.enriched).sum(),
            matched: tenants.iter().map(|t| t.matched).sum(),
            profiles: tenants.iter().map(|t| t.profiles).sum(),
        };

        let outputs = RunOutputs {
            raw: scraped.iter().map(|s| output.raw_file(&s.slug)).collect(),
            imports: scraped.iter().map(|s| output.imports_file(&s.slug)).collect(),
            enriched: enriched.iter().map(|e| output.enriched_file(&e.slug)).collect(),
            index: output.index_file(),
            summary: output.summary_file(),
        };

        let finished_at = Utc::now();
        let summary = RunSummary {
            federation_id: self.config.federation.id.clone(),
            started_at,
            finished_at,
            duration_secs: (finished_at - started_at).num_milliseconds() as f64 / 1000.0,
            scrape_skipped: options.skip_scrape,
            enrichment_skipped: options.skip_enrichment,
            cancelled: self.cancel.is_cancelled(),
            tenants,
            totals,
            outputs,
        };
        write_json(&output.summary_file(), &summary)?;
        tracing::info!(
            profiles = summary.totals.profiles,
            matched = summary.totals.matched,
            duration_secs = summary.duration_secs,
            "pipeline finished"
        );

        Ok(summary)
    }

    // ============ Phase 1 ============

    async fn scrape_phase(&self, selected: &[&TenantConfig]) -> Result<Vec<ScrapePhaseOutcome>> {
        let eligible: Vec<&TenantConfig> = selected
            .iter()
            .copied()
            .filter(|t| {
                if !t.is_scrapable() {
                    tracing::debug!(tenant = %t.slug, kind = %t.kind, "not scrapable, skipping");
                }
                t.is_scrapable()
            })
            .collect();
        tracing::info!(tenants = eligible.len(), "phase 1: scrape");

        let outcomes: Vec<Result<ScrapePhaseOutcome>> = stream::iter(eligible)
            .map(|tenant| self.scrape_tenant(tenant))
            .buffered(self.config.pipeline.max_parallel_tenants)
            .collect()
            .await;
        outcomes.into_iter().collect()
    }

    async fn scrape_tenant(&self, tenant: &TenantConfig) -> Result<ScrapePhaseOutcome> {
        let started_at = Utc::now();
        let (people, result) = match self.scraper.scrape(tenant).await {
            Ok(outcome) => (outcome.people, outcome.result),
            Err(e) => {
                tracing::error!(tenant = %tenant.slug, error = %format!("{:#}", e), "scrape failed");
                let result = ImportResult {
                    tenant_slug: tenant.slug.clone(),
                    started_at,
                    finished_at: Utc::now(),
                    found: 0,
                    failed: 1,
                    errors: vec![ImportError {
                        at: Utc::now(),
                        url: None,
                        person_name: None,
                        index: None,
                        message: format!("{:#}", e),
                    }],
                };
                (Vec::new(), result)
            }
        };

        tracing::info!(
            tenant = %tenant.slug,
            found = result.found,
            failed = result.failed,
            "tenant scraped"
        );

        let output = &self.config.output;
        let raw = RawTenantFile {
            tenant_slug: tenant.slug.clone(),
            institution_name: tenant.name.clone(),
            scraped_at: result.finished_at,
            count: people.len(),
            people,
        };
        write_json(&output.raw_file(&tenant.slug), &raw)?;
        write_json(&output.imports_file(&tenant.slug), &result)?;

        Ok(ScrapePhaseOutcome {
            slug: tenant.slug.clone(),
            found: result.found,
            failed: result.failed,
        })
    }

    // ============ Phase 2 ============

    async fn enrich_phase(&self, selected: &[&TenantConfig]) -> Result<Vec<EnrichPhaseOutcome>> {
        let eligible: Vec<&TenantConfig> = selected
            .iter()
            .copied()
            .filter(|t| t.is_enrichable())
            .collect();
        tracing::info!(tenants = eligible.len(), "phase 2: enrich");

        let outcomes: Vec<Result<EnrichPhaseOutcome>> = stream::iter(eligible)
            .map(|tenant| self.enrich_tenant(tenant))
            .buffered(self.config.pipeline.max_parallel_tenants)
            .collect()
            .await;
        outcomes.into_iter().collect()
    }

    async fn enrich_tenant(&self, tenant: &TenantConfig) -> Result<EnrichPhaseOutcome> {
        let people = self.load_people(tenant);
        let ctx = TenantMatchContext::for_tenant(tenant, &self.config.enrichment);
        let results = self.enricher.enrich_batch(&people, &ctx).await;
        let matched = matched_count(&results);

        tracing::info!(
            tenant = %tenant.slug,
            people = people.len(),
            enriched = results.len(),
            matched,
            "tenant enriched"
        );

        let file = EnrichedTenantFile {
            tenant_slug: tenant.slug.clone(),
            enriched_at: Utc::now(),
            count: results.len(),
            matched,
            results,
        };
        write_json(&self.config.output.enriched_file(&tenant.slug), &file)?;

        Ok(EnrichPhaseOutcome {
            slug: tenant.slug.clone(),
            enriched: file.count,
            matched,
        })
    }

    /// Raw records of a tenant; a missing or unreadable file is zero records.
    fn load_people(&self, tenant: &TenantConfig) -> Vec<ScrapedPerson> {
        let path = self.config.output.raw_file(&tenant.slug);
        match read_json::<RawTenantFile>(&path) {
            Ok(Some(raw)) => raw.people,
            Ok(None) => {
                tracing::debug!(tenant = %tenant.slug, path = %path.display(), "no raw records");
                Vec::new()
            }
            Err(e) => {
                tracing::error!(tenant = %tenant.slug, error = %format!("{:#}", e), "raw records unreadable");
                Vec::new()
            }
        }
    }

    fn load_enrichment(&self, tenant: &TenantConfig) -> Vec<EnrichmentResult> {
        let path = self.config.output.enriched_file(&tenant.slug);
        match read_json::<EnrichedTenantFile>(&path) {
            Ok(Some(file)) => file.results,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::error!(tenant = %tenant.slug, error = %format!("{:#}", e), "enrichment results unreadable");
                Vec::new()
            }
        }
    }

    // ============ Phase 3 ============

    /// Merge every configured tenant into the index file. Returns
    /// `(raw records, profiles)` per tenant in configuration order.
    fn index_phase(&self) -> Result<Vec<(usize, usize)>> {
        tracing::info!(tenants = self.config.tenants.len(), "phase 3: build federation index");

        let mut profiles = Vec::new();
        let mut counts = Vec::with_capacity(self.config.tenants.len());
        for tenant in &self.config.tenants {
            let people = self.load_people(tenant);
            let enrichment = self.load_enrichment(tenant);
            let merged = build_tenant_profiles(&tenant.name, &people, &enrichment);
            tracing::debug!(tenant = %tenant.slug, profiles = merged.len(), "tenant merged");
            counts.push((people.len(), merged.len()));
            profiles.extend(merged);
        }

        let file = FederationIndexFile::assemble(
            &self.config.federation.id,
            &self.config.federation.name,
            profiles,
        );
        write_json(&self.config.output.index_file(), &file)?;
        tracing::info!(profiles = file.total_profiles, "federation index written");
        Ok(counts)
    }
}
