//! Configuration parsing and validation.
//!
//! Faculty Federation is configured via a TOML file (default:
//! `config/federation.toml`). The file identifies the federation, names the
//! output directory, tunes the authority client and batch enrichment, and
//! declares one `[[tenants]]` table per participating institution.
//!
//! # Example
//!
//! ```toml
//! [federation]
//! id = "atlanta-research"
//! name = "Atlanta Research Consortium"
//!
//! [output]
//! dir = "./data/federation"
//!
//! [authority]
//! mailto = "ops@example.edu"
//!
//! [[tenants]]
//! slug = "gsu"
//! name = "Georgia State University"
//! kind = "consortium"
//!
//! [tenants.crawl]
//! urls = ["https://neuroscience.gsu.edu/directory/"]
//!
//! [tenants.crawl.selectors]
//! container = ".profile-card"
//! name = "h3"
//! photo = "img@src"
//!
//! [tenants.enrichment]
//! openalex = true
//! institution_names = ["Georgia State"]
//! ```
//!
//! Tenant configuration is data only. Adding an institution means adding a
//! `[[tenants]]` table, never a code path.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::directory::SelectorSet;

/// Logical person fields a tenant may map to a CSS selector.
pub const SELECTOR_FIELDS: &[&str] = &[
    "container",
    "name",
    "position",
    "department",
    "college",
    "email",
    "phone",
    "office",
    "bio",
    "research_interests",
    "photo",
    "profile",
    "orcid",
];

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub federation: FederationConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub authority: AuthorityConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FederationConfig {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl OutputConfig {
    pub fn raw_file(&self, slug: &str) -> PathBuf {
        self.dir.join("raw").join(format!("{}.json", slug))
    }

    pub fn imports_file(&self, slug: &str) -> PathBuf {
        self.dir.join("imports").join(format!("{}.json", slug))
    }

    pub fn enriched_file(&self, slug: &str) -> PathBuf {
        self.dir.join("enriched").join(format!("{}.json", slug))
    }

    pub fn index_file(&self) -> PathBuf {
        self.dir.join("federation_index.json")
    }

    pub fn summary_file(&self) -> PathBuf {
        self.dir.join("run_summary.json")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthorityConfig {
    #[serde(default = "default_authority_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub mailto: Option<String>,
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
    #[serde(default = "default_authority_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            base_url: default_authority_base_url(),
            mailto: None,
            min_request_interval_ms: default_min_request_interval_ms(),
            timeout_secs: default_authority_timeout_secs(),
        }
    }
}

fn default_authority_base_url() -> String {
    "https://api.openalex.org".to_string()
}
fn default_min_request_interval_ms() -> u64 {
    100
}
fn default_authority_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnrichmentConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_works_per_author")]
    pub works_per_author: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            max_concurrency: default_max_concurrency(),
            works_per_author: default_works_per_author(),
        }
    }
}

fn default_batch_size() -> usize {
    10
}
fn default_batch_pause_ms() -> u64 {
    500
}
fn default_max_concurrency() -> usize {
    10
}
fn default_works_per_author() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_max_parallel_tenants")]
    pub max_parallel_tenants: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_parallel_tenants: default_max_parallel_tenants(),
        }
    }
}

fn default_max_parallel_tenants() -> usize {
    1
}

/// Whether a tenant's roster has to be scraped.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TenantKind {
    /// Must be scraped from public directory pages.
    #[serde(alias = "CONSORTIUM")]
    Consortium,
    /// Authoritative data is held elsewhere; never scraped.
    #[serde(alias = "FULL")]
    Full,
}

impl fmt::Display for TenantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantKind::Consortium => f.write_str("CONSORTIUM"),
            TenantKind::Full => f.write_str("FULL"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TenantConfig {
    pub slug: String,
    pub name: String,
    pub kind: TenantKind,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub enrichment: TenantEnrichmentConfig,
}

impl TenantConfig {
    /// Consortium tenants with crawling switched on.
    pub fn is_scrapable(&self) -> bool {
        self.kind == TenantKind::Consortium && self.crawl.enabled
    }

    pub fn is_enrichable(&self) -> bool {
        self.enrichment.openalex
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub urls: Vec<String>,
    /// Logical field name -> CSS selector, with an optional `@attr` suffix.
    #[serde(default)]
    pub selectors: BTreeMap<String, String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_crawl_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            urls: Vec::new(),
            selectors: BTreeMap::new(),
            user_agent: default_user_agent(),
            requests_per_second: default_requests_per_second(),
            page_delay_ms: default_page_delay_ms(),
            timeout_secs: default_crawl_timeout_secs(),
        }
    }
}

impl CrawlConfig {
    /// Pause between listing pages: the larger of the configured delay and
    /// the interval implied by `requests_per_second`.
    pub fn page_interval_ms(&self) -> u64 {
        let from_rate = if self.requests_per_second > 0.0 {
            (1000.0 / self.requests_per_second).ceil() as u64
        } else {
            0
        };
        self.page_delay_ms.max(from_rate)
    }
}

fn default_true() -> bool {
    true
}
fn default_user_agent() -> String {
    format!("FacultyFederationBot/{}", env!("CARGO_PKG_VERSION"))
}
fn default_requests_per_second() -> f64 {
    1.0
}
fn default_page_delay_ms() -> u64 {
    1000
}
fn default_crawl_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TenantEnrichmentConfig {
    #[serde(default)]
    pub openalex: bool,
    /// Also fetch each matched author's top works.
    #[serde(default)]
    pub works: bool,
    /// Authority institution id used by the name + institution strategy.
    #[serde(default)]
    pub institution_id: Option<String>,
    /// Fragments matched against a candidate's institution during scoring.
    #[serde(default)]
    pub institution_names: Vec<String>,
}

impl Config {
    pub fn tenant(&self, slug: &str) -> Option<&TenantConfig> {
        self.tenants.iter().find(|t| t.slug == slug)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Deserialize and validate a TOML document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.federation.id.trim().is_empty() {
        anyhow::bail!("federation.id must not be empty");
    }

    // Validate enrichment
    if config.enrichment.batch_size < 1 {
        anyhow::bail!("enrichment.batch_size must be >= 1");
    }
    if config.enrichment.max_concurrency < 1 {
        anyhow::bail!("enrichment.max_concurrency must be >= 1");
    }
    if config.pipeline.max_parallel_tenants < 1 {
        anyhow::bail!("pipeline.max_parallel_tenants must be >= 1");
    }

    // Validate tenants
    if config.tenants.is_empty() {
        anyhow::bail!("at least one [[tenants]] entry is required");
    }

    let mut seen = HashSet::new();
    for tenant in &config.tenants {
        if tenant.slug.trim().is_empty() {
            anyhow::bail!("tenant slug must not be empty (tenant '{}')", tenant.name);
        }
        if !seen.insert(tenant.slug.as_str()) {
            anyhow::bail!("duplicate tenant slug: '{}'", tenant.slug);
        }
        validate_crawl(tenant)?;
    }

    Ok(config)
}

fn validate_crawl(tenant: &TenantConfig) -> Result<()> {
    let crawl = &tenant.crawl;

    for field in crawl.selectors.keys() {
        if !SELECTOR_FIELDS.contains(&field.as_str()) {
            anyhow::bail!(
                "tenant '{}': unknown selector field '{}'. Known fields: {}",
                tenant.slug,
                field,
                SELECTOR_FIELDS.join(", ")
            );
        }
    }

    SelectorSet::compile(&crawl.selectors)
        .with_context(|| format!("tenant '{}': invalid selector", tenant.slug))?;

    if crawl.requests_per_second.is_nan() || crawl.requests_per_second <= 0.0 {
        anyhow::bail!(
            "tenant '{}': crawl.requests_per_second must be > 0",
            tenant.slug
        );
    }

    if tenant.is_scrapable() {
        if crawl.urls.is_empty() {
            anyhow::bail!(
                "tenant '{}': crawl.urls must list at least one page when crawling is enabled",
                tenant.slug
            );
        }
        if !crawl.selectors.contains_key("container") {
            anyhow::bail!(
                "tenant '{}': crawl.selectors.container is required when crawling is enabled",
                tenant.slug
            );
        }
    }

    Ok(())
}
