//! End-to-end pipeline tests.
//!
//! All four phases run against an in-memory page source and authority, with
//! outputs written to a temporary directory.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use faculty_federation::authority::Authority;
use faculty_federation::config::{parse_config, Config};
use faculty_federation::directory::{PageRequest, PageSource};
use faculty_federation::federation::load_index;
use faculty_federation::pipeline::{Pipeline, RunOptions, RunSummary};
use federation_core::index::SearchQuery;
use federation_core::matching::AuthorCandidate;
use federation_core::models::{
    EnrichedTenantFile, ImportResult, MatchConfidence, RawTenantFile, WorkSummary,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ─── Fakes ──────────────────────────────────────────────────────────

#[derive(Default)]
struct FakePages {
    pages: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
}

impl FakePages {
    fn with(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(u, h)| (u.to_string(), h.to_string()))
                .collect(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for FakePages {
    async fn fetch(&self, request: &PageRequest<'_>) -> Result<String> {
        self.fetched.lock().unwrap().push(request.url.to_string());
        self.pages
            .get(request.url)
            .cloned()
            .ok_or_else(|| anyhow!("{} returned HTTP 503", request.url))
    }
}

#[derive(Default)]
struct FakeAuthority {
    by_name: HashMap<String, AuthorCandidate>,
    calls: Mutex<usize>,
}

#[async_trait]
impl Authority for FakeAuthority {
    async fn author_by_orcid(&self, _orcid: &str) -> Option<AuthorCandidate> {
        *self.calls.lock().unwrap() += 1;
        None
    }

    async fn search_authors(
        &self,
        name: &str,
        _institution_id: Option<&str>,
    ) -> Option<AuthorCandidate> {
        *self.calls.lock().unwrap() += 1;
        self.by_name.get(name).cloned()
    }

    async fn top_works(&self, _author_id: &str, _limit: usize) -> Vec<WorkSummary> {
        Vec::new()
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────

const ALPHA_FACULTY: &str = r#"
<html><body>
  <div class="person">
    <h2>Dr. Jane A. Smith</h2>
    <p class="role">Professor</p>
    <p class="dept">Biology</p>
    <a class="mail" href="mailto:jane@alpha.edu">jane@alpha.edu</a>
    <p class="ri">Ecology; Coral reefs</p>
  </div>
  <div class="person">
    <h2>Robert Chen</h2>
    <p class="role">Postdoctoral Researcher</p>
    <p class="dept">Chemistry</p>
  </div>
  <div class="person"><h2></h2><p class="role">Vacant</p></div>
</body></html>
"#;

const BETA_PEOPLE: &str = r#"
<ul>
  <li class="member"><span class="n">Ann Lee</span><em>Lab Manager</em></li>
  <li class="member"><span class="n">Jane Smith</span><em>Lecturer</em></li>
</ul>
"#;

fn config_toml(out: &Path) -> String {
    format!(
        r#"
[federation]
id = "test-fed"
name = "Test Federation"

[output]
dir = "{out}"

[enrichment]
batch_size = 2
batch_pause_ms = 0

[pipeline]
max_parallel_tenants = 2

[[tenants]]
slug = "alpha"
name = "Alpha University"
kind = "consortium"

[tenants.crawl]
urls = ["https://alpha.edu/faculty", "https://alpha.edu/missing"]
page_delay_ms = 0
requests_per_second = 1000.0

[tenants.crawl.selectors]
container = ".person"
name = "h2"
position = ".role"
department = ".dept"
email = "a.mail"
research_interests = ".ri"

[tenants.enrichment]
openalex = true
institution_id = "I1"
institution_names = ["Alpha"]

[[tenants]]
slug = "beta"
name = "Beta College"
kind = "consortium"

[tenants.crawl]
urls = ["https://beta.edu/people"]
page_delay_ms = 0
requests_per_second = 1000.0

[tenants.crawl.selectors]
container = "li.member"
name = ".n"
position = "em"

[[tenants]]
slug = "gamma"
name = "Gamma Institute"
kind = "full"

[tenants.enrichment]
openalex = true
"#,
        out = out.display()
    )
}

fn setup() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("out");
    let cfg = parse_config(&config_toml(&out)).unwrap();
    (tmp, cfg)
}

fn pages() -> Arc<FakePages> {
    Arc::new(FakePages::with(&[
        ("https://alpha.edu/faculty", ALPHA_FACULTY),
        ("https://beta.edu/people", BETA_PEOPLE),
    ]))
}

fn authority() -> Arc<FakeAuthority> {
    let mut fake = FakeAuthority::default();
    fake.by_name.insert(
        "Jane A. Smith".to_string(),
        AuthorCandidate {
            id: "https://openalex.org/A100".to_string(),
            display_name: "Jane A. Smith".to_string(),
            works_count: 60,
            cited_by_count: 4000,
            h_index: Some(25),
            institutions: vec!["Alpha University".to_string()],
            ..Default::default()
        },
    );
    Arc::new(fake)
}

fn read<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("missing {}: {}", path.display(), e));
    serde_json::from_str(&content).unwrap()
}

async fn run(
    cfg: &Config,
    pages: Arc<FakePages>,
    authority: Arc<FakeAuthority>,
    options: RunOptions,
) -> Result<RunSummary> {
    let pipeline = Pipeline::new(cfg.clone(), pages, authority, CancellationToken::new());
    pipeline.run(&options).await
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_run_writes_every_phase_output() {
    let (_tmp, cfg) = setup();
    let summary = run(&cfg, pages(), authority(), RunOptions::default())
        .await
        .unwrap();

    let out = &cfg.output;
    let alpha_raw: RawTenantFile = read(&out.raw_file("alpha"));
    assert_eq!(alpha_raw.count, 2);
    assert_eq!(alpha_raw.institution_name, "Alpha University");
    assert_eq!(alpha_raw.people[0].full_name, "Jane A. Smith");

    let alpha_import: ImportResult = read(&out.imports_file("alpha"));
    assert_eq!(alpha_import.found, 2);
    assert_eq!(alpha_import.failed, 1);
    assert_eq!(
        alpha_import.errors[0].url.as_deref(),
        Some("https://alpha.edu/missing")
    );

    let alpha_enriched: EnrichedTenantFile = read(&out.enriched_file("alpha"));
    assert_eq!(alpha_enriched.count, 2);
    assert_eq!(alpha_enriched.matched, 1);
    assert_eq!(alpha_enriched.results[0].confidence, MatchConfidence::High);

    // beta has enrichment off, gamma is never scraped
    assert!(!out.enriched_file("beta").exists());
    assert!(!out.raw_file("gamma").exists());
    let gamma_enriched: EnrichedTenantFile = read(&out.enriched_file("gamma"));
    assert_eq!(gamma_enriched.count, 0);

    assert!(out.summary_file().exists());
    assert_eq!(summary.totals.found, 4);
    assert_eq!(summary.totals.failed, 1);
    assert_eq!(summary.totals.matched, 1);
    assert_eq!(summary.totals.profiles, 4);
    assert_eq!(summary.tenants.len(), 3);
    assert_eq!(summary.tenants[2].slug, "gamma");
    assert!(!summary.tenants[2].scraped);
    assert_eq!(summary.tenants[2].profiles, 0);
}

#[tokio::test]
async fn test_index_joins_enrichment_and_keeps_tenants_distinct() {
    let (_tmp, cfg) = setup();
    run(&cfg, pages(), authority(), RunOptions::default())
        .await
        .unwrap();

    let index = load_index(&cfg.output.index_file()).unwrap();
    assert_eq!(index.consortium_id(), "test-fed");
    assert_eq!(index.len(), 4);

    let alpha = index.get_by_institution("alpha");
    assert_eq!(alpha.len(), 2);
    assert_eq!(alpha[0].id, "alpha:jane a. smith");
    assert_eq!(alpha[0].match_confidence, MatchConfidence::High);
    assert_eq!(alpha[0].h_index, Some(25));
    assert_eq!(alpha[1].match_confidence, MatchConfidence::None);

    // same person name in another tenant stays a separate profile
    let results = index.search(&SearchQuery::text("jane smith"));
    assert_eq!(results.total, 2);
    assert_eq!(results.hits[0].profile.tenant_slug, "alpha");
    assert_eq!(results.hits[1].profile.tenant_slug, "beta");
    assert_eq!(results.hits[1].profile.match_confidence, MatchConfidence::None);

    let stats = index.stats();
    assert_eq!(stats.coverage.with_openalex, 1);
    assert_eq!(stats.by_tenant["beta"], 2);
}

#[tokio::test]
async fn test_skip_flags_resume_from_disk() {
    let (_tmp, cfg) = setup();
    run(&cfg, pages(), authority(), RunOptions::default())
        .await
        .unwrap();

    let silent_pages = Arc::new(FakePages::default());
    let silent_authority = Arc::new(FakeAuthority::default());
    let summary = run(
        &cfg,
        silent_pages.clone(),
        silent_authority.clone(),
        RunOptions {
            skip_scrape: true,
            skip_enrichment: true,
            tenants: None,
        },
    )
    .await
    .unwrap();

    assert!(silent_pages.fetched().is_empty());
    assert_eq!(*silent_authority.calls.lock().unwrap(), 0);
    assert!(summary.scrape_skipped);
    assert_eq!(summary.totals.profiles, 4);
    assert_eq!(summary.totals.found, 4);

    let index = load_index(&cfg.output.index_file()).unwrap();
    assert_eq!(
        index.get_by_institution("alpha")[0].match_confidence,
        MatchConfidence::High
    );
}

#[tokio::test]
async fn test_tenant_filter_limits_scrape_and_enrich() {
    let (_tmp, cfg) = setup();
    let fake_pages = pages();
    let fake_authority = authority();
    let summary = run(
        &cfg,
        fake_pages.clone(),
        fake_authority.clone(),
        RunOptions {
            tenants: Some(vec!["beta".to_string()]),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(fake_pages.fetched(), vec!["https://beta.edu/people"]);
    assert_eq!(*fake_authority.calls.lock().unwrap(), 0);
    assert!(!cfg.output.raw_file("alpha").exists());
    assert_eq!(summary.totals.profiles, 2);
}

#[tokio::test]
async fn test_unknown_tenant_filter_is_error() {
    let (_tmp, cfg) = setup();
    let err = run(
        &cfg,
        pages(),
        authority(),
        RunOptions {
            tenants: Some(vec!["nope".to_string()]),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Unknown tenant"));
}

#[tokio::test]
async fn test_unreachable_tenant_contributes_zero_records() {
    let (_tmp, cfg) = setup();
    let only_beta = Arc::new(FakePages::with(&[("https://beta.edu/people", BETA_PEOPLE)]));
    let summary = run(&cfg, only_beta, authority(), RunOptions::default())
        .await
        .unwrap();

    let alpha = summary.tenants.iter().find(|t| t.slug == "alpha").unwrap();
    assert_eq!(alpha.found, 0);
    assert_eq!(alpha.failed, 2);
    assert_eq!(alpha.profiles, 0);
    assert_eq!(summary.totals.profiles, 2);

    let alpha_raw: RawTenantFile = read(&cfg.output.raw_file("alpha"));
    assert!(alpha_raw.people.is_empty());
}

#[tokio::test]
async fn test_cancelled_run_still_writes_index() {
    let (_tmp, cfg) = setup();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let pipeline = Pipeline::new(cfg.clone(), pages(), authority(), cancel);
    let summary = pipeline.run(&RunOptions::default()).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.totals.profiles, 0);
    assert!(cfg.output.index_file().exists());
}
