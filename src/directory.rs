//! Configuration-driven directory scraper.
//!
//! One generic extractor serves every tenant. A tenant's `crawl.selectors`
//! map names a CSS selector per logical field; the scraper finds every
//! `container` match on a listing page and reads each field relative to
//! that container.
//!
//! Selector syntax is plain CSS with an optional `@attr` suffix:
//!
//! | Spec | Value read |
//! |------|------------|
//! | `h3.name` | whitespace-normalized text of the first match |
//! | `img@src` | the `src` attribute of the first match |
//! | `a.more@href` | the `href` attribute of the first match |
//!
//! `photo` and `profile` default to `src` / `href` when no attribute is
//! given, and both are resolved to absolute URLs against the page URL.
//!
//! Failures are collected, never raised: an unreachable page or a record
//! with an unresolvable link becomes an [`ImportError`] and the scrape moves
//! on. A container with no name text is skipped silently.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use federation_core::models::{ImportError, ImportResult, ScrapedPerson};
use federation_core::parse::{
    extract_orcid, infer_person_type, normalize_whitespace, parse_name, parse_research_interests,
};

use crate::config::TenantConfig;

// ═══════════════════════════════════════════════════════════════════════
// Page source seam
// ═══════════════════════════════════════════════════════════════════════

/// One listing page request.
#[derive(Debug, Clone)]
pub struct PageRequest<'a> {
    pub url: &'a str,
    pub user_agent: &'a str,
    pub timeout: Duration,
}

/// Fetches listing page HTML.
///
/// The production implementation is [`HttpPageSource`]; tests substitute
/// an in-memory map of URL to HTML.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, request: &PageRequest<'_>) -> Result<String>;
}

/// [`PageSource`] over HTTP. Non-2xx responses are errors.
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, request: &PageRequest<'_>) -> Result<String> {
        let response = self
            .client
            .get(request.url)
            .header(reqwest::header::USER_AGENT, request.user_agent)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .timeout(request.timeout)
            .send()
            .await
            .with_context(|| format!("request to {} failed", request.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("{} returned HTTP {}", request.url, status.as_u16());
        }

        response
            .text()
            .await
            .with_context(|| format!("failed to read body of {}", request.url))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Selectors
// ═══════════════════════════════════════════════════════════════════════

/// Split `css@attr` into its CSS and attribute parts.
///
/// The suffix only counts as an attribute when it looks like an attribute
/// name, so selectors such as `a[href*='@']` stay intact.
pub fn split_selector_spec(spec: &str) -> (&str, Option<&str>) {
    if let Some((css, attr)) = spec.rsplit_once('@') {
        let is_attr_name = !attr.is_empty()
            && attr
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':');
        if is_attr_name && !css.trim().is_empty() {
            return (css.trim(), Some(attr));
        }
    }
    (spec.trim(), None)
}

/// A compiled field selector.
#[derive(Debug, Clone)]
pub struct FieldSelector {
    selector: Selector,
    attr: Option<String>,
}

impl FieldSelector {
    pub fn parse(spec: &str) -> Result<Self> {
        let (css, attr) = split_selector_spec(spec);
        let selector =
            Selector::parse(css).map_err(|e| anyhow!("cannot parse selector '{}': {}", css, e))?;
        Ok(Self {
            selector,
            attr: attr.map(str::to_string),
        })
    }
}

/// All of a tenant's compiled selectors, keyed by logical field.
#[derive(Debug, Clone, Default)]
pub struct SelectorSet {
    fields: BTreeMap<String, FieldSelector>,
}

impl SelectorSet {
    pub fn compile(specs: &BTreeMap<String, String>) -> Result<Self> {
        let mut fields = BTreeMap::new();
        for (field, spec) in specs {
            let compiled =
                FieldSelector::parse(spec).with_context(|| format!("field '{}'", field))?;
            fields.insert(field.clone(), compiled);
        }
        Ok(Self { fields })
    }

    fn get(&self, field: &str) -> Option<&FieldSelector> {
        self.fields.get(field)
    }

    fn container(&self) -> Result<&Selector> {
        self.get("container")
            .map(|f| &f.selector)
            .ok_or_else(|| anyhow!("no container selector configured"))
    }

    /// Text or attribute value of the first match under `scope`.
    fn value(&self, scope: ElementRef<'_>, field: &str, default_attr: Option<&str>) -> Option<String> {
        let fs = self.get(field)?;
        let element = scope.select(&fs.selector).next()?;
        let raw = match fs.attr.as_deref().or(default_attr) {
            Some(attr) => element.value().attr(attr)?.to_string(),
            None => element_text(element),
        };
        let value = normalize_whitespace(&raw);
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Email: an explicit attribute wins, then a `mailto:` link, then text.
    fn email(&self, scope: ElementRef<'_>) -> Option<String> {
        let fs = self.get("email")?;
        let element = scope.select(&fs.selector).next()?;
        let raw = match fs.attr.as_deref() {
            Some(attr) => element.value().attr(attr)?.to_string(),
            None => match element.value().attr("href") {
                Some(href) if href.starts_with("mailto:") => href.to_string(),
                _ => element_text(element),
            },
        };
        let raw = raw.trim();
        let address = raw.strip_prefix("mailto:").unwrap_or(raw);
        let address = address.split('?').next().unwrap_or(address).trim();
        if address.is_empty() {
            None
        } else {
            Some(address.to_string())
        }
    }

    /// Research interests: several matches are one interest each; a single
    /// match is split on the usual separators.
    fn interests(&self, scope: ElementRef<'_>) -> Vec<String> {
        let Some(fs) = self.get("research_interests") else {
            return Vec::new();
        };
        let matches: Vec<ElementRef<'_>> = scope.select(&fs.selector).collect();
        match matches.as_slice() {
            [] => Vec::new(),
            [single] => parse_research_interests(&element_text(*single)),
            many => many
                .iter()
                .map(|e| normalize_whitespace(&element_text(*e)))
                .filter(|s| !s.is_empty() && s.chars().count() < 100)
                .collect(),
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

fn resolve_link(page: &Url, href: &str) -> Result<String> {
    page.join(href)
        .map(|u| u.to_string())
        .map_err(|e| anyhow!("cannot resolve link '{}': {}", href, e))
}

// ═══════════════════════════════════════════════════════════════════════
// Extraction
// ═══════════════════════════════════════════════════════════════════════

/// People and record-level errors extracted from one page.
#[derive(Debug, Default)]
pub struct PageExtraction {
    pub people: Vec<ScrapedPerson>,
    pub errors: Vec<ImportError>,
}

/// Extract every person container on one listing page.
///
/// Pure over its input: no I/O, no clock beyond the extraction timestamp.
pub fn extract_people(
    html: &str,
    page_url: &str,
    tenant_slug: &str,
    selectors: &SelectorSet,
) -> Result<PageExtraction> {
    let base = Url::parse(page_url).with_context(|| format!("invalid page URL '{}'", page_url))?;
    let container = selectors.container()?;
    let document = Html::parse_document(html);

    let mut out = PageExtraction::default();
    for (index, element) in document.select(container).enumerate() {
        match extract_person(element, &base, page_url, tenant_slug, selectors) {
            Ok(Some(person)) => out.people.push(person),
            Ok(None) => {
                tracing::debug!(url = %page_url, index, "skipping container without a name");
            }
            Err((name, e)) => {
                tracing::debug!(url = %page_url, index, error = %e, "record extraction failed");
                out.errors
                    .push(ImportError::record(page_url, index, name, e.to_string()));
            }
        }
    }
    Ok(out)
}

type RecordFailure = (Option<String>, anyhow::Error);

fn extract_person(
    element: ElementRef<'_>,
    base: &Url,
    page_url: &str,
    tenant_slug: &str,
    selectors: &SelectorSet,
) -> std::result::Result<Option<ScrapedPerson>, RecordFailure> {
    let Some(raw_name) = selectors.value(element, "name", None) else {
        return Ok(None);
    };
    let Some(name) = parse_name(&raw_name) else {
        return Ok(None);
    };

    let link = |field: &str, default_attr: &str| -> std::result::Result<Option<String>, RecordFailure> {
        selectors
            .value(element, field, Some(default_attr))
            .map(|href| resolve_link(base, &href))
            .transpose()
            .map_err(|e| (Some(name.full_name.clone()), e))
    };
    let photo_url = link("photo", "src")?;
    let profile_url = link("profile", "href")?;

    let position = selectors.value(element, "position", None);
    let orcid = selectors
        .value(element, "orcid", None)
        .and_then(|v| extract_orcid(&v))
        .or_else(|| {
            // an ORCID link is often the only place the iD appears
            selectors
                .value(element, "orcid", Some("href"))
                .and_then(|v| extract_orcid(&v))
        });

    Ok(Some(ScrapedPerson {
        tenant_slug: tenant_slug.to_string(),
        source_url: page_url.to_string(),
        scraped_at: Utc::now(),
        raw_name,
        full_name: name.full_name,
        first_name: name.first_name,
        last_name: name.last_name,
        person_type: infer_person_type(position.as_deref()),
        position,
        department: selectors.value(element, "department", None),
        college: selectors.value(element, "college", None),
        email: selectors.email(element),
        phone: selectors.value(element, "phone", None),
        office: selectors.value(element, "office", None),
        bio: selectors.value(element, "bio", None),
        research_interests: selectors.interests(element),
        photo_url,
        profile_url,
        orcid,
    }))
}

// ═══════════════════════════════════════════════════════════════════════
// Scraper
// ═══════════════════════════════════════════════════════════════════════

/// Records and run accounting of one tenant scrape.
#[derive(Debug)]
pub struct ScrapeOutcome {
    pub result: ImportResult,
    pub people: Vec<ScrapedPerson>,
}

/// Fetches and extracts every configured listing page of a tenant.
#[derive(Clone)]
pub struct DirectoryScraper {
    source: Arc<dyn PageSource>,
    cancel: CancellationToken,
}

impl DirectoryScraper {
    pub fn new(source: Arc<dyn PageSource>, cancel: CancellationToken) -> Self {
        Self { source, cancel }
    }

    /// Scrape all of `tenant`'s listing pages in order.
    ///
    /// Returns `Err` only when the tenant's selectors do not compile. Page and
    /// record failures land in the returned [`ImportResult`].
    pub async fn scrape(&self, tenant: &TenantConfig) -> Result<ScrapeOutcome> {
        let crawl = &tenant.crawl;
        let selectors = SelectorSet::compile(&crawl.selectors)
            .with_context(|| format!("tenant '{}': invalid selectors", tenant.slug))?;
        let interval = Duration::from_millis(crawl.page_interval_ms());
        let timeout = Duration::from_secs(crawl.timeout_secs);

        let started_at = Utc::now();
        let mut people = Vec::new();
        let mut errors = Vec::new();

        for (i, url) in crawl.urls.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(tenant = %tenant.slug, "scrape cancelled");
                break;
            }
            if i > 0 {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = self.cancel.cancelled() => {
                        tracing::warn!(tenant = %tenant.slug, "scrape cancelled");
                        break;
                    }
                }
            }

            let request = PageRequest {
                url,
                user_agent: &crawl.user_agent,
                timeout,
            };
            let html = match self.source.fetch(&request).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!(tenant = %tenant.slug, url = %url, error = %e, "page fetch failed");
                    errors.push(ImportError::page(url.as_str(), format!("{:#}", e)));
                    continue;
                }
            };

            match extract_people(&html, url, &tenant.slug, &selectors) {
                Ok(page) => {
                    if page.people.is_empty() && page.errors.is_empty() {
                        tracing::warn!(tenant = %tenant.slug, url = %url, "no people found on page");
                    } else {
                        tracing::debug!(
                            tenant = %tenant.slug,
                            url = %url,
                            people = page.people.len(),
                            errors = page.errors.len(),
                            "page extracted"
                        );
                    }
                    people.extend(page.people);
                    errors.extend(page.errors);
                }
                Err(e) => {
                    tracing::warn!(tenant = %tenant.slug, url = %url, error = %e, "page extraction failed");
                    errors.push(ImportError::page(url.as_str(), format!("{:#}", e)));
                }
            }
        }

        let result = ImportResult {
            tenant_slug: tenant.slug.clone(),
            started_at,
            finished_at: Utc::now(),
            found: people.len(),
            failed: errors.len(),
            errors,
        };
        Ok(ScrapeOutcome { result, people })
    }
}
