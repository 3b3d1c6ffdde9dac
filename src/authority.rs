//! Bibliometric authority lookups (OpenAlex).
//!
//! [`Authority`] is the seam the enricher resolves people through. Every
//! method is infallible from the caller's point of view: transport errors,
//! non-2xx responses, and undecodable bodies are logged and come back as
//! "no result".
//!
//! [`OpenAlexClient`] throttles every outbound call through a `governor`
//! rate limiter whose period is `authority.min_request_interval_ms`, and
//! appends the configured `mailto` contact to each request.
//!
//! Endpoints used:
//!
//! | Lookup | Request |
//! |--------|---------|
//! | by ORCID | `GET /authors/orcid:<id>` |
//! | by name | `GET /authors?search=<name>[&filter=last_known_institutions.id:<I..>]&per_page=1` |
//! | top works | `GET /works?filter=author.id:<A..>&sort=cited_by_count:desc&per_page=<n>` |

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use federation_core::matching::{reconstruct_abstract, AuthorCandidate, TopicScore};
use federation_core::models::WorkSummary;

use crate::config::AuthorityConfig;

const OPENALEX_ID_PREFIX: &str = "https://openalex.org/";
const ORCID_PREFIX: &str = "https://orcid.org/";

/// Author resolution and works lookup against an external authority.
#[async_trait]
pub trait Authority: Send + Sync {
    /// Direct lookup by ORCID iD.
    async fn author_by_orcid(&self, orcid: &str) -> Option<AuthorCandidate>;

    /// Top fuzzy-search hit for `name`, optionally restricted to one
    /// institution.
    async fn search_authors(&self, name: &str, institution_id: Option<&str>)
        -> Option<AuthorCandidate>;

    /// Most cited works of an author, highest first.
    async fn top_works(&self, author_id: &str, limit: usize) -> Vec<WorkSummary>;
}

/// Strip the `https://openalex.org/` prefix from an entity id.
pub fn short_id(id: &str) -> &str {
    id.trim().strip_prefix(OPENALEX_ID_PREFIX).unwrap_or(id.trim())
}

// ============ Wire types ============

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct OaAuthor {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    orcid: Option<String>,
    #[serde(default)]
    works_count: u64,
    #[serde(default)]
    cited_by_count: u64,
    #[serde(default)]
    summary_stats: Option<OaSummaryStats>,
    #[serde(default)]
    last_known_institutions: Vec<OaInstitution>,
    #[serde(default)]
    last_known_institution: Option<OaInstitution>,
    #[serde(default)]
    topics: Vec<OaTopic>,
    #[serde(default)]
    x_concepts: Vec<OaTopic>,
}

#[derive(Debug, Deserialize)]
struct OaSummaryStats {
    #[serde(default)]
    h_index: Option<u32>,
    #[serde(default)]
    i10_index: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OaInstitution {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OaTopic {
    display_name: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    count: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OaWork {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    publication_year: Option<i32>,
    #[serde(default)]
    cited_by_count: u64,
    #[serde(default)]
    abstract_inverted_index: Option<BTreeMap<String, Vec<u32>>>,
}

impl From<OaAuthor> for AuthorCandidate {
    fn from(a: OaAuthor) -> Self {
        let mut institutions: Vec<String> = a
            .last_known_institutions
            .into_iter()
            .filter_map(|i| i.display_name)
            .collect();
        if institutions.is_empty() {
            institutions.extend(a.last_known_institution.and_then(|i| i.display_name));
        }

        // topics replaced x_concepts; older records only carry the latter
        let raw_topics = if a.topics.is_empty() { a.x_concepts } else { a.topics };
        let topics = raw_topics
            .into_iter()
            .map(|t| TopicScore {
                relevance: t.score.or(t.count).unwrap_or(0.0),
                display_name: t.display_name,
            })
            .collect();

        let stats = a.summary_stats;
        AuthorCandidate {
            id: a.id,
            display_name: a.display_name.unwrap_or_default(),
            orcid: a
                .orcid
                .map(|o| o.strip_prefix(ORCID_PREFIX).unwrap_or(o.as_str()).to_string()),
            works_count: a.works_count,
            cited_by_count: a.cited_by_count,
            h_index: stats.as_ref().and_then(|s| s.h_index),
            i10_index: stats.as_ref().and_then(|s| s.i10_index),
            institutions,
            topics,
        }
    }
}

impl From<OaWork> for WorkSummary {
    fn from(w: OaWork) -> Self {
        let abstract_text = w
            .abstract_inverted_index
            .as_ref()
            .map(reconstruct_abstract)
            .filter(|s| !s.is_empty());
        WorkSummary {
            id: w.id,
            title: w.display_name.or(w.title),
            year: w.publication_year,
            cited_by_count: w.cited_by_count,
            abstract_text,
        }
    }
}

// ============ Client ============

/// OpenAlex HTTP client.
pub struct OpenAlexClient {
    http: reqwest::Client,
    base_url: String,
    mailto: Option<String>,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl OpenAlexClient {
    pub fn new(config: &AuthorityConfig) -> Result<Self> {
        let user_agent = match &config.mailto {
            Some(mailto) => format!(
                "faculty-federation/{} (mailto:{})",
                env!("CARGO_PKG_VERSION"),
                mailto
            ),
            None => format!("faculty-federation/{}", env!("CARGO_PKG_VERSION")),
        };
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build OpenAlex HTTP client")?;

        let limiter = Quota::with_period(Duration::from_millis(config.min_request_interval_ms))
            .map(RateLimiter::direct);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            mailto: config.mailto.clone(),
            limiter,
        })
    }

    /// Wait until the next authority call is allowed.
    async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Option<T> {
        self.throttle().await;

        let url = format!("{}{}", self.base_url, path);
        let mut query: Vec<(&str, String)> = params.to_vec();
        if let Some(mailto) = &self.mailto {
            query.push(("mailto", mailto.clone()));
        }

        tracing::debug!(url = %url, "querying OpenAlex");
        let response = match self.http.get(&url).query(&query).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "OpenAlex request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "OpenAlex returned non-success");
            return None;
        }

        match response.json::<T>().await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "OpenAlex response did not decode");
                None
            }
        }
    }
}

#[async_trait]
impl Authority for OpenAlexClient {
    async fn author_by_orcid(&self, orcid: &str) -> Option<AuthorCandidate> {
        let path = format!("/authors/orcid:{}", orcid.trim());
        self.get_json::<OaAuthor>(&path, &[]).await.map(Into::into)
    }

    async fn search_authors(
        &self,
        name: &str,
        institution_id: Option<&str>,
    ) -> Option<AuthorCandidate> {
        let mut params = vec![("search", name.to_string()), ("per_page", "1".to_string())];
        if let Some(inst) = institution_id {
            params.push((
                "filter",
                format!("last_known_institutions.id:{}", short_id(inst)),
            ));
        }
        let list: ListResponse<OaAuthor> = self.get_json("/authors", &params).await?;
        list.results.into_iter().next().map(Into::into)
    }

    async fn top_works(&self, author_id: &str, limit: usize) -> Vec<WorkSummary> {
        if limit == 0 {
            return Vec::new();
        }
        let params = [
            ("filter", format!("author.id:{}", short_id(author_id))),
            ("sort", "cited_by_count:desc".to_string()),
            ("per_page", limit.to_string()),
        ];
        let list: Option<ListResponse<OaWork>> = self.get_json("/works", &params).await;
        list.map(|l| l.results.into_iter().map(Into::into).collect())
            .unwrap_or_default()
    }
}
