//! Core data models used throughout Faculty Federation.
//!
//! These types represent the records that flow through the harvesting
//! pipeline: raw directory extractions, authority resolution outcomes,
//! the flattened profiles stored in the federation index, and the JSON
//! envelopes each phase persists.
//!
//! Every non-identity field of a person is an explicit `Option` (or an
//! empty `Vec`). Absence is always a valid state and is never used to
//! signal an extraction failure; failures travel as [`ImportError`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Inferred role category of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonType {
    Faculty,
    Staff,
    Researcher,
    Postdoc,
    GraduateStudent,
    Administrator,
    Emeritus,
    Affiliate,
    Other,
}

impl PersonType {
    pub const ALL: [PersonType; 9] = [
        PersonType::Faculty,
        PersonType::Staff,
        PersonType::Researcher,
        PersonType::Postdoc,
        PersonType::GraduateStudent,
        PersonType::Administrator,
        PersonType::Emeritus,
        PersonType::Affiliate,
        PersonType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonType::Faculty => "FACULTY",
            PersonType::Staff => "STAFF",
            PersonType::Researcher => "RESEARCHER",
            PersonType::Postdoc => "POSTDOC",
            PersonType::GraduateStudent => "GRADUATE_STUDENT",
            PersonType::Administrator => "ADMINISTRATOR",
            PersonType::Emeritus => "EMERITUS",
            PersonType::Affiliate => "AFFILIATE",
            PersonType::Other => "OTHER",
        }
    }
}

impl fmt::Display for PersonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        PersonType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown person type: '{}'", s))
    }
}

/// Categorical estimate of whether a resolved author is the scraped person.
///
/// `None` is a terminal state (no candidate, or the lookup failed), not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchConfidence {
    High,
    Medium,
    Low,
    #[default]
    None,
}

impl MatchConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchConfidence::High => "HIGH",
            MatchConfidence::Medium => "MEDIUM",
            MatchConfidence::Low => "LOW",
            MatchConfidence::None => "NONE",
        }
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, MatchConfidence::None)
    }
}

impl fmt::Display for MatchConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which resolution strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Orcid,
    NameInstitution,
    NameOnly,
}

/// One person extracted from a directory listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPerson {
    pub tenant_slug: String,
    pub source_url: String,
    pub scraped_at: DateTime<Utc>,

    /// Name text as found on the page (whitespace collapsed), before
    /// honorifics and credentials are removed.
    #[serde(default)]
    pub raw_name: String,
    pub full_name: String,
    pub first_name: Option<String>,
    pub last_name: String,

    pub position: Option<String>,
    pub person_type: PersonType,

    pub department: Option<String>,
    pub college: Option<String>,

    pub email: Option<String>,
    pub phone: Option<String>,
    pub office: Option<String>,

    pub bio: Option<String>,
    #[serde(default)]
    pub research_interests: Vec<String>,

    pub photo_url: Option<String>,
    pub profile_url: Option<String>,
    /// External researcher identifier (ORCID iD), when the page exposes one.
    #[serde(default)]
    pub orcid: Option<String>,
}

/// Citation metrics reported by the authority for a resolved author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorMetrics {
    pub works_count: u64,
    pub cited_by_count: u64,
    /// Absent when the authority reports no summary statistics.
    #[serde(default)]
    pub h_index: Option<u32>,
    #[serde(default)]
    pub i10_index: Option<u32>,
}

/// A highly cited work of a resolved author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkSummary {
    pub id: String,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub cited_by_count: u64,
    pub abstract_text: Option<String>,
}

/// Outcome of resolving one [`ScrapedPerson`] against the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub person: ScrapedPerson,
    pub openalex_id: Option<String>,
    /// Display name of the matched author record.
    #[serde(default)]
    pub matched_name: Option<String>,
    #[serde(default)]
    pub strategy: Option<MatchStrategy>,
    pub metrics: Option<AuthorMetrics>,
    /// Up to ten topic names, most relevant first.
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub works: Vec<WorkSummary>,
    pub confidence: MatchConfidence,
}

impl EnrichmentResult {
    /// Result for a person with no usable authority candidate.
    pub fn unmatched(person: ScrapedPerson) -> Self {
        Self {
            person,
            openalex_id: None,
            matched_name: None,
            strategy: None,
            metrics: None,
            topics: Vec::new(),
            works: Vec::new(),
            confidence: MatchConfidence::None,
        }
    }
}

/// Flattened person + enrichment record stored in the federation index.
///
/// Identity is `tenant_slug + normalized full_name` (see [`FederatedProfile::id`]).
/// Profiles from different tenants never share identity, even with equal names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederatedProfile {
    pub id: String,
    pub tenant_slug: String,
    pub institution_name: String,

    pub full_name: String,
    pub first_name: Option<String>,
    pub last_name: String,
    pub position: Option<String>,
    pub person_type: PersonType,
    pub department: Option<String>,
    pub college: Option<String>,

    pub email: Option<String>,
    pub phone: Option<String>,
    pub office: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub research_interests: Vec<String>,
    pub photo_url: Option<String>,
    pub profile_url: Option<String>,
    pub source_url: String,

    pub orcid: Option<String>,
    pub openalex_id: Option<String>,
    pub works_count: Option<u64>,
    pub citation_count: Option<u64>,
    pub h_index: Option<u32>,
    /// Authority topics, used as search keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    pub match_confidence: MatchConfidence,
}

/// A single extraction failure recorded during a scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportError {
    pub at: DateTime<Utc>,
    pub url: Option<String>,
    pub person_name: Option<String>,
    /// Position of the offending container on its page, when known.
    #[serde(default)]
    pub index: Option<usize>,
    pub message: String,
}

impl ImportError {
    pub fn page(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            url: Some(url.into()),
            person_name: None,
            index: None,
            message: message.into(),
        }
    }

    pub fn record(
        url: impl Into<String>,
        index: usize,
        person_name: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            at: Utc::now(),
            url: Some(url.into()),
            person_name,
            index: Some(index),
            message: message.into(),
        }
    }
}

/// Per-tenant run record of one scraper invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub tenant_slug: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub found: usize,
    pub failed: usize,
    #[serde(default)]
    pub errors: Vec<ImportError>,
}

// ============ Persisted envelopes ============

/// `raw/<slug>.json`: output of the scrape phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTenantFile {
    pub tenant_slug: String,
    pub institution_name: String,
    pub scraped_at: DateTime<Utc>,
    pub count: usize,
    pub people: Vec<ScrapedPerson>,
}

/// `enriched/<slug>.json`: output of the enrich phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedTenantFile {
    pub tenant_slug: String,
    pub enriched_at: DateTime<Utc>,
    pub count: usize,
    pub matched: usize,
    pub results: Vec<EnrichmentResult>,
}

/// `federation_index.json`: the merged snapshot loaded by search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationIndexFile {
    pub consortium_id: String,
    pub consortium_name: String,
    pub generated_at: DateTime<Utc>,
    pub total_profiles: usize,
    pub tenant_counts: BTreeMap<String, usize>,
    pub profiles: Vec<FederatedProfile>,
}
