//! In-memory federation index with filtered, scored, paginated search.
//!
//! The index is an immutable snapshot of [`FederatedProfile`]s merged from
//! every tenant. Search runs as three pure stages over that snapshot, in a
//! fixed order:
//!
//! 1. **Filter** by tenant allow-list, person-type allow-list, department
//!    substring (any-of), and minimum h-index.
//! 2. **Score** every surviving profile against the free-text query, keep
//!    scores `> 0`, and stable-sort descending. Without a query the filtered
//!    profiles pass through in index order.
//! 3. **Paginate** with `offset` / `limit`.
//!
//! # Scoring
//!
//! Per query term (lower-cased, whitespace split), against one profile:
//!
//! | Match | Points |
//! |-------|--------|
//! | name contains term | +10 |
//! | department contains term | +5 |
//! | each research interest containing term | +3 |
//! | each keyword (topic) containing term | +2 |
//! | position contains term | +2 |
//! | institution name contains term | +1 |
//! | concatenation of all text fields contains term | +0.5 |
//!
//! The sum is then multiplied by 1.1 when the h-index exceeds 10 and by
//! 1.05 when the match confidence is HIGH.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::error::IndexError;
use crate::models::{
    EnrichmentResult, FederatedProfile, FederationIndexFile, MatchConfidence, PersonType,
    ScrapedPerson,
};
use crate::parse::normalize_name_key;

const NAME_WEIGHT: f64 = 10.0;
const DEPARTMENT_WEIGHT: f64 = 5.0;
const INTEREST_WEIGHT: f64 = 3.0;
const KEYWORD_WEIGHT: f64 = 2.0;
const POSITION_WEIGHT: f64 = 2.0;
const INSTITUTION_WEIGHT: f64 = 1.0;
const ANY_FIELD_WEIGHT: f64 = 0.5;

const IMPACT_BOOST_THRESHOLD: u32 = 10;
const IMPACT_BOOST: f64 = 1.1;
const HIGH_CONFIDENCE_BOOST: f64 = 1.05;

const TOP_DEPARTMENTS: usize = 10;

/// Filters, free-text query, and paging for one [`FederationIndex::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub text: Option<String>,
    /// Tenant slugs to keep; empty keeps all.
    pub tenants: Vec<String>,
    /// Person types to keep; empty keeps all.
    pub person_types: Vec<PersonType>,
    /// Department substrings, any of which must match; empty keeps all.
    pub departments: Vec<String>,
    pub min_h_index: Option<u32>,
    pub offset: usize,
    /// `None` returns everything after `offset`.
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    fn terms(&self) -> Vec<String> {
        self.text
            .as_deref()
            .map(|t| t.to_lowercase().split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// One ranked hit.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredProfile<'a> {
    pub score: f64,
    pub profile: &'a FederatedProfile,
}

/// A page of search hits plus the pre-pagination total.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults<'a> {
    pub total: usize,
    pub offset: usize,
    pub hits: Vec<ScoredProfile<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub with_email: usize,
    pub with_research_interests: usize,
    pub with_openalex: usize,
    pub with_h_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentCount {
    pub department: String,
    pub count: usize,
}

/// Aggregate statistics over the whole index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub total_profiles: usize,
    pub by_tenant: BTreeMap<String, usize>,
    pub coverage: Coverage,
    pub by_person_type: BTreeMap<PersonType, usize>,
    pub top_departments: Vec<DepartmentCount>,
}

/// Immutable, loaded federation snapshot.
#[derive(Debug, Clone)]
pub struct FederationIndex {
    consortium_id: String,
    consortium_name: String,
    generated_at: DateTime<Utc>,
    profiles: Vec<FederatedProfile>,
}

impl FederationIndex {
    pub fn new(file: FederationIndexFile) -> Self {
        Self {
            consortium_id: file.consortium_id,
            consortium_name: file.consortium_name,
            generated_at: file.generated_at,
            profiles: file.profiles,
        }
    }

    /// Parse an index document previously read from `path`.
    pub fn from_json(json: &str, path: &Path) -> Result<Self, IndexError> {
        let file: FederationIndexFile =
            serde_json::from_str(json).map_err(|source| IndexError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(file))
    }

    pub fn consortium_id(&self) -> &str {
        &self.consortium_id
    }

    pub fn consortium_name(&self) -> &str {
        &self.consortium_name
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn profiles(&self) -> &[FederatedProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Filter, score, and paginate, in that order.
    pub fn search(&self, query: &SearchQuery) -> SearchResults<'_> {
        let filtered = apply_filters(&self.profiles, query);
        let ranked = rank(filtered, &query.terms());
        let total = ranked.len();
        SearchResults {
            total,
            offset: query.offset,
            hits: paginate(ranked, query.offset, query.limit),
        }
    }

    /// Profiles whose keywords or research interests mention `topic`.
    pub fn find_by_topic(&self, topic: &str) -> Vec<&FederatedProfile> {
        let needle = topic.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.profiles
            .iter()
            .filter(|p| {
                p.keywords
                    .iter()
                    .chain(p.research_interests.iter())
                    .any(|k| k.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// All profiles of one tenant, in index order.
    pub fn get_by_institution(&self, tenant_slug: &str) -> Vec<&FederatedProfile> {
        self.profiles
            .iter()
            .filter(|p| p.tenant_slug == tenant_slug)
            .collect()
    }

    pub fn stats(&self) -> IndexStats {
        let mut by_tenant: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_person_type: BTreeMap<PersonType, usize> = BTreeMap::new();
        let mut departments: HashMap<&str, usize> = HashMap::new();
        let mut coverage = Coverage {
            with_email: 0,
            with_research_interests: 0,
            with_openalex: 0,
            with_h_index: 0,
        };

        for p in &self.profiles {
            *by_tenant.entry(p.tenant_slug.clone()).or_default() += 1;
            *by_person_type.entry(p.person_type).or_default() += 1;

            if has_text(&p.email) {
                coverage.with_email += 1;
            }
            if !p.research_interests.is_empty() {
                coverage.with_research_interests += 1;
            }
            if has_text(&p.openalex_id) {
                coverage.with_openalex += 1;
            }
            if p.h_index.is_some() {
                coverage.with_h_index += 1;
            }

            if let Some(dept) = p.department.as_deref().map(str::trim) {
                if !dept.is_empty() && !dept.eq_ignore_ascii_case("unknown") {
                    *departments.entry(dept).or_default() += 1;
                }
            }
        }

        let mut top_departments: Vec<DepartmentCount> = departments
            .into_iter()
            .map(|(department, count)| DepartmentCount {
                department: department.to_string(),
                count,
            })
            .collect();
        top_departments.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.department.cmp(&b.department))
        });
        top_departments.truncate(TOP_DEPARTMENTS);

        IndexStats {
            total_profiles: self.profiles.len(),
            by_tenant,
            coverage,
            by_person_type,
            top_departments,
        }
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

// ============ Search stages ============

/// Stage 1: tenant, person type, department, minimum h-index.
pub fn apply_filters<'a>(
    profiles: &'a [FederatedProfile],
    query: &SearchQuery,
) -> Vec<&'a FederatedProfile> {
    let departments: Vec<String> = query
        .departments
        .iter()
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .collect();

    profiles
        .iter()
        .filter(|p| query.tenants.is_empty() || query.tenants.iter().any(|t| *t == p.tenant_slug))
        .filter(|p| query.person_types.is_empty() || query.person_types.contains(&p.person_type))
        .filter(|p| {
            if departments.is_empty() {
                return true;
            }
            let Some(dept) = p.department.as_deref() else {
                return false;
            };
            let dept = dept.to_lowercase();
            departments.iter().any(|d| dept.contains(d.as_str()))
        })
        .filter(|p| match query.min_h_index {
            Some(min) => p.h_index.is_some_and(|h| h >= min),
            None => true,
        })
        .collect()
}

/// Stage 2: score and sort. With no terms, every profile passes in order
/// with a score of zero.
pub fn rank<'a>(profiles: Vec<&'a FederatedProfile>, terms: &[String]) -> Vec<ScoredProfile<'a>> {
    if terms.is_empty() {
        return profiles
            .into_iter()
            .map(|profile| ScoredProfile {
                score: 0.0,
                profile,
            })
            .collect();
    }

    let mut scored: Vec<ScoredProfile<'a>> = profiles
        .into_iter()
        .map(|profile| ScoredProfile {
            score: score_profile(profile, terms),
            profile,
        })
        .filter(|s| s.score > 0.0)
        .collect();

    // stable: equal scores keep index order
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored
}

/// Stage 3: drop `offset`, keep `limit`.
pub fn paginate<T>(items: Vec<T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    let rest = items.into_iter().skip(offset);
    match limit {
        Some(limit) => rest.take(limit).collect(),
        None => rest.collect(),
    }
}

fn lower(value: &Option<String>) -> String {
    value.as_deref().map(str::to_lowercase).unwrap_or_default()
}

/// Relevance of one profile for already lower-cased query terms.
pub fn score_profile(profile: &FederatedProfile, terms: &[String]) -> f64 {
    let name = profile.full_name.to_lowercase();
    let department = lower(&profile.department);
    let position = lower(&profile.position);
    let institution = profile.institution_name.to_lowercase();
    let interests: Vec<String> = profile
        .research_interests
        .iter()
        .map(|s| s.to_lowercase())
        .collect();
    let keywords: Vec<String> = profile.keywords.iter().map(|s| s.to_lowercase()).collect();

    let mut haystack = vec![
        name.clone(),
        department.clone(),
        position.clone(),
        institution.clone(),
        lower(&profile.college),
        lower(&profile.bio),
    ];
    haystack.extend(interests.iter().cloned());
    haystack.extend(keywords.iter().cloned());
    let all_fields = haystack.join(" ");

    let mut score = 0.0;
    for term in terms {
        let term = term.as_str();
        if name.contains(term) {
            score += NAME_WEIGHT;
        }
        if department.contains(term) {
            score += DEPARTMENT_WEIGHT;
        }
        score += INTEREST_WEIGHT * interests.iter().filter(|i| i.contains(term)).count() as f64;
        score += KEYWORD_WEIGHT * keywords.iter().filter(|k| k.contains(term)).count() as f64;
        if position.contains(term) {
            score += POSITION_WEIGHT;
        }
        if institution.contains(term) {
            score += INSTITUTION_WEIGHT;
        }
        if all_fields.contains(term) {
            score += ANY_FIELD_WEIGHT;
        }
    }

    if profile.h_index.is_some_and(|h| h > IMPACT_BOOST_THRESHOLD) {
        score *= IMPACT_BOOST;
    }
    if profile.match_confidence == MatchConfidence::High {
        score *= HIGH_CONFIDENCE_BOOST;
    }
    score
}

// ============ Building ============

/// Profile id: `<tenant>:<normalized full name>`.
pub fn profile_id(tenant_slug: &str, full_name: &str) -> String {
    format!("{}:{}", tenant_slug, normalize_name_key(full_name))
}

impl FederatedProfile {
    /// Flatten a scraped person and its enrichment (if any) into a profile.
    pub fn merge(
        person: &ScrapedPerson,
        institution_name: &str,
        enrichment: Option<&EnrichmentResult>,
    ) -> Self {
        let metrics = enrichment.and_then(|e| e.metrics.as_ref());
        Self {
            id: profile_id(&person.tenant_slug, &person.full_name),
            tenant_slug: person.tenant_slug.clone(),
            institution_name: institution_name.to_string(),
            full_name: person.full_name.clone(),
            first_name: person.first_name.clone(),
            last_name: person.last_name.clone(),
            position: person.position.clone(),
            person_type: person.person_type,
            department: person.department.clone(),
            college: person.college.clone(),
            email: person.email.clone(),
            phone: person.phone.clone(),
            office: person.office.clone(),
            bio: person.bio.clone(),
            research_interests: person.research_interests.clone(),
            photo_url: person.photo_url.clone(),
            profile_url: person.profile_url.clone(),
            source_url: person.source_url.clone(),
            orcid: person.orcid.clone(),
            openalex_id: enrichment.and_then(|e| e.openalex_id.clone()),
            works_count: metrics.map(|m| m.works_count),
            citation_count: metrics.map(|m| m.cited_by_count),
            h_index: metrics.and_then(|m| m.h_index),
            keywords: enrichment.map(|e| e.topics.clone()).unwrap_or_default(),
            match_confidence: enrichment
                .map(|e| e.confidence)
                .unwrap_or(MatchConfidence::None),
        }
    }
}

/// Join one tenant's raw records to their enrichment results by full name.
///
/// Records without an enrichment result pass through with confidence NONE.
/// A repeated normalized name keeps only its first occurrence.
pub fn build_tenant_profiles(
    institution_name: &str,
    people: &[ScrapedPerson],
    enrichments: &[EnrichmentResult],
) -> Vec<FederatedProfile> {
    let mut by_name: HashMap<String, &EnrichmentResult> = HashMap::new();
    for result in enrichments {
        by_name
            .entry(normalize_name_key(&result.person.full_name))
            .or_insert(result);
    }

    let mut seen: HashSet<String> = HashSet::new();
    people
        .iter()
        .filter(|p| seen.insert(normalize_name_key(&p.full_name)))
        .map(|p| {
            let enrichment = by_name.get(&normalize_name_key(&p.full_name)).copied();
            FederatedProfile::merge(p, institution_name, enrichment)
        })
        .collect()
}

impl FederationIndexFile {
    /// Wrap merged profiles with header fields and per-tenant counts.
    pub fn assemble(
        consortium_id: &str,
        consortium_name: &str,
        profiles: Vec<FederatedProfile>,
    ) -> Self {
        let mut tenant_counts: BTreeMap<String, usize> = BTreeMap::new();
        for p in &profiles {
            *tenant_counts.entry(p.tenant_slug.clone()).or_default() += 1;
        }
        Self {
            consortium_id: consortium_id.to_string(),
            consortium_name: consortium_name.to_string(),
            generated_at: Utc::now(),
            total_profiles: profiles.len(),
            tenant_counts,
            profiles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthorMetrics;

    fn person(tenant: &str, name: &str) -> ScrapedPerson {
        let parsed = crate::parse::parse_name(name).unwrap();
        ScrapedPerson {
            tenant_slug: tenant.to_string(),
            source_url: format!("https://{}.edu/people", tenant),
            scraped_at: Utc::now(),
            raw_name: name.to_string(),
            full_name: parsed.full_name,
            first_name: parsed.first_name,
            last_name: parsed.last_name,
            position: None,
            person_type: PersonType::Faculty,
            department: None,
            college: None,
            email: None,
            phone: None,
            office: None,
            bio: None,
            research_interests: Vec::new(),
            photo_url: None,
            profile_url: None,
            orcid: None,
        }
    }

    fn profile(tenant: &str, name: &str) -> FederatedProfile {
        FederatedProfile::merge(&person(tenant, name), &format!("{} University", tenant), None)
    }

    fn index(profiles: Vec<FederatedProfile>) -> FederationIndex {
        FederationIndex::new(FederationIndexFile::assemble("test", "Test", profiles))
    }

    fn names<'a>(results: &'a SearchResults<'_>) -> Vec<&'a str> {
        results
            .hits
            .iter()
            .map(|h| h.profile.full_name.as_str())
            .collect()
    }

    #[test]
    fn test_name_match_contributes_ten_per_term() {
        let mut p = profile("inst", "Jane A. Smith");
        p.email = Some("jane@inst.edu".into());
        p.department = Some("Biology".into());
        let idx = index(vec![p]);

        let results = idx.search(&SearchQuery::text("jane smith"));
        assert_eq!(results.total, 1);
        // two name hits (10 each) plus two any-field hits (0.5 each)
        assert!((results.hits[0].score - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_field_weights() {
        let mut p = profile("inst", "Alex Doe");
        p.department = Some("Neuroscience".into());
        p.position = Some("Professor of Neuroscience".into());
        p.research_interests = vec!["Neuroscience of memory".into(), "Sleep".into()];
        p.keywords = vec!["Cognitive Neuroscience".into()];
        p.bio = Some("Works on neuroscience".into());
        let terms = vec!["neuroscience".to_string()];
        // dept 5 + interest 3 + keyword 2 + position 2 + any-field 0.5
        assert!((score_profile(&p, &terms) - 12.5).abs() < 1e-9);

        let terms = vec!["inst".to_string()];
        // institution 1 + any-field 0.5
        assert!((score_profile(&p, &terms) - 1.5).abs() < 1e-9);

        let terms = vec!["works".to_string()];
        // bio only reaches the any-field fallback
        assert!((score_profile(&p, &terms) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_boosts_are_multiplicative() {
        let mut base = profile("inst", "Kim Lee");
        base.h_index = Some(11);
        let terms = vec!["kim".to_string()];
        assert!((score_profile(&base, &terms) - 10.5 * 1.1).abs() < 1e-9);

        base.match_confidence = MatchConfidence::High;
        assert!((score_profile(&base, &terms) - 10.5 * 1.1 * 1.05).abs() < 1e-9);

        base.h_index = Some(10);
        assert!((score_profile(&base, &terms) - 10.5 * 1.05).abs() < 1e-9);
    }

    #[test]
    fn test_ranking_order_from_weights() {
        let mut by_dept = profile("a", "Pat Quinn");
        by_dept.department = Some("Chemistry".into());
        let mut by_name = profile("a", "Chemistry Jones");
        by_name.department = Some("History".into());
        let mut by_interest = profile("a", "Lou Reed");
        by_interest.research_interests = vec!["Organic chemistry".into()];
        let mut boosted_interest = profile("a", "Ray Charles");
        boosted_interest.research_interests = vec!["Physical chemistry".into()];
        boosted_interest.h_index = Some(40);
        boosted_interest.match_confidence = MatchConfidence::High;
        let idx = index(vec![by_interest, by_dept, boosted_interest, by_name]);

        let results = idx.search(&SearchQuery::text("chemistry"));
        assert_eq!(
            names(&results),
            vec!["Chemistry Jones", "Pat Quinn", "Ray Charles", "Lou Reed"]
        );
    }

    #[test]
    fn test_ties_keep_index_order() {
        let idx = index(vec![
            profile("a", "Sam One"),
            profile("b", "Sam Two"),
            profile("c", "Sam Three"),
        ]);
        let results = idx.search(&SearchQuery::text("sam"));
        assert_eq!(names(&results), vec!["Sam One", "Sam Two", "Sam Three"]);

        let again = idx.search(&SearchQuery::text("sam"));
        assert_eq!(names(&results), names(&again));
    }

    #[test]
    fn test_zero_scores_are_dropped() {
        let idx = index(vec![profile("a", "Sam One"), profile("a", "Lee Two")]);
        let results = idx.search(&SearchQuery::text("sam"));
        assert_eq!(names(&results), vec!["Sam One"]);
    }

    #[test]
    fn test_no_query_passes_filtered_in_index_order() {
        let mut a = profile("a", "Zed Alpha");
        a.person_type = PersonType::Staff;
        let b = profile("b", "Amy Beta");
        let c = profile("a", "Bob Gamma");
        let idx = index(vec![a, b, c]);

        let all = idx.search(&SearchQuery::default());
        assert_eq!(names(&all), vec!["Zed Alpha", "Amy Beta", "Bob Gamma"]);

        let blank = idx.search(&SearchQuery::text("   "));
        assert_eq!(blank.total, 3);

        let tenant_a = idx.search(&SearchQuery {
            tenants: vec!["a".into()],
            ..Default::default()
        });
        assert_eq!(names(&tenant_a), vec!["Zed Alpha", "Bob Gamma"]);

        let faculty_a = idx.search(&SearchQuery {
            tenants: vec!["a".into()],
            person_types: vec![PersonType::Faculty],
            ..Default::default()
        });
        assert_eq!(names(&faculty_a), vec!["Bob Gamma"]);
    }

    #[test]
    fn test_department_and_h_index_filters() {
        let mut a = profile("a", "Ann One");
        a.department = Some("Department of Biology".into());
        a.h_index = Some(20);
        let mut b = profile("a", "Ben Two");
        b.department = Some("Physics".into());
        b.h_index = Some(5);
        let c = profile("a", "Cat Three");
        let idx = index(vec![a, b, c]);

        let bio_or_phys = idx.search(&SearchQuery {
            departments: vec!["BIOLOGY".into(), "phys".into()],
            ..Default::default()
        });
        assert_eq!(names(&bio_or_phys), vec!["Ann One", "Ben Two"]);

        let impactful = idx.search(&SearchQuery {
            min_h_index: Some(10),
            ..Default::default()
        });
        assert_eq!(names(&impactful), vec!["Ann One"]);
    }

    #[test]
    fn test_pagination_is_slice_of_full_result() {
        let profiles: Vec<FederatedProfile> = (0..25)
            .map(|i| {
                let mut p = profile("a", &format!("Person Number{}", i));
                p.research_interests = (0..(i % 4)).map(|_| "number theory".to_string()).collect();
                p
            })
            .collect();
        let idx = index(profiles);

        let full = idx.search(&SearchQuery::text("number"));
        let full_names = names(&full);
        for offset in [0, 1, 7, 24, 25, 40] {
            for limit in [0, 1, 5, 100] {
                let page = idx.search(&SearchQuery {
                    text: Some("number".into()),
                    offset,
                    limit: Some(limit),
                    ..Default::default()
                });
                let expected: Vec<&str> =
                    full_names.iter().skip(offset).take(limit).copied().collect();
                assert_eq!(names(&page), expected, "offset={} limit={}", offset, limit);
                assert_eq!(page.total, full.total);
            }
        }
    }

    #[test]
    fn test_stats_counts() {
        let profiles: Vec<FederatedProfile> = (0..100)
            .map(|i| {
                let tenant = if i < 60 { "a" } else { "b" };
                let mut p = profile(tenant, &format!("Person N{}", i));
                if i < 30 {
                    p.openalex_id = Some(format!("https://openalex.org/A{}", i));
                    p.h_index = Some(i as u32);
                }
                if i % 2 == 0 {
                    p.email = Some(format!("p{}@x.edu", i));
                }
                if i % 5 == 0 {
                    p.research_interests = vec!["x".into()];
                }
                p.department = Some(match i % 10 {
                    0..=4 => "Biology".to_string(),
                    5..=7 => "Chemistry".to_string(),
                    8 => "Unknown".to_string(),
                    _ => "  ".to_string(),
                });
                if i < 3 {
                    p.person_type = PersonType::Postdoc;
                }
                p
            })
            .collect();
        let stats = index(profiles).stats();

        assert_eq!(stats.total_profiles, 100);
        assert_eq!(stats.by_tenant["a"], 60);
        assert_eq!(stats.by_tenant["b"], 40);
        assert_eq!(stats.coverage.with_openalex, 30);
        assert_eq!(stats.coverage.with_h_index, 30);
        assert_eq!(stats.coverage.with_email, 50);
        assert_eq!(stats.coverage.with_research_interests, 20);
        assert_eq!(stats.by_person_type[&PersonType::Postdoc], 3);
        assert_eq!(stats.by_person_type[&PersonType::Faculty], 97);
        assert_eq!(
            stats.top_departments,
            vec![
                DepartmentCount {
                    department: "Biology".into(),
                    count: 50
                },
                DepartmentCount {
                    department: "Chemistry".into(),
                    count: 30
                },
            ]
        );
    }

    #[test]
    fn test_top_departments_capped_at_ten() {
        let profiles: Vec<FederatedProfile> = (0..15)
            .map(|i| {
                let mut p = profile("a", &format!("P Q{}", i));
                p.department = Some(format!("Dept {:02}", i));
                p
            })
            .collect();
        let stats = index(profiles).stats();
        assert_eq!(stats.top_departments.len(), 10);
        assert_eq!(stats.top_departments[0].department, "Dept 00");
    }

    #[test]
    fn test_find_by_topic_and_institution() {
        let mut a = profile("a", "Ann One");
        a.keywords = vec!["Machine Learning".into()];
        let mut b = profile("b", "Ben Two");
        b.research_interests = vec!["machine learning for health".into()];
        let c = profile("b", "Cat Three");
        let idx = index(vec![a, b, c]);

        let hits: Vec<&str> = idx
            .find_by_topic("Machine learning")
            .iter()
            .map(|p| p.full_name.as_str())
            .collect();
        assert_eq!(hits, vec!["Ann One", "Ben Two"]);
        assert!(idx.find_by_topic(" ").is_empty());

        let b_people: Vec<&str> = idx
            .get_by_institution("b")
            .iter()
            .map(|p| p.full_name.as_str())
            .collect();
        assert_eq!(b_people, vec!["Ben Two", "Cat Three"]);
        assert!(idx.get_by_institution("zzz").is_empty());
    }

    #[test]
    fn test_build_tenant_profiles_joins_by_name() {
        let jane = person("a", "Jane Smith");
        let bob = person("a", "Bob Stone");
        let mut enriched = EnrichmentResult::unmatched(person("a", "jane  SMITH"));
        enriched.openalex_id = Some("A1".into());
        enriched.confidence = MatchConfidence::Medium;
        enriched.topics = vec!["Ecology".into()];
        enriched.metrics = Some(AuthorMetrics {
            works_count: 12,
            cited_by_count: 300,
            h_index: Some(9),
            i10_index: Some(8),
        });

        let profiles = build_tenant_profiles("A University", &[jane, bob], &[enriched]);
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].id, "a:jane smith");
        assert_eq!(profiles[0].match_confidence, MatchConfidence::Medium);
        assert_eq!(profiles[0].h_index, Some(9));
        assert_eq!(profiles[0].keywords, vec!["Ecology"]);
        assert_eq!(profiles[1].match_confidence, MatchConfidence::None);
        assert_eq!(profiles[1].openalex_id, None);
        assert_eq!(profiles[1].institution_name, "A University");
    }

    #[test]
    fn test_build_tenant_profiles_collapses_repeated_names() {
        let first = person("a", "Jane Smith");
        let mut second = person("a", "Jane  Smith");
        second.source_url = "https://a.edu/other".into();
        let profiles = build_tenant_profiles("A", &[first, second], &[]);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].source_url, "https://a.edu/people");
    }

    #[test]
    fn test_missing_h_index_stays_absent() {
        let mut enriched = EnrichmentResult::unmatched(person("a", "Jane Smith"));
        enriched.openalex_id = Some("A1".into());
        enriched.confidence = MatchConfidence::Low;
        enriched.metrics = Some(AuthorMetrics {
            works_count: 4,
            cited_by_count: 20,
            h_index: None,
            i10_index: None,
        });

        let profiles = build_tenant_profiles("A", &[person("a", "Jane Smith")], &[enriched]);
        assert_eq!(profiles[0].works_count, Some(4));
        assert_eq!(profiles[0].h_index, None);

        let idx = index(profiles);
        let stats = idx.stats();
        assert_eq!(stats.coverage.with_openalex, 1);
        assert_eq!(stats.coverage.with_h_index, 0);

        let query = SearchQuery {
            min_h_index: Some(0),
            ..Default::default()
        };
        assert_eq!(idx.search(&query).total, 0);
    }

    #[test]
    fn test_same_name_in_two_tenants_is_two_profiles() {
        let a = FederatedProfile::merge(&person("a", "Jane Smith"), "A", None);
        let b = FederatedProfile::merge(&person("b", "Jane Smith"), "B", None);
        assert_ne!(a.id, b.id);
        let file = FederationIndexFile::assemble("c", "C", vec![a, b]);
        assert_eq!(file.total_profiles, 2);
        assert_eq!(file.tenant_counts["a"], 1);
        assert_eq!(file.tenant_counts["b"], 1);
    }

    #[test]
    fn test_from_json_reports_parse_error() {
        let err = FederationIndex::from_json("{not json", Path::new("idx.json")).unwrap_err();
        assert!(matches!(err, IndexError::Parse { .. }));
        assert!(!err.is_not_found());
    }
}
