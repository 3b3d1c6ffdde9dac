//! Authority match scoring.
//!
//! Given a scraped person and the top candidate an authority lookup
//! returned, decide how much to trust the pairing. The score is a fixed
//! additive rule, not a learned model:
//!
//! | Signal | Points |
//! |--------|--------|
//! | display name equals person name (case-insensitive) | +3 |
//! | otherwise first and last tokens agree | +2 |
//! | otherwise (a candidate exists at all) | +1 |
//! | last-known institution contains a registered fragment | +3 |
//! | more than 10 works | +1 |
//! | more than 50 works | +1 |
//!
//! `>= 6` is [`MatchConfidence::High`], `>= 4` is [`MatchConfidence::Medium`],
//! anything else is [`MatchConfidence::Low`].
//!
//! This module also holds the two authority payload transforms that are
//! pure functions: topic ranking and inverted-index abstract reconstruction.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::MatchConfidence;

pub const HIGH_THRESHOLD: u32 = 6;
pub const MEDIUM_THRESHOLD: u32 = 4;
pub const MAX_TOPICS: usize = 10;

/// Authority-neutral view of a candidate author record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthorCandidate {
    pub id: String,
    pub display_name: String,
    pub orcid: Option<String>,
    pub works_count: u64,
    pub cited_by_count: u64,
    pub h_index: Option<u32>,
    pub i10_index: Option<u32>,
    /// Display names of the author's last known institutions.
    pub institutions: Vec<String>,
    pub topics: Vec<TopicScore>,
}

/// A topic attached to an author with its relevance.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicScore {
    pub display_name: String,
    pub relevance: f64,
}

/// The boolean/numeric signals the score is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSignals {
    pub exact_name: bool,
    pub similar_name: bool,
    pub institution_match: bool,
    pub works_count: u64,
}

impl MatchSignals {
    /// Derive signals for `person_name` against `candidate`.
    pub fn observe(
        person_name: &str,
        candidate: &AuthorCandidate,
        institution_fragments: &[String],
    ) -> Self {
        Self {
            exact_name: names_equal(person_name, &candidate.display_name),
            similar_name: names_similar(person_name, &candidate.display_name),
            institution_match: institution_matches(&candidate.institutions, institution_fragments),
            works_count: candidate.works_count,
        }
    }

    pub fn score(&self) -> u32 {
        let mut score = 0;
        score += if self.exact_name {
            3
        } else if self.similar_name {
            2
        } else {
            1
        };
        if self.institution_match {
            score += 3;
        }
        if self.works_count > 10 {
            score += 1;
        }
        if self.works_count > 50 {
            score += 1;
        }
        score
    }
}

/// Map an additive score onto the confidence scale.
pub fn confidence_for_score(score: u32) -> MatchConfidence {
    if score >= HIGH_THRESHOLD {
        MatchConfidence::High
    } else if score >= MEDIUM_THRESHOLD {
        MatchConfidence::Medium
    } else {
        MatchConfidence::Low
    }
}

/// Score a found candidate. Never returns [`MatchConfidence::None`]; that
/// state belongs to "no candidate at all".
pub fn assess_candidate(
    person_name: &str,
    candidate: &AuthorCandidate,
    institution_fragments: &[String],
) -> (u32, MatchConfidence) {
    let score = MatchSignals::observe(person_name, candidate, institution_fragments).score();
    (score, confidence_for_score(score))
}

fn names_equal(a: &str, b: &str) -> bool {
    let a = a.split_whitespace().collect::<Vec<_>>().join(" ");
    let b = b.split_whitespace().collect::<Vec<_>>().join(" ");
    !a.is_empty() && a.to_lowercase() == b.to_lowercase()
}

fn letter_tokens(name: &str) -> Vec<String> {
    name.split_whitespace()
        .map(|t| {
            t.chars()
                .filter(|c| c.is_alphabetic())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// First and last tokens agree once non-letters are stripped.
///
/// "Jane A. Smith" is similar to "Jane Smith" and to "Jane B Smith", but not
/// to "J. Smith".
pub fn names_similar(a: &str, b: &str) -> bool {
    let a = letter_tokens(a);
    let b = letter_tokens(b);
    match (a.first(), a.last(), b.first(), b.last()) {
        (Some(af), Some(al), Some(bf), Some(bl)) => af == bf && al == bl,
        _ => false,
    }
}

fn institution_matches(institutions: &[String], fragments: &[String]) -> bool {
    institutions.iter().any(|inst| {
        let inst = inst.to_lowercase();
        fragments
            .iter()
            .map(|f| f.trim().to_lowercase())
            .any(|f| !f.is_empty() && inst.contains(&f))
    })
}

/// Top topics by relevance, display names only.
///
/// Sorted descending with a stable sort, so equal-relevance topics keep the
/// authority's order. At most [`MAX_TOPICS`] are returned.
pub fn extract_topics(topics: &[TopicScore]) -> Vec<String> {
    let mut ranked: Vec<&TopicScore> = topics.iter().collect();
    ranked.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(Ordering::Equal)
    });
    ranked
        .into_iter()
        .take(MAX_TOPICS)
        .map(|t| t.display_name.clone())
        .collect()
}

/// Rebuild abstract text from a word -> positions inverted index.
///
/// Words sharing a position come out in map key order (lexicographic).
pub fn reconstruct_abstract(inverted: &BTreeMap<String, Vec<u32>>) -> String {
    let mut placed: Vec<(u32, &str)> = inverted
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |p| (*p, word.as_str())))
        .collect();
    placed.sort_by_key(|(pos, _)| *pos);
    placed
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}
