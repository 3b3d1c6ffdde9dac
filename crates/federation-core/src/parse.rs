//! Field normalization for scraped directory entries.
//!
//! Directory pages carry names with honorifics and credentials, research
//! interests in whatever list format the site author preferred, and free
//! form position titles. These helpers turn them into the normalized shape
//! stored on [`ScrapedPerson`](crate::models::ScrapedPerson).
//!
//! [`parse_name`] is a fixed point on its own output. For
//! [`parse_research_interests`] the fixed point holds for the whole list
//! re-joined with `"; "`, not for each fragment alone: a fragment may still
//! contain a lower-priority separator and split further when parsed by itself.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::PersonType;

/// Credentials stripped from the end of a name, compared without dots or case.
const CREDENTIAL_SUFFIXES: &[&str] = &[
    "phd", "md", "jr", "sr", "ii", "iii", "iv", "mba", "mph", "msc", "rn", "dvm", "edd", "psyd",
    "pharmd", "dds", "dmd", "esq", "faan", "facp",
];

/// Honorifics stripped from the start of a name.
const LEADING_TITLES: &[&str] = &["dr", "prof", "mr", "ms", "mrs"];

/// List separators for research interests, highest priority first.
const INTEREST_SEPARATORS: [char; 5] = [';', ',', '•', '|', '\n'];

const MAX_INTEREST_LEN: usize = 100;
const MAX_SINGLE_INTEREST_LEN: usize = 200;

static ORCID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4}-\d{4}-\d{4}-\d{3}[\dX])\b").expect("valid ORCID regex"));

/// A display name split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Cleaned full name: honorifics and credentials removed, single spaces.
    pub full_name: String,
    /// Every token before the last one; `None` for single-token names.
    pub first_name: Option<String>,
    pub last_name: String,
}

/// Collapse all runs of whitespace to single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Key used for name identity: lower-cased, whitespace-normalized.
pub fn normalize_name_key(s: &str) -> String {
    normalize_whitespace(s).to_lowercase()
}

fn token_key(token: &str) -> String {
    token
        .trim_matches(|c: char| c == ',' || c == ';')
        .replace('.', "")
        .to_lowercase()
}

/// Parse a raw directory name into first and last name.
///
/// Trailing credentials (`Ph.D.`, `M.D.`, `Jr.`, `III`, ...) and leading
/// honorifics (`Dr.`, `Prof.`, `Mr.`, `Ms.`, `Mrs.`) are removed. The final
/// remaining token is the last name; everything before it is the first name.
/// Compound surnames such as "van der Berg" therefore parse as last name
/// "Berg".
///
/// Returns `None` when nothing name-like remains.
pub fn parse_name(raw: &str) -> Option<ParsedName> {
    let mut tokens: Vec<&str> = raw.split_whitespace().collect();

    while tokens.len() > 1 {
        let key = token_key(tokens[tokens.len() - 1]);
        if key.is_empty() || CREDENTIAL_SUFFIXES.contains(&key.as_str()) {
            tokens.pop();
        } else {
            break;
        }
    }

    while tokens.len() > 1 && LEADING_TITLES.contains(&token_key(tokens[0]).as_str()) {
        tokens.remove(0);
    }

    let tokens: Vec<&str> = tokens
        .into_iter()
        .map(|t| t.trim_end_matches(|c: char| c == ',' || c == ';'))
        .filter(|t| !t.is_empty())
        .collect();

    let (last, rest) = tokens.split_last()?;
    let first_name = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };

    Some(ParsedName {
        full_name: tokens.join(" "),
        first_name,
        last_name: (*last).to_string(),
    })
}

/// Split a research-interests blob into individual interests.
///
/// The first separator from `;`, `,`, `•`, `|`, newline that occurs in the
/// text is used. Fragments are trimmed and kept when non-empty and shorter
/// than 100 characters. Text with no separator is kept whole when shorter
/// than 200 characters.
pub fn parse_research_interests(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    match INTEREST_SEPARATORS.iter().find(|sep| text.contains(**sep)) {
        Some(sep) => text
            .split(*sep)
            .map(str::trim)
            .filter(|s| !s.is_empty() && s.chars().count() < MAX_INTEREST_LEN)
            .map(str::to_string)
            .collect(),
        None if text.chars().count() < MAX_SINGLE_INTEREST_LEN => vec![text.to_string()],
        None => Vec::new(),
    }
}

/// Keyword sets scanned in order; the first category with a hit wins.
const PERSON_TYPE_KEYWORDS: &[(PersonType, &[&str])] = &[
    (PersonType::Emeritus, &["emeritus", "emerita", "emeriti", "retired"]),
    (
        PersonType::Postdoc,
        &["postdoc", "post-doc", "postdoctoral", "post-doctoral"],
    ),
    (
        PersonType::GraduateStudent,
        &[
            "graduate student",
            "grad student",
            "phd student",
            "ph.d. student",
            "doctoral student",
            "doctoral candidate",
            "phd candidate",
            "ph.d. candidate",
            "masters student",
            "master's student",
            "graduate assistant",
            "graduate research assistant",
            "graduate teaching assistant",
        ],
    ),
    (
        PersonType::Researcher,
        &[
            "research scientist",
            "research associate",
            "research fellow",
            "researcher",
            "scientist",
            "research engineer",
        ],
    ),
    (
        PersonType::Staff,
        &[
            "staff",
            "coordinator",
            "manager",
            "specialist",
            "administrative assistant",
            "technician",
            "advisor",
            "accountant",
            "analyst",
        ],
    ),
    (
        PersonType::Affiliate,
        &["affiliate", "adjunct", "visiting", "courtesy", "associated faculty"],
    ),
    (
        PersonType::Administrator,
        &[
            "dean",
            "provost",
            "president",
            "chancellor",
            "director",
            "chair",
            "head of department",
        ],
    ),
    (
        PersonType::Faculty,
        &["professor", "lecturer", "instructor", "faculty", "teaching"],
    ),
];

/// Infer the person-type category from a position title.
///
/// Case-insensitive keyword scan in the order emeritus, postdoc, graduate
/// student, researcher, staff, affiliate, administrator, faculty. A missing
/// position or a position with no known keyword defaults to faculty.
pub fn infer_person_type(position: Option<&str>) -> PersonType {
    let Some(position) = position else {
        return PersonType::Faculty;
    };
    let lower = position.to_lowercase();

    PERSON_TYPE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(person_type, _)| *person_type)
        .unwrap_or(PersonType::Faculty)
}

/// Pull an ORCID iD (`0000-0002-1825-0097`) out of a URL or free text.
pub fn extract_orcid(text: &str) -> Option<String> {
    ORCID_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
