//! Read-side commands over the persisted federation index.
//!
//! Everything here loads `federation_index.json` once with [`load_index`]
//! and prints to stdout. A missing index is [`IndexError::NotFound`], which
//! the CLI turns into a non-zero exit.

use anyhow::Result;
use std::path::Path;

use federation_core::error::IndexError;
use federation_core::index::{FederationIndex, IndexStats, SearchQuery};
use federation_core::models::FederatedProfile;

use crate::config::Config;
use crate::pipeline::RunSummary;

/// Load the index snapshot at `path`.
pub fn load_index(path: &Path) -> Result<FederationIndex, IndexError> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            IndexError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            IndexError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    FederationIndex::from_json(&content, path)
}

fn open(config: &Config) -> Result<FederationIndex> {
    let path = config.output.index_file();
    let index = load_index(&path).map_err(|e| {
        if e.is_not_found() {
            anyhow::anyhow!("{}. Run `fedx` without a subcommand to build it.", e)
        } else {
            anyhow::Error::new(e)
        }
    })?;
    tracing::debug!(path = %path.display(), profiles = index.len(), "federation index loaded");
    Ok(index)
}

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn print_profile_line(i: usize, score: Option<f64>, p: &FederatedProfile) {
    match score {
        Some(score) => println!(
            "{}. [{:.2}] {} / {}",
            i + 1,
            score,
            p.tenant_slug,
            p.full_name
        ),
        None => println!("{}. {} / {}", i + 1, p.tenant_slug, p.full_name),
    }
    println!(
        "    {} | {} | {}",
        or_dash(&p.position),
        or_dash(&p.department),
        p.institution_name
    );
    if let Some(ref email) = p.email {
        println!("    email: {}", email);
    }
    if let Some(h) = p.h_index {
        println!(
            "    h-index: {}  works: {}  citations: {}  match: {}",
            h,
            p.works_count.unwrap_or(0),
            p.citation_count.unwrap_or(0),
            p.match_confidence
        );
    }
    if !p.research_interests.is_empty() {
        println!("    interests: {}", p.research_interests.join("; "));
    }
    if !p.keywords.is_empty() {
        println!("    topics: {}", p.keywords.join("; "));
    }
    println!("    id: {}", p.id);
    println!();
}

/// `fedx search`.
pub fn run_search(config: &Config, query: &SearchQuery, json: bool) -> Result<()> {
    let index = open(config)?;
    let results = index.search(query);

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!(
        "{} match{} (showing {} from offset {})",
        results.total,
        if results.total == 1 { "" } else { "es" },
        results.hits.len(),
        results.offset
    );
    println!();
    let scored = query.text.as_deref().is_some_and(|t| !t.trim().is_empty());
    for (i, hit) in results.hits.iter().enumerate() {
        let score = if scored { Some(hit.score) } else { None };
        print_profile_line(results.offset + i, score, hit.profile);
    }
    Ok(())
}

fn percent(part: usize, total: usize) -> usize {
    if total > 0 {
        (part * 100) / total
    } else {
        0
    }
}

fn print_stats(index: &FederationIndex, stats: &IndexStats) {
    let total = stats.total_profiles;
    println!("{}: Federation Stats", index.consortium_name());
    println!("================================");
    println!();
    println!("  Federation:  {}", index.consortium_id());
    println!(
        "  Generated:   {}",
        index.generated_at().format("%Y-%m-%d %H:%M")
    );
    println!("  Profiles:    {}", total);
    println!();
    println!("  Coverage:");
    let c = &stats.coverage;
    for (label, n) in [
        ("email", c.with_email),
        ("research interests", c.with_research_interests),
        ("openalex id", c.with_openalex),
        ("h-index", c.with_h_index),
    ] {
        println!("    {:<20} {:>6} ({}%)", label, n, percent(n, total));
    }

    println!();
    println!("  By tenant:");
    println!("  {:<24} {:>8}", "TENANT", "PROFILES");
    println!("  {}", "-".repeat(34));
    for (slug, n) in &stats.by_tenant {
        println!("  {:<24} {:>8}", slug, n);
    }

    println!();
    println!("  By person type:");
    for (person_type, n) in &stats.by_person_type {
        println!("    {:<20} {:>6}", person_type.to_string(), n);
    }

    if !stats.top_departments.is_empty() {
        println!();
        println!("  Top departments:");
        for d in &stats.top_departments {
            println!("    {:<40} {:>6}", d.department, d.count);
        }
    }
    println!();
}

/// `fedx stats`.
pub fn run_stats(config: &Config, json: bool) -> Result<()> {
    let index = open(config)?;
    let stats = index.stats();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&index, &stats);
    }
    Ok(())
}

/// `fedx topic`.
pub fn run_topic(config: &Config, topic: &str) -> Result<()> {
    let index = open(config)?;
    let profiles = index.find_by_topic(topic);
    if profiles.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, p) in profiles.iter().enumerate() {
        print_profile_line(i, None, p);
    }
    Ok(())
}

/// `fedx institution`.
pub fn run_institution(config: &Config, slug: &str) -> Result<()> {
    let index = open(config)?;
    let profiles = index.get_by_institution(slug);
    if profiles.is_empty() {
        println!("No profiles for tenant '{}'.", slug);
        return Ok(());
    }
    for (i, p) in profiles.iter().enumerate() {
        print_profile_line(i, None, p);
    }
    Ok(())
}

/// `fedx tenants`: configured tenants and which phases apply to them.
pub fn list_tenants(config: &Config) {
    println!(
        "{:<16} {:<12} {:<8} {:<8} NAME",
        "TENANT", "KIND", "SCRAPE", "ENRICH"
    );
    for t in &config.tenants {
        println!(
            "{:<16} {:<12} {:<8} {:<8} {}",
            t.slug,
            t.kind.to_string(),
            if t.is_scrapable() { "yes" } else { "no" },
            if t.is_enrichable() { "yes" } else { "no" },
            t.name
        );
    }
}

/// Human summary printed after a pipeline run.
pub fn print_run_summary(summary: &RunSummary) {
    println!(
        "Federation {} built in {:.1}s{}",
        summary.federation_id,
        summary.duration_secs,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    println!();
    println!(
        "  {:<16} {:>7} {:>7} {:>9} {:>8} {:>9}",
        "TENANT", "FOUND", "FAILED", "ENRICHED", "MATCHED", "PROFILES"
    );
    println!("  {}", "-".repeat(61));
    for t in &summary.tenants {
        println!(
            "  {:<16} {:>7} {:>7} {:>9} {:>8} {:>9}",
            t.slug, t.found, t.failed, t.enriched, t.matched, t.profiles
        );
    }
    let totals = &summary.totals;
    println!("  {}", "-".repeat(61));
    println!(
        "  {:<16} {:>7} {:>7} {:>9} {:>8} {:>9}",
        "total", totals.found, totals.failed, totals.enriched, totals.matched, totals.profiles
    );
    println!();
    println!("  index: {}", summary.outputs.index.display());
    println!("  summary: {}", summary.outputs.summary.display());
}
