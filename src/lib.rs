//! # Faculty Federation
//!
//! Multi-tenant faculty directory harvesting and cross-institutional entity
//! resolution.
//!
//! Faculty Federation crawls the public directory pages of independently
//! run institutions, extracts a common person record with per-tenant CSS
//! selectors, resolves each person against OpenAlex with confidence scoring,
//! and merges everything into one searchable federation index.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Directory  │──▶│  Enricher   │──▶│  Federation  │
//! │  scraper    │   │  (OpenAlex) │   │  index JSON  │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │
//!                                            ▼
//!                                     ┌──────────────┐
//!                                     │ fedx search  │
//!                                     │ stats/topic  │
//!                                     └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! fedx --config ./config/federation.toml            # scrape, enrich, index, summarize
//! fedx --skip-scrape --tenants gsu,emory            # re-enrich from saved raw records
//! fedx search "computational neuroscience" --min-h-index 10
//! fedx stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`directory`] | Selector-driven directory scraper and the page source seam |
//! | [`authority`] | OpenAlex client behind the `Authority` seam |
//! | [`enricher`] | Strategy-chain resolution and batch enrichment |
//! | [`pipeline`] | Four-phase orchestration and persisted outputs |
//! | [`federation`] | Index loading and read-side commands |
//! | [`logging`] | Tracing subscriber setup |
//!
//! The pure data model, parsing, scoring, and search live in
//! [`federation_core`].

pub mod authority;
pub mod config;
pub mod directory;
pub mod enricher;
pub mod federation;
pub mod logging;
pub mod pipeline;

pub use federation_core;
