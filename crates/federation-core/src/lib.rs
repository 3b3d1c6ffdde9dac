//! # Federation Core
//!
//! Shared, I/O-free logic for Faculty Federation: the directory record
//! model, name and research-interest parsing, authority match scoring, and
//! the in-memory federation index with its search engine.
//!
//! This crate contains no tokio, HTTP, or filesystem dependencies. The
//! application crate supplies fetched pages, authority responses, and
//! persisted index bytes; everything here is a pure function of its input.

pub mod error;
pub mod index;
pub mod matching;
pub mod models;
pub mod parse;
