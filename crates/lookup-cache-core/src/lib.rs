//! # Lookup Cache Core
//!
//! Pure logic for the word-lookup cache: the data model, script-aware
//! tokenization and normalization, stopword tables, the LLM batch protocol,
//! and timing-token parsing.
//!
//! This crate contains no tokio, HTTP client, or filesystem I/O. Persistence,
//! networking and orchestration live in the `lookup-cache` app crate.

pub mod models;
pub mod protocol;
pub mod stopwords;
pub mod timing;
pub mod tokenize;
