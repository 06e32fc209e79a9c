//! # Lookup Cache
//!
//! A job-scoped cache of dictionary definitions for the words of a
//! translated text, built through batched LLM calls and cross-linked to the
//! audio positions where each word is spoken.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Sentences  │──▶│  Tokenizer   │──▶│ Batch lookup │──▶ LLM
//! └─────────────┘   │ + stopwords  │   │ (retrying)   │
//!                   └──────────────┘   └──────┬───────┘
//!                                             │ per batch
//!                                             ▼
//! ┌─────────────┐                      ┌──────────────┐
//! │ Timing      │─────── link ────────▶│ Cache + save │──▶ metadata/lookup_cache.json
//! │ tracks      │                      └──────┬───────┘
//! └─────────────┘                             ▼
//!                                      export / summary / get / bulk
//! ```
//!
//! Pure logic (data model, tokenization, batch protocol, timing parsing)
//! lives in the `lookup-cache-core` crate. This crate adds configuration,
//! the LLM client, orchestration, persistence and the `lkc` CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! lkc build job-42 --sentences sentences.json --input-language Arabic
//! lkc link job-42 --timing chunk-0.timing.json --chunk chunk-0
//! lkc get job-42 مرحبا
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`llm`] | LLM client trait, OpenAI-compatible client, diagnostics |
//! | [`lookup`] | Batch lookup orchestrator |
//! | [`store`] | Cache file persistence and job helpers |
//! | [`manager`] | Per-job cache facade: build, link, save |
//! | [`query`] | Read-only export, summary and word lookups |
//! | [`progress`] | Build progress reporting |
//! | [`build_cmd`] | `build` and `link` commands |

pub mod build_cmd;
pub mod config;
pub mod llm;
pub mod lookup;
pub mod manager;
pub mod progress;
pub mod query;
pub mod store;
