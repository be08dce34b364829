//! CRM Vendor Intelligence Library
//!
//! Turns a list of CRM vendor names into normalized comparison records by
//! fetching each vendor's public pricing page, stripping boilerplate, mining
//! deterministic facts, asking an LLM for the remaining fields and merging
//! the results with explicit provenance.
//!
//! # Modules
//!
//! - `api`: Route table and HTTP handlers.
//! - `core`: Pipeline stages, models and errors.
//! - `integrations`: Vendor page fetcher, OpenAI client and record store.
//! - `vendors`: Alias table of known vendors.
//! - `fetcher`: Page retrieval with a single user-agent retry.
//! - `extractor`: Boilerplate removal.
//! - `miner`: Deterministic fact mining.
//! - `normalizer`: AI normalization with strict reply parsing.
//! - `openai_client`: Chat completion client.
//! - `assembler`: Precedence merge into `ComparisonRecord`.
//! - `pipeline`: Per-vendor pipeline and bounded batch runner.
//! - `store`: JSON file persistence for records.
//! - `cache_validator`: Checksummed record cache entries.
//! - `circuit_breaker`: Breaker guarding the completion API.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and other binaries
pub mod assembler;
pub mod cache_validator;
pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod extractor;
pub mod fetcher;
pub mod handlers;
pub mod miner;
pub mod models;
pub mod normalizer;
pub mod openai_client;
pub mod pipeline;
pub mod store;
pub mod vendors;
