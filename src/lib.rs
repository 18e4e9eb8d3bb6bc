//! Semantic memory index — per-user text memories with embedding search and
//! graceful degradation.
//!
//! Engram stores short text records per owner, embeds their content into
//! 1536-dimension vectors, and answers similarity queries by ranking stored
//! records against a query embedding. Two failure regimes degrade rather
//! than fail:
//!
//! - **Embedding provider unavailable** (no API key, rate limit, network):
//!   search falls back to plain substring matching with a documented
//!   sentinel score.
//! - **Ranked backend unreachable**: search falls back to an in-process
//!   approximate-nearest-neighbor index mirrored at insert time and rebuilt
//!   from durable storage at process start.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   for ranked vector search — the durable source of truth for embeddings
//! - **Embeddings**: OpenAI-compatible HTTP provider (1536 dimensions,
//!   L2-normalized)
//! - **Fallback index**: HNSW (`hora`) over cosine distance, capacity-bounded
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite database initialization and schema
//! - [`embedding`] — Text-to-vector embedding via an OpenAI-compatible API
//! - [`error`] — The [`error::MemoryError`] taxonomy
//! - [`memory`] — Record lifecycle, durable store SQL, stats, and the manager
//! - [`vector`] — The search coordinator and the local fallback index

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod vector;
