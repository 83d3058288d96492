//! clusterdeck - operator console engine for inspecting infrastructure clusters.
//!
//! Provides:
//! - `models` - targets, categories, query parameters, typed data rows
//! - `schema` - per-category column catalogue and default selections
//! - `table` - generic row comparator and sort state
//! - `hierarchy` - cluster/host progressive disclosure for performance rows
//! - `orchestrator` - category/parameter state, fetch generations, result set
//! - `export` - export payload construction for the export sink
//! - `connection` - presets, connection set, batch verification workflow
//! - `service` - query/verification/export traits, cache, HTTP and mock backends
//! - `analysis` - capacity ratio analysis and metric aggregation
//! - `store` - key-value persistence behind presets and connections
//! - `config` - command-line / environment configuration

pub mod analysis;
pub mod config;
pub mod connection;
pub mod error;
pub mod export;
pub mod hierarchy;
pub mod models;
pub mod notice;
pub mod orchestrator;
pub mod schema;
pub mod service;
pub mod store;
pub mod table;

pub use error::ConsoleError;

/// Crate version reported by the binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
