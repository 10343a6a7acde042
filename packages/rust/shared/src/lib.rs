//! Shared types, error model, and configuration for welfarebridge.
//!
//! This crate is the foundation depended on by all other welfarebridge crates.
//! It provides:
//! - [`WelfareBridgeError`] — the unified error type
//! - Domain types ([`WelfareCard`], [`Region`], [`IncomeEstimate`], [`EstimateSummary`])
//! - Loose numeric coercion ([`coerce_int`])
//! - Configuration ([`AppConfig`], config loading, secret lookup)

pub mod config;
pub mod error;
pub mod numeric;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CatalogConfig, GenerationConfig, IngestConfig, IngestPolicy, StorageConfig,
    config_dir, config_file_path, expand_home, generation_api_key, init_config, load_config,
    load_config_from, service_key,
};
pub use error::{Result, WelfareBridgeError};
pub use numeric::coerce_int;
pub use types::{EstimateSummary, IncomeEstimate, Region, WelfareCard};
