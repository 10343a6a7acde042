//! Application configuration for welfarebridge.
//!
//! User config lives at `~/.welfarebridge/welfarebridge.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never stored in the file; the config names the env vars.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WelfareBridgeError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "welfarebridge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".welfarebridge";

/// Local-government welfare listing endpoint.
const DEFAULT_CATALOG_URL: &str =
    "http://apis.data.go.kr/B554287/LocalGovernmentWelfareInformations/LcgvWelfarelist";

// ---------------------------------------------------------------------------
// Config structs (matching welfarebridge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Welfare listing API settings.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Destination database settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Generation model settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Batch ingestion behaviour.
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// `[catalog]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Listing endpoint URL.
    #[serde(default = "default_catalog_url")]
    pub base_url: String,

    /// Name of the env var holding the (decoded) data.go.kr service key.
    #[serde(default = "default_service_key_env")]
    pub service_key_env: String,

    #[serde(default = "default_page_no")]
    pub page_no: u32,

    #[serde(default = "default_num_of_rows")]
    pub num_of_rows: u32,

    /// Life-stage code list (`lifeArray`).
    #[serde(default = "default_life_array")]
    pub life_array: String,

    /// Search-key selector (`srchKeyCode`); `003` = service name + content.
    #[serde(default = "default_srch_key_code")]
    pub srch_key_code: String,

    /// Request timeout in seconds.
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_url(),
            service_key_env: default_service_key_env(),
            page_no: default_page_no(),
            num_of_rows: default_num_of_rows(),
            life_array: default_life_array(),
            srch_key_code: default_srch_key_code(),
            timeout_secs: default_catalog_timeout(),
        }
    }
}

fn default_catalog_url() -> String {
    DEFAULT_CATALOG_URL.into()
}
fn default_service_key_env() -> String {
    "DATA_SERVICE_KEY".into()
}
fn default_page_no() -> u32 {
    1
}
fn default_num_of_rows() -> u32 {
    15
}
fn default_life_array() -> String {
    "005".into()
}
fn default_srch_key_code() -> String {
    "003".into()
}
fn default_catalog_timeout() -> u64 {
    10
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file path; a leading `~` expands to the home directory.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_welfare_table")]
    pub welfare_table: String,

    #[serde(default = "default_income_request_table")]
    pub income_request_table: String,

    #[serde(default = "default_income_snapshot_table")]
    pub income_snapshot_table: String,

    /// Per-call timeout for each persistence round trip, in seconds.
    #[serde(default = "default_storage_timeout")]
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            welfare_table: default_welfare_table(),
            income_request_table: default_income_request_table(),
            income_snapshot_table: default_income_snapshot_table(),
            timeout_secs: default_storage_timeout(),
        }
    }
}

fn default_db_path() -> String {
    "~/.welfarebridge/welfarebridge.db".into()
}
fn default_welfare_table() -> String {
    "welfare_item".into()
}
fn default_income_request_table() -> String {
    "income_request".into()
}
fn default_income_snapshot_table() -> String {
    "income_snapshot".into()
}
fn default_storage_timeout() -> u64 {
    5
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_generation_url")]
    pub base_url: String,

    /// Name of the env var holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Optional file overriding the built-in system instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_path: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_url(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout(),
            system_prompt_path: None,
        }
    }
}

fn default_generation_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_generation_timeout() -> u64 {
    60
}

/// What a batch does when one card fails to persist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestPolicy {
    /// Stop at the first failing card; earlier inserts stay committed.
    #[default]
    #[serde(rename = "abort")]
    AbortOnFirstError,
    /// Record the failure and keep going; the run returns a partial report.
    #[serde(rename = "continue")]
    ContinueOnError,
}

/// `[ingest]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub policy: IngestPolicy,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.welfarebridge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| WelfareBridgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.welfarebridge/welfarebridge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content =
        std::fs::read_to_string(path).map_err(|e| WelfareBridgeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        WelfareBridgeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    url::Url::parse(&config.catalog.base_url).map_err(|e| {
        WelfareBridgeError::config(format!("invalid catalog.base_url: {e}"))
    })?;
    url::Url::parse(&config.generation.base_url).map_err(|e| {
        WelfareBridgeError::config(format!("invalid generation.base_url: {e}"))
    })?;

    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| WelfareBridgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| WelfareBridgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| WelfareBridgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` against the home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| WelfareBridgeError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

/// Read the listing API service key from the configured env var.
pub fn service_key(config: &AppConfig) -> Result<String> {
    read_secret(&config.catalog.service_key_env, "Listing API service key")
}

/// Read the generation API key from the configured env var.
pub fn generation_api_key(config: &AppConfig) -> Result<String> {
    read_secret(&config.generation.api_key_env, "Generation API key")
}

fn read_secret(var_name: &str, what: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(WelfareBridgeError::config(format!(
            "{what} not found. Set the {var_name} environment variable."
        ))),
    }
}
