//! Application configuration for FirmScope.
//!
//! User config lives at `~/.firmscope/firmscope.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FirmScopeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "firmscope.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".firmscope";

// ---------------------------------------------------------------------------
// Config structs (matching firmscope.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Crawler limits and HTTP behaviour.
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Batch processing settings.
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Extraction model settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Sector vocabulary source.
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,

    /// Result database.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Extra URL admission rules.
    #[serde(default)]
    pub crawl_policies: CrawlPoliciesConfig,
}

/// `[crawler]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum pages fetched per site.
    #[serde(default = "default_max_pages")]
    pub max_pages_per_domain: usize,

    /// Delay between consecutive fetches of one crawl.
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,

    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Character budget for the visible text of a single page.
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages_per_domain: default_max_pages(),
            request_delay_ms: default_request_delay(),
            request_timeout_secs: default_request_timeout(),
            max_content_length: default_max_content_length(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_max_pages() -> usize {
    10
}
fn default_request_delay() -> u64 {
    1000
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_content_length() -> usize {
    50_000
}
fn default_user_agent() -> String {
    concat!("FirmScope/", env!("CARGO_PKG_VERSION")).into()
}

/// `[processing]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Run batches with bounded parallelism instead of one URL at a time.
    #[serde(default = "default_true")]
    pub parallel_enabled: bool,

    /// Worker-pool size and number of extractor instances.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// URLs per parallel chunk.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between URLs in sequential mode.
    #[serde(default = "default_batch_delay")]
    pub batch_delay_ms: u64,

    /// Number of results kept in the in-memory history.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_enabled: true,
            max_parallel: default_max_parallel(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay(),
            history_capacity: default_history_capacity(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_max_parallel() -> usize {
    3
}
fn default_batch_size() -> usize {
    10
}
fn default_batch_delay() -> u64 {
    2000
}
fn default_history_capacity() -> usize {
    100
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the chat-completions API.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model (or Azure deployment) name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Azure OpenAI API version. When set, Azure routing and `api-key` auth are used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,

    /// Maximum number of tool-call round trips per extraction.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// Character budget for the combined website text sent to the model.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Optional file replacing the built-in extraction requirements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements_file: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_version: None,
            temperature: 0.0,
            max_tool_rounds: default_max_tool_rounds(),
            max_input_chars: default_max_input_chars(),
            requirements_file: None,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        let var_name = &self.api_key_env;
        match std::env::var(var_name) {
            Ok(val) if !val.trim().is_empty() => Ok(val),
            _ => Err(FirmScopeError::config(format!(
                "extraction API key not found. Set the {var_name} environment variable."
            ))),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_endpoint() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_max_tool_rounds() -> usize {
    4
}
fn default_max_input_chars() -> usize {
    100_000
}

/// `[taxonomy]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyConfig {
    /// `;`-delimited sector CSV.
    #[serde(default = "default_sectors_path")]
    pub sectors_path: String,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            sectors_path: default_sectors_path(),
        }
    }
}

fn default_sectors_path() -> String {
    "sectors.csv".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// libSQL database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "firmscope.db".into()
}

/// `[crawl_policies]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlPoliciesConfig {
    /// URL path glob patterns rejected in addition to the built-in denylist.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Page cap per crawl.
    pub max_pages: usize,
    /// Delay between consecutive fetch attempts, in ms.
    pub request_delay_ms: u64,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Per-page text budget in characters.
    pub max_content_length: usize,
    /// User-Agent header.
    pub user_agent: String,
    /// Extra exclude globs.
    pub exclude_patterns: Vec<String>,
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_pages: config.crawler.max_pages_per_domain,
            request_delay_ms: config.crawler.request_delay_ms,
            request_timeout_secs: config.crawler.request_timeout_secs,
            max_content_length: config.crawler.max_content_length,
            user_agent: config.crawler.user_agent.clone(),
            exclude_patterns: config.crawl_policies.exclude_patterns.clone(),
        }
    }
}

/// Runtime batch configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Default batch mode when the caller does not override it.
    pub parallel_enabled: bool,
    /// Worker-pool size.
    pub max_parallel: usize,
    /// URLs per parallel chunk.
    pub batch_size: usize,
    /// Sequential inter-item delay, in ms.
    pub batch_delay_ms: u64,
    /// In-memory history capacity.
    pub history_capacity: usize,
    /// Character budget for the extractor input.
    pub max_input_chars: usize,
}

impl From<&AppConfig> for BatchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            parallel_enabled: config.processing.parallel_enabled,
            max_parallel: config.processing.max_parallel.max(1),
            batch_size: config.processing.batch_size.max(1),
            batch_delay_ms: config.processing.batch_delay_ms,
            history_capacity: config.processing.history_capacity,
            max_input_chars: config.llm.max_input_chars,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.firmscope/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| FirmScopeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.firmscope/firmscope.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| FirmScopeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        FirmScopeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FirmScopeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FirmScopeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FirmScopeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the extraction API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    config.llm.api_key().map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_pages_per_domain"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("sectors.csv"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.crawler.max_pages_per_domain, 10);
        assert_eq!(parsed.processing.history_capacity, 100);
        assert_eq!(parsed.llm.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[crawler]
max_pages_per_domain = 4

[processing]
parallel_enabled = false

[crawl_policies]
exclude_patterns = ["/blog/**"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.crawler.max_pages_per_domain, 4);
        assert_eq!(config.crawler.request_timeout_secs, 30);
        assert!(!config.processing.parallel_enabled);
        assert_eq!(config.processing.max_parallel, 3);
        assert_eq!(config.crawl_policies.exclude_patterns, vec!["/blog/**"]);
    }

    #[test]
    fn crawl_config_from_app_config() {
        let app = AppConfig::default();
        let crawl = CrawlConfig::from(&app);
        assert_eq!(crawl.max_pages, 10);
        assert_eq!(crawl.request_delay_ms, 1000);
        assert_eq!(crawl.max_content_length, 50_000);
    }

    #[test]
    fn batch_config_clamps_zero_sizes() {
        let mut app = AppConfig::default();
        app.processing.max_parallel = 0;
        app.processing.batch_size = 0;
        let batch = BatchConfig::from(&app);
        assert_eq!(batch.max_parallel, 1);
        assert_eq!(batch.batch_size, 1);
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.llm.api_key_env = "FS_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
