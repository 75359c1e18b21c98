//! Configuration models for flipscan.
//!
//! Every tunable of a run lives here. The struct is built once at startup
//! (TOML file, then environment, then CLI overrides) and handed to each
//! component by reference.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `api.base_url`.
pub const BASE_URL_ENV: &str = "IDENA_API_URL";

/// Largest page size the Idena API accepts for `limit=`.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Top-level configuration for flipscan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API access
    #[serde(default)]
    pub api: ApiConfig,

    /// Pagination and pacing
    #[serde(default)]
    pub scan: ScanConfig,

    /// Report output
    #[serde(default)]
    pub output: OutputConfig,
}

/// Idena API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL, may contain `${VAR}` placeholders
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Total attempts per request (1 = no retry)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Linear backoff unit; attempt `n` waits `n * backoff_unit_ms`
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
}

fn default_base_url() -> String {
    "https://api.idena.io/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    6
}

fn default_backoff_unit_ms() -> u64 {
    1500
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            backoff_unit_ms: default_backoff_unit_ms(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

/// Pagination and pacing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// `limit=` sent with every paginated request
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Pause between list pages
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Pause between per-flip detail requests
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_page_delay_ms() -> u64 {
    100
}

fn default_item_delay_ms() -> u64 {
    50
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            page_delay_ms: default_page_delay_ms(),
            item_delay_ms: default_item_delay_ms(),
        }
    }
}

impl ScanConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving CSV/JSONL/JSON reports
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Explorer used for `scan_url` columns
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./out")
}

fn default_explorer_url() -> String {
    "https://scan.idena.io".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            explorer_url: default_explorer_url(),
        }
    }
}

impl OutputConfig {
    /// Explorer link for a flip.
    pub fn flip_url(&self, cid: &str) -> String {
        format!("{}/flip/{cid}", self.explorer_url.trim_end_matches('/'))
    }

    /// Explorer link for an identity.
    pub fn address_url(&self, address: &str) -> String {
        format!("{}/address/{address}", self.explorer_url.trim_end_matches('/'))
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Load from `path` if given, otherwise start from defaults.
    ///
    /// `IDENA_API_URL` wins over the file; `${VAR}` placeholders in the base
    /// URL are expanded afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };

        if let Some(url) = std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|u| !u.trim().is_empty())
        {
            config.api.base_url = url;
        }
        config.api.base_url = expand_env_vars(&config.api.base_url);

        Ok(config)
    }

    /// Check value bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url must not be empty".into()));
        }
        if reqwest::Url::parse(&self.api.base_url).is_err() {
            return Err(ConfigError::Invalid(format!(
                "api.base_url is not a valid URL: {}",
                self.api.base_url
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be > 0".into()));
        }
        if self.api.max_retries == 0 {
            return Err(ConfigError::Invalid("api.max_retries must be >= 1".into()));
        }
        if self.scan.page_size == 0 || self.scan.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "scan.page_size must be within 1..={MAX_PAGE_SIZE}, got {}",
                self.scan.page_size
            )));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let Ok(re) = regex::Regex::new(r"\$\{([^}]+)\}") else {
        return s.to_string();
    };

    let mut result = s.to_string();
    for cap in re.captures_iter(s) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }
    result
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
