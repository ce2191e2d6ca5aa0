//! Configuration models for preform.
//!
//! All runtime-tunable parameters live here and are resolved from a TOML file.
//! Credentials are resolved once at startup and carried by the client; core
//! formatting logic never reads the environment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for preform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Fine-tuning service API configuration
    pub api: ApiConfig,

    /// Source dataset locations
    pub dataset: DatasetConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Formatting policy
    #[serde(default)]
    pub format: FormatConfig,

    /// Training job settings
    pub training: TrainingConfig,
}

/// Fine-tuning service API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API key (can also be set via the env var named by `api_key_env`)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable name for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL for the fine-tuning service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries on failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout() -> u64 {
    180
}

fn default_max_retries() -> u32 {
    3
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Source dataset locations, one JSONL file per split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Path to the train split
    pub train: PathBuf,

    /// Path to the validation split
    pub validation: PathBuf,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for formatted JSONL files
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

/// Formatting policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatConfig {
    /// Reject records with an empty prompt. Off by default: empty strings pass
    /// through unchanged.
    #[serde(default)]
    pub strict: bool,
}

/// Training method for a fine-tuning job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingMethod {
    /// Supervised fine-tuning on the preferred responses
    Supervised,
    /// Direct preference optimization on the full pairs
    Dpo,
}

/// Training job settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Base model to fine-tune. Also accepts a previously fine-tuned model or
    /// checkpoint id, which is how jobs are chained.
    pub base_model: String,

    /// Training method
    #[serde(default = "default_method")]
    pub method: TrainingMethod,

    /// Preference-optimization conservativeness (DPO beta). Higher values keep
    /// the tuned model closer to the base model. Ignored for supervised jobs.
    #[serde(default = "default_beta")]
    pub beta: f64,

    /// Number of training epochs (service default when omitted)
    #[serde(default)]
    pub n_epochs: Option<u32>,

    /// Learning rate multiplier (service default when omitted)
    #[serde(default)]
    pub learning_rate_multiplier: Option<f64>,

    /// Suffix appended to the fine-tuned model name
    #[serde(default)]
    pub suffix: Option<String>,

    /// Seconds between job status polls when waiting
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_method() -> TrainingMethod {
    TrainingMethod::Dpo
}

fn default_beta() -> f64 {
    0.1
}

fn default_poll_interval() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Resolve the API key from config or environment.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        // Explicit key in config wins, with ${VAR} expansion
        if let Some(key) = &self.api.api_key {
            return Ok(expand_env_vars(key));
        }

        std::env::var(&self.api.api_key_env).map_err(|_| ConfigError::MissingApiKey {
            env_var: self.api.api_key_env.clone(),
        })
    }
}

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax. Unset variables are left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

    for cap in re.captures_iter(s) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
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

    #[error("Missing API key: set {env_var} env var or api_key in config")]
    MissingApiKey { env_var: String },
}
