//! Configuration
//!
//! Layered configuration: serde defaults, then an optional TOML file, then
//! `MOLDSTORE__*` environment variables (highest precedence).

pub mod facade;
pub mod merge;
pub mod sources;

pub use facade::ConfigLoader;

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::writer::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoldstoreConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MoldstoreConfig {
    /// Reject configurations that cannot produce a working store
    pub fn validate(&self) -> Result<(), ApiError> {
        match self.store.backend {
            StoreBackend::Github => {
                let gh = &self.store.github;
                if gh.owner.trim().is_empty() || gh.repo.trim().is_empty() {
                    return Err(ApiError::ConfigError(
                        "store.github.owner and store.github.repo are required for the github backend"
                            .to_string(),
                    ));
                }
                if gh.resolved_token().is_none() {
                    return Err(ApiError::ConfigError(
                        "GitHub token required (set store.github.token or GITHUB_TOKEN)"
                            .to_string(),
                    ));
                }
            }
            StoreBackend::Local => {
                if self.store.local.root.is_none() {
                    return Err(ApiError::ConfigError(
                        "store.local.root is required for the local backend".to_string(),
                    ));
                }
            }
            StoreBackend::Memory => {}
        }

        if self.server.port == 0 {
            return Err(ApiError::ConfigError("server.port cannot be 0".to_string()));
        }
        Ok(())
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_body_limit() -> usize {
    1024 * 1024
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    #[serde(default = "default_cors_origins")]
    pub cors_allowed_origins: Vec<String>,

    /// Maximum accepted request body size
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_allowed_origins: default_cors_origins(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// Which file store backend to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Github,
    Local,
    #[default]
    Memory,
}

/// File store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub local: LocalStoreConfig,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_path_prefix() -> String {
    "Data/".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_user_agent() -> String {
    format!("moldstore/{}", env!("CARGO_PKG_VERSION"))
}

/// GitHub repository holding the table files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub repo: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// API token; falls back to `GITHUB_TOKEN` when unset
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Directory inside the repository, e.g. `Data/`
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl GitHubConfig {
    pub fn resolved_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            branch: default_branch(),
            token: None,
            api_base: default_api_base(),
            path_prefix: default_path_prefix(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Directory-backed store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalStoreConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    3000
}

fn default_jitter_ms() -> u64 {
    100
}

fn default_op_timeout_ms() -> u64 {
    15_000
}

/// Retry settings for the read-modify-write cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Timeout for each individual store read or write
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter_ms: default_jitter_ms(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.clamp(1, 10),
            base_backoff: Duration::from_millis(self.base_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms.max(self.base_backoff_ms)),
            jitter: Duration::from_millis(self.jitter_ms),
            op_timeout: Duration::from_millis(self.op_timeout_ms.max(1)),
        }
    }
}
