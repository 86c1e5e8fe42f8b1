//! Logging System
//!
//! Structured logging using the `tracing` crate. Provides configurable log
//! levels, output formats, and destinations.

use crate::error::ApiError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Resolve the log file path with precedence: CLI, MOLDSTORE_LOG_FILE env, config file, default.
pub fn resolve_log_file_path(
    cli_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
) -> Result<PathBuf, ApiError> {
    if let Some(p) = cli_file {
        if !p.as_os_str().is_empty() {
            return Ok(p);
        }
    }
    if let Ok(env_path) = std::env::var("MOLDSTORE_LOG_FILE") {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    if let Some(p) = config_file {
        if !p.as_os_str().is_empty() {
            return Ok(p);
        }
    }
    default_log_file_path()
}

fn default_log_file_path() -> Result<PathBuf, ApiError> {
    let project_dirs = directories::ProjectDirs::from("", "moldstore", "moldstore")
        .ok_or_else(|| {
            ApiError::ConfigError(
                "Could not determine platform state directory for log file".to_string(),
            )
        })?;
    // state_dir is Linux-only; fall back to the data dir elsewhere
    let dir = project_dirs
        .state_dir()
        .unwrap_or_else(|| project_dirs.data_local_dir())
        .to_path_buf();
    Ok(dir.join("moldstore.log"))
}

/// Line format of emitted events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Where events are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
    #[serde(rename = "file+stderr")]
    #[value(name = "file+stderr")]
    FileStderr,
    /// stdout and stderr
    Both,
}

impl LogOutput {
    fn writes_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::FileStderr)
    }
}

/// Parse a `MOLDSTORE_LOG_*` override, naming the accepted values on failure
fn env_override<T: ValueEnum>(var: &str) -> Result<Option<T>, ApiError> {
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => T::from_str(raw.trim(), true)
            .map(Some)
            .map_err(|e| ApiError::ConfigError(format!("Invalid {}: {}", var, e))),
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Filter directive, e.g. `info` or `moldstore::writer=debug,info`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_format")]
    pub format: LogFormat,

    #[serde(default = "default_output")]
    pub output: LogOutput,

    /// Used when `output` includes a file; unset means the platform state dir
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> LogFormat {
    LogFormat::Text
}

fn default_output() -> LogOutput {
    LogOutput::Stderr
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
        }
    }
}

/// Initialize the logging system
///
/// Priority order (highest to lowest):
/// 1. Environment variables (MOLDSTORE_LOG, MOLDSTORE_LOG_FORMAT, etc.)
/// 2. Configuration file / CLI overrides folded into `config`
/// 3. Defaults
///
/// Calling this twice is harmless; the second subscriber is not installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), ApiError> {
    let disabled = config.map(|c| !c.enabled).unwrap_or(false);
    if disabled {
        let _ = Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .try_init();
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    let format = match env_override("MOLDSTORE_LOG_FORMAT")? {
        Some(format) => format,
        None => config.map(|c| c.format).unwrap_or_else(default_format),
    };
    let output = match env_override("MOLDSTORE_LOG_OUTPUT")? {
        Some(output) => output,
        None => config.map(|c| c.output).unwrap_or_else(default_output),
    };

    let writer = match output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::Both => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
        LogOutput::File | LogOutput::FileStderr => {
            let path = resolve_log_file_path(None, config.and_then(|c| c.file.clone()))?;
            let file = Arc::new(open_log_file(&path)?);
            if output == LogOutput::FileStderr {
                BoxMakeWriter::new(file.and(std::io::stderr))
            } else {
                BoxMakeWriter::new(file)
            }
        }
    };

    let base_subscriber = Registry::default().with(filter);
    let installed = if format == LogFormat::Json {
        base_subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init()
    } else {
        base_subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(!output.writes_file())
                    .with_writer(writer),
            )
            .try_init()
    };

    if installed.is_err() {
        tracing::debug!("Logging already initialized; keeping existing subscriber");
    }
    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File, ApiError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ApiError::ConfigError(format!("Failed to create log directory: {}", e))
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ApiError::ConfigError(format!("Failed to open log file {:?}: {}", path, e)))
}

fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, ApiError> {
    if let Ok(filter) = EnvFilter::try_from_env("MOLDSTORE_LOG") {
        return Ok(filter);
    }
    let level = config.map(|c| c.level.as_str()).unwrap_or("info");
    EnvFilter::try_new(level)
        .map_err(|e| ApiError::ConfigError(format!("Invalid log level {:?}: {}", level, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging_config() {
        let config = LoggingConfig::default();
        assert!(config.enabled);
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Text);
        assert_eq!(config.output, LogOutput::Stderr);
        assert_eq!(config.file, None);
    }

    #[test]
    fn output_names_match_config_spelling() {
        let config: LoggingConfig =
            serde_json::from_str(r#"{"format":"json","output":"file+stderr"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::FileStderr);
        assert!(config.output.writes_file());
        assert!(!LogOutput::Both.writes_file());

        assert_eq!(
            LogOutput::from_str("file+stderr", true).unwrap(),
            LogOutput::FileStderr
        );
        assert!(LogOutput::from_str("syslog", true).is_err());
    }

    #[test]
    fn unknown_format_fails_to_deserialize() {
        assert!(serde_json::from_str::<LoggingConfig>(r#"{"format":"xml"}"#).is_err());
    }

    #[test]
    fn level_accepts_per_module_directives() {
        let config = LoggingConfig {
            level: "moldstore::writer=debug,info".to_string(),
            ..LoggingConfig::default()
        };
        assert!(build_env_filter(Some(&config)).is_ok());
    }

    #[test]
    fn test_resolve_log_file_path_cli_wins() {
        let cli = Some(PathBuf::from("/tmp/cli.log"));
        let config = Some(PathBuf::from("/tmp/config.log"));
        let path = resolve_log_file_path(cli, config).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/cli.log"));
    }

    #[test]
    fn test_resolve_log_file_path_default_fallback() {
        if std::env::var("MOLDSTORE_LOG_FILE").is_ok() {
            return;
        }
        let path = resolve_log_file_path(None, None).unwrap();
        assert!(path.ends_with("moldstore.log"));
    }
}
