//! Configuration management for taskbreaker.
//!
//! Configuration can be set via environment variables:
//! - `YANDEX_API_KEY` - Required. API key for the completion endpoint.
//! - `FOLDER_ID` - Required. Cloud folder the model is billed to.
//! - `DATABASE_URL` - Optional. `sqlite://<path>`, a bare path, or `memory`. Defaults to `sqlite://tasks.db`.
//! - `COMPLETION_URL` - Optional. Completion endpoint. Defaults to the YandexGPT foundation models API.
//! - `COMPLETION_MODEL` - Optional. Model path inside the folder. Defaults to `yandexgpt-lite/latest`.
//! - `COMPLETION_TIMEOUT_SECS` - Optional. Per-call timeout. Defaults to `15`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8000`.
//! - `EXTRACT_PARSE_STRATEGY` / `DECOMPOSE_PARSE_STRATEGY` - Optional. `fixed[:n]` or `brace`.
//! - `EXTRACT_FAILURE_POLICY` / `DECOMPOSE_FAILURE_POLICY` - Optional. `fail_closed` or `fail_open`.
//! - `CONFIG_SOURCE` - Optional. `local` or `container`; detected from `/.dockerenv` when unset.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::task::{FailurePolicy, ParseStrategy};

pub const DEFAULT_COMPLETION_URL: &str =
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";
pub const DEFAULT_COMPLETION_MODEL: &str = "yandexgpt-lite/latest";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Where configuration values come from.
///
/// Resolved once at startup, before any component is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Running inside a container: the process environment is authoritative.
    Container,
    /// Local development: a `.env` file may override/extend the environment.
    Local,
}

impl ConfigSource {
    /// Honour `CONFIG_SOURCE` if set, otherwise look for `/.dockerenv`.
    pub fn detect() -> Self {
        match std::env::var("CONFIG_SOURCE").ok().as_deref() {
            Some("container") => ConfigSource::Container,
            Some("local") => ConfigSource::Local,
            _ => Self::detect_from_marker(Path::new("/.dockerenv")),
        }
    }

    fn detect_from_marker(marker: &Path) -> Self {
        if marker.exists() {
            ConfigSource::Container
        } else {
            ConfigSource::Local
        }
    }

    /// Apply the source: for `Local`, load `.env` from the working directory.
    pub fn apply(self) {
        if self == ConfigSource::Local {
            match dotenvy::dotenv() {
                Ok(path) => tracing::info!("Loaded environment overrides from {}", path.display()),
                Err(e) if e.not_found() => tracing::debug!("No .env file found"),
                Err(e) => tracing::warn!("Failed to load .env file: {}", e),
            }
        }
    }
}

/// Which backend holds the task table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Sqlite(PathBuf),
    Memory,
}

impl FromStr for DatabaseTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::InvalidValue(
                "DATABASE_URL".to_string(),
                "empty".to_string(),
            ));
        }
        if s == "memory" || s == "sqlite::memory:" {
            return Ok(DatabaseTarget::Memory);
        }
        let path = s
            .strip_prefix("sqlite://")
            .or_else(|| s.strip_prefix("sqlite:"))
            .unwrap_or(s);
        if path.contains("://") {
            return Err(ConfigError::InvalidValue(
                "DATABASE_URL".to_string(),
                format!("unsupported scheme in {}", s),
            ));
        }
        Ok(DatabaseTarget::Sqlite(PathBuf::from(path)))
    }
}

/// Settings for the completion endpoint.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// API key sent as `Authorization: Api-Key <key>`
    pub api_key: String,

    /// Folder (tenant) identifier, sent as `x-folder-id` and used in the model URI
    pub folder_id: String,

    /// Endpoint URL
    pub url: String,

    /// Model path within the folder, e.g. `yandexgpt-lite/latest`
    pub model: String,

    /// Per-call timeout
    pub timeout: Duration,
}

impl CompletionConfig {
    /// Full model URI as the API expects it.
    pub fn model_uri(&self) -> String {
        format!("gpt://{}/{}", self.folder_id, self.model)
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub completion: CompletionConfig,

    pub database: DatabaseTarget,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    pub extract_parse: ParseStrategy,
    pub extract_policy: FailurePolicy,
    pub decompose_parse: ParseStrategy,
    pub decompose_policy: FailurePolicy,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `YANDEX_API_KEY` or `FOLDER_ID` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = required("YANDEX_API_KEY")?;
        let folder_id = required("FOLDER_ID")?;

        let url = std::env::var("COMPLETION_URL")
            .unwrap_or_else(|_| DEFAULT_COMPLETION_URL.to_string());

        let model = std::env::var("COMPLETION_MODEL")
            .unwrap_or_else(|_| DEFAULT_COMPLETION_MODEL.to_string());

        let timeout_secs: u64 = parsed("COMPLETION_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;

        let database: DatabaseTarget = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://tasks.db".to_string())
            .parse()?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parsed("PORT", 8000u16)?;

        Ok(Self {
            completion: CompletionConfig {
                api_key,
                folder_id,
                url,
                model,
                timeout: Duration::from_secs(timeout_secs),
            },
            database,
            host,
            port,
            extract_parse: parsed("EXTRACT_PARSE_STRATEGY", ParseStrategy::FixedWrapper(4))?,
            extract_policy: parsed("EXTRACT_FAILURE_POLICY", FailurePolicy::FailClosed)?,
            decompose_parse: parsed("DECOMPOSE_PARSE_STRATEGY", ParseStrategy::BraceScan)?,
            decompose_policy: parsed("DECOMPOSE_FAILURE_POLICY", FailurePolicy::FailOpen)?,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, folder_id: String, database: DatabaseTarget) -> Self {
        Self {
            completion: CompletionConfig {
                api_key,
                folder_id,
                url: DEFAULT_COMPLETION_URL.to_string(),
                model: DEFAULT_COMPLETION_MODEL.to_string(),
                timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            },
            database,
            host: "127.0.0.1".to_string(),
            port: 8000,
            extract_parse: ParseStrategy::FixedWrapper(4),
            extract_policy: FailurePolicy::FailClosed,
            decompose_parse: ParseStrategy::BraceScan,
            decompose_policy: FailurePolicy::FailOpen,
        }
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}

fn parsed<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_target_accepts_sqlite_urls_and_paths() {
        assert_eq!(
            "sqlite://data/tasks.db".parse::<DatabaseTarget>().unwrap(),
            DatabaseTarget::Sqlite(PathBuf::from("data/tasks.db"))
        );
        assert_eq!(
            "sqlite:tasks.db".parse::<DatabaseTarget>().unwrap(),
            DatabaseTarget::Sqlite(PathBuf::from("tasks.db"))
        );
        assert_eq!(
            "/var/lib/tasks.db".parse::<DatabaseTarget>().unwrap(),
            DatabaseTarget::Sqlite(PathBuf::from("/var/lib/tasks.db"))
        );
        assert_eq!(
            "memory".parse::<DatabaseTarget>().unwrap(),
            DatabaseTarget::Memory
        );
    }

    #[test]
    fn database_target_rejects_other_schemes() {
        assert!("postgresql://user@host/db".parse::<DatabaseTarget>().is_err());
        assert!("   ".parse::<DatabaseTarget>().is_err());
    }

    #[test]
    fn source_detection_follows_marker_file() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join(".dockerenv");
        assert_eq!(ConfigSource::detect_from_marker(&marker), ConfigSource::Local);

        std::fs::write(&marker, "").unwrap();
        assert_eq!(
            ConfigSource::detect_from_marker(&marker),
            ConfigSource::Container
        );
    }

    #[test]
    fn model_uri_includes_folder() {
        let config = Config::new("key".into(), "b1gfolder".into(), DatabaseTarget::Memory);
        assert_eq!(
            config.completion.model_uri(),
            "gpt://b1gfolder/yandexgpt-lite/latest"
        );
    }

    #[test]
    fn defaults_keep_extraction_strict_and_decomposition_lenient() {
        let config = Config::new("key".into(), "folder".into(), DatabaseTarget::Memory);
        assert_eq!(config.extract_policy, FailurePolicy::FailClosed);
        assert_eq!(config.decompose_policy, FailurePolicy::FailOpen);
        assert_eq!(config.extract_parse, ParseStrategy::FixedWrapper(4));
        assert_eq!(config.decompose_parse, ParseStrategy::BraceScan);
    }
}
