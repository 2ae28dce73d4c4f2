//! Core runtime configuration.
//!
//! # Responsibility
//! - Load database, logging, locale and URL settings from JSON.
//! - Reject configurations that would break locale handling at runtime.
//!
//! # Invariants
//! - Every section has defaults; an empty JSON object is a valid config.
//! - `locales.primary` is one of `locales.supported`.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::logging::{init_logging, LoggingError};
use crate::map::MapContext;
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config JSON: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// SQLite file path; `None` opens an in-memory database.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute log directory; logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocaleConfig {
    pub primary: String,
    pub supported: Vec<String>,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            primary: "en_US".to_string(),
            supported: vec!["en_US".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoreConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub locales: LocaleConfig,
    /// Installation base URL used to build `_href` and page URLs.
    pub base_url: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            locales: LocaleConfig::default(),
            base_url: "http://localhost".to_string(),
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(source: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&source)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.locales.supported.is_empty() {
            return Err(ConfigError::Invalid(
                "locales.supported cannot be empty".to_string(),
            ));
        }
        if !self.locales.supported.contains(&self.locales.primary) {
            return Err(ConfigError::Invalid(format!(
                "primary locale `{}` is not in locales.supported",
                self.locales.primary
            )));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("baseUrl cannot be empty".to_string()));
        }
        if let Some(dir) = &self.logging.dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "logging.dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    /// Opens the configured database file, or an in-memory one when no
    /// path is set. Migrations are applied either way.
    pub fn open_database(&self) -> DbResult<Connection> {
        match &self.database.path {
            Some(path) => open_db(path),
            None => open_db_in_memory(),
        }
    }

    /// Starts file logging when `logging.dir` is set.
    ///
    /// Returns `Ok(false)` when no directory is configured.
    pub fn start_logging(&self) -> Result<bool, LoggingError> {
        let Some(dir) = &self.logging.dir else {
            return Ok(false);
        };
        init_logging(&self.logging.level, dir)?;
        Ok(true)
    }

    /// Mapping context for requests served under `context_path`.
    pub fn map_context(&self, context_path: &str, now: NaiveDateTime) -> MapContext {
        MapContext {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            context_path: context_path.to_string(),
            supported_locales: self.locales.supported.clone(),
            now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};
    use chrono::NaiveDate;
    use std::io::Write;

    #[test]
    fn empty_object_uses_defaults() {
        let config = CoreConfig::from_json_str("{}").expect("defaults should validate");
        assert_eq!(config, CoreConfig::default());
        assert!(config.database.path.is_none());
    }

    #[test]
    fn partial_sections_are_merged_with_defaults() {
        let config = CoreConfig::from_json_str(
            r#"{
                "locales": { "primary": "fr_CA", "supported": ["en_US", "fr_CA"] },
                "baseUrl": "https://journals.example.org/"
            }"#,
        )
        .expect("config should parse");

        assert_eq!(config.locales.primary, "fr_CA");
        assert_eq!(config.logging.level, crate::logging::default_log_level());

        let now = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|date| date.and_hms_opt(3, 4, 5))
            .expect("valid datetime");
        let context = config.map_context("jpk", now);
        assert_eq!(context.base_url, "https://journals.example.org");
        assert_eq!(
            context.api_url("announcements/1"),
            "https://journals.example.org/jpk/api/v1/announcements/1"
        );
    }

    #[test]
    fn primary_locale_must_be_supported() {
        let error = CoreConfig::from_json_str(
            r#"{ "locales": { "primary": "de_DE", "supported": ["en_US"] } }"#,
        )
        .expect_err("unsupported primary locale must be rejected");
        assert!(matches!(error, ConfigError::Invalid(message) if message.contains("de_DE")));
    }

    #[test]
    fn relative_log_dir_is_rejected() {
        let error = CoreConfig::from_json_str(r#"{ "logging": { "dir": "logs" } }"#)
            .expect_err("relative log dir must be rejected");
        assert!(matches!(error, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let error = CoreConfig::from_json_str("{").expect_err("malformed JSON must fail");
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file should be created");
        write!(file, r#"{{ "database": {{ "path": "/tmp/scholar.sqlite3" }} }}"#)
            .expect("config should be written");

        let config = CoreConfig::from_path(file.path()).expect("config should load");
        assert_eq!(
            config.database.path.as_deref(),
            Some(std::path::Path::new("/tmp/scholar.sqlite3"))
        );
    }

    #[test]
    fn database_without_path_opens_in_memory() {
        let config = CoreConfig::default();
        let conn = config.open_database().expect("in-memory database should open");
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'announcements';",
                [],
                |row| row.get(0),
            )
            .expect("sqlite_master should be readable");
        assert_eq!(tables, 1);
        assert!(!config.start_logging().expect("no-op without dir"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let error = CoreConfig::from_path("/nonexistent/scholar-config.json")
            .expect_err("missing file must fail");
        assert!(matches!(error, ConfigError::Io { .. }));
    }
}
