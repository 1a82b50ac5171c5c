//! Runtime settings for the core crate.
//!
//! Every field has a default, so a partial document (or none) is valid
//! input. Hosts deserialize with their own format crate and call
//! [`CoreConfig::validate`] before use.

use crate::logging::{default_log_level, normalize_level, LoggingError};
use crate::repo::RepoResult;
use crate::uow::UnitOfWork;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite file; `None` means a private in-memory database.
    pub database_path: Option<PathBuf>,
    pub log_level: String,
    /// Absolute log directory; `None` leaves logging to the host.
    pub log_dir: Option<PathBuf>,
    pub storage: StorageConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
            storage: StorageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    /// Prefix of the references handed back by the store.
    pub public_prefix: String,
    pub max_image_bytes: u64,
    /// Lowercase extensions without the dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            public_prefix: "/uploads".to_string(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            allowed_extensions: ["jpg", "jpeg", "png", "gif"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    LogLevel(LoggingError),
    RelativeLogDir(PathBuf),
    /// A required setting is empty or zero.
    Invalid { field: &'static str, reason: &'static str },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LogLevel(err) => write!(f, "log_level: {err}"),
            Self::RelativeLogDir(dir) => {
                write!(f, "log_dir must be absolute, got `{}`", dir.display())
            }
            Self::Invalid { field, reason } => write!(f, "{field}: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::LogLevel(err) => Some(err),
            _ => None,
        }
    }
}

impl CoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.log_level).map_err(ConfigError::LogLevel)?;
        if let Some(dir) = self.log_dir.as_ref().filter(|dir| !dir.is_absolute()) {
            return Err(ConfigError::RelativeLogDir(dir.clone()));
        }
        self.storage.validate()
    }

    /// Opens a unit of work on the configured database.
    pub fn open_unit_of_work(&self) -> RepoResult<UnitOfWork> {
        match &self.database_path {
            Some(path) => UnitOfWork::open(path),
            None => UnitOfWork::open_in_memory(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "storage.upload_dir",
                reason: "must not be empty",
            });
        }
        if !self.public_prefix.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "storage.public_prefix",
                reason: "must start with `/`",
            });
        }
        if self.max_image_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "storage.max_image_bytes",
                reason: "must be positive",
            });
        }
        if self.allowed_extensions.iter().all(|ext| ext.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "storage.allowed_extensions",
                reason: "must list at least one extension",
            });
        }
        Ok(())
    }
}
