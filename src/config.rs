use std::path::PathBuf;
use thiserror::Error;

use crate::recorder::DEFAULT_PAGE_SIZE;

/// Entity id fragments whose readings are folded into per-minute averages
pub const DEFAULT_MINUTE_AVERAGE_TOKENS: &[&str] = &["_voltage", "_current", "_current_consumption"];

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("sqlite database path is required")]
    MissingSqlitePath,
    #[error("mysql dsn is required")]
    MissingDsn,
    #[error("entity is required")]
    MissingEntity,
    #[error("page size must be greater than zero")]
    ZeroPageSize,
}

/// Configuration for the energy export
#[derive(Debug, Clone)]
pub struct EnergySyncConfig {
    pub sqlite_path: PathBuf,
    pub dsn: String,
    /// Substring matched against recorder entity ids
    pub entity: String,
    pub page_size: usize,
    pub minute_average_tokens: Vec<String>,
}

impl Default for EnergySyncConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::new(),
            dsn: String::new(),
            entity: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            minute_average_tokens: DEFAULT_MINUTE_AVERAGE_TOKENS
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

impl EnergySyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sqlite_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingSqlitePath);
        }
        if self.dsn.trim().is_empty() {
            return Err(ConfigError::MissingDsn);
        }
        if self.entity.trim().is_empty() {
            return Err(ConfigError::MissingEntity);
        }
        if self.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        Ok(())
    }

    /// Whether readings of `entity_id` are averaged per minute
    pub fn needs_minute_average(&self, entity_id: &str) -> bool {
        let lowered = entity_id.to_lowercase();
        self.minute_average_tokens
            .iter()
            .any(|token| lowered.contains(token.as_str()))
    }
}

/// Configuration for the GPS export
#[derive(Debug, Clone)]
pub struct GpsSyncConfig {
    pub sqlite_path: PathBuf,
    pub dsn: String,
    pub page_size: usize,
}

impl Default for GpsSyncConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::new(),
            dsn: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl GpsSyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sqlite_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingSqlitePath);
        }
        if self.dsn.trim().is_empty() {
            return Err(ConfigError::MissingDsn);
        }
        if self.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        Ok(())
    }
}
