//! Store configuration.
//!
//! # Responsibility
//! - Hold tunables shared by connection bootstrap and record listing.
//! - Parse settings from JSON documents supplied by the host application.
//!
//! # Invariants
//! - `default_page_limit` and `max_page_limit` are both >= 1.
//! - `default_page_limit <= max_page_limit`.

use crate::record::{RecordError, RecordResult};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const DEFAULT_PAGE_LIMIT: u32 = 10;
const MAX_PAGE_LIMIT: u32 = 100;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Errors raised while loading or validating [`StoreConfig`].
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid store config document: {err}"),
            Self::Invalid(message) => write!(f, "invalid store config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
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

/// Tunables for connection bootstrap and paginated reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Page size used when a list request does not specify one.
    pub default_page_limit: u32,
    /// Upper bound applied to caller-supplied page sizes.
    pub max_page_limit: u32,
    /// SQLite busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_page_limit: DEFAULT_PAGE_LIMIT,
            max_page_limit: MAX_PAGE_LIMIT,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    /// Parses and validates a JSON settings document.
    ///
    /// Missing keys fall back to defaults; unknown keys are rejected.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks limit invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_limit == 0 {
            return Err(ConfigError::Invalid(
                "default_page_limit must be at least 1".to_string(),
            ));
        }
        if self.max_page_limit == 0 {
            return Err(ConfigError::Invalid(
                "max_page_limit must be at least 1".to_string(),
            ));
        }
        if self.default_page_limit > self.max_page_limit {
            return Err(ConfigError::Invalid(format!(
                "default_page_limit {} exceeds max_page_limit {}",
                self.default_page_limit, self.max_page_limit
            )));
        }
        Ok(())
    }

    /// Resolves the page size for a list request.
    ///
    /// `None` uses the default. Zero and values above the maximum are
    /// rejected, so the offset always follows the caller's own limit.
    pub fn resolve_limit(&self, page: u32, limit: Option<u32>) -> RecordResult<u32> {
        match limit {
            None => Ok(self.default_page_limit),
            Some(value) if value == 0 || value > self.max_page_limit => {
                Err(RecordError::InvalidPagination { page, limit: value })
            }
            Some(value) => Ok(value),
        }
    }
}
