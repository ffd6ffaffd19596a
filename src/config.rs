//! Runtime configuration

use crate::charset::Fallback;
use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

pub const DEFAULT_INBOX_CAPACITY: usize = 50;
pub const DEFAULT_CODE_TTL_SECS: u64 = 600;
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Upper bound for `code_ttl_secs` (one year)
pub const MAX_CODE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Settings shared by ingestion and the mailbox API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum entries kept in a recipient's recency index
    pub inbox_capacity: usize,

    /// Lifetime of the `code:{recipient}:latest` entry
    pub code_ttl_secs: u64,

    /// Page size when a list request gives no usable limit
    pub default_list_limit: usize,

    /// How to decode bytes that are not valid UTF-8
    pub fallback: Fallback,

    /// Shared secret checked against the `epin` parameter
    pub epin: Option<String>,

    /// Token checked against `X-Auth-Token` / `Authorization: Bearer`
    pub auth_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            code_ttl_secs: DEFAULT_CODE_TTL_SECS,
            default_list_limit: DEFAULT_LIST_LIMIT,
            fallback: Fallback::default(),
            epin: None,
            auth_token: None,
        }
    }
}

impl Config {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| IngestError::Config(e.to_string()))?;
        config.validate()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Apply `INBOX_OTP_*` environment overrides on top of `self`
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(epin) = lookup("INBOX_OTP_EPIN") {
            self.epin = non_empty(epin);
        }
        if let Some(token) = lookup("INBOX_OTP_AUTH_TOKEN") {
            self.auth_token = non_empty(token);
        }
        if let Some(capacity) = lookup("INBOX_OTP_INBOX_CAPACITY") {
            self.inbox_capacity = parse_var("INBOX_OTP_INBOX_CAPACITY", &capacity)?;
        }
        if let Some(ttl) = lookup("INBOX_OTP_CODE_TTL_SECS") {
            self.code_ttl_secs = parse_var("INBOX_OTP_CODE_TTL_SECS", &ttl)?;
        }
        self.validate()
    }

    fn validate(self) -> Result<Self> {
        if self.inbox_capacity == 0 {
            return Err(IngestError::Config("inbox_capacity must be at least 1".into()));
        }
        if self.code_ttl_secs > MAX_CODE_TTL_SECS {
            return Err(IngestError::Config(format!(
                "code_ttl_secs must be at most {MAX_CODE_TTL_SECS}"
            )));
        }
        if self.default_list_limit == 0 {
            return Err(IngestError::Config(
                "default_list_limit must be at least 1".into(),
            ));
        }
        Ok(self)
    }

    /// Whether any request authentication is configured
    #[must_use]
    pub const fn auth_enabled(&self) -> bool {
        self.epin.is_some() || self.auth_token.is_some()
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| IngestError::Config(format!("{name} is not a valid number: {value}")))
}
