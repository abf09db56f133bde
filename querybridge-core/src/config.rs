use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Default bind address for the HTTP server
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Default application database
pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/querybridge";

/// Default pool size for the application database
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Layered configuration loaded from ~/.querybridge/config.toml
///
/// Every section is optional; a missing file yields the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerybridgeConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub query: QuerySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySection {
    /// Allow callers to run arbitrary SQL against the connected database.
    ///
    /// Statements are executed verbatim; turning this off makes the query
    /// and preview endpoints answer 403.
    pub allow_raw_sql: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.parse().expect("valid default bind address"),
        }
    }
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Default for QuerySection {
    fn default() -> Self {
        Self { allow_raw_sql: true }
    }
}

impl QuerybridgeConfig {
    /// Load config from ~/.querybridge/config.toml, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content).map_err(|reason| CoreError::invalid_config(path, reason))
    }

    /// Parse TOML text and expand `${VAR}` references in the database URL
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let mut config: Self = toml::from_str(content).map_err(|e| e.to_string())?;
        config.database.url = expand_env(&config.database.url);
        Ok(config)
    }

    /// Get config file path: ~/.querybridge/config.toml
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".querybridge/config.toml")
    }

    /// Render as TOML (for `config show` / `config init`)
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Expand `${VAR}` references from the process environment.
///
/// Unset variables expand to the empty string.
fn expand_env(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                result.push_str(&env::var(name).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}
