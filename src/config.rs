//! # Configuration Module
//!
//! Server settings, loaded from an optional TOML file and then overridden by
//! environment variables.
//!
//! ## File
//!
//! ```toml
//! addr = "0.0.0.0:8080"
//! stack_size = 0x8000
//! connection_hint = "close"   # none | close | keep-alive
//! ```
//!
//! Every key is optional.
//!
//! ## Environment Variables
//!
//! ### `BRRTLITE_ADDR`
//!
//! Listen address. Default: `0.0.0.0:80`.
//!
//! ### `BRRTLITE_STACK_SIZE`
//!
//! Stack size of the serving coroutine. Accepts values in:
//! - Decimal: `16384` (16 KB)
//! - Hexadecimal: `0x4000` (16 KB)
//!
//! Default: `0x4000` (16 KB). Unparseable values fall back to the default.
//!
//! ### `BRRTLITE_CONNECTION_HINT`
//!
//! `none`, `close` or `keep-alive`; adds `Connection: close` or
//! `Keep-Alive: timeout=1, max=1` to buffered and streamed responses.
//! Unknown values are ignored.

use crate::server::ConnectionHint;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_ADDR: &str = "0.0.0.0:80";
pub const DEFAULT_STACK_SIZE: usize = 0x4000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub addr: String,
    pub stack_size: usize,
    pub connection_hint: ConnectionHint,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            stack_size: DEFAULT_STACK_SIZE,
            connection_hint: ConnectionHint::None,
        }
    }
}

/// Configuration loading error
#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The config file is not valid TOML or has unknown keys
    Parse { path: PathBuf, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read config file '{}': {}", path.display(), source)
            }
            ConfigError::Parse { path, message } => {
                write!(f, "invalid config file '{}': {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { .. } => None,
        }
    }
}

/// Parse a stack size given in decimal or `0x`-prefixed hex.
pub fn parse_stack_size(val: &str) -> Option<usize> {
    let val = val.trim();
    if let Some(hex) = val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}

impl ServerConfig {
    /// Defaults, then `path` if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(base.with_env())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Apply `BRRTLITE_*` overrides from the process environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_lookup(|key| env::var(key).ok())
    }

    /// Apply overrides from a custom variable source.
    #[must_use]
    pub fn with_lookup<F: Fn(&str) -> Option<String>>(mut self, lookup: F) -> Self {
        if let Some(addr) = lookup("BRRTLITE_ADDR") {
            self.addr = addr;
        }
        if let Some(raw) = lookup("BRRTLITE_STACK_SIZE") {
            match parse_stack_size(&raw) {
                Some(size) => self.stack_size = size,
                None => {
                    warn!(value = %raw, default = DEFAULT_STACK_SIZE, "invalid BRRTLITE_STACK_SIZE");
                    self.stack_size = DEFAULT_STACK_SIZE;
                }
            }
        }
        if let Some(raw) = lookup("BRRTLITE_CONNECTION_HINT") {
            match raw.parse() {
                Ok(hint) => self.connection_hint = hint,
                Err(e) => warn!(error = %e, "ignoring BRRTLITE_CONNECTION_HINT"),
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |k: &str| map.get(k).map(|v| v.to_string())
    }

    #[test]
    fn test_parse_stack_size() {
        assert_eq!(parse_stack_size("16384"), Some(16384));
        assert_eq!(parse_stack_size("0x4000"), Some(0x4000));
        assert_eq!(parse_stack_size("0X8000"), Some(0x8000));
        assert_eq!(parse_stack_size("lots"), None);
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default().with_lookup(|_| None);
        assert_eq!(config.addr, "0.0.0.0:80");
        assert_eq!(config.stack_size, 0x4000);
        assert_eq!(config.connection_hint, ConnectionHint::None);
    }

    #[test]
    fn test_env_overrides() {
        let config = ServerConfig::default().with_lookup(lookup(&[
            ("BRRTLITE_ADDR", "127.0.0.1:9000"),
            ("BRRTLITE_STACK_SIZE", "0x8000"),
            ("BRRTLITE_CONNECTION_HINT", "close"),
        ]));
        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.stack_size, 0x8000);
        assert_eq!(config.connection_hint, ConnectionHint::Close);
    }

    #[test]
    fn test_bad_env_values_fall_back() {
        let config = ServerConfig {
            stack_size: 0x10000,
            connection_hint: ConnectionHint::Close,
            ..Default::default()
        }
        .with_lookup(lookup(&[
            ("BRRTLITE_STACK_SIZE", "huge"),
            ("BRRTLITE_CONNECTION_HINT", "maybe"),
        ]));
        assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
        assert_eq!(config.connection_hint, ConnectionHint::Close);
    }

    #[test]
    fn test_from_toml() {
        let config = ServerConfig::from_toml(
            "addr = \"127.0.0.1:8081\"\nstack_size = 32768\nconnection_hint = \"keep-alive\"\n",
        )
        .unwrap();
        assert_eq!(config.addr, "127.0.0.1:8081");
        assert_eq!(config.stack_size, 32768);
        assert_eq!(config.connection_hint, ConnectionHint::KeepAliveOnce);
    }

    #[test]
    fn test_from_toml_partial_and_unknown_keys() {
        let config = ServerConfig::from_toml("addr = \"[::1]:80\"\n").unwrap();
        assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
        assert!(ServerConfig::from_toml("port = 80\n").is_err());
    }
}
