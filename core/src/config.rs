//! API base URL resolution.
//!
//! A compiled-in default, optionally replaced once at startup by a runtime
//! override (`env.toml`, a command-line flag, ...). The resolved `Config` is
//! immutable.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "https://tripshare-9pif.onrender.com";

/// Runtime-injected override object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuntimeEnv {
    #[serde(default, rename = "API_URL", alias = "api_url")]
    pub api_url: Option<String>,
}

impl RuntimeEnv {
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: Some(api_url.into()),
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

/// Default base URL unless the override carries a non-empty one. The URL's
/// shape is not checked.
pub fn resolve_base_url(overrides: Option<&RuntimeEnv>) -> String {
    match overrides.and_then(|env| env.api_url.as_deref()) {
        Some(url) if !url.is_empty() => {
            debug!(api_url = url, "using runtime API URL override");
            url.to_string()
        }
        _ => DEFAULT_API_BASE_URL.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    api_base_url: String,
}

impl Config {
    pub fn resolve(overrides: Option<&RuntimeEnv>) -> Self {
        Self {
            api_base_url: resolve_base_url(overrides),
        }
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::resolve(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_without_override() {
        assert_eq!(Config::resolve(None).api_base_url(), DEFAULT_API_BASE_URL);
        assert_eq!(Config::default(), Config::resolve(Some(&RuntimeEnv::default())));
    }

    #[test]
    fn override_wins() {
        let env = RuntimeEnv::with_api_url("http://localhost:8000");
        assert_eq!(Config::resolve(Some(&env)).api_base_url(), "http://localhost:8000");
    }

    #[test]
    fn empty_override_is_ignored() {
        let env = RuntimeEnv::with_api_url("");
        assert_eq!(resolve_base_url(Some(&env)), DEFAULT_API_BASE_URL);
    }

    #[test]
    fn malformed_url_is_not_validated() {
        let env = RuntimeEnv::with_api_url("not a url");
        assert_eq!(resolve_base_url(Some(&env)), "not a url");
    }

    #[test]
    fn parses_toml_override() {
        let env = RuntimeEnv::from_toml_str(r#"API_URL = "https://staging.example""#).unwrap();
        assert_eq!(env.api_url.as_deref(), Some("https://staging.example"));
        let env = RuntimeEnv::from_toml_str(r#"api_url = "http://x""#).unwrap();
        assert_eq!(env.api_url.as_deref(), Some("http://x"));
        let env = RuntimeEnv::from_toml_str("").unwrap();
        assert!(env.api_url.is_none());
    }

    #[test]
    fn rejects_bad_toml() {
        assert!(matches!(
            RuntimeEnv::from_toml_str("API_URL = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = RuntimeEnv::load(Path::new("/nonexistent/tripshare/env.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
