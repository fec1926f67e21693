//! Session configuration (environment-driven).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const API_URL_VAR: &str = "BACKOFFICE_API_URL";
pub const STORE_PATH_VAR: &str = "BACKOFFICE_STORE_PATH";
pub const ENTRY_ROUTE_VAR: &str = "BACKOFFICE_ENTRY_ROUTE";
pub const REQUEST_TIMEOUT_VAR: &str = "BACKOFFICE_REQUEST_TIMEOUT_SECS";

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_ENTRY_ROUTE: &str = "/login";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")]
    NoDataDir,

    #[error("{var} must be a whole number of seconds, got {value:?}")]
    InvalidTimeout { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Base URL of the back-office API.
    pub api_url: String,

    /// Location of the credential store document.
    pub store_path: PathBuf,

    /// Where unauthenticated navigation is redirected.
    pub entry_route: String,

    /// Per-request timeout for the HTTP transport; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl SessionConfig {
    pub fn new(api_url: impl Into<String>, store_path: impl Into<PathBuf>) -> Self {
        Self {
            api_url: api_url.into(),
            store_path: store_path.into(),
            entry_route: DEFAULT_ENTRY_ROUTE.to_string(),
            request_timeout: None,
        }
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup` (an environment stand-in).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup(API_URL_VAR).unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let store_path = match lookup(STORE_PATH_VAR) {
            Some(path) => PathBuf::from(path),
            None => default_store_path()?,
        };

        let entry_route =
            lookup(ENTRY_ROUTE_VAR).unwrap_or_else(|| DEFAULT_ENTRY_ROUTE.to_string());

        let request_timeout = match lookup(REQUEST_TIMEOUT_VAR) {
            Some(value) => {
                let secs = value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidTimeout {
                    var: REQUEST_TIMEOUT_VAR,
                    value: value.clone(),
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            api_url,
            store_path,
            entry_route,
            request_timeout,
        })
    }
}

/// `{app_data_dir}/backoffice/credentials.json`
fn default_store_path() -> Result<PathBuf, ConfigError> {
    let mut dir = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .ok_or(ConfigError::NoDataDir)?;

    dir.push("backoffice");
    dir.push("credentials.json");

    Ok(dir)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn explicit_values_are_used() {
        let config = SessionConfig::from_lookup(lookup_from(&[
            (API_URL_VAR, "https://erp.example.com"),
            (STORE_PATH_VAR, "/tmp/creds.json"),
            (ENTRY_ROUTE_VAR, "/sign-in"),
            (REQUEST_TIMEOUT_VAR, "30"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://erp.example.com");
        assert_eq!(config.store_path, PathBuf::from("/tmp/creds.json"));
        assert_eq!(config.entry_route, "/sign-in");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = SessionConfig::from_lookup(lookup_from(&[(STORE_PATH_VAR, "creds.json")]))
            .unwrap();

        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.entry_route, DEFAULT_ENTRY_ROUTE);
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let err = SessionConfig::from_lookup(lookup_from(&[
            (STORE_PATH_VAR, "creds.json"),
            (REQUEST_TIMEOUT_VAR, "soon"),
        ]))
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::InvalidTimeout {
                var: REQUEST_TIMEOUT_VAR,
                value: "soon".to_string()
            }
        );
    }
}
