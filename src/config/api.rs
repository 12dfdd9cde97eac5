//! Workflow service connection settings

use serde::{Deserialize, Serialize};

/// Connection settings for the remote workflow service
///
/// Unset fields fall back to built-in defaults only after all config layers
/// are merged, so a later layer can always restate a default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL of the service, e.g. `https://studio.example.com/api`
    pub base_url: Option<String>,

    /// Bearer token sent with every request
    pub api_key: Option<String>,

    /// Environment variable to read the bearer token from
    pub api_key_env: Option<String>,

    /// Request timeout in seconds
    pub timeout: Option<u64>,
}

const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

const DEFAULT_TIMEOUT: u64 = 600; // executions can take minutes

impl ApiConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn timeout(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Explicit key first, then the configured environment variable
    pub fn resolved_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
    }

    /// Whether no `[api]` setting was given anywhere
    pub(crate) fn is_default(&self) -> bool {
        self.base_url.is_none()
            && self.api_key.is_none()
            && self.api_key_env.is_none()
            && self.timeout.is_none()
    }

    /// Overlay `other`, whose set fields win
    pub(crate) fn merge(&mut self, other: Self) {
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.api_key_env.is_some() {
            self.api_key_env = other.api_key_env;
        }
        if other.timeout.is_some() {
            self.timeout = other.timeout;
        }
    }
}
