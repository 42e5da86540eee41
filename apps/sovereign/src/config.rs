//! # Configuration
//!
//! Server settings, read from an optional TOML file and then overridden by
//! environment variables.
//!
//! ## File layout
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! route_prefix = "/make-server"
//! request_timeout_secs = 10
//! body_limit_bytes = 65536
//!
//! [security]
//! cors_origins = ["*"]
//! rate_limit = 100
//! api_key = "public-anon-key"
//!
//! [counter]
//! genesis = "2025-12-01T00:00:00Z"
//! base_count = 1420
//! max_count = 1881
//! daily_rate_milli = 3800
//! fallback_count = 1444
//! ```
//!
//! ## Environment overrides
//!
//! - `SOVEREIGN_CORS_ORIGINS`: comma-separated origins, or `*`
//! - `SOVEREIGN_RATE_LIMIT`: requests per second, 0 disables
//! - `SOVEREIGN_API_KEY`: bearer key required on the sovereign routes
//! - `SOVEREIGN_ROUTE_PREFIX`: path prefix for every route

use crate::AppError;
use serde::{Deserialize, Serialize};
use sovereign_core::CounterPolicy;
use std::path::Path;
use std::time::Duration;

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default body limit (64 KiB). Contact payloads are small.
const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

/// Default rate limit in requests per second.
const DEFAULT_RATE_LIMIT: u32 = 100;

// =============================================================================
// SECTIONS
// =============================================================================

/// `[server]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub route_prefix: String,
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            route_prefix: String::new(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            body_limit_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

/// `[security]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    pub cors_origins: Vec<String>,
    pub rate_limit: u32,
    pub api_key: Option<String>,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            cors_origins: vec!["*".to_string()],
            rate_limit: DEFAULT_RATE_LIMIT,
            api_key: None,
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SovereignConfig {
    pub server: ServerSection,
    pub security: SecuritySection,
    pub counter: CounterPolicy,
}

impl SovereignConfig {
    /// Load from `path` if given, otherwise start from defaults. Environment
    /// overrides are applied in both cases.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    AppError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self, AppError> {
        toml::from_str(raw).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Apply `SOVEREIGN_*` overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(origins) = lookup("SOVEREIGN_CORS_ORIGINS") {
            self.security.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(limit) = lookup("SOVEREIGN_RATE_LIMIT") {
            match limit.parse() {
                Ok(rps) => self.security.rate_limit = rps,
                Err(_) => tracing::warn!("Ignoring invalid SOVEREIGN_RATE_LIMIT '{}'", limit),
            }
        }
        if let Some(key) = lookup("SOVEREIGN_API_KEY") {
            self.security.api_key = Some(key);
        }
        if let Some(prefix) = lookup("SOVEREIGN_ROUTE_PREFIX") {
            self.server.route_prefix = prefix;
        }
        self.security.api_key = self.security.api_key.take().filter(|k| !k.is_empty());
    }

    /// Settings consumed by the router.
    #[must_use]
    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            cors_origins: self.security.cors_origins.clone(),
            rate_limit: self.security.rate_limit,
            api_key: self.security.api_key.clone(),
            route_prefix: self.server.route_prefix.clone(),
            request_timeout: Duration::from_secs(self.server.request_timeout_secs.max(1)),
            body_limit_bytes: self.server.body_limit_bytes,
        }
    }
}

/// Everything `create_router` needs besides the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub cors_origins: Vec<String>,
    pub rate_limit: u32,
    pub api_key: Option<String>,
    pub route_prefix: String,
    pub request_timeout: Duration,
    pub body_limit_bytes: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        SovereignConfig::default().api_settings()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_is_default() {
        let config = SovereignConfig::from_toml("").expect("parse");
        assert_eq!(config, SovereignConfig::default());
        assert_eq!(config.security.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.counter.max_count, 1881);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = SovereignConfig::from_toml(
            r#"
            [server]
            port = 9000

            [counter]
            max_count = 2000
            "#,
        )
        .expect("parse");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.counter.max_count, 2000);
        assert_eq!(config.counter.base_count, 1420);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        assert!(matches!(
            SovereignConfig::from_toml("[server\nport="),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("SOVEREIGN_CORS_ORIGINS", "https://a.example, https://b.example"),
            ("SOVEREIGN_RATE_LIMIT", "5"),
            ("SOVEREIGN_API_KEY", "anon"),
            ("SOVEREIGN_ROUTE_PREFIX", "/fn"),
        ]
        .into_iter()
        .collect();

        let mut config = SovereignConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(
            config.security.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert_eq!(config.security.rate_limit, 5);
        assert_eq!(config.security.api_key.as_deref(), Some("anon"));
        assert_eq!(config.server.route_prefix, "/fn");
    }

    #[test]
    fn empty_api_key_disables_auth() {
        let mut config = SovereignConfig::default();
        config.apply_overrides(|k| (k == "SOVEREIGN_API_KEY").then(String::new));
        assert!(config.security.api_key.is_none());
    }
}
