//! Configuration types for the restaurant directory

use serde::{Deserialize, Serialize};

/// Main configuration for all services
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MekanConfig {
    /// REST API configuration
    pub rest: RestConfig,
    /// Token validation configuration
    pub auth: AuthConfig,
    /// Store bootstrap configuration
    pub store: StoreConfig,
}

/// REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    /// Host to bind to
    pub host: String,
    /// Port for REST API (default: 8000)
    pub port: u16,
    /// Default number of restaurants per page when `limit` is absent
    pub page_size: usize,
    /// Upper bound applied to a caller-supplied `limit`
    pub max_page_size: usize,
    /// CORS allowed origins, `"*"` allows any origin
    pub cors_origins: Vec<String>,
    /// Number of HTTP worker threads (0 = actix default)
    pub workers: usize,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            page_size: 50,
            max_page_size: 1000,
            cors_origins: vec!["http://localhost:3000".to_string()],
            workers: 4,
        }
    }
}

impl RestConfig {
    /// Whether CORS should accept any origin
    #[must_use]
    pub fn cors_permissive(&self) -> bool {
        self.cors_origins.iter().any(|origin| origin == "*")
    }
}

/// Bearer token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT secret for HS256 (auto-generated if not set)
    pub jwt_secret: Option<String>,
    /// Expected `iss` claim
    pub issuer: String,
    /// Expected `aud` claim
    pub audience: String,
    /// Lifetime of locally issued tokens in seconds (default: 1800)
    pub jwt_expiry: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            issuer: "mekan".to_string(),
            audience: "mekan-api".to_string(),
            jwt_expiry: 1800,
        }
    }
}

/// Store bootstrap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Upsert the baseline districts, features and additional filters at startup
    pub seed_taxonomy: bool,
    /// Load demo restaurants at startup (implies the taxonomy seed)
    pub sample_data: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            seed_taxonomy: true,
            sample_data: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MekanConfig::default();
        assert_eq!(config.rest.port, 8000);
        assert_eq!(config.rest.page_size, 50);
        assert_eq!(config.auth.jwt_expiry, 1800);
        assert!(config.store.seed_taxonomy);
        assert!(!config.store.sample_data);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: MekanConfig =
            serde_json::from_str(r#"{"rest": {"port": 9100}, "store": {"sample_data": true}}"#)
                .unwrap();
        assert_eq!(parsed.rest.port, 9100);
        assert_eq!(parsed.rest.host, "0.0.0.0");
        assert!(parsed.store.seed_taxonomy);
        assert!(parsed.store.sample_data);
        assert_eq!(parsed.auth.issuer, "mekan");
    }

    #[test]
    fn test_cors_permissive() {
        let mut config = RestConfig::default();
        assert!(!config.cors_permissive());
        config.cors_origins.push("*".to_string());
        assert!(config.cors_permissive());
    }
}
