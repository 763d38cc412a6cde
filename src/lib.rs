//! Mekan restaurant directory
//!
//! REST backend for browsing restaurants by district, features and
//! additional filters, with editor-gated writes.
//!
//! # Crates
//!
//! - [`common`] - configuration, errors and domain types
//! - [`auth`] - bearer token validation and the editor access policy
//! - [`rest`] - filtering, storage, serialization and the HTTP server

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub use mekan_auth as auth;
pub use mekan_common as common;
pub use mekan_rest as rest;

use std::sync::Arc;
use tracing::info;

use mekan_auth::JwtManager;
use mekan_common::config::MekanConfig;
use mekan_common::error::Result;
use mekan_rest::{DirectoryBackend, InMemoryBackend, RestServer, TaxonomySeed};

/// Main directory server
pub struct MekanServer {
    config: MekanConfig,
    backend: Arc<InMemoryBackend>,
    jwt_manager: Arc<JwtManager>,
    rest_server: Arc<RestServer>,
}

impl MekanServer {
    /// Create a new server with the given configuration
    ///
    /// # Errors
    /// Returns an error if the auth section is invalid or the store cannot be
    /// bootstrapped.
    pub async fn new(config: MekanConfig) -> Result<Self> {
        info!("Initializing restaurant directory");

        let jwt_manager = Arc::new(JwtManager::from_config(&config.auth)?);
        let backend = Arc::new(InMemoryBackend::new());

        // demo rows reference the baseline taxonomy
        if config.store.seed_taxonomy || config.store.sample_data {
            let report = backend.seed_taxonomy(&TaxonomySeed::baseline()).await?;
            info!(
                created = report.created,
                updated = report.updated,
                "Seeded taxonomy"
            );
        }
        if config.store.sample_data {
            mekan_rest::load_sample_restaurants(&backend)?;
        }

        let rest_server = Arc::new(RestServer::new(
            &config.rest,
            backend.clone(),
            jwt_manager.clone(),
        ));

        Ok(Self {
            config,
            backend,
            jwt_manager,
            rest_server,
        })
    }

    /// Get reference to the REST server
    #[must_use]
    pub fn rest(&self) -> &RestServer {
        &self.rest_server
    }

    /// Get reference to the backing store
    #[must_use]
    pub fn backend(&self) -> &InMemoryBackend {
        &self.backend
    }

    /// Get reference to the token manager
    #[must_use]
    pub fn jwt_manager(&self) -> &JwtManager {
        &self.jwt_manager
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &MekanConfig {
        &self.config
    }

    /// Serve HTTP until the server stops
    ///
    /// # Errors
    /// Returns an error if the REST server fails to bind or run.
    pub async fn run(&self) -> Result<()> {
        info!("Starting restaurant directory");
        info!(
            "  - REST service: http://{}:{}",
            self.config.rest.host, self.config.rest.port
        );

        self.rest_server.run().await
    }

    /// Shutdown gracefully
    ///
    /// # Errors
    /// Currently infallible; kept fallible for backends that hold connections.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down restaurant directory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_config_seeds_taxonomy_only() {
        let server = MekanServer::new(MekanConfig::default()).await.unwrap();
        assert_eq!(server.backend().list_districts().await.unwrap().len(), 3);
        assert_eq!(server.backend().restaurant_count(), 0);
    }

    #[tokio::test]
    async fn test_sample_data_implies_taxonomy() {
        let mut config = MekanConfig::default();
        config.store.seed_taxonomy = false;
        config.store.sample_data = true;

        let server = MekanServer::new(config).await.unwrap();
        assert_eq!(server.backend().restaurant_count(), 4);
    }

    #[tokio::test]
    async fn test_blank_secret_is_rejected() {
        let mut config = MekanConfig::default();
        config.auth.jwt_secret = Some(String::new());
        assert!(MekanServer::new(config).await.is_err());
    }
}
