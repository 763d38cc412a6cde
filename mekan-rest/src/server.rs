//! REST API server implementation

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::{self, TrailingSlash};
use actix_web::{web, App, FromRequest, Handler, HttpServer, Responder};
use tracing::info;

use mekan_auth::{EditorPolicy, JwtManager};
use mekan_common::config::RestConfig;
use mekan_common::error::{Error, Result};

use crate::backend::DirectoryBackend;
use crate::handlers::{self, RestState};

/// Restaurant directory HTTP server
pub struct RestServer {
    config: RestConfig,
    state: Arc<RestState>,
}

impl RestServer {
    /// Create a new REST server over a backend
    pub fn new(
        config: &RestConfig,
        backend: Arc<dyn DirectoryBackend>,
        jwt_manager: Arc<JwtManager>,
    ) -> Self {
        let state = Arc::new(RestState {
            backend,
            jwt_manager,
            policy: Arc::new(EditorPolicy),
            page_size: config.page_size.max(1),
            max_page_size: config.max_page_size.max(config.page_size).max(1),
        });

        Self {
            config: config.clone(),
            state,
        }
    }

    /// Shared handler state
    #[must_use]
    pub fn state(&self) -> Arc<RestState> {
        self.state.clone()
    }

    /// Run the REST server until it is stopped
    pub async fn run(&self) -> Result<()> {
        let state = self.state.clone();
        let config = self.config.clone();
        let host = self.config.host.clone();
        let port = self.config.port;

        info!("Starting REST API server on {}:{}", host, port);
        if config.cors_permissive() {
            info!("  CORS: any origin");
        } else {
            info!("  CORS origins: {}", config.cors_origins.join(", "));
        }

        let mut server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(state.clone()))
                .wrap(cors(&config))
                .wrap(middleware::Compress::default())
                .wrap(middleware::NormalizePath::new(TrailingSlash::Always))
                .wrap(middleware::Logger::default())
                .configure(configure)
        });

        if self.config.workers > 0 {
            server = server.workers(self.config.workers);
        }

        server
            .bind((host.as_str(), port))
            .map_err(|e| Error::ConfigError(format!("Cannot bind {}:{}: {}", host, port, e)))?
            .run()
            .await
            .map_err(|e| Error::InternalError(format!("HTTP server failed: {}", e)))?;

        Ok(())
    }
}

/// Route table, shared by the server and HTTP tests.
///
/// Paths carry a trailing slash; `NormalizePath` adds it to incoming requests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(read_only("/", handlers::api_root))
        .service(read_only("/health/", handlers::health_handler))
        .service(
            web::resource("/restaurants/")
                .route(web::get().to(handlers::list_restaurants))
                .route(web::head().to(handlers::list_restaurants))
                .route(web::post().to(handlers::create_restaurant)),
        )
        .service(
            web::resource("/restaurants/{identifier}/")
                .route(web::get().to(handlers::retrieve_restaurant))
                .route(web::head().to(handlers::retrieve_restaurant))
                .route(web::put().to(handlers::update_restaurant))
                .route(web::patch().to(handlers::partial_update_restaurant))
                .route(web::delete().to(handlers::delete_restaurant)),
        )
        .service(read_only("/features/", handlers::list_features))
        .service(read_only(
            "/additional-filters/",
            handlers::list_additional_filters,
        ))
        .service(read_only("/districts/", handlers::list_districts))
        .service(read_only(
            "/search/suggestions/",
            handlers::search_suggestions,
        ))
        .default_service(web::to(handlers::not_found_handler));
}

/// Resource answering GET, and HEAD through the same handler
fn read_only<F, Args>(path: &str, handler: F) -> actix_web::Resource
where
    F: Handler<Args> + Clone,
    Args: FromRequest + 'static,
    F::Output: Responder + 'static,
{
    web::resource(path)
        .route(web::get().to(handler.clone()))
        .route(web::head().to(handler))
}

fn cors(config: &RestConfig) -> Cors {
    if config.cors_permissive() {
        return Cors::permissive();
    }

    config
        .cors_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ])
        .max_age(3600)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use actix_web::http::{Method, StatusCode};
    use actix_web::test;

    fn server(config: &RestConfig) -> RestServer {
        RestServer::new(
            config,
            Arc::new(InMemoryBackend::new()),
            Arc::new(JwtManager::new("test-secret-key", "mekan", "mekan-api", 1800)),
        )
    }

    #[::core::prelude::v1::test]
    fn test_page_size_bounds() {
        let config = RestConfig {
            page_size: 0,
            max_page_size: 0,
            ..RestConfig::default()
        };
        let state = server(&config).state();
        assert_eq!(state.page_size, 1);
        assert_eq!(state.max_page_size, 1);
    }

    #[actix_web::test]
    async fn test_routes_without_trailing_slash() {
        let state = server(&RestConfig::default()).state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .wrap(middleware::NormalizePath::new(TrailingSlash::Always))
                .configure(configure),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/features").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/nowhere").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = test::call_service(
            &app,
            test::TestRequest::delete().uri("/restaurants").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[actix_web::test]
    async fn test_head_served_on_read_routes() {
        let state = server(&RestConfig::default()).state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .wrap(middleware::NormalizePath::new(TrailingSlash::Always))
                .configure(configure),
        )
        .await;

        let read_routes = [
            "/",
            "/health",
            "/restaurants",
            "/features",
            "/districts",
            "/additional-filters",
            "/search/suggestions",
        ];
        for uri in read_routes {
            let req = test::TestRequest::default()
                .method(Method::HEAD)
                .uri(uri)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK, "HEAD {}", uri);
        }
    }
}
