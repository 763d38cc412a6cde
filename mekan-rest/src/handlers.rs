//! HTTP handlers for the directory API

use std::sync::Arc;

use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, error, info, warn};

use mekan_auth::{authenticate, AccessPolicy, Identity, JwtManager};
use mekan_common::error::{Error, Result};
use mekan_common::types::ApiError;

use crate::backend::DirectoryBackend;
use crate::query::{last_value, ListQuery, SEARCH_PARAM};
use crate::resolver::resolve;
use crate::serializers::{
    DistrictOut, Paginated, RestaurantDetail, RestaurantListItem, RestaurantSuggestion,
    RestaurantWrite, SearchSuggestions, WriteMode,
};

/// Maximum entries per suggestion list
pub const SUGGESTION_LIMIT: usize = 5;

/// Shared REST API state
pub struct RestState {
    pub backend: Arc<dyn DirectoryBackend>,
    pub jwt_manager: Arc<JwtManager>,
    pub policy: Arc<dyn AccessPolicy>,
    pub page_size: usize,
    pub max_page_size: usize,
}

// ============================================================================
// Response helpers
// ============================================================================

fn error_response(err: &Error) -> HttpResponse {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        error!(error = %err, "Request failed");
    }

    let mut response = HttpResponse::build(status);
    if err.is_authentication_failure() {
        response.insert_header((header::WWW_AUTHENTICATE, r#"Bearer realm="api""#));
    }
    response.json(err.to_api_error())
}

fn respond<T: Serialize>(result: Result<T>, status: StatusCode) -> HttpResponse {
    match result {
        Ok(body) => HttpResponse::build(status).json(body),
        Err(err) => error_response(&err),
    }
}

/// Authenticate the caller and apply the request-level policy check
fn admit(state: &RestState, req: &HttpRequest) -> Result<Identity> {
    let identity = authenticate(req, &state.jwt_manager).map_err(|err| {
        warn!(error = %err, path = %req.path(), "Rejected bearer token");
        err
    })?;
    state.policy.authorize(req.method(), &identity)?;
    Ok(identity)
}

/// Parse a write body after the caller has been admitted
fn read_body(body: &[u8], mode: WriteMode) -> Result<RestaurantWrite> {
    let value: JsonValue = if body.is_empty() {
        JsonValue::Object(serde_json::Map::new())
    } else {
        serde_json::from_slice(body)
            .map_err(|e| Error::MalformedPayload(format!("JSON parse error - {}", e)))?
    };
    Ok(RestaurantWrite::parse(&value, mode)?)
}

// ============================================================================
// Restaurants
// ============================================================================

/// GET /restaurants/
pub async fn list_restaurants(state: web::Data<Arc<RestState>>, req: HttpRequest) -> HttpResponse {
    respond(list_page(&state, &req).await, StatusCode::OK)
}

async fn list_page(state: &RestState, req: &HttpRequest) -> Result<Paginated<RestaurantListItem>> {
    admit(state, req)?;

    let query = ListQuery::parse(req.query_string(), state.page_size, state.max_page_size);
    debug!(
        district = ?query.filter.district,
        features = ?query.filter.features,
        additional = ?query.filter.additional,
        limit = query.pagination.limit,
        offset = query.pagination.offset,
        "Listing restaurants"
    );

    let page = state.backend.list_restaurants(&query).await?;
    let url = req.full_url();

    Ok(Paginated {
        count: page.count,
        next: query.pagination.next_link(&url, page.count),
        previous: query.pagination.previous_link(&url),
        results: page.items.iter().map(RestaurantListItem::from).collect(),
    })
}

/// GET /restaurants/{identifier}/
pub async fn retrieve_restaurant(
    state: web::Data<Arc<RestState>>,
    path: web::Path<String>,
    req: HttpRequest,
) -> HttpResponse {
    respond(retrieve(&state, &path, &req).await, StatusCode::OK)
}

async fn retrieve(state: &RestState, identifier: &str, req: &HttpRequest) -> Result<RestaurantDetail> {
    let identity = admit(state, req)?;
    let record = resolve(state.backend.as_ref(), identifier).await?;
    state
        .policy
        .authorize_object(req.method(), &identity, &record.restaurant)?;
    Ok(RestaurantDetail::from(&record))
}

/// POST /restaurants/
pub async fn create_restaurant(
    state: web::Data<Arc<RestState>>,
    body: web::Bytes,
    req: HttpRequest,
) -> HttpResponse {
    respond(create(&state, &body, &req).await, StatusCode::CREATED)
}

async fn create(state: &RestState, body: &[u8], req: &HttpRequest) -> Result<RestaurantDetail> {
    let identity = admit(state, req)?;
    let input = read_body(body, WriteMode::Create).map_err(|err| rejected(err, &identity))?;

    let record = state
        .backend
        .create_restaurant(input)
        .await
        .map_err(|err| rejected(err, &identity))?;

    info!(
        id = %record.restaurant.id,
        slug = %record.restaurant.slug,
        actor = identity.describe(),
        "Created restaurant"
    );
    Ok(RestaurantDetail::from(&record))
}

/// PUT /restaurants/{identifier}/
pub async fn update_restaurant(
    state: web::Data<Arc<RestState>>,
    path: web::Path<String>,
    body: web::Bytes,
    req: HttpRequest,
) -> HttpResponse {
    respond(
        update(&state, &path, &body, &req, WriteMode::Replace).await,
        StatusCode::OK,
    )
}

/// PATCH /restaurants/{identifier}/
pub async fn partial_update_restaurant(
    state: web::Data<Arc<RestState>>,
    path: web::Path<String>,
    body: web::Bytes,
    req: HttpRequest,
) -> HttpResponse {
    respond(
        update(&state, &path, &body, &req, WriteMode::Partial).await,
        StatusCode::OK,
    )
}

async fn update(
    state: &RestState,
    identifier: &str,
    body: &[u8],
    req: &HttpRequest,
    mode: WriteMode,
) -> Result<RestaurantDetail> {
    let identity = admit(state, req)?;
    let target = resolve(state.backend.as_ref(), identifier).await?;
    state
        .policy
        .authorize_object(req.method(), &identity, &target.restaurant)?;

    let input = read_body(body, mode).map_err(|err| rejected(err, &identity))?;
    let record = state
        .backend
        .update_restaurant(target.restaurant.id, input)
        .await
        .map_err(|err| rejected(err, &identity))?;

    info!(
        id = %record.restaurant.id,
        slug = %record.restaurant.slug,
        actor = identity.describe(),
        partial = mode == WriteMode::Partial,
        "Updated restaurant"
    );
    Ok(RestaurantDetail::from(&record))
}

/// DELETE /restaurants/{identifier}/
pub async fn delete_restaurant(
    state: web::Data<Arc<RestState>>,
    path: web::Path<String>,
    req: HttpRequest,
) -> HttpResponse {
    match destroy(&state, &path, &req).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => error_response(&err),
    }
}

async fn destroy(state: &RestState, identifier: &str, req: &HttpRequest) -> Result<()> {
    let identity = admit(state, req)?;
    let target = resolve(state.backend.as_ref(), identifier).await?;
    state
        .policy
        .authorize_object(req.method(), &identity, &target.restaurant)?;

    state.backend.delete_restaurant(target.restaurant.id).await?;

    info!(
        id = %target.restaurant.id,
        slug = %target.restaurant.slug,
        actor = identity.describe(),
        "Deleted restaurant"
    );
    Ok(())
}

fn rejected(err: Error, identity: &Identity) -> Error {
    if let Error::Validation(errors) = &err {
        warn!(actor = identity.describe(), errors = %errors, "Rejected restaurant write");
    }
    err
}

// ============================================================================
// Taxonomy
// ============================================================================

/// GET /features/
pub async fn list_features(state: web::Data<Arc<RestState>>, req: HttpRequest) -> HttpResponse {
    let result = match admit(&state, &req) {
        Ok(_) => state.backend.list_features().await,
        Err(err) => Err(err),
    };
    respond(result, StatusCode::OK)
}

/// GET /additional-filters/
pub async fn list_additional_filters(
    state: web::Data<Arc<RestState>>,
    req: HttpRequest,
) -> HttpResponse {
    let result = match admit(&state, &req) {
        Ok(_) => state.backend.list_additional_filters().await,
        Err(err) => Err(err),
    };
    respond(result, StatusCode::OK)
}

/// GET /districts/
pub async fn list_districts(state: web::Data<Arc<RestState>>, req: HttpRequest) -> HttpResponse {
    let result = match admit(&state, &req) {
        Ok(_) => state
            .backend
            .list_districts()
            .await
            .map(|districts| districts.iter().map(DistrictOut::from).collect::<Vec<_>>()),
        Err(err) => Err(err),
    };
    respond(result, StatusCode::OK)
}

// ============================================================================
// Search
// ============================================================================

/// GET /search/suggestions/?q=
pub async fn search_suggestions(
    state: web::Data<Arc<RestState>>,
    req: HttpRequest,
) -> HttpResponse {
    respond(suggestions(&state, &req).await, StatusCode::OK)
}

async fn suggestions(state: &RestState, req: &HttpRequest) -> Result<SearchSuggestions> {
    admit(state, req)?;

    let params: Vec<(String, String)> = url::form_urlencoded::parse(req.query_string().as_bytes())
        .into_owned()
        .collect();
    let query = last_value(&params, SEARCH_PARAM)
        .map(|value| value.trim().to_string())
        .unwrap_or_default();

    let found = state.backend.suggest(&query, SUGGESTION_LIMIT).await?;

    Ok(SearchSuggestions {
        restaurants: found
            .restaurants
            .into_iter()
            .map(|r| RestaurantSuggestion {
                id: r.id,
                name: r.name,
                slug: r.slug,
            })
            .collect(),
        districts: found.districts.iter().map(DistrictOut::from).collect(),
        query,
    })
}

// ============================================================================
// Service endpoints
// ============================================================================

/// GET / - links to the collection endpoints
pub async fn api_root(req: HttpRequest) -> HttpResponse {
    let info = req.connection_info();
    let base = format!("{}://{}", info.scheme(), info.host());

    HttpResponse::Ok().json(serde_json::json!({
        "restaurants": format!("{}/restaurants/", base),
        "features": format!("{}/features/", base),
        "additional-filters": format!("{}/additional-filters/", base),
        "districts": format!("{}/districts/", base),
        "search-suggestions": format!("{}/search/suggestions/", base),
    }))
}

/// Health check
pub async fn health_handler() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "mekan",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Fallback for unknown routes
pub async fn not_found_handler() -> HttpResponse {
    HttpResponse::NotFound().json(ApiError::new("not_found", Error::ResourceNotFound.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_status_and_challenge() {
        let response = error_response(&Error::Unauthorized);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            r#"Bearer realm="api""#
        );

        let response = error_response(&Error::Forbidden);
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn test_empty_body_is_an_empty_object() {
        let errors = match read_body(b"", WriteMode::Create) {
            Err(Error::Validation(errors)) => errors,
            other => panic!("unexpected result: {:?}", other),
        };
        assert!(errors.contains("name"));
        assert!(read_body(b"", WriteMode::Partial).is_ok());
    }

    #[test]
    fn test_malformed_body() {
        assert!(matches!(
            read_body(b"{\"name\": ", WriteMode::Partial),
            Err(Error::MalformedPayload(_))
        ));
    }
}
