//! Single-restaurant lookup by id or slug

use uuid::Uuid;

use mekan_common::error::{Error, Result};

use crate::backend::{DirectoryBackend, RestaurantRecord};

/// How a path identifier addresses a restaurant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Id(Uuid),
    Slug(String),
}

impl Lookup {
    /// Anything that parses as a UUID is an id lookup, everything else a slug.
    /// An id that matches no row does not fall back to slug matching.
    pub fn parse(identifier: &str) -> Self {
        match Uuid::parse_str(identifier) {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Slug(identifier.to_string()),
        }
    }
}

/// Locate a restaurant, active or not, or fail with not-found
pub async fn resolve(backend: &dyn DirectoryBackend, identifier: &str) -> Result<RestaurantRecord> {
    backend
        .find_restaurant(&Lookup::parse(identifier))
        .await?
        .ok_or(Error::ResourceNotFound)
}
