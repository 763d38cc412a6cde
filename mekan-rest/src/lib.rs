//! Restaurant directory REST API
//!
//! - Filtered, ordered, limit/offset paginated restaurant listing
//! - Restaurant lookup by UUID or slug
//! - Editor-only create, update, partial update and delete
//! - Taxonomy listings and name-based search suggestions

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod handlers;
pub mod query;
pub mod resolver;
pub mod seed;
pub mod serializers;
pub mod server;

pub use backend::{DirectoryBackend, InMemoryBackend, Page, RestaurantRecord};
pub use handlers::RestState;
pub use query::{ListQuery, Ordering, Pagination, RestaurantFilter};
pub use resolver::{resolve, Lookup};
pub use seed::{load_sample_restaurants, SeedReport, TaxonomySeed};
pub use serializers::{RestaurantWrite, WriteMode};
pub use server::{configure, RestServer};
