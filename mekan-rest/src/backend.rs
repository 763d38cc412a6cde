//! Restaurant and taxonomy storage
//!
//! [`DirectoryBackend`] is the storage contract the HTTP layer works
//! against. [`InMemoryBackend`] keeps every table behind one
//! `parking_lot::RwLock`; each mutating operation validates and applies its
//! whole change set under a single write guard, so a write either lands
//! completely or not at all.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use mekan_common::error::{Error, Result};
use mekan_common::types::{AdditionalFilter, District, FeatureTag, Restaurant, ValidationErrors};

use crate::query::ListQuery;
use crate::resolver::Lookup;
use crate::seed::{SeedReport, TaxonomySeed};
use crate::serializers::{DistrictRef, RestaurantWrite};

const FIELD_REQUIRED: &str = "This field is required.";

/// Restaurant joined with its district
#[derive(Debug, Clone, PartialEq)]
pub struct RestaurantRecord {
    pub restaurant: Restaurant,
    pub district: District,
}

/// One window of a filtered listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Rows matching the filter before windowing
    pub count: usize,
    pub items: Vec<T>,
}

/// Autocomplete matches
#[derive(Debug, Clone, Default)]
pub struct Suggestions {
    pub restaurants: Vec<Restaurant>,
    pub districts: Vec<District>,
}

/// Storage contract for the directory
#[async_trait::async_trait]
pub trait DirectoryBackend: Send + Sync {
    /// Districts ordered by name
    async fn list_districts(&self) -> Result<Vec<District>>;

    /// Feature tags ordered by label
    async fn list_features(&self) -> Result<Vec<FeatureTag>>;

    /// Additional filters ordered by label
    async fn list_additional_filters(&self) -> Result<Vec<AdditionalFilter>>;

    /// Filter, order and window the active restaurants
    async fn list_restaurants(&self, query: &ListQuery) -> Result<Page<RestaurantRecord>>;

    /// Look up a single restaurant, active or not
    async fn find_restaurant(&self, lookup: &Lookup) -> Result<Option<RestaurantRecord>>;

    async fn create_restaurant(&self, input: RestaurantWrite) -> Result<RestaurantRecord>;

    /// Apply the fields present in `input` to an existing restaurant
    async fn update_restaurant(&self, id: Uuid, input: RestaurantWrite) -> Result<RestaurantRecord>;

    /// Remove a restaurant together with its taxonomy links
    async fn delete_restaurant(&self, id: Uuid) -> Result<()>;

    /// Name-substring matches for an already trimmed query
    async fn suggest(&self, query: &str, limit: usize) -> Result<Suggestions>;

    /// Upsert the reference taxonomy by natural key in one transaction
    async fn seed_taxonomy(&self, seed: &TaxonomySeed) -> Result<SeedReport>;

    /// Delete a district that no restaurant references
    async fn remove_district(&self, slug: &str) -> Result<()>;
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Debug, Default)]
struct Tables {
    districts: BTreeMap<i64, District>,
    last_district_id: i64,
    features: HashMap<String, FeatureTag>,
    additional_filters: HashMap<String, AdditionalFilter>,
    restaurants: HashMap<Uuid, Restaurant>,
}

impl Tables {
    fn district_by_slug(&self, slug: &str) -> Option<&District> {
        self.districts.values().find(|d| d.slug == slug)
    }

    /// Primary key first, then slug for string references
    fn resolve_district(&self, reference: &DistrictRef) -> Option<&District> {
        let by_id = reference.as_id().and_then(|id| self.districts.get(&id));
        match reference {
            DistrictRef::Slug(slug) => by_id.or_else(|| self.district_by_slug(slug)),
            DistrictRef::Id(_) => by_id,
        }
    }

    fn find(&self, lookup: &Lookup) -> Option<&Restaurant> {
        match lookup {
            Lookup::Id(id) => self.restaurants.get(id),
            Lookup::Slug(slug) => self.restaurants.values().find(|r| r.slug == *slug),
        }
    }

    fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> bool {
        self.restaurants
            .values()
            .any(|r| r.slug == slug && Some(r.id) != except)
    }

    /// Attach the district and put taxonomy keys in label order
    fn hydrate(&self, restaurant: &Restaurant) -> Result<RestaurantRecord> {
        let district = self
            .districts
            .get(&restaurant.district_id)
            .cloned()
            .ok_or_else(|| {
                Error::InternalError(format!(
                    "restaurant {} references missing district {}",
                    restaurant.id, restaurant.district_id
                ))
            })?;

        let mut restaurant = restaurant.clone();
        sort_by_label(&mut restaurant.features, |key| {
            self.features.get(key).map(|tag| tag.label.as_str())
        });
        sort_by_label(&mut restaurant.additional_filters, |key| {
            self.additional_filters.get(key).map(|f| f.label.as_str())
        });

        Ok(RestaurantRecord {
            restaurant,
            district,
        })
    }

    /// Build the row a write would produce, without touching the tables.
    ///
    /// `existing` is the row being updated, `None` for a create. Store-level
    /// failures are merged into one set of field errors.
    fn stage(&self, existing: Option<&Restaurant>, input: RestaurantWrite) -> Result<Restaurant> {
        let mut errors = ValidationErrors::new();

        let district_id = match &input.district {
            Some(reference) => match self.resolve_district(reference) {
                Some(district) => Some(district.id),
                None => {
                    errors.add("district", reference.missing_message());
                    None
                }
            },
            None => existing.map(|r| r.district_id),
        };

        if let Some(slug) = &input.slug {
            if self.slug_taken(slug, existing.map(|r| r.id)) {
                errors.add("slug", "restaurant with this slug already exists.");
            }
        }

        let features = input
            .feature_keys
            .map(|keys| resolve_keys(keys, |k| self.features.contains_key(k)))
            .transpose()
            .unwrap_or_else(|message| {
                errors.add("feature_keys", message);
                None
            });
        let additional_filters = input
            .additional_keys
            .map(|keys| resolve_keys(keys, |k| self.additional_filters.contains_key(k)))
            .transpose()
            .unwrap_or_else(|message| {
                errors.add("additional_keys", message);
                None
            });

        let mut row = match existing {
            Some(row) => row.clone(),
            None => {
                if input.name.is_none() {
                    errors.add("name", FIELD_REQUIRED);
                }
                if input.slug.is_none() {
                    errors.add("slug", FIELD_REQUIRED);
                }
                if input.district.is_none() {
                    errors.add("district", FIELD_REQUIRED);
                }
                Restaurant::new(String::new(), String::new(), 0)
            }
        };

        errors.into_result()?;

        if let Some(name) = input.name {
            row.name = name;
        }
        if let Some(slug) = input.slug {
            row.slug = slug;
        }
        if let Some(district_id) = district_id {
            row.district_id = district_id;
        }
        if let Some(description) = input.description {
            row.description = description;
        }
        if let Some(address) = input.address {
            row.address = address;
        }
        if let Some(latitude) = input.latitude {
            row.latitude = latitude;
        }
        if let Some(longitude) = input.longitude {
            row.longitude = longitude;
        }
        if let Some(price_tier) = input.price_tier {
            row.price_tier = price_tier;
        }
        if let Some(is_active) = input.is_active {
            row.is_active = is_active;
        }
        // a supplied list, even an empty one, replaces the set
        if let Some(features) = features {
            row.features = features;
        }
        if let Some(additional_filters) = additional_filters {
            row.additional_filters = additional_filters;
        }

        if existing.is_some() {
            row.updated_at = Utc::now();
        }
        Ok(row)
    }
}

/// De-duplicate keys keeping first occurrence, then check every key exists.
/// The error names all missing keys.
fn resolve_keys(
    keys: Vec<String>,
    exists: impl Fn(&str) -> bool,
) -> std::result::Result<Vec<String>, String> {
    let mut unique: Vec<String> = Vec::with_capacity(keys.len());
    for key in keys {
        if !unique.contains(&key) {
            unique.push(key);
        }
    }

    let missing: Vec<&str> = unique
        .iter()
        .map(String::as_str)
        .filter(|k| !exists(k))
        .collect();

    if missing.is_empty() {
        Ok(unique)
    } else {
        Err(format!("Unknown keys: {}", missing.join(", ")))
    }
}

fn sort_by_label<'a>(keys: &mut [String], label: impl Fn(&str) -> Option<&'a str>) {
    keys.sort_by(|a, b| {
        label(a)
            .unwrap_or(a.as_str())
            .cmp(&label(b).unwrap_or(b.as_str()))
            .then_with(|| a.cmp(b))
    });
}

/// In-memory transactional backend
pub struct InMemoryBackend {
    tables: RwLock<Tables>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Insert a fully formed row, checking the same references a write does.
    ///
    /// Used for fixtures and sample data where fields such as `rating` are
    /// not writable through the API.
    pub fn insert_restaurant(&self, mut restaurant: Restaurant) -> Result<RestaurantRecord> {
        let mut tables = self.tables.write();
        let mut errors = ValidationErrors::new();

        if !tables.districts.contains_key(&restaurant.district_id) {
            errors.add(
                "district",
                format!(
                    "Invalid pk \"{}\" - object does not exist.",
                    restaurant.district_id
                ),
            );
        }
        if tables.slug_taken(&restaurant.slug, Some(restaurant.id))
            || tables.restaurants.contains_key(&restaurant.id)
        {
            errors.add("slug", "restaurant with this slug already exists.");
        }
        match resolve_keys(std::mem::take(&mut restaurant.features), |k| {
            tables.features.contains_key(k)
        }) {
            Ok(keys) => restaurant.features = keys,
            Err(message) => errors.add("feature_keys", message),
        }
        match resolve_keys(std::mem::take(&mut restaurant.additional_filters), |k| {
            tables.additional_filters.contains_key(k)
        }) {
            Ok(keys) => restaurant.additional_filters = keys,
            Err(message) => errors.add("additional_keys", message),
        }
        errors.into_result()?;

        let record = tables.hydrate(&restaurant)?;
        tables.restaurants.insert(restaurant.id, restaurant);
        Ok(record)
    }

    /// Id of the district with this slug
    pub fn district_id(&self, slug: &str) -> Option<i64> {
        self.tables.read().district_by_slug(slug).map(|d| d.id)
    }

    /// Number of stored restaurants, active or not
    pub fn restaurant_count(&self) -> usize {
        self.tables.read().restaurants.len()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DirectoryBackend for InMemoryBackend {
    async fn list_districts(&self) -> Result<Vec<District>> {
        let tables = self.tables.read();
        let mut districts: Vec<District> = tables.districts.values().cloned().collect();
        districts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(districts)
    }

    async fn list_features(&self) -> Result<Vec<FeatureTag>> {
        let tables = self.tables.read();
        let mut features: Vec<FeatureTag> = tables.features.values().cloned().collect();
        features.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.key.cmp(&b.key)));
        Ok(features)
    }

    async fn list_additional_filters(&self) -> Result<Vec<AdditionalFilter>> {
        let tables = self.tables.read();
        let mut filters: Vec<AdditionalFilter> =
            tables.additional_filters.values().cloned().collect();
        filters.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.key.cmp(&b.key)));
        Ok(filters)
    }

    async fn list_restaurants(&self, query: &ListQuery) -> Result<Page<RestaurantRecord>> {
        let tables = self.tables.read();

        let mut records = Vec::new();
        for restaurant in tables.restaurants.values().filter(|r| r.is_active) {
            let record = tables.hydrate(restaurant)?;
            if query.filter.matches(&record.restaurant, &record.district) {
                records.push(record);
            }
        }
        records.sort_by(|a, b| query.ordering.compare(&a.restaurant, &b.restaurant));

        let count = records.len();
        let items = records
            .into_iter()
            .skip(query.pagination.offset)
            .take(query.pagination.limit)
            .collect();

        Ok(Page { count, items })
    }

    async fn find_restaurant(&self, lookup: &Lookup) -> Result<Option<RestaurantRecord>> {
        let tables = self.tables.read();
        tables.find(lookup).map(|r| tables.hydrate(r)).transpose()
    }

    async fn create_restaurant(&self, input: RestaurantWrite) -> Result<RestaurantRecord> {
        let mut tables = self.tables.write();
        let row = tables.stage(None, input)?;
        let record = tables.hydrate(&row)?;
        tables.restaurants.insert(row.id, row);
        Ok(record)
    }

    async fn update_restaurant(&self, id: Uuid, input: RestaurantWrite) -> Result<RestaurantRecord> {
        let mut tables = self.tables.write();
        let existing = tables
            .restaurants
            .get(&id)
            .cloned()
            .ok_or(Error::ResourceNotFound)?;
        let row = tables.stage(Some(&existing), input)?;
        let record = tables.hydrate(&row)?;
        tables.restaurants.insert(id, row);
        Ok(record)
    }

    async fn delete_restaurant(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write();
        tables
            .restaurants
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::ResourceNotFound)
    }

    async fn suggest(&self, query: &str, limit: usize) -> Result<Suggestions> {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return Ok(Suggestions::default());
        }

        let tables = self.tables.read();

        let mut restaurants: Vec<Restaurant> = tables
            .restaurants
            .values()
            .filter(|r| r.is_active && r.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        restaurants.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        restaurants.truncate(limit);

        let mut districts: Vec<District> = tables
            .districts
            .values()
            .filter(|d| d.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        districts.sort_by(|a, b| a.name.cmp(&b.name));
        districts.truncate(limit);

        Ok(Suggestions {
            restaurants,
            districts,
        })
    }

    async fn seed_taxonomy(&self, seed: &TaxonomySeed) -> Result<SeedReport> {
        let mut tables = self.tables.write();

        // check every district row first so a conflict leaves nothing applied
        for entry in &seed.districts {
            let clash = tables
                .districts
                .values()
                .any(|d| d.name == entry.name && d.slug != entry.slug);
            if clash {
                return Err(Error::DuplicateKey(format!(
                    "district name '{}' already used by another slug",
                    entry.name
                )));
            }
        }

        let mut report = SeedReport::default();

        for entry in &seed.districts {
            let existing = tables.district_by_slug(&entry.slug).map(|d| d.id);
            match existing {
                Some(id) => {
                    if let Some(district) = tables.districts.get_mut(&id) {
                        district.name.clone_from(&entry.name);
                    }
                    report.updated += 1;
                }
                None => {
                    tables.last_district_id += 1;
                    let id = tables.last_district_id;
                    tables.districts.insert(
                        id,
                        District {
                            id,
                            name: entry.name.clone(),
                            slug: entry.slug.clone(),
                        },
                    );
                    report.created += 1;
                }
            }
        }

        for tag in &seed.features {
            match tables.features.insert(tag.key.clone(), tag.clone()) {
                Some(_) => report.updated += 1,
                None => report.created += 1,
            }
        }

        for filter in &seed.additional_filters {
            match tables
                .additional_filters
                .insert(filter.key.clone(), filter.clone())
            {
                Some(_) => report.updated += 1,
                None => report.created += 1,
            }
        }

        Ok(report)
    }

    async fn remove_district(&self, slug: &str) -> Result<()> {
        let mut tables = self.tables.write();
        let id = tables
            .district_by_slug(slug)
            .map(|d| d.id)
            .ok_or(Error::ResourceNotFound)?;

        let references = tables
            .restaurants
            .values()
            .filter(|r| r.district_id == id)
            .count();
        if references > 0 {
            return Err(Error::ProtectedReference(format!(
                "district '{}' ({} restaurants)",
                slug, references
            )));
        }

        tables.districts.remove(&id);
        Ok(())
    }
}
