//! Wire shapes for restaurants and taxonomy
//!
//! Reads render a stored [`RestaurantRecord`] as either the compact list
//! shape or the detail shape (list fields plus description, address,
//! coordinates and timestamps). Writes go the other way: a JSON body is
//! checked field by field into a [`RestaurantWrite`], which keeps track of
//! which fields the caller actually sent so partial updates only touch those.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use mekan_common::types::{District, ValidationErrors, NON_FIELD_ERRORS};

use crate::backend::RestaurantRecord;

/// Stored scale of latitude/longitude
pub const COORDINATE_SCALE: u32 = 6;
/// Rendered scale of the rating
pub const RATING_SCALE: u32 = 1;

pub const NAME_MAX_LENGTH: usize = 140;
pub const SLUG_MAX_LENGTH: usize = 50;
pub const ADDRESS_MAX_LENGTH: usize = 255;
pub const KEY_MAX_LENGTH: usize = 32;

const COORDINATE_MAX_DIGITS: u32 = 9;

// ============================================================================
// Read Shapes
// ============================================================================

/// Collection entry
#[derive(Debug, Clone, Serialize)]
pub struct RestaurantListItem {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    /// District slug
    pub district: String,
    pub district_name: String,
    pub price_tier: u8,
    pub rating: Decimal,
    pub review_count: u32,
    pub features: Vec<String>,
    pub additional_filters: Vec<String>,
}

impl From<&RestaurantRecord> for RestaurantListItem {
    fn from(record: &RestaurantRecord) -> Self {
        let restaurant = &record.restaurant;
        let mut rating = restaurant.rating;
        rating.rescale(RATING_SCALE);

        Self {
            id: restaurant.id,
            name: restaurant.name.clone(),
            slug: restaurant.slug.clone(),
            district: record.district.slug.clone(),
            district_name: record.district.name.clone(),
            price_tier: restaurant.price_tier,
            rating,
            review_count: restaurant.review_count,
            features: restaurant.features.clone(),
            additional_filters: restaurant.additional_filters.clone(),
        }
    }
}

/// Single restaurant view
#[derive(Debug, Clone, Serialize)]
pub struct RestaurantDetail {
    #[serde(flatten)]
    pub summary: RestaurantListItem,
    pub description: String,
    pub address: String,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&RestaurantRecord> for RestaurantDetail {
    fn from(record: &RestaurantRecord) -> Self {
        let restaurant = &record.restaurant;
        Self {
            summary: RestaurantListItem::from(record),
            description: restaurant.description.clone(),
            address: restaurant.address.clone(),
            latitude: restaurant.latitude,
            longitude: restaurant.longitude,
            created_at: restaurant.created_at,
            updated_at: restaurant.updated_at,
        }
    }
}

/// District as exposed over the API (the numeric id stays internal)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistrictOut {
    pub slug: String,
    pub name: String,
}

impl From<&District> for DistrictOut {
    fn from(district: &District) -> Self {
        Self {
            slug: district.slug.clone(),
            name: district.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RestaurantSuggestion {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Autocomplete payload
#[derive(Debug, Clone, Serialize)]
pub struct SearchSuggestions {
    pub query: String,
    pub restaurants: Vec<RestaurantSuggestion>,
    pub districts: Vec<DistrictOut>,
}

/// Limit/offset page envelope
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

// ============================================================================
// Write Shape
// ============================================================================

/// How a write body is being applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    /// Full update (PUT)
    Replace,
    /// Partial update (PATCH)
    Partial,
}

impl WriteMode {
    fn requires_all(self) -> bool {
        matches!(self, Self::Create | Self::Replace)
    }
}

/// District reference in a write body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistrictRef {
    Id(i64),
    Slug(String),
}

impl DistrictRef {
    /// A string that parses as an integer is tried as a primary key first
    pub fn as_id(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Slug(text) => text.parse().ok(),
        }
    }

    /// Error reported when no district matches
    pub fn missing_message(&self) -> String {
        match self {
            Self::Id(id) => format!("Invalid pk \"{}\" - object does not exist.", id),
            Self::Slug(text) if self.as_id().is_some() => {
                format!("Invalid pk \"{}\" - object does not exist.", text)
            }
            Self::Slug(slug) => format!("Object with slug={} does not exist.", slug),
        }
    }
}

/// Field-checked restaurant input.
///
/// `None` means the field was not sent. For the nullable coordinates,
/// `Some(None)` means it was sent as `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestaurantWrite {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub district: Option<DistrictRef>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<Option<Decimal>>,
    pub longitude: Option<Option<Decimal>>,
    pub price_tier: Option<u8>,
    pub feature_keys: Option<Vec<String>>,
    pub additional_keys: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

impl RestaurantWrite {
    /// Check a request body. Every field is examined and all failures are
    /// returned together.
    pub fn parse(body: &JsonValue, mode: WriteMode) -> Result<Self, ValidationErrors> {
        let Some(object) = body.as_object() else {
            return Err(ValidationErrors::single(
                NON_FIELD_ERRORS,
                format!(
                    "Invalid data. Expected a dictionary, but got {}.",
                    type_name(body)
                ),
            ));
        };

        let mut reader = FieldReader::new(object, mode.requires_all());

        let write = Self {
            name: reader.string("name", true, false, Some(NAME_MAX_LENGTH)),
            slug: reader.slug("slug"),
            district: reader.district("district"),
            description: reader.string("description", false, true, None),
            address: reader.string("address", false, true, Some(ADDRESS_MAX_LENGTH)),
            latitude: reader.coordinate("latitude"),
            longitude: reader.coordinate("longitude"),
            price_tier: reader.price_tier("price_tier"),
            feature_keys: reader.key_list("feature_keys"),
            additional_keys: reader.key_list("additional_keys"),
            is_active: reader.boolean("is_active"),
        };

        reader.errors.into_result().map(|()| write)
    }
}

/// Python-flavoured type names used in error messages
fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "NoneType",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(n) if n.is_f64() => "float",
        JsonValue::Number(_) => "int",
        JsonValue::String(_) => "str",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "dict",
    }
}

fn slug_pattern() -> &'static Regex {
    static SLUG: OnceLock<Regex> = OnceLock::new();
    SLUG.get_or_init(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern is valid"))
}

struct FieldReader<'a> {
    body: &'a Map<String, JsonValue>,
    requires_all: bool,
    errors: ValidationErrors,
}

impl<'a> FieldReader<'a> {
    fn new(body: &'a Map<String, JsonValue>, requires_all: bool) -> Self {
        Self {
            body,
            requires_all,
            errors: ValidationErrors::new(),
        }
    }

    fn fail(&mut self, field: &str, message: impl Into<String>) {
        // first message per field only
        if !self.errors.contains(field) {
            self.errors.add(field, message);
        }
    }

    /// Present, non-null value; records required/null failures
    fn value(&mut self, field: &str, required: bool) -> Option<&'a JsonValue> {
        let body = self.body;
        match body.get(field) {
            None => {
                if required && self.requires_all {
                    self.fail(field, "This field is required.");
                }
                None
            }
            Some(JsonValue::Null) => {
                self.fail(field, "This field may not be null.");
                None
            }
            Some(value) => Some(value),
        }
    }

    fn string(
        &mut self,
        field: &str,
        required: bool,
        allow_blank: bool,
        max_length: Option<usize>,
    ) -> Option<String> {
        let value = self.value(field, required)?;
        let text = match value {
            JsonValue::String(s) => s.trim().to_string(),
            JsonValue::Number(n) => n.to_string(),
            _ => {
                self.fail(field, "Not a valid string.");
                return None;
            }
        };

        if text.is_empty() && !allow_blank {
            self.fail(field, "This field may not be blank.");
            return None;
        }
        if let Some(max) = max_length {
            if text.chars().count() > max {
                self.fail(
                    field,
                    format!("Ensure this field has no more than {} characters.", max),
                );
                return None;
            }
        }
        Some(text)
    }

    fn slug(&mut self, field: &str) -> Option<String> {
        let slug = self.string(field, true, false, Some(SLUG_MAX_LENGTH))?;
        if !slug_pattern().is_match(&slug) {
            self.fail(
                field,
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
            );
            return None;
        }
        Some(slug)
    }

    fn district(&mut self, field: &str) -> Option<DistrictRef> {
        let value = self.value(field, true)?;
        match value {
            JsonValue::Number(n) => match n.as_i64() {
                Some(id) => Some(DistrictRef::Id(id)),
                None => {
                    self.fail(field, format!("Invalid pk \"{}\" - object does not exist.", n));
                    None
                }
            },
            JsonValue::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    self.fail(field, "This field may not be blank.");
                    return None;
                }
                Some(DistrictRef::Slug(s.to_string()))
            }
            other => {
                self.fail(
                    field,
                    format!("Incorrect type. Expected pk value, received {}.", type_name(other)),
                );
                None
            }
        }
    }

    fn price_tier(&mut self, field: &str) -> Option<u8> {
        let value = self.value(field, false)?;
        let Some(tier) = integer(value) else {
            self.fail(field, "A valid integer is required.");
            return None;
        };
        if !(1..=4).contains(&tier) {
            self.fail(field, "price_tier must be between 1 and 4");
            return None;
        }
        u8::try_from(tier).ok()
    }

    fn boolean(&mut self, field: &str) -> Option<bool> {
        let value = self.value(field, false)?;
        let parsed = match value {
            JsonValue::Bool(b) => Some(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(1) => Some(true),
                Some(0) => Some(false),
                _ => None,
            },
            JsonValue::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            },
            _ => None,
        };
        if parsed.is_none() {
            self.fail(field, "Must be a valid boolean.");
        }
        parsed
    }

    /// Nullable decimal; `Some(None)` for an explicit null
    fn coordinate(&mut self, field: &str) -> Option<Option<Decimal>> {
        let body = self.body;
        let value = match body.get(field) {
            None => return None,
            Some(JsonValue::Null) => return Some(None),
            Some(value) => value,
        };

        let text = match value {
            JsonValue::String(s) => s.trim().to_string(),
            JsonValue::Number(n) => n.to_string(),
            _ => {
                self.fail(field, "A valid number is required.");
                return None;
            }
        };

        let Some(decimal) = parse_decimal(&text) else {
            self.fail(field, "A valid number is required.");
            return None;
        };

        if let Err(message) = check_precision(decimal) {
            self.fail(field, message);
            return None;
        }

        let mut stored = decimal;
        stored.rescale(COORDINATE_SCALE);
        Some(Some(stored))
    }

    fn key_list(&mut self, field: &str) -> Option<Vec<String>> {
        let value = self.value(field, false)?;
        let JsonValue::Array(items) = value else {
            self.fail(
                field,
                format!(
                    "Expected a list of items but got type \"{}\".",
                    type_name(value)
                ),
            );
            return None;
        };

        let mut keys = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let key = match item {
                JsonValue::String(s) => s.trim().to_string(),
                JsonValue::Number(n) => n.to_string(),
                _ => {
                    self.fail(field, format!("Item {}: Not a valid string.", index));
                    return None;
                }
            };
            if key.is_empty() {
                self.fail(field, format!("Item {}: This field may not be blank.", index));
                return None;
            }
            if key.chars().count() > KEY_MAX_LENGTH {
                self.fail(
                    field,
                    format!(
                        "Item {}: Ensure this field has no more than {} characters.",
                        index, KEY_MAX_LENGTH
                    ),
                );
                return None;
            }
            keys.push(key);
        }
        Some(keys)
    }
}

fn integer(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 1e15)
                // integral and in range, so the cast is exact
                .map(|f| f as i64)
        }),
        JsonValue::String(s) => {
            let s = s.trim();
            // "2.0" and "2." read as 2
            let whole = match s.split_once('.') {
                Some((whole, fraction)) if fraction.bytes().all(|b| b == b'0') => whole,
                _ => s,
            };
            whole.parse().ok()
        }
        _ => None,
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Digit limits for a coordinate: 9 in total, 6 after the point, 3 before
fn check_precision(value: Decimal) -> Result<(), String> {
    let normalized = value.normalize();
    let scale = normalized.scale();
    let digits = if normalized.mantissa() == 0 {
        1
    } else {
        u32::try_from(normalized.mantissa().unsigned_abs().to_string().len()).unwrap_or(u32::MAX)
    };

    let whole_digits = digits.saturating_sub(scale);
    let total_digits = digits.max(scale);

    if total_digits > COORDINATE_MAX_DIGITS {
        return Err(format!(
            "Ensure that there are no more than {} digits in total.",
            COORDINATE_MAX_DIGITS
        ));
    }
    if scale > COORDINATE_SCALE {
        return Err(format!(
            "Ensure that there are no more than {} decimal places.",
            COORDINATE_SCALE
        ));
    }
    if whole_digits > COORDINATE_MAX_DIGITS - COORDINATE_SCALE {
        return Err(format!(
            "Ensure that there are no more than {} digits before the decimal point.",
            COORDINATE_MAX_DIGITS - COORDINATE_SCALE
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mekan_common::types::Restaurant;
    use serde_json::json;

    fn record() -> RestaurantRecord {
        let mut restaurant = Restaurant::new("Mikla", "mikla", 1);
        restaurant.rating = Decimal::new(45, 1);
        restaurant.latitude = Some(Decimal::new(41_031_200, 6));
        restaurant.features = vec!["alcohol".to_string()];
        RestaurantRecord {
            restaurant,
            district: District {
                id: 1,
                name: "Beyoğlu".to_string(),
                slug: "beyoglu".to_string(),
            },
        }
    }

    #[test]
    fn test_list_shape_fields() {
        let json = serde_json::to_value(RestaurantListItem::from(&record())).unwrap();
        assert_eq!(json["district"], "beyoglu");
        assert_eq!(json["district_name"], "Beyoğlu");
        assert_eq!(json["rating"], "4.5");
        assert_eq!(json["features"], json!(["alcohol"]));
        assert!(json.get("description").is_none());
        assert!(json.get("latitude").is_none());
    }

    #[test]
    fn test_detail_shape_extends_list_shape() {
        let json = serde_json::to_value(RestaurantDetail::from(&record())).unwrap();
        assert_eq!(json["slug"], "mikla");
        assert_eq!(json["latitude"], "41.031200");
        assert!(json["longitude"].is_null());
        assert_eq!(json["description"], "");
        assert!(json.get("created_at").is_some());
    }

    #[test]
    fn test_zero_rating_renders_one_place() {
        let mut record = record();
        record.restaurant.rating = Decimal::ZERO;
        let json = serde_json::to_value(RestaurantListItem::from(&record)).unwrap();
        assert_eq!(json["rating"], "0.0");
    }

    #[test]
    fn test_create_requires_identity_fields() {
        let errors = RestaurantWrite::parse(&json!({}), WriteMode::Create).unwrap_err();
        for field in ["name", "slug", "district"] {
            assert_eq!(errors.messages(field), ["This field is required."]);
        }
    }

    #[test]
    fn test_partial_update_requires_nothing() {
        let write = RestaurantWrite::parse(&json!({"price_tier": 3}), WriteMode::Partial).unwrap();
        assert_eq!(write.price_tier, Some(3));
        assert!(write.name.is_none());
        assert!(write.feature_keys.is_none());
    }

    #[test]
    fn test_parse_full_body() {
        let write = RestaurantWrite::parse(
            &json!({
                "name": "  Çiya Sofrası ",
                "slug": "ciya",
                "district": "kadikoy",
                "latitude": "40.990",
                "longitude": 29.0272,
                "price_tier": "2",
                "feature_keys": ["meal", "meal"],
                "is_active": "false",
                "rating": "5.0"
            }),
            WriteMode::Create,
        )
        .unwrap();

        assert_eq!(write.name.as_deref(), Some("Çiya Sofrası"));
        assert_eq!(write.district, Some(DistrictRef::Slug("kadikoy".to_string())));
        assert_eq!(write.latitude, Some(Some(Decimal::new(40_990_000, 6))));
        assert_eq!(write.longitude, Some(Some(Decimal::new(29_027_200, 6))));
        assert_eq!(write.price_tier, Some(2));
        // de-duplication happens when keys are resolved
        assert_eq!(write.feature_keys, Some(vec!["meal".to_string(), "meal".to_string()]));
        assert_eq!(write.is_active, Some(false));
    }

    #[test]
    fn test_district_by_id() {
        let write = RestaurantWrite::parse(&json!({"district": 3}), WriteMode::Partial).unwrap();
        assert_eq!(write.district, Some(DistrictRef::Id(3)));
    }

    #[test]
    fn test_integral_strings_accepted_as_integers() {
        let write =
            RestaurantWrite::parse(&json!({"price_tier": "3.0"}), WriteMode::Partial).unwrap();
        assert_eq!(write.price_tier, Some(3));

        let write =
            RestaurantWrite::parse(&json!({"price_tier": " 2. "}), WriteMode::Partial).unwrap();
        assert_eq!(write.price_tier, Some(2));

        let errors =
            RestaurantWrite::parse(&json!({"price_tier": "2.5"}), WriteMode::Partial).unwrap_err();
        assert_eq!(errors.messages("price_tier"), ["A valid integer is required."]);
    }

    #[test]
    fn test_numeric_district_string_kept_for_lookup() {
        let write =
            RestaurantWrite::parse(&json!({"district": "34"}), WriteMode::Partial).unwrap();
        let district = write.district.unwrap();
        assert_eq!(district, DistrictRef::Slug("34".to_string()));
        assert_eq!(district.as_id(), Some(34));
        assert_eq!(DistrictRef::Slug("kadikoy".to_string()).as_id(), None);
    }

    #[test]
    fn test_price_tier_bounds() {
        let errors =
            RestaurantWrite::parse(&json!({"price_tier": 5}), WriteMode::Partial).unwrap_err();
        assert_eq!(errors.messages("price_tier"), ["price_tier must be between 1 and 4"]);

        let errors =
            RestaurantWrite::parse(&json!({"price_tier": "cheap"}), WriteMode::Partial).unwrap_err();
        assert_eq!(errors.messages("price_tier"), ["A valid integer is required."]);
    }

    #[test]
    fn test_slug_format_and_length() {
        let errors =
            RestaurantWrite::parse(&json!({"slug": "no spaces!"}), WriteMode::Partial).unwrap_err();
        assert!(errors.messages("slug")[0].starts_with("Enter a valid slug"));

        let long = "a".repeat(SLUG_MAX_LENGTH + 1);
        let errors = RestaurantWrite::parse(&json!({"slug": long}), WriteMode::Partial).unwrap_err();
        assert_eq!(
            errors.messages("slug"),
            ["Ensure this field has no more than 50 characters."]
        );
    }

    #[test]
    fn test_null_handling() {
        let write = RestaurantWrite::parse(&json!({"latitude": null}), WriteMode::Partial).unwrap();
        assert_eq!(write.latitude, Some(None));

        let errors = RestaurantWrite::parse(&json!({"name": null}), WriteMode::Partial).unwrap_err();
        assert_eq!(errors.messages("name"), ["This field may not be null."]);
    }

    #[test]
    fn test_coordinate_precision() {
        let errors = RestaurantWrite::parse(
            &json!({"latitude": "41.1234567", "longitude": "1234.5"}),
            WriteMode::Partial,
        )
        .unwrap_err();
        assert_eq!(
            errors.messages("latitude"),
            ["Ensure that there are no more than 6 decimal places."]
        );
        assert_eq!(
            errors.messages("longitude"),
            ["Ensure that there are no more than 3 digits before the decimal point."]
        );

        assert!(RestaurantWrite::parse(&json!({"latitude": "-180.123456"}), WriteMode::Partial)
            .is_ok());
    }

    #[test]
    fn test_key_list_must_be_list() {
        let errors = RestaurantWrite::parse(&json!({"feature_keys": "outdoor"}), WriteMode::Partial)
            .unwrap_err();
        assert_eq!(
            errors.messages("feature_keys"),
            ["Expected a list of items but got type \"str\"."]
        );
    }

    #[test]
    fn test_non_object_body() {
        let errors = RestaurantWrite::parse(&json!([1, 2]), WriteMode::Create).unwrap_err();
        assert_eq!(
            errors.messages(NON_FIELD_ERRORS),
            ["Invalid data. Expected a dictionary, but got list."]
        );
    }

    #[test]
    fn test_errors_are_collected() {
        let errors = RestaurantWrite::parse(
            &json!({"name": "", "slug": "ok", "district": 1, "price_tier": 0, "is_active": "maybe"}),
            WriteMode::Create,
        )
        .unwrap_err();
        let fields: Vec<_> = errors.fields().collect();
        assert_eq!(fields, vec!["is_active", "name", "price_tier"]);
    }
}
