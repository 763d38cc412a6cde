//! Common types for the restaurant directory

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Taxonomy Types
// ============================================================================

/// City district a restaurant belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Amenity tag such as "serves alcohol"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureTag {
    pub key: String,
    pub label: String,
}

impl FeatureTag {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// Secondary filter with an optional display glyph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalFilter {
    pub key: String,
    pub label: String,
    /// Empty when no glyph is set
    #[serde(default)]
    pub emoji: String,
}

impl AdditionalFilter {
    pub fn new(key: impl Into<String>, label: impl Into<String>, emoji: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            emoji: emoji.into(),
        }
    }
}

// ============================================================================
// Restaurant Types
// ============================================================================

/// Default price tier for a restaurant created without one
pub const DEFAULT_PRICE_TIER: u8 = 2;

/// Stored restaurant row with its taxonomy links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub district_id: i64,
    pub description: String,
    pub address: String,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub price_tier: u8,
    pub rating: Decimal,
    pub review_count: u32,
    /// Linked feature keys
    pub features: Vec<String>,
    /// Linked additional filter keys
    pub additional_filters: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Restaurant {
    pub fn new(name: impl Into<String>, slug: impl Into<String>, district_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            slug: slug.into(),
            district_id,
            description: String::new(),
            address: String::new(),
            latitude: None,
            longitude: None,
            price_tier: DEFAULT_PRICE_TIER,
            rating: Decimal::ZERO,
            review_count: 0,
            features: vec![],
            additional_filters: vec![],
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_feature(&self, key: &str) -> bool {
        self.features.iter().any(|k| k == key)
    }

    pub fn has_additional_filter(&self, key: &str) -> bool {
        self.additional_filters.iter().any(|k| k == key)
    }
}

// ============================================================================
// Token Types
// ============================================================================

/// Token claims for JWT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Group memberships
    #[serde(default)]
    pub groups: Vec<String>,
    /// Audience
    pub aud: String,
    /// Issuer
    pub iss: String,
    /// Issued at (as UTC timestamp)
    pub iat: i64,
    /// Expiration time (as UTC timestamp)
    pub exp: i64,
}

// ============================================================================
// Response Types
// ============================================================================

/// Field name used for errors that are not tied to one input field
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Field-to-messages mapping for rejected writes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single-field failure
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.fields.get(field).map_or(&[], Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.fields).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Standard API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
