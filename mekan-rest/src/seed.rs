//! Baseline taxonomy and demo restaurants

use rust_decimal::Decimal;
use tracing::info;

use mekan_common::error::{Error, Result};
use mekan_common::types::{AdditionalFilter, FeatureTag, Restaurant};

use crate::backend::InMemoryBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistrictSeed {
    pub slug: String,
    pub name: String,
}

impl DistrictSeed {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
        }
    }
}

/// Reference rows upserted by natural key (district slug, tag key)
#[derive(Debug, Clone)]
pub struct TaxonomySeed {
    pub districts: Vec<DistrictSeed>,
    pub features: Vec<FeatureTag>,
    pub additional_filters: Vec<AdditionalFilter>,
}

impl TaxonomySeed {
    /// Taxonomy the frontend filters are built around
    pub fn baseline() -> Self {
        Self {
            districts: vec![
                DistrictSeed::new("beyoglu", "Beyoğlu"),
                DistrictSeed::new("kadikoy", "Kadıköy"),
                DistrictSeed::new("sisli", "Şişli"),
            ],
            features: vec![
                FeatureTag::new("alcohol", "Serves Alcohol"),
                FeatureTag::new("outdoor", "Outdoor Seating"),
                FeatureTag::new("meal", "Full Meals"),
                FeatureTag::new("coffee", "Coffee"),
                FeatureTag::new("dessert", "Dessert"),
            ],
            additional_filters: vec![
                AdditionalFilter::new("date-night", "Date Night", "💞"),
                AdditionalFilter::new("work-friendly", "Work Friendly", "💻"),
                AdditionalFilter::new("group-friendly", "Group Friendly", "👥"),
            ],
        }
    }
}

/// Row counts from a seed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub updated: usize,
}

struct SampleRestaurant {
    name: &'static str,
    slug: &'static str,
    district: &'static str,
    address: &'static str,
    coordinates: (i64, i64),
    price_tier: u8,
    rating: i64,
    review_count: u32,
    features: &'static [&'static str],
    additional: &'static [&'static str],
}

const SAMPLE_RESTAURANTS: &[SampleRestaurant] = &[
    SampleRestaurant {
        name: "Mikla",
        slug: "mikla",
        district: "beyoglu",
        address: "Meşrutiyet Cd. No:15, Beyoğlu",
        coordinates: (41_031_870, 28_975_090),
        price_tier: 4,
        rating: 46,
        review_count: 1_820,
        features: &["alcohol", "meal"],
        additional: &["date-night"],
    },
    SampleRestaurant {
        name: "Çiya Sofrası",
        slug: "ciya-sofrasi",
        district: "kadikoy",
        address: "Caferağa, Güneşli Bahçe Sk. No:43, Kadıköy",
        coordinates: (40_989_720, 29_025_870),
        price_tier: 2,
        rating: 45,
        review_count: 3_410,
        features: &["meal", "dessert"],
        additional: &["group-friendly"],
    },
    SampleRestaurant {
        name: "Kronotrop",
        slug: "kronotrop",
        district: "beyoglu",
        address: "Firuzağa, Defterdar Ykş. No:1, Beyoğlu",
        coordinates: (41_031_100, 28_982_600),
        price_tier: 2,
        rating: 44,
        review_count: 960,
        features: &["coffee", "outdoor"],
        additional: &["work-friendly"],
    },
    SampleRestaurant {
        name: "Hünkar",
        slug: "hunkar",
        district: "sisli",
        address: "Teşvikiye, Mim Kemal Öke Cd. No:21, Şişli",
        coordinates: (41_051_400, 28_993_300),
        price_tier: 3,
        rating: 43,
        review_count: 1_150,
        features: &["meal", "dessert"],
        additional: &["date-night", "group-friendly"],
    },
];

/// Load the demo restaurants; expects the baseline taxonomy to be present
pub fn load_sample_restaurants(backend: &InMemoryBackend) -> Result<usize> {
    for sample in SAMPLE_RESTAURANTS {
        let district_id = backend.district_id(sample.district).ok_or_else(|| {
            Error::ConfigError(format!(
                "sample data needs district '{}', seed the taxonomy first",
                sample.district
            ))
        })?;

        let mut restaurant = Restaurant::new(sample.name, sample.slug, district_id);
        restaurant.address = sample.address.to_string();
        restaurant.latitude = Some(Decimal::new(sample.coordinates.0, 6));
        restaurant.longitude = Some(Decimal::new(sample.coordinates.1, 6));
        restaurant.price_tier = sample.price_tier;
        restaurant.rating = Decimal::new(sample.rating, 1);
        restaurant.review_count = sample.review_count;
        restaurant.features = sample.features.iter().map(|k| (*k).to_string()).collect();
        restaurant.additional_filters =
            sample.additional.iter().map(|k| (*k).to_string()).collect();

        backend.insert_restaurant(restaurant)?;
    }

    info!(count = SAMPLE_RESTAURANTS.len(), "Loaded sample restaurants");
    Ok(SAMPLE_RESTAURANTS.len())
}
