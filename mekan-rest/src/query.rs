//! Query string parsing for restaurant listings

use std::cmp::Ordering as CmpOrdering;

use url::Url;

use mekan_common::types::{District, Restaurant};

/// Query parameter names understood by the list endpoint
pub const DISTRICT_PARAM: &str = "district";
pub const FEATURE_PARAM: &str = "feature";
pub const ADDITIONAL_PARAM: &str = "additional";
pub const ORDERING_PARAM: &str = "ordering";
pub const LIMIT_PARAM: &str = "limit";
pub const OFFSET_PARAM: &str = "offset";
pub const SEARCH_PARAM: &str = "q";

/// Parsed list request: filter, ordering and page window
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filter: RestaurantFilter,
    pub ordering: Ordering,
    pub pagination: Pagination,
}

impl ListQuery {
    /// Parse a raw query string.
    ///
    /// Never fails: unknown parameters are ignored, malformed ordering terms
    /// are dropped and malformed limits fall back to the page size.
    pub fn parse(query_string: &str, page_size: usize, max_page_size: usize) -> Self {
        let params: Vec<(String, String)> =
            url::form_urlencoded::parse(query_string.as_bytes())
                .into_owned()
                .collect();

        Self {
            filter: RestaurantFilter::from_params(&params),
            ordering: last_value(&params, ORDERING_PARAM)
                .map(Ordering::parse)
                .unwrap_or_default(),
            pagination: Pagination::from_params(&params, page_size, max_page_size),
        }
    }
}

/// Value of a single-valued parameter; a repeated key keeps its last value
pub(crate) fn last_value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Non-empty values of a repeatable parameter, in request order, de-duplicated
fn repeated_values(params: &[(String, String)], key: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for (k, v) in params {
        let v = v.trim();
        if k == key && !v.is_empty() && !values.iter().any(|seen| seen == v) {
            values.push(v.to_string());
        }
    }
    values
}

// ============================================================================
// Filter
// ============================================================================

/// Composed predicate over restaurants.
///
/// Clauses are ANDed; values inside the feature and additional clauses are
/// ORed. An empty clause places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestaurantFilter {
    pub district: Option<String>,
    pub features: Vec<String>,
    pub additional: Vec<String>,
}

impl RestaurantFilter {
    pub fn from_params(params: &[(String, String)]) -> Self {
        let district = last_value(params, DISTRICT_PARAM)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Self {
            district,
            features: repeated_values(params, FEATURE_PARAM),
            additional: repeated_values(params, ADDITIONAL_PARAM),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.district.is_none() && self.features.is_empty() && self.additional.is_empty()
    }

    /// Whether a restaurant located in `district` passes every clause
    pub fn matches(&self, restaurant: &Restaurant, district: &District) -> bool {
        if let Some(slug) = &self.district {
            if district.slug != *slug {
                return false;
            }
        }

        if !self.features.is_empty() && !self.features.iter().any(|k| restaurant.has_feature(k)) {
            return false;
        }

        if !self.additional.is_empty()
            && !self
                .additional
                .iter()
                .any(|k| restaurant.has_additional_filter(k))
        {
            return false;
        }

        true
    }
}

// ============================================================================
// Ordering
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Rating,
    PriceTier,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Single sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerm {
    pub field: OrderField,
    pub direction: OrderDirection,
}

impl OrderTerm {
    pub const fn asc(field: OrderField) -> Self {
        Self {
            field,
            direction: OrderDirection::Asc,
        }
    }

    pub const fn desc(field: OrderField) -> Self {
        Self {
            field,
            direction: OrderDirection::Desc,
        }
    }

    /// Parse a caller-supplied term; only rating and price_tier are orderable
    fn parse(term: &str) -> Option<Self> {
        let (name, direction) = match term.strip_prefix('-') {
            Some(name) => (name, OrderDirection::Desc),
            None => (term, OrderDirection::Asc),
        };

        let field = match name {
            "rating" => OrderField::Rating,
            "price_tier" => OrderField::PriceTier,
            _ => return None,
        };

        Some(Self { field, direction })
    }

    fn compare(&self, a: &Restaurant, b: &Restaurant) -> CmpOrdering {
        let ordering = match self.field {
            OrderField::Rating => a.rating.cmp(&b.rating),
            OrderField::PriceTier => a.price_tier.cmp(&b.price_tier),
            OrderField::Name => a.name.cmp(&b.name),
        };
        match self.direction {
            OrderDirection::Asc => ordering,
            OrderDirection::Desc => ordering.reverse(),
        }
    }
}

/// Sort order for a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    terms: Vec<OrderTerm>,
}

impl Default for Ordering {
    /// Highest rated first, then alphabetical
    fn default() -> Self {
        Self {
            terms: vec![
                OrderTerm::desc(OrderField::Rating),
                OrderTerm::asc(OrderField::Name),
            ],
        }
    }
}

impl Ordering {
    /// Parse a comma-separated `ordering` value such as `-price_tier,rating`
    pub fn parse(raw: &str) -> Self {
        let mut terms: Vec<OrderTerm> = Vec::new();
        for term in raw.split(',').map(str::trim).filter_map(OrderTerm::parse) {
            if !terms.iter().any(|t| t.field == term.field) {
                terms.push(term);
            }
        }

        if terms.is_empty() {
            return Self::default();
        }

        terms.push(OrderTerm::asc(OrderField::Name));
        Self { terms }
    }

    pub fn terms(&self) -> &[OrderTerm] {
        &self.terms
    }

    /// Total order: the id breaks any remaining tie
    pub fn compare(&self, a: &Restaurant, b: &Restaurant) -> CmpOrdering {
        self.terms
            .iter()
            .map(|term| term.compare(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.id.cmp(&b.id))
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Limit/offset page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
}

impl Pagination {
    pub fn from_params(params: &[(String, String)], page_size: usize, max_page_size: usize) -> Self {
        let limit = last_value(params, LIMIT_PARAM)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|limit| *limit > 0)
            .map_or(page_size, |limit| limit.min(max_page_size));

        let offset = last_value(params, OFFSET_PARAM)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);

        Self { limit, offset }
    }

    /// URL of the following page, if any rows remain
    pub fn next_link(&self, request_url: &Url, count: usize) -> Option<String> {
        if self.offset.saturating_add(self.limit) >= count {
            return None;
        }
        Some(window_url(
            request_url,
            self.limit,
            Some(self.offset + self.limit),
        ))
    }

    /// URL of the preceding page; the first page carries no offset
    pub fn previous_link(&self, request_url: &Url) -> Option<String> {
        if self.offset == 0 {
            return None;
        }
        if self.offset <= self.limit {
            return Some(window_url(request_url, self.limit, None));
        }
        Some(window_url(
            request_url,
            self.limit,
            Some(self.offset - self.limit),
        ))
    }
}

/// Rewrite the limit/offset pair of a URL, keeping every other parameter
fn window_url(request_url: &Url, limit: usize, offset: Option<usize>) -> String {
    let kept: Vec<(String, String)> = request_url
        .query_pairs()
        .filter(|(k, _)| k != LIMIT_PARAM && k != OFFSET_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = request_url.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        pairs.append_pair(LIMIT_PARAM, &limit.to_string());
        if let Some(offset) = offset {
            pairs.append_pair(OFFSET_PARAM, &offset.to_string());
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn restaurant(name: &str, rating: i64, tier: u8) -> Restaurant {
        let mut r = Restaurant::new(name, name.to_lowercase(), 1);
        r.rating = Decimal::new(rating, 1);
        r.price_tier = tier;
        r
    }

    fn district(slug: &str) -> District {
        District {
            id: 1,
            name: slug.to_string(),
            slug: slug.to_string(),
        }
    }

    #[test]
    fn test_parse_repeated_feature_keys() {
        let query = ListQuery::parse("feature=outdoor&feature=alcohol&feature=outdoor", 50, 1000);
        assert_eq!(query.filter.features, vec!["outdoor", "alcohol"]);
        assert!(query.filter.additional.is_empty());
    }

    #[test]
    fn test_empty_values_place_no_constraint() {
        let query = ListQuery::parse("district=&feature=&additional=", 50, 1000);
        assert!(query.filter.is_empty());
    }

    #[test]
    fn test_single_valued_params_keep_last() {
        let query = ListQuery::parse(
            "district=beyoglu&district=kadikoy&ordering=rating&ordering=-price_tier&limit=5&limit=2",
            50,
            1000,
        );
        assert_eq!(query.filter.district.as_deref(), Some("kadikoy"));
        assert_eq!(query.ordering.terms()[0], OrderTerm::desc(OrderField::PriceTier));
        assert_eq!(query.pagination.limit, 2);
    }

    #[test]
    fn test_feature_clause_is_or() {
        let filter = RestaurantFilter {
            features: vec!["outdoor".to_string(), "alcohol".to_string()],
            ..Default::default()
        };
        let mut r = restaurant("Mikla", 45, 4);
        r.features = vec!["alcohol".to_string()];
        assert!(filter.matches(&r, &district("beyoglu")));

        r.features = vec!["coffee".to_string()];
        assert!(!filter.matches(&r, &district("beyoglu")));
    }

    #[test]
    fn test_clauses_are_and() {
        let filter = RestaurantFilter {
            district: Some("kadikoy".to_string()),
            features: vec!["outdoor".to_string()],
            ..Default::default()
        };
        let mut r = restaurant("Mikla", 45, 4);
        r.features = vec!["outdoor".to_string()];
        assert!(!filter.matches(&r, &district("beyoglu")));
        assert!(filter.matches(&r, &district("kadikoy")));
    }

    #[test]
    fn test_default_ordering() {
        let ordering = Ordering::default();
        let a = restaurant("Alpha", 40, 2);
        let b = restaurant("Beta", 45, 2);
        let c = restaurant("Ceta", 45, 2);
        let mut rows = vec![a, c, b];
        rows.sort_by(|x, y| ordering.compare(x, y));
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Beta", "Ceta", "Alpha"]);
    }

    #[test]
    fn test_parse_ordering_ignores_unknown_terms() {
        let ordering = Ordering::parse("name,-price_tier,review_count");
        assert_eq!(
            ordering.terms(),
            &[
                OrderTerm::desc(OrderField::PriceTier),
                OrderTerm::asc(OrderField::Name)
            ]
        );
        assert_eq!(Ordering::parse("bogus"), Ordering::default());
    }

    #[test]
    fn test_limit_is_capped_and_defaulted() {
        assert_eq!(ListQuery::parse("limit=5000", 50, 1000).pagination.limit, 1000);
        assert_eq!(ListQuery::parse("limit=0", 50, 1000).pagination.limit, 50);
        assert_eq!(ListQuery::parse("limit=abc&offset=-3", 50, 1000).pagination,
            Pagination { limit: 50, offset: 0 });
    }

    #[test]
    fn test_page_links() {
        let url = Url::parse("http://localhost/restaurants/?feature=outdoor&limit=2&offset=2").unwrap();
        let page = Pagination { limit: 2, offset: 2 };

        let next = page.next_link(&url, 5).unwrap();
        assert_eq!(next, "http://localhost/restaurants/?feature=outdoor&limit=2&offset=4");
        assert!(page.next_link(&url, 4).is_none());

        let previous = page.previous_link(&url).unwrap();
        assert_eq!(previous, "http://localhost/restaurants/?feature=outdoor&limit=2");

        let first = Pagination { limit: 2, offset: 0 };
        assert!(first.previous_link(&url).is_none());
    }
}
